use serde::{Deserialize, Serialize};

use crate::field::field_model::FieldDescriptor;
use crate::store::record::{FormRecord, RecordUpdate};
use crate::store::store::StoreResult;

/// One-shot request between page, coordinator and UI. The `action` key
/// selects the variant on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Message {
    // ---- storage, handled by the coordinator ----
    GetFormsForUrl { url_pattern: String },
    GetAllForms,
    SaveForm { form_record: FormRecord },
    UpdateForm { id: String, updates: RecordUpdate },
    DeleteForm { id: String },
    DeleteAllForms,

    // ---- page actions, handled by a frame's content agent ----
    FillForm { fields: Vec<FieldDescriptor> },
    ClickSubmit,

    // ---- relay request from an isolated frame ----
    ClickSubmitInMainPage,
}

impl Message {
    pub fn action(&self) -> &'static str {
        match self {
            Message::GetFormsForUrl { .. } => "getFormsForUrl",
            Message::GetAllForms => "getAllForms",
            Message::SaveForm { .. } => "saveForm",
            Message::UpdateForm { .. } => "updateForm",
            Message::DeleteForm { .. } => "deleteForm",
            Message::DeleteAllForms => "deleteAllForms",
            Message::FillForm { .. } => "fillForm",
            Message::ClickSubmit => "clickSubmit",
            Message::ClickSubmitInMainPage => "clickSubmitInMainPage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillResult {
    pub success: bool,
    pub filled: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClickResult {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

/// Reply payloads. Untagged on the wire; variants are tried in order, so
/// the narrower shapes come first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Records(Vec<FormRecord>),
    Fill(FillResult),
    Click(ClickResult),
    Store(StoreResult),
    Error(ErrorReply),
}

impl Reply {
    pub fn error(message: impl ToString) -> Self {
        Reply::Error(ErrorReply {
            error: message.to_string(),
        })
    }

    pub fn unknown_action() -> Self {
        Self::error("Unknown action")
    }

    /// Whether the receiver reports having done what was asked.
    pub fn is_success(&self) -> bool {
        match self {
            Reply::Records(_) => true,
            Reply::Fill(r) => r.success,
            Reply::Click(r) => r.success,
            Reply::Store(r) => r.success,
            Reply::Error(_) => false,
        }
    }
}
