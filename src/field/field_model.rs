use serde::{Deserialize, Deserializer, Serialize};

/// Durable description of one form field: how to find it again and what it
/// last held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Locator chosen at capture time. Always present.
    pub selector: String,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub id: Option<String>,

    /// Platform control type: `text`, `password`, `checkbox`, `radio`,
    /// `select-one`, `select-multiple`, `textarea`, `email`, ...
    #[serde(rename = "type")]
    pub field_type: String,

    pub label: String,

    pub value: FieldValue,

    /// Position of the enclosing form among the page's forms, -1 when the
    /// field sits outside any form.
    #[serde(default = "no_form")]
    pub form_index: i32,
}

fn no_form() -> i32 {
    -1
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()))
}

impl FieldDescriptor {
    /// The enclosing form ordinal, if the field had one.
    pub fn form_position(&self) -> Option<usize> {
        usize::try_from(self.form_index).ok()
    }

    pub fn is_toggle(&self) -> bool {
        matches!(self.field_type.as_str(), "checkbox" | "radio")
    }

    /// The write strategy for this descriptor's type, carrying the value in
    /// the representation that strategy needs.
    pub fn write(&self) -> FieldWrite {
        match self.field_type.as_str() {
            "checkbox" | "radio" => FieldWrite::Checked(self.value.is_truthy()),
            "select-one" | "select-multiple" => FieldWrite::SelectValue(self.value.as_text()),
            "textarea" => FieldWrite::TextAreaValue(self.value.as_text()),
            _ => FieldWrite::InputValue(self.value.as_text()),
        }
    }
}

/// Captured value: boolean for checkbox/radio, string otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Bool(b) => *b,
            FieldValue::Text(s) => !s.is_empty(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// How a stored value reaches a live control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldWrite {
    Checked(bool),
    InputValue(String),
    TextAreaValue(String),
    SelectValue(String),
}
