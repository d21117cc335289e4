use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};

use crate::field::field_model::FieldDescriptor;
use crate::field::synthesis::CaptureResult;
use crate::store::url_pattern::{host_of, normalize_url};

/// A saved form: where it was captured, what to put back, and whether to do
/// it unattended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormRecord {
    pub id: String,
    #[serde(default)]
    pub url: String,
    pub url_pattern: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub submit_selector: Option<String>,
    #[serde(default)]
    pub auto_fill: bool,
    /// Click submit after an unattended fill.
    #[serde(default)]
    pub auto_confirm: bool,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
}

impl FormRecord {
    /// Build a fresh record from what was captured on `url`.
    pub fn from_capture(url: &str, title: &str, capture: CaptureResult, now: u64) -> Self {
        let title = title.trim();
        let title = if title.is_empty() {
            format!("Form on {}", host_of(url))
        } else {
            title.to_string()
        };

        FormRecord {
            id: new_record_id(url, now),
            url: url.to_string(),
            url_pattern: normalize_url(url),
            title,
            fields: capture.fields,
            submit_selector: capture.submit_selector,
            auto_fill: false,
            auto_confirm: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update. `updated_at` always moves forward, even when
    /// the wall clock has not.
    pub fn apply(&mut self, update: &RecordUpdate, now: u64) {
        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(auto_fill) = update.auto_fill {
            self.auto_fill = auto_fill;
        }
        if let Some(auto_confirm) = update.auto_confirm {
            self.auto_confirm = auto_confirm;
        }
        if let Some(fields) = &update.fields {
            self.fields = fields.clone();
        }
        if let Some(selector) = &update.submit_selector {
            self.submit_selector = selector.clone();
        }
        self.updated_at = now.max(self.updated_at + 1);
    }

    /// Participates in an unattended session at all.
    pub fn wants_autofill(&self) -> bool {
        self.auto_fill || self.auto_confirm
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_fill: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_confirm: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldDescriptor>>,
    /// `Some(None)` clears the cached selector. On the wire an explicit
    /// `null` clears it and a missing key leaves it alone.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub submit_selector: Option<Option<String>>,
}

// Only called when the key is present, so `null` becomes `Some(None)`.
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl RecordUpdate {
    pub fn title(title: &str) -> Self {
        RecordUpdate {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == RecordUpdate::default()
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// `form_<ms>_<6 hex>`; the suffix keeps ids unique within one millisecond.
pub fn new_record_id(url: &str, now: u64) -> String {
    use sha1::{Digest, Sha1};

    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    hasher.update(now.to_le_bytes());
    hasher.update(counter.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("form_{}_{}", now, &digest[..6])
}
