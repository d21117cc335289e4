use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::autofill::error::AutofillError;
use crate::store::record::FormRecord;
use crate::store::store::FormStore;

#[derive(Debug)]
pub enum ImportError {
    /// Not JSON, or not a JSON array
    InvalidFormat(String),

    /// Element at `index` lacks an id, a pattern or a field list
    InvalidRecord { index: usize },

    /// Saving the validated records failed
    Store(AutofillError),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::InvalidFormat(msg) => write!(f, "Invalid file format: {}", msg),
            ImportError::InvalidRecord { index } => {
                write!(f, "Invalid form data in file (entry {})", index)
            }
            ImportError::Store(e) => write!(f, "Import failed: {}", e),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AutofillError> for ImportError {
    fn from(e: AutofillError) -> Self {
        ImportError::Store(e)
    }
}

/// Every record as a pretty JSON array, most recent first.
pub fn export_records(store: &dyn FormStore) -> Result<String, AutofillError> {
    let records = store.get_all()?;
    serde_json::to_string_pretty(&records).map_err(|source| AutofillError::JsonSerialize {
        context: "export".to_string(),
        source,
    })
}

/// `autofill-backup-YYYY-MM-DD.json` for the UTC day containing `epoch_ms`.
pub fn backup_file_name(epoch_ms: u64) -> String {
    let day: DateTime<Utc> = i64::try_from(epoch_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_default();
    format!("autofill-backup-{}.json", day.format("%Y-%m-%d"))
}

/// Validate the whole array first; save only when every element passes.
/// Returns how many records were written.
pub fn import_records(store: &mut dyn FormStore, json: &str) -> Result<usize, ImportError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| ImportError::InvalidFormat(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(ImportError::InvalidFormat("expected a JSON array".to_string()));
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        if !has_required_keys(&item) {
            return Err(ImportError::InvalidRecord { index });
        }
        let record: FormRecord =
            serde_json::from_value(item).map_err(|_| ImportError::InvalidRecord { index })?;
        records.push(record);
    }

    let count = records.len();
    for record in records {
        store.save(record)?;
    }
    tracing::info!(count, "records imported");
    Ok(count)
}

fn has_required_keys(item: &Value) -> bool {
    let non_empty = |key: &str| item.get(key).and_then(Value::as_str).is_some_and(|s| !s.is_empty());
    non_empty("id") && non_empty("urlPattern") && item.get("fields").is_some_and(Value::is_array)
}

// ============================================================================
// Listing helpers
// ============================================================================

/// Case-insensitive substring match over title, url, pattern and field
/// labels. A blank query keeps everything.
pub fn search_records<'a>(records: &'a [FormRecord], query: &str) -> Vec<&'a FormRecord> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return records.iter().collect();
    }

    records
        .iter()
        .filter(|r| {
            r.title.to_lowercase().contains(&query)
                || r.url.to_lowercase().contains(&query)
                || r.url_pattern.to_lowercase().contains(&query)
                || r.fields.iter().any(|f| f.label.to_lowercase().contains(&query))
        })
        .collect()
}

/// Records bucketed by pattern, patterns in first-seen order.
pub fn group_by_pattern<'a>(records: &[&'a FormRecord]) -> Vec<(String, Vec<&'a FormRecord>)> {
    let mut groups: Vec<(String, Vec<&'a FormRecord>)> = Vec::new();
    for &record in records {
        match groups.iter_mut().find(|(p, _)| *p == record.url_pattern) {
            Some((_, bucket)) => bucket.push(record),
            None => groups.push((record.url_pattern.clone(), vec![record])),
        }
    }
    groups
}
