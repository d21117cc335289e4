use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::autofill::error::AutofillError;
use crate::store::record::{FormRecord, RecordUpdate, now_ms};

/// Outcome of a write, in the shape UI callers expect on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoreResult {
    pub fn ok() -> Self {
        StoreResult {
            success: true,
            id: None,
            error: None,
        }
    }

    pub fn saved(id: &str) -> Self {
        StoreResult {
            success: true,
            id: Some(id.to_string()),
            error: None,
        }
    }

    pub fn failure(error: impl ToString) -> Self {
        StoreResult {
            success: false,
            id: None,
            error: Some(error.to_string()),
        }
    }

    pub fn not_found() -> Self {
        Self::failure("Not found")
    }
}

/// Persistent collection of saved forms keyed by record id.
pub trait FormStore {
    /// Records whose pattern equals `pattern` exactly.
    fn get_by_url_pattern(&self, pattern: &str) -> Result<Vec<FormRecord>, AutofillError>;

    /// Every record, most recently updated first.
    fn get_all(&self) -> Result<Vec<FormRecord>, AutofillError>;

    fn get(&self, id: &str) -> Result<Option<FormRecord>, AutofillError> {
        Ok(self.get_all()?.into_iter().find(|r| r.id == id))
    }

    /// Insert or overwrite by id.
    fn save(&mut self, record: FormRecord) -> Result<StoreResult, AutofillError>;

    fn update(&mut self, id: &str, update: &RecordUpdate) -> Result<StoreResult, AutofillError>;

    fn delete(&mut self, id: &str) -> Result<StoreResult, AutofillError>;

    fn delete_all(&mut self) -> Result<StoreResult, AutofillError>;
}

type RecordMap = BTreeMap<String, FormRecord>;

fn sorted_by_recency(map: &RecordMap) -> Vec<FormRecord> {
    let mut records: Vec<FormRecord> = map.values().cloned().collect();
    records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    records
}

fn matching_pattern(map: &RecordMap, pattern: &str) -> Vec<FormRecord> {
    map.values()
        .filter(|r| r.url_pattern == pattern)
        .cloned()
        .collect()
}

fn update_in(map: &mut RecordMap, id: &str, update: &RecordUpdate) -> StoreResult {
    match map.get_mut(id) {
        Some(record) => {
            record.apply(update, now_ms());
            StoreResult::ok()
        }
        None => StoreResult::not_found(),
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: RecordMap,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = FormRecord>) -> Self {
        MemoryStore {
            records: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FormStore for MemoryStore {
    fn get_by_url_pattern(&self, pattern: &str) -> Result<Vec<FormRecord>, AutofillError> {
        Ok(matching_pattern(&self.records, pattern))
    }

    fn get_all(&self) -> Result<Vec<FormRecord>, AutofillError> {
        Ok(sorted_by_recency(&self.records))
    }

    fn save(&mut self, record: FormRecord) -> Result<StoreResult, AutofillError> {
        let id = record.id.clone();
        self.records.insert(id.clone(), record);
        Ok(StoreResult::saved(&id))
    }

    fn update(&mut self, id: &str, update: &RecordUpdate) -> Result<StoreResult, AutofillError> {
        Ok(update_in(&mut self.records, id, update))
    }

    fn delete(&mut self, id: &str) -> Result<StoreResult, AutofillError> {
        Ok(match self.records.remove(id) {
            Some(_) => StoreResult::ok(),
            None => StoreResult::not_found(),
        })
    }

    fn delete_all(&mut self) -> Result<StoreResult, AutofillError> {
        self.records.clear();
        Ok(StoreResult::ok())
    }
}

// ============================================================================
// JSON file
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreFile {
    #[serde(default)]
    saved_forms: RecordMap,
}

/// One JSON document on disk: `{"savedForms": {id: record}}`. Every write
/// replaces the whole file through a sibling temp file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        JsonFileStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> AutofillError {
        AutofillError::StoreIo {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read(&self) -> Result<RecordMap, AutofillError> {
        if !self.path.exists() {
            return Ok(RecordMap::new());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        if text.trim().is_empty() {
            return Ok(RecordMap::new());
        }
        let file: StoreFile =
            serde_json::from_str(&text).map_err(|source| AutofillError::JsonParse {
                context: self.path.display().to_string(),
                source,
            })?;
        Ok(file.saved_forms)
    }

    fn write(&self, records: RecordMap) -> Result<(), AutofillError> {
        let file = StoreFile {
            saved_forms: records,
        };
        let json =
            serde_json::to_string_pretty(&file).map_err(|source| AutofillError::JsonSerialize {
                context: self.path.display().to_string(),
                source,
            })?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        tracing::debug!(path = %self.path.display(), "record store written");
        Ok(())
    }
}

impl FormStore for JsonFileStore {
    fn get_by_url_pattern(&self, pattern: &str) -> Result<Vec<FormRecord>, AutofillError> {
        Ok(matching_pattern(&self.read()?, pattern))
    }

    fn get_all(&self) -> Result<Vec<FormRecord>, AutofillError> {
        Ok(sorted_by_recency(&self.read()?))
    }

    fn get(&self, id: &str) -> Result<Option<FormRecord>, AutofillError> {
        Ok(self.read()?.remove(id))
    }

    fn save(&mut self, record: FormRecord) -> Result<StoreResult, AutofillError> {
        let mut records = self.read()?;
        let id = record.id.clone();
        records.insert(id.clone(), record);
        self.write(records)?;
        Ok(StoreResult::saved(&id))
    }

    fn update(&mut self, id: &str, update: &RecordUpdate) -> Result<StoreResult, AutofillError> {
        let mut records = self.read()?;
        let result = update_in(&mut records, id, update);
        if result.success {
            self.write(records)?;
        }
        Ok(result)
    }

    fn delete(&mut self, id: &str) -> Result<StoreResult, AutofillError> {
        let mut records = self.read()?;
        if records.remove(id).is_none() {
            return Ok(StoreResult::not_found());
        }
        self.write(records)?;
        Ok(StoreResult::ok())
    }

    fn delete_all(&mut self) -> Result<StoreResult, AutofillError> {
        self.write(RecordMap::new())?;
        Ok(StoreResult::ok())
    }
}
