use std::fmt;

#[derive(Debug)]
pub enum AutofillError {
    /// Reading or writing the record file failed
    StoreIo { path: String, source: std::io::Error },

    /// JSON parsing failed (record file, snapshot, driver output)
    JsonParse { context: String, source: serde_json::Error },

    /// JSON serialization failed (record file, driver command)
    JsonSerialize { context: String, source: serde_json::Error },

    /// Browser driver process failed to spawn
    DriverSpawn { command: String, source: std::io::Error },

    /// Pipe to or from the driver process broke
    DriverIo(String),

    /// Driver answered with ok=false or an unexpected shape
    DriverProtocol { command: String, error: String },

    /// Driver did not answer within the request timeout
    DriverTimeout { command: String, waited_ms: u64 },

    /// No record with this id
    RecordNotFound(String),

    /// Snapshot or capture had nothing usable
    NothingCaptured(String),
}

impl fmt::Display for AutofillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutofillError::StoreIo { path, source } => {
                write!(f, "Record store '{}' unavailable: {}", path, source)
            }
            AutofillError::JsonParse { context, source } => {
                write!(f, "JSON parse error ({}): {}", context, source)
            }
            AutofillError::JsonSerialize { context, source } => {
                write!(f, "JSON serialize error ({}): {}", context, source)
            }
            AutofillError::DriverSpawn { command, source } => {
                write!(f, "Failed to spawn driver '{}': {}", command, source)
            }
            AutofillError::DriverIo(msg) => write!(f, "Driver I/O failed: {}", msg),
            AutofillError::DriverProtocol { command, error } => {
                write!(f, "Driver command '{}' failed: {}", command, error)
            }
            AutofillError::DriverTimeout { command, waited_ms } => {
                write!(f, "Driver command '{}' timed out after {}ms", command, waited_ms)
            }
            AutofillError::RecordNotFound(id) => write!(f, "No saved form with id '{}'", id),
            AutofillError::NothingCaptured(msg) => write!(f, "Nothing captured: {}", msg),
        }
    }
}

impl std::error::Error for AutofillError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AutofillError::StoreIo { source, .. } => Some(source),
            AutofillError::JsonParse { source, .. } => Some(source),
            AutofillError::JsonSerialize { source, .. } => Some(source),
            AutofillError::DriverSpawn { source, .. } => Some(source),
            _ => None,
        }
    }
}
