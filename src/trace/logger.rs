use std::{fs::OpenOptions, io::Write, path::Path, sync::Mutex};

use serde::Serialize;
use tracing::warn;

use crate::trace::trace::TraceEvent;

/// Append-only JSONL sink for session events. Several sessions may share one
/// file, so each line names the page it came from.
pub struct TraceLogger {
    file: Option<Mutex<std::fs::File>>,
    page: Option<String>,
}

#[derive(Serialize)]
struct TraceLine<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<&'a str>,
    #[serde(flatten)]
    event: &'a TraceEvent,
}

impl TraceLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path);

        match file {
            Ok(f) => Self {
                file: Some(Mutex::new(f)),
                page: None,
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not open trace file");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { file: None, page: None }
    }

    /// Stamp every following line with the session's page URL.
    pub fn for_page(mut self, url: &str) -> Self {
        self.page = Some(url.to_string());
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    pub fn log(&self, event: &TraceEvent) {
        let file_mutex = match &self.file {
            Some(f) => f,
            None => return, // tracing disabled
        };

        let line = TraceLine {
            page: self.page.as_deref(),
            event,
        };
        let json = match serde_json::to_string(&line) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "failed to serialize trace event");
                return;
            }
        };

        let mut file = match file_mutex.lock() {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "trace logger lock poisoned");
                return;
            }
        };

        if let Err(e) = writeln!(file, "{}", json) {
            warn!(error = %e, "failed to write trace event");
        }
    }
}
