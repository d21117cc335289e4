use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::autofill::orchestrator::SessionPhase;

#[derive(Debug, Serialize)]
pub struct TraceEvent {
    pub timestamp_ms: u128,
    pub step: u64,

    /// Session time of the timer that produced this event
    pub at_ms: u64,

    pub phase: String,

    pub decision: Option<String>,
    pub detail: Option<String>,

    pub filled: Option<usize>,
}

impl TraceEvent {
    pub fn now(step: u64, at_ms: u64, phase: SessionPhase) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0),
            step,
            at_ms,
            phase: format!("{:?}", phase),
            decision: None,
            detail: None,
            filled: None,
        }
    }

    pub fn with_decision(mut self, decision: impl ToString) -> Self {
        self.decision = Some(decision.to_string());
        self
    }

    pub fn with_detail(mut self, detail: impl ToString) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    pub fn with_filled(mut self, filled: usize) -> Self {
        self.filled = Some(filled);
        self
    }
}
