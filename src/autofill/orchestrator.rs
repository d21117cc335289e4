use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::autofill::frames::{FrameId, PageContext};
use crate::autofill::readiness::{ReadinessPolicy, is_ready};
use crate::autofill::scheduler::{CancelHandle, Clock, TimerQueue};
use crate::autofill::submit::{SubmitMatch, find_submit_button};
use crate::field::apply::fill_fields;
use crate::messaging::coordinator::{Coordinator, RelayOutcome};
use crate::store::record::FormRecord;
use crate::trace::{logger::TraceLogger, trace::TraceEvent};

/// Session timing. Defaults reproduce the tuned values: poll every 500 ms
/// for 30 s, submit 1 s after the first fill, then retry every 500 ms ten
/// times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub poll_interval_ms: u64,
    /// Ticks after the immediate first check.
    pub max_poll_attempts: u32,
    pub submit_settle_ms: u64,
    pub submit_retry_interval_ms: u64,
    pub max_submit_retries: u32,
    pub relay_timeout_ms: u64,
    pub min_visible_ratio: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            max_poll_attempts: 60,
            submit_settle_ms: 1000,
            submit_retry_interval_ms: 500,
            max_submit_retries: 10,
            relay_timeout_ms: 2000,
            min_visible_ratio: 0.5,
        }
    }
}

impl TimingConfig {
    pub fn readiness(&self) -> ReadinessPolicy {
        ReadinessPolicy {
            min_visible_ratio: self.min_visible_ratio,
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn submit_settle(&self) -> Duration {
        Duration::from_millis(self.submit_settle_ms)
    }

    fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.submit_retry_interval_ms)
    }

    fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    /// Nothing on this page is set to run unattended
    Idle,
    Polling,
    /// At least one ready tick has filled
    Filled,
    SubmitAttempted,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubmitOutcome {
    /// No auto-submit record, or the form never became ready
    NotRequested,
    Clicked,
    /// Handed to the coordinator for the top-level document
    Relayed(RelayOutcome),
    /// Retry budget spent without finding a control
    GaveUp,
    /// Stopped from outside before the attempt finished
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub phase: SessionPhase,
    pub ticks: u32,
    pub ready_ticks: u32,
    pub fields_filled: usize,
    pub submit_attempts: u32,
    pub submit_retries: u32,
    pub outcome: SubmitOutcome,
    pub clicked: Option<SubmitMatch>,
    pub cancelled: bool,
    /// Session time when the last task ran.
    pub elapsed: Duration,
}

impl SessionReport {
    fn new(phase: SessionPhase) -> Self {
        SessionReport {
            phase,
            ticks: 0,
            ready_ticks: 0,
            fields_filled: 0,
            submit_attempts: 0,
            submit_retries: 0,
            outcome: SubmitOutcome::NotRequested,
            clicked: None,
            cancelled: false,
            elapsed: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Poll { attempt: u32 },
    Submit,
    SubmitRetry { retry: u32 },
}

/// One page load's worth of unattended filling. All state lives here, so
/// two sessions never share a submit flag.
pub struct AutofillSession {
    timing: TimingConfig,
    policy: ReadinessPolicy,
    fill_records: Vec<FormRecord>,
    auto_submit: bool,
    phase: SessionPhase,
    /// Set by the first ready tick, never cleared.
    submit_requested: bool,
    queue: TimerQueue<Task>,
    cancel: CancelHandle,
    step: u64,
    report: SessionReport,
}

impl AutofillSession {
    /// Stays `Idle` unless some record has `autoFill` or `autoConfirm`;
    /// otherwise the first readiness check is due immediately.
    pub fn start(records: Vec<FormRecord>, timing: TimingConfig) -> Self {
        let phase = if records.iter().any(FormRecord::wants_autofill) {
            SessionPhase::Polling
        } else {
            SessionPhase::Idle
        };
        let auto_submit = records.iter().any(|r| r.auto_confirm);
        let fill_records: Vec<FormRecord> = records.into_iter().filter(|r| r.auto_fill).collect();

        let mut queue = TimerQueue::new();
        if phase == SessionPhase::Polling {
            queue.schedule(Duration::ZERO, Task::Poll { attempt: 0 });
        }

        AutofillSession {
            timing,
            policy: timing.readiness(),
            fill_records,
            auto_submit,
            phase,
            submit_requested: false,
            queue,
            cancel: CancelHandle::new(),
            step: 0,
            report: SessionReport::new(phase),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn submit_requested(&self) -> bool {
        self.submit_requested
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Drive every timer to completion (or cancellation) and report.
    pub fn run(
        &mut self,
        page: &mut dyn PageContext,
        coordinator: &mut Coordinator,
        clock: &mut dyn Clock,
        tracer: &TraceLogger,
    ) -> SessionReport {
        if self.phase == SessionPhase::Idle {
            debug!(url = %page.url(), "no unattended records, staying idle");
            self.trace(tracer, Duration::ZERO, "idle", None);
            return self.report.clone();
        }

        info!(
            url = %page.url(),
            records = self.fill_records.len(),
            auto_submit = self.auto_submit,
            "autofill session started"
        );
        let origin = clock.now();

        while let Some(due) = self.queue.peek_due() {
            if self.cancel.is_cancelled() {
                break;
            }
            clock.sleep_until(origin + due);
            if self.cancel.is_cancelled() {
                break;
            }
            let Some((due, task)) = self.queue.pop() else {
                break;
            };
            self.report.elapsed = due;

            if let Err(e) = page.refresh() {
                warn!(error = %e, ?task, "page refresh failed, skipping task");
                self.trace(tracer, due, "refresh-failed", Some(e.to_string()));
                self.reschedule_after_fault(task, due);
                continue;
            }

            match task {
                Task::Poll { attempt } => self.poll_tick(attempt, due, page, tracer),
                Task::Submit => self.submit_attempt(due, page, coordinator, tracer),
                Task::SubmitRetry { retry } => self.submit_retry(retry, due, page, tracer),
            }

            if let Err(e) = page.commit() {
                warn!(error = %e, ?task, "page commit failed");
                self.trace(tracer, due, "commit-failed", Some(e.to_string()));
            }
        }

        if self.cancel.is_cancelled() && !self.queue.is_empty() {
            self.queue.clear();
            self.report.cancelled = true;
            if self.submit_requested && self.report.outcome == SubmitOutcome::NotRequested {
                self.report.outcome = SubmitOutcome::Cancelled;
            }
            info!("autofill session cancelled");
        }

        self.phase = SessionPhase::Stopped;
        self.report.phase = SessionPhase::Stopped;
        self.trace(tracer, self.report.elapsed, "stopped", Some(format!("{:?}", self.report.outcome)));
        self.report.clone()
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    fn poll_tick(&mut self, attempt: u32, due: Duration, page: &mut dyn PageContext, tracer: &TraceLogger) {
        self.report.ticks += 1;
        let frame = page.frame();

        let ready = page
            .tab()
            .document(frame)
            .is_some_and(|doc| is_ready(doc, &self.fill_records, &self.policy));
        debug!(attempt, ready, "readiness tick");

        if ready {
            self.report.ready_ticks += 1;
            let mut filled = 0;
            if let Some(doc) = page.tab_mut().document_mut(frame) {
                for record in &self.fill_records {
                    filled += fill_fields(doc, &record.fields);
                }
            }
            self.report.fields_filled += filled;
            if self.phase == SessionPhase::Polling {
                self.phase = SessionPhase::Filled;
            }
            info!(attempt, filled, "form ready, filled");
            self.trace_filled(tracer, due, filled);

            if self.auto_submit && !self.submit_requested {
                self.submit_requested = true;
                self.queue.schedule(due + self.timing.submit_settle(), Task::Submit);
                debug!("submit scheduled");
            }
        } else {
            self.trace(tracer, due, "not-ready", None);
        }

        if attempt < self.timing.max_poll_attempts {
            self.queue
                .schedule(due + self.timing.poll_interval(), Task::Poll { attempt: attempt + 1 });
        }
    }

    fn submit_attempt(
        &mut self,
        due: Duration,
        page: &mut dyn PageContext,
        coordinator: &mut Coordinator,
        tracer: &TraceLogger,
    ) {
        self.phase = SessionPhase::SubmitAttempted;
        self.report.submit_attempts += 1;
        let frame = page.frame();
        let frames = page.tab().search_frames(frame);
        debug!(documents = frames.len(), embedded = page.tab().is_embedded(frame), "looking for submit");

        if self.click_submit(page, &frames, due, tracer) {
            return;
        }

        // Isolated frame: only the coordinator can reach the top document.
        if page.tab().is_embedded(frame) && frames.len() == 1 {
            let outcome = coordinator.relay_submit(page.tab_mut(), self.timing.relay_timeout());
            info!(?outcome, "submit relayed to top frame");
            self.report.outcome = SubmitOutcome::Relayed(outcome);
            self.trace(tracer, due, "relayed", Some(format!("{:?}", outcome)));
            return;
        }

        self.schedule_retry(1, due);
    }

    fn submit_retry(&mut self, retry: u32, due: Duration, page: &mut dyn PageContext, tracer: &TraceLogger) {
        self.report.submit_retries += 1;
        let frames = page.tab().search_frames(page.frame());

        if self.click_submit(page, &frames, due, tracer) {
            return;
        }
        self.trace(tracer, due, "submit-missing", Some(format!("retry {}", retry)));
        self.schedule_retry(retry + 1, due);
    }

    fn schedule_retry(&mut self, retry: u32, due: Duration) {
        if retry > self.timing.max_submit_retries {
            warn!(retries = self.timing.max_submit_retries, "could not find submit button, giving up");
            self.report.outcome = SubmitOutcome::GaveUp;
            return;
        }
        self.queue
            .schedule(due + self.timing.retry_interval(), Task::SubmitRetry { retry });
    }

    fn click_submit(
        &mut self,
        page: &mut dyn PageContext,
        frames: &[FrameId],
        due: Duration,
        tracer: &TraceLogger,
    ) -> bool {
        let Some(found) = find_submit_button(page.tab(), frames) else {
            return false;
        };
        let Some(doc) = page.tab_mut().document_mut(found.frame) else {
            return false;
        };

        info!(frame = found.frame.0, tier = ?found.tier, "clicking submit");
        doc.click(found.node);
        self.report.outcome = SubmitOutcome::Clicked;
        self.report.clicked = Some(found);
        self.trace(tracer, due, "clicked", Some(format!("{:?}", found.tier)));
        true
    }

    /// A task that could not see the page still keeps its loop alive.
    fn reschedule_after_fault(&mut self, task: Task, due: Duration) {
        match task {
            Task::Poll { attempt } => {
                self.report.ticks += 1;
                if attempt < self.timing.max_poll_attempts {
                    self.queue
                        .schedule(due + self.timing.poll_interval(), Task::Poll { attempt: attempt + 1 });
                }
            }
            Task::Submit => {
                self.phase = SessionPhase::SubmitAttempted;
                self.report.submit_attempts += 1;
                self.schedule_retry(1, due);
            }
            Task::SubmitRetry { retry } => {
                self.report.submit_retries += 1;
                self.schedule_retry(retry + 1, due);
            }
        }
    }

    // ------------------------------------------------------------------
    // Trace
    // ------------------------------------------------------------------

    fn next_event(&mut self, at: Duration) -> TraceEvent {
        self.step += 1;
        TraceEvent::now(self.step, at.as_millis() as u64, self.phase)
    }

    fn trace(&mut self, tracer: &TraceLogger, at: Duration, decision: &str, detail: Option<String>) {
        if !tracer.is_enabled() {
            return;
        }
        let mut event = self.next_event(at).with_decision(decision);
        if let Some(detail) = detail {
            event = event.with_detail(detail);
        }
        tracer.log(&event);
    }

    fn trace_filled(&mut self, tracer: &TraceLogger, at: Duration, filled: usize) {
        if !tracer.is_enabled() {
            return;
        }
        let event = self.next_event(at).with_decision("filled").with_filled(filled);
        tracer.log(&event);
    }
}

/// Start and run a session in one call.
pub fn run_session(
    records: Vec<FormRecord>,
    timing: TimingConfig,
    page: &mut dyn PageContext,
    coordinator: &mut Coordinator,
    clock: &mut dyn Clock,
    tracer: &TraceLogger,
) -> SessionReport {
    AutofillSession::start(records, timing).run(page, coordinator, clock, tracer)
}
