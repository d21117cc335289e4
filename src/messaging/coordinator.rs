use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::autofill::frames::FrameId;
use crate::autofill::submit::locate_submit_in;
use crate::dom::dom_model::Document;
use crate::field::apply::fill_fields;
use crate::messaging::message::{ClickResult, FillResult, Message, Reply};
use crate::messaging::transport::{Transport, TransportError};
use crate::store::store::{FormStore, StoreResult};

/// What became of a submit click forwarded to the top-level document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RelayOutcome {
    Clicked,
    NotFound,
    NoReceiver,
    TimedOut,
}

/// Forward `clickSubmit` to the top frame and wait at most `timeout`.
/// Never retried here.
pub fn relay_click_submit(transport: &mut dyn Transport, timeout: Duration) -> RelayOutcome {
    match transport.send(FrameId::TOP, &Message::ClickSubmit, timeout) {
        Ok(reply) if reply.is_success() => RelayOutcome::Clicked,
        Ok(_) => RelayOutcome::NotFound,
        Err(TransportError::TimedOut) => RelayOutcome::TimedOut,
        Err(TransportError::NoReceiver) => RelayOutcome::NoReceiver,
        Err(TransportError::Protocol(msg)) => {
            warn!(error = %msg, "relay reply unreadable");
            RelayOutcome::NoReceiver
        }
    }
}

/// The privileged side: owns the record store and relays page requests
/// between frames of one tab.
pub struct Coordinator {
    store: Box<dyn FormStore>,
}

impl Coordinator {
    pub fn new(store: Box<dyn FormStore>) -> Self {
        Coordinator { store }
    }

    pub fn store(&self) -> &dyn FormStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn FormStore {
        self.store.as_mut()
    }

    /// Answer a storage request. Store faults come back as failed results,
    /// never as errors. Page actions are not ours to answer.
    pub fn handle(&mut self, message: Message) -> Reply {
        let action = message.action();
        let reply = match message {
            Message::GetFormsForUrl { url_pattern } => self
                .store
                .get_by_url_pattern(&url_pattern)
                .map(Reply::Records),
            Message::GetAllForms => self.store.get_all().map(Reply::Records),
            Message::SaveForm { form_record } => self.store.save(form_record).map(Reply::Store),
            Message::UpdateForm { id, updates } => self.store.update(&id, &updates).map(Reply::Store),
            Message::DeleteForm { id } => self.store.delete(&id).map(Reply::Store),
            Message::DeleteAllForms => self.store.delete_all().map(Reply::Store),
            Message::FillForm { .. } | Message::ClickSubmit | Message::ClickSubmitInMainPage => {
                return Reply::unknown_action();
            }
        };

        reply.unwrap_or_else(|e| {
            warn!(action, error = %e, "store request failed");
            match action {
                "getFormsForUrl" | "getAllForms" => Reply::error(e),
                _ => Reply::Store(StoreResult::failure(e)),
            }
        })
    }

    /// Answer a request sent from a content context inside `sender`'s tab.
    /// Relay requests are forwarded to the tab's top frame.
    pub fn handle_from_tab(&mut self, message: Message, sender: &mut dyn Transport, relay_timeout: Duration) -> Reply {
        match message {
            Message::ClickSubmitInMainPage => Reply::Click(ClickResult {
                success: self.relay_submit(sender, relay_timeout) == RelayOutcome::Clicked,
            }),
            other => self.handle(other),
        }
    }

    /// Click submit in the top document of `sender`'s tab on behalf of an
    /// embedded frame that cannot reach it.
    pub fn relay_submit(&mut self, sender: &mut dyn Transport, timeout: Duration) -> RelayOutcome {
        let outcome = relay_click_submit(sender, timeout);
        info!(?outcome, "relayed submit to top frame");
        outcome
    }
}

/// The per-frame content side: fills and clicks inside its own document.
pub struct ContentAgent;

impl ContentAgent {
    /// `None` when this context has no handler for the action.
    pub fn handle(doc: &mut Document, message: &Message) -> Option<Reply> {
        match message {
            Message::FillForm { fields } => {
                let filled = fill_fields(doc, fields);
                Some(Reply::Fill(FillResult { success: true, filled }))
            }
            Message::ClickSubmit => {
                let clicked = match locate_submit_in(doc) {
                    Some((node, tier)) => {
                        info!(?tier, "clicking submit on request");
                        doc.click(node);
                        true
                    }
                    None => false,
                };
                Some(Reply::Click(ClickResult { success: clicked }))
            }
            _ => None,
        }
    }
}
