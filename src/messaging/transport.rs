use std::fmt;
use std::time::Duration;

use crate::autofill::frames::{FrameId, Tab};
use crate::messaging::coordinator::ContentAgent;
use crate::messaging::message::{Message, Reply};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Nobody is listening in the target context (torn down or never there)
    NoReceiver,

    /// The receiver did not answer within the wait
    TimedOut,

    /// The answer could not be understood
    Protocol(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::NoReceiver => write!(f, "Could not establish connection. Receiving end does not exist."),
            TransportError::TimedOut => write!(f, "No response before timeout"),
            TransportError::Protocol(msg) => write!(f, "Malformed reply: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Request/response delivery to the content context of one frame.
pub trait Transport {
    fn send(&mut self, to: FrameId, message: &Message, timeout: Duration) -> Result<Reply, TransportError>;
}

/// In-process delivery: the frame's content agent answers synchronously.
impl Transport for Tab {
    fn send(&mut self, to: FrameId, message: &Message, _timeout: Duration) -> Result<Reply, TransportError> {
        if !self.frame(to).is_some_and(|f| f.attached) {
            return Err(TransportError::NoReceiver);
        }
        let doc = self.document_mut(to).ok_or(TransportError::NoReceiver)?;
        ContentAgent::handle(doc, message).ok_or(TransportError::NoReceiver)
    }
}
