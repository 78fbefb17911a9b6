//! Effects produced by state transitions

use crate::api::ChatRequest;
use crate::runtime::ViewEvent;
use crate::state_machine::state::{GatePrompt, Message, MessageId};

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Issue a streamed answer request
    OpenStream { request: ChatRequest },

    /// Stop reading and drop the current byte stream
    CloseStream,

    /// Write the session id through to durable storage
    PersistSession { session_id: String },

    /// Best-effort server-side cleanup of an abandoned session
    ClearRemoteSession { session_id: String },

    /// Notify subscribed views
    Notify(ViewEvent),
}

impl Effect {
    pub fn open_stream(message: &str, session_id: &str, email: Option<String>) -> Self {
        Effect::OpenStream {
            request: ChatRequest {
                message: message.to_string(),
                session_id: session_id.to_string(),
                email,
            },
        }
    }

    pub fn message_added(message: &Message) -> Self {
        Effect::Notify(ViewEvent::MessageAdded {
            message: message.clone(),
        })
    }

    pub fn message_updated(message: &Message) -> Self {
        Effect::Notify(ViewEvent::MessageUpdated {
            message: message.clone(),
        })
    }

    pub fn message_removed(id: MessageId) -> Self {
        Effect::Notify(ViewEvent::MessageRemoved { id })
    }

    pub fn gate_opened(gate: &GatePrompt) -> Self {
        Effect::Notify(ViewEvent::GateOpened { gate: gate.clone() })
    }

    pub fn session_changed(session_id: &str) -> Self {
        Effect::Notify(ViewEvent::SessionChanged {
            session_id: session_id.to_string(),
        })
    }

    pub fn notify_error(message: impl Into<String>) -> Self {
        Effect::Notify(ViewEvent::Error {
            message: message.into(),
        })
    }
}
