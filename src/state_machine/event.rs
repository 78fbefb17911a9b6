//! Events that drive the conversation

use crate::protocol::StreamEvent;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserQuery {
        text: String,
    },

    // Stream events
    StreamFrame(StreamEvent),
    /// Byte stream closed without a terminal frame
    StreamEnded,
    /// Transport error or stall
    StreamFailed {
        message: String,
    },

    // Gate side-channel outcomes
    /// Server accepted the email or the skip. `email` is forwarded on the
    /// replayed query.
    GateResolved {
        email: Option<String>,
    },
    GateRejected {
        message: String,
    },

    Reset {
        session_id: String,
    },
}

impl Event {
    pub fn user_query(text: impl Into<String>) -> Self {
        Event::UserQuery { text: text.into() }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::UserQuery { .. } => "user_query",
            Event::StreamFrame(_) => "stream_frame",
            Event::StreamEnded => "stream_ended",
            Event::StreamFailed { .. } => "stream_failed",
            Event::GateResolved { .. } => "gate_resolved",
            Event::GateRejected { .. } => "gate_rejected",
            Event::Reset { .. } => "reset",
        }
    }
}
