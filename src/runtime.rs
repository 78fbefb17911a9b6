//! Runtime for driving a chat session
//!
//! The state machine decides; this module performs the I/O it asks for and
//! broadcasts what changed to any attached view.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{new_session_id, ChatError, GateResolution, SessionController};
pub use traits::*;

use crate::state_machine::{GatePrompt, Message, MessageId};

/// Notifications for views. Presentation-neutral.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    MessageAdded {
        message: Message,
    },
    /// Content, sources or streaming flag changed in place
    MessageUpdated {
        message: Message,
    },
    MessageRemoved {
        id: MessageId,
    },
    GateOpened {
        gate: GatePrompt,
    },
    /// Inline error under the gate prompt; the gate stays open
    GateError {
        message: String,
    },
    GateClosed,
    SessionChanged {
        session_id: String,
    },
    /// Transcript wiped by a reset
    Cleared,
    Error {
        message: String,
    },
}
