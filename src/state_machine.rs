//! Conversation state machine
//!
//! Elm-style: [`transition`] is pure and returns the next state together with
//! the effects the runtime must execute.

mod effect;
pub mod event;
pub mod interpret;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use interpret::{interpret, SkipPolicy, StreamEffect};
pub use state::{
    ChatContext, ChatPhase, ChatState, GatePrompt, Message, MessageId, MessageKind, Role,
};
pub use transition::{transition, TransitionError, TransitionResult};
