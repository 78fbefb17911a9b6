//! Pure state transition function

use super::interpret::{interpret, StreamEffect};
use super::state::{ChatContext, ChatPhase, ChatState, GatePrompt, Message, DEFAULT_GATE_TEXT};
use super::{Effect, Event};
use crate::protocol::StreamEvent;
use crate::runtime::ViewEvent;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ChatState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ChatState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("An answer is still streaming, wait for it to finish")]
    Busy,
    #[error("No email gate is open")]
    NoGateOpen,
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs. Message
/// timestamps are the only ambient input.
pub fn transition(
    state: &ChatState,
    context: &ChatContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let mut next = state.clone();

    match event {
        // ============================================================
        // User queries
        // ============================================================
        Event::UserQuery { text } if text.trim().is_empty() => Ok(TransitionResult::new(next)),

        Event::UserQuery { .. } if state.phase.is_streaming() => Err(TransitionError::Busy),

        // Idle or GateOpen: a fresh query abandons any open gate and its pending query
        Event::UserQuery { text } => {
            let mut effects = close_gate(&mut next);

            let user_id = next.allocate_id();
            let user = Message::user(user_id, text.clone());
            effects.push(Effect::message_added(&user));
            next.messages.insert(user_id, user);

            effects.extend(start_answer(&mut next, text, None));
            Ok(TransitionResult::new(next).with_effects(effects))
        }

        // ============================================================
        // Stream frames
        // ============================================================
        Event::StreamFrame(frame) => {
            if !state.phase.is_streaming() {
                // Late frame from a stream that was already finalized or gated
                return Ok(TransitionResult::new(next));
            }
            let effects = apply_frame(&mut next, context, &frame);
            Ok(TransitionResult::new(next).with_effects(effects))
        }

        Event::StreamEnded => {
            let effects = finalize_answer(&mut next, None);
            Ok(TransitionResult::new(next).with_effects(effects))
        }

        Event::StreamFailed { message } => {
            if !state.phase.is_streaming() {
                return Ok(TransitionResult::new(next));
            }
            let mut effects = finalize_answer(&mut next, None);
            effects.push(Effect::notify_error(message));
            Ok(TransitionResult::new(next).with_effects(effects))
        }

        // ============================================================
        // Gate resolution
        // ============================================================
        Event::GateResolved { email } => {
            let ChatPhase::GateOpen { pending, .. } = &state.phase else {
                return Err(TransitionError::NoGateOpen);
            };
            let pending = pending.clone();

            let mut effects = close_gate(&mut next);
            if let Some(query) = pending {
                // Replay without a second user bubble
                effects.extend(start_answer(&mut next, query, email));
            }
            Ok(TransitionResult::new(next).with_effects(effects))
        }

        Event::GateRejected { message } => {
            let ChatPhase::GateOpen { gate, .. } = &mut next.phase else {
                return Err(TransitionError::NoGateOpen);
            };
            gate.error = Some(message.clone());
            Ok(TransitionResult::new(next).with_effect(Effect::Notify(ViewEvent::GateError { message })))
        }

        // ============================================================
        // Reset
        // ============================================================
        Event::Reset { session_id } => {
            let mut effects = Vec::new();
            if state.phase.is_streaming() {
                effects.push(Effect::CloseStream);
            }

            next.phase = ChatPhase::Idle;
            next.messages.clear();
            let old_session = std::mem::replace(&mut next.session_id, session_id.clone());

            effects.push(Effect::PersistSession {
                session_id: session_id.clone(),
            });
            effects.push(Effect::ClearRemoteSession {
                session_id: old_session,
            });
            effects.push(Effect::Notify(ViewEvent::Cleared));
            effects.push(Effect::session_changed(&session_id));
            Ok(TransitionResult::new(next).with_effects(effects))
        }
    }
}

/// Add a streaming placeholder and request an answer for `query`
fn start_answer(state: &mut ChatState, query: String, email: Option<String>) -> Vec<Effect> {
    let bot_id = state.allocate_id();
    let placeholder = Message::placeholder(bot_id);
    let effects = vec![
        Effect::message_added(&placeholder),
        Effect::open_stream(&query, &state.session_id, email),
    ];
    state.messages.insert(bot_id, placeholder);
    state.phase = ChatPhase::Streaming { bot_id, query };
    effects
}

/// Drop an open gate along with its transcript entry. No-op otherwise.
fn close_gate(state: &mut ChatState) -> Vec<Effect> {
    let ChatPhase::GateOpen { gate, .. } = &state.phase else {
        return Vec::new();
    };
    let gate_id = gate.message_id;
    state.phase = ChatPhase::Idle;

    let mut effects = Vec::new();
    if state.messages.remove(&gate_id).is_some() {
        effects.push(Effect::message_removed(gate_id));
    }
    effects.push(Effect::Notify(ViewEvent::GateClosed));
    effects
}

fn apply_frame(state: &mut ChatState, context: &ChatContext, frame: &StreamEvent) -> Vec<Effect> {
    let mut effects = Vec::new();

    for stream_effect in interpret(frame, context.skip_policy) {
        match stream_effect {
            StreamEffect::Update {
                content,
                sources,
                streaming,
            } => effects.extend(update_answer(state, content, sources, streaming)),

            StreamEffect::ServerError { message } => {
                effects.extend(finalize_answer(state, Some(&message)));
                effects.push(Effect::notify_error(message));
            }

            StreamEffect::Gate {
                message,
                skip_allowed,
            } => effects.extend(open_gate(state, message, skip_allowed)),

            StreamEffect::RotateSession { session_id } => {
                if session_id != state.session_id {
                    effects.push(Effect::PersistSession {
                        session_id: session_id.clone(),
                    });
                    effects.push(Effect::session_changed(&session_id));
                    state.session_id = session_id;
                }
            }
        }
    }

    effects
}

fn update_answer(
    state: &mut ChatState,
    content: Option<String>,
    sources: Option<String>,
    streaming: bool,
) -> Vec<Effect> {
    let ChatPhase::Streaming { bot_id, .. } = state.phase else {
        return Vec::new();
    };
    let Some(message) = state.messages.get_mut(&bot_id) else {
        return Vec::new();
    };

    if let Some(content) = content {
        message.content = content;
    }
    if let Some(sources) = sources {
        message.sources = Some(sources);
    }
    if streaming {
        return vec![Effect::message_updated(message)];
    }

    finalize_answer(state, None)
}

/// Mark the streaming answer complete and return to idle. `fallback` fills
/// an answer that never received content.
fn finalize_answer(state: &mut ChatState, fallback: Option<&str>) -> Vec<Effect> {
    let ChatPhase::Streaming { bot_id, .. } = state.phase else {
        return Vec::new();
    };
    state.phase = ChatPhase::Idle;

    let mut effects = Vec::new();
    if let Some(message) = state.messages.get_mut(&bot_id) {
        message.streaming = false;
        if let Some(text) = fallback {
            if message.content.is_empty() {
                message.content = text.to_string();
            }
        }
        effects.push(Effect::message_updated(message));
    }
    effects.push(Effect::CloseStream);
    effects
}

fn open_gate(state: &mut ChatState, text: Option<String>, skip_allowed: bool) -> Vec<Effect> {
    let ChatPhase::Streaming { bot_id, query } = &state.phase else {
        return Vec::new();
    };
    let (bot_id, query) = (*bot_id, query.clone());

    let mut effects = vec![Effect::CloseStream];
    if state.messages.remove(&bot_id).is_some() {
        effects.push(Effect::message_removed(bot_id));
    }

    let text = text.unwrap_or_else(|| DEFAULT_GATE_TEXT.to_string());
    let gate_id = state.allocate_id();
    let gate_message = Message::gate(gate_id, text.clone());
    effects.push(Effect::message_added(&gate_message));
    state.messages.insert(gate_id, gate_message);

    let gate = GatePrompt {
        message_id: gate_id,
        text,
        skip_allowed,
        error: None,
    };
    effects.push(Effect::gate_opened(&gate));
    state.phase = ChatPhase::GateOpen {
        gate,
        pending: Some(query),
    };
    effects
}
