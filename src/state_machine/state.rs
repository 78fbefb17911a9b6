//! Conversation state types

use super::interpret::SkipPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Gate text used when the server omits one
pub const DEFAULT_GATE_TEXT: &str = "Please provide your email to continue.";

/// Monotonic message key. Key order is arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Bot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Normal,
    /// The gate prompt as shown in the transcript
    Gate,
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub sources: Option<String>,
    /// True only on the bot message currently receiving frames
    pub streaming: bool,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(id: MessageId, role: Role, content: String, kind: MessageKind) -> Self {
        Self {
            id,
            role,
            content,
            sources: None,
            streaming: false,
            kind,
            created_at: Utc::now(),
        }
    }

    pub fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, Role::User, text.into(), MessageKind::Normal)
    }

    /// Empty bot message waiting for its first frame
    pub fn placeholder(id: MessageId) -> Self {
        Self {
            streaming: true,
            ..Self::new(id, Role::Bot, String::new(), MessageKind::Normal)
        }
    }

    pub fn gate(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, Role::Bot, text.into(), MessageKind::Gate)
    }
}

/// The open email gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePrompt {
    /// Transcript entry showing the prompt
    pub message_id: MessageId,
    pub text: String,
    pub skip_allowed: bool,
    /// Inline error from the last failed resolution attempt
    pub error: Option<String>,
}

/// Controller phase
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatPhase {
    #[default]
    Idle,

    /// A stream is open and feeding `bot_id`
    Streaming {
        bot_id: MessageId,
        /// Query text being answered, parked if a gate interrupts
        query: String,
    },

    /// The server asked for an email; `pending` is replayed on success
    GateOpen {
        gate: GatePrompt,
        pending: Option<String>,
    },
}

impl ChatPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, ChatPhase::Idle)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, ChatPhase::Streaming { .. })
    }

    pub fn gate(&self) -> Option<&GatePrompt> {
        match self {
            ChatPhase::GateOpen { gate, .. } => Some(gate),
            _ => None,
        }
    }

    pub fn pending_query(&self) -> Option<&str> {
        match self {
            ChatPhase::GateOpen { pending, .. } => pending.as_deref(),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChatPhase::Idle => "idle",
            ChatPhase::Streaming { .. } => "streaming",
            ChatPhase::GateOpen { .. } => "gate_open",
        }
    }
}

/// Everything the controller owns about one conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatState {
    pub phase: ChatPhase,
    pub messages: BTreeMap<MessageId, Message>,
    pub session_id: String,
    next_id: u64,
}

impl ChatState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            phase: ChatPhase::Idle,
            messages: BTreeMap::new(),
            session_id: session_id.into(),
            next_id: 1,
        }
    }

    /// Reserve the next message id
    pub(crate) fn allocate_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn streaming_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values().filter(|m| m.streaming)
    }

    pub fn user_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values().filter(|m| m.role == Role::User)
    }

    pub fn bot_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values().filter(|m| m.role == Role::Bot)
    }

    /// Most recent bot answer, gate prompts excluded
    pub fn last_answer(&self) -> Option<&Message> {
        self.bot_messages()
            .filter(|m| m.kind == MessageKind::Normal)
            .last()
    }
}

/// Immutable settings the transition function consults
#[derive(Debug, Clone, Default)]
pub struct ChatContext {
    pub skip_policy: SkipPolicy,
}

impl ChatContext {
    pub fn new(skip_policy: SkipPolicy) -> Self {
        Self { skip_policy }
    }
}
