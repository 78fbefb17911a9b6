//! Maps decoded frames to semantic stream effects

use crate::protocol::StreamEvent;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How to decide whether skipping the gate is offered when the frame does
/// not say so explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipPolicy {
    /// Offer skip only while the server reports no skip used yet
    #[default]
    SkipCount,
    Always,
    Never,
}

impl SkipPolicy {
    fn allows(self, skip_count: Option<u32>) -> bool {
        match self {
            SkipPolicy::SkipCount => skip_count == Some(0),
            SkipPolicy::Always => true,
            SkipPolicy::Never => false,
        }
    }
}

impl FromStr for SkipPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip-count" | "skip_count" => Ok(SkipPolicy::SkipCount),
            "always" => Ok(SkipPolicy::Always),
            "never" => Ok(SkipPolicy::Never),
            other => Err(format!("unknown skip policy: {other}")),
        }
    }
}

/// What one frame means for the in-progress answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEffect {
    /// Replace whichever fields are present; `streaming: false` finalizes
    Update {
        content: Option<String>,
        sources: Option<String>,
        streaming: bool,
    },
    Gate {
        message: Option<String>,
        skip_allowed: bool,
    },
    /// Server reported a failure for this answer
    ServerError { message: String },
    RotateSession { session_id: String },
}

pub fn interpret(event: &StreamEvent, policy: SkipPolicy) -> Vec<StreamEffect> {
    let mut effects = Vec::with_capacity(2);

    if event.requires_email() {
        effects.push(StreamEffect::Gate {
            message: non_empty(event.message.as_ref()),
            skip_allowed: event
                .skip_allowed
                .unwrap_or_else(|| policy.allows(event.skip_count)),
        });
    } else if let Some(error) = &event.error {
        effects.push(StreamEffect::ServerError {
            message: error.clone(),
        });
    } else {
        effects.push(StreamEffect::Update {
            content: non_empty(event.content.as_ref()),
            sources: non_empty(event.sources.as_ref()),
            streaming: !event.is_done(),
        });
    }

    if event.is_done() {
        if let Some(session_id) = non_empty(event.session_id.as_ref()) {
            effects.push(StreamEffect::RotateSession { session_id });
        }
    }

    effects
}

// Empty strings never erase what has already arrived
fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}
