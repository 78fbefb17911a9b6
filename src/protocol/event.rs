//! Wire payload of a single stream frame

use serde::{Deserialize, Serialize};

/// One decoded `data:` frame.
///
/// Every field is optional on the wire. Unknown fields are ignored so the
/// server can grow the payload without breaking older clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamEvent {
    /// Full answer text so far (the server resends the accumulated text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_email: Option<bool>,
    /// Gate prompt text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_allowed: Option<bool>,
    /// Server-side skip counter, consulted when `skip_allowed` is absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Server-side failure text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamEvent {
    /// Content-only frame
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn is_done(&self) -> bool {
        self.done == Some(true)
    }

    pub fn requires_email(&self) -> bool {
        self.require_email == Some(true)
    }

    /// Render back to a wire line, including the trailing separator
    pub fn to_line(&self) -> String {
        // A struct of options and strings always serializes
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("{} {json}\n\n", super::EVENT_PREFIX)
    }
}
