//! Request and response bodies

use super::error::error_detail;
use serde::{Deserialize, Serialize};

/// Body of the streamed answer request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    /// Forwarded when replaying a query right after an email submit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRequest {
    pub email: String,
    pub session_id: String,
}

/// Body for endpoints that only need the session (skip, clear)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub session_id: String,
}

/// Outcome of a gate side-channel call
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GateReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GateReply {
    pub fn accepted() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    /// Read a reply from a response body. Error bodies carrying a `detail`
    /// become rejections so the server's wording reaches the user.
    pub fn from_body(success_status: bool, body: &str) -> Option<Self> {
        if success_status {
            if let Ok(reply) = serde_json::from_str::<GateReply>(body) {
                return Some(reply);
            }
        }
        error_detail(body).map(Self::rejected)
    }
}

/// `GET /api/health`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub chatbot_ready: bool,
    #[serde(default)]
    pub auth_enabled: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HealthStatus {
    pub fn is_ready(&self) -> bool {
        self.status == "healthy" && self.chatbot_ready
    }
}
