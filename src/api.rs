//! HTTP adapter for the answer service

mod client;
mod error;
mod stream;
mod types;

pub use client::{
    HttpChatApi, CHAT_STREAM_PATH, EMAIL_SKIP_PATH, EMAIL_SUBMIT_PATH, HEALTH_PATH,
    SESSION_CLEAR_PATH,
};
pub use error::{ApiError, ApiErrorKind};
pub use stream::{ByteStream, ResponseStream};
pub use types::{ChatRequest, EmailRequest, GateReply, HealthStatus, SessionRequest};
