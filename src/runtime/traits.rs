//! Trait abstractions for runtime I/O
//!
//! These traits let the controller run against mock implementations.

use crate::api::{
    ApiError, ChatRequest, EmailRequest, GateReply, HealthStatus, ResponseStream, SessionRequest,
};
use crate::db::StoreError;
use async_trait::async_trait;
use std::sync::Arc;

/// The remote answer service
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Start a streamed answer
    async fn open_stream(&self, request: &ChatRequest) -> Result<ResponseStream, ApiError>;

    async fn submit_email(&self, request: &EmailRequest) -> Result<GateReply, ApiError>;

    async fn skip_email(&self, request: &SessionRequest) -> Result<GateReply, ApiError>;

    /// Drop server-side state for a session
    async fn clear_session(&self, request: &SessionRequest) -> Result<GateReply, ApiError>;

    async fn health(&self) -> Result<HealthStatus, ApiError>;
}

/// Durable home of the session id
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, StoreError>;

    fn save(&self, session_id: &str) -> Result<(), StoreError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ChatApi + ?Sized> ChatApi for Arc<T> {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ResponseStream, ApiError> {
        (**self).open_stream(request).await
    }

    async fn submit_email(&self, request: &EmailRequest) -> Result<GateReply, ApiError> {
        (**self).submit_email(request).await
    }

    async fn skip_email(&self, request: &SessionRequest) -> Result<GateReply, ApiError> {
        (**self).skip_email(request).await
    }

    async fn clear_session(&self, request: &SessionRequest) -> Result<GateReply, ApiError> {
        (**self).clear_session(request).await
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        (**self).health().await
    }
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn load(&self) -> Result<Option<String>, StoreError> {
        (**self).load()
    }

    fn save(&self, session_id: &str) -> Result<(), StoreError> {
        (**self).save(session_id)
    }
}
