//! reqwest implementation of [`ChatApi`]

use super::{
    ApiError, ChatRequest, EmailRequest, GateReply, HealthStatus, ResponseStream, SessionRequest,
};
use crate::runtime::ChatApi;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const CHAT_STREAM_PATH: &str = "/api/chat/stream";
pub const EMAIL_SUBMIT_PATH: &str = "/api/email/submit";
pub const EMAIL_SKIP_PATH: &str = "/api/email/skip";
pub const SESSION_CLEAR_PATH: &str = "/api/session/clear";
pub const HEALTH_PATH: &str = "/api/health";

/// HTTP client for the answer service
#[derive(Clone)]
pub struct HttpChatApi {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    /// Parent of every stream's token
    shutdown: CancellationToken,
}

impl HttpChatApi {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ApiError> {
        // No overall timeout: answer bodies stay open as long as frames arrive
        let client = Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::unknown(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
            shutdown: CancellationToken::new(),
        })
    }

    /// Token whose cancellation aborts every open answer stream
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_gate<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<GateReply, ApiError> {
        let response = self
            .client
            .post(self.url(path))
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if let Some(reply) = GateReply::from_body(status.is_success(), &text) {
            return Ok(reply);
        }
        if status.is_success() {
            return Err(ApiError::unknown(format!("Unexpected response body: {text}")));
        }
        Err(ApiError::from_status(status.as_u16(), &text))
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ResponseStream, ApiError> {
        let send = self
            .client
            .post(self.url(CHAT_STREAM_PATH))
            .header("accept", "text/event-stream")
            .json(request)
            .send();

        // Headers may never arrive; shutdown must still get through
        let response = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => {
                return Err(ApiError::network("Request cancelled"));
            }
            response = send => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), &body));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| ApiError::network(format!("Stream interrupted: {e}")))
            })
            .boxed();

        Ok(ResponseStream::with_cancel(body, self.shutdown.child_token()))
    }

    async fn submit_email(&self, request: &EmailRequest) -> Result<GateReply, ApiError> {
        self.post_gate(EMAIL_SUBMIT_PATH, request).await
    }

    async fn skip_email(&self, request: &SessionRequest) -> Result<GateReply, ApiError> {
        self.post_gate(EMAIL_SKIP_PATH, request).await
    }

    async fn clear_session(&self, request: &SessionRequest) -> Result<GateReply, ApiError> {
        self.post_gate(SESSION_CLEAR_PATH, request).await
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        let response = self
            .client
            .get(self.url(HEALTH_PATH))
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16(), &body));
        }
        serde_json::from_str(&body)
            .map_err(|e| ApiError::unknown(format!("Failed to parse health response: {e}")))
    }
}
