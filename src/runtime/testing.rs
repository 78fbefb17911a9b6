//! Mock implementations for testing
//!
//! These mocks enable controller tests without real I/O.

use super::traits::*;
use crate::api::{
    ApiError, ByteStream, ChatRequest, EmailRequest, GateReply, HealthStatus, ResponseStream,
    SessionRequest,
};
use crate::db::StoreError;
use crate::protocol::StreamEvent;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Scripted Chat API
// ============================================================================

/// One step of a scripted answer body
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Chunk(Vec<u8>),
    Fail(ApiError),
    /// Keep the connection open without sending anything. Only meaningful last.
    Stall,
}

impl ScriptStep {
    /// A whole frame as one chunk
    pub fn frame(event: &StreamEvent) -> Self {
        ScriptStep::Chunk(event.to_line().into_bytes())
    }

    /// A frame parsed from JSON text
    pub fn json(payload: &str) -> Self {
        ScriptStep::Chunk(format!("data: {payload}\n\n").into_bytes())
    }

    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        ScriptStep::Chunk(bytes.into())
    }
}

/// What the next `open_stream` call does
enum ScriptedOpen {
    Body(Vec<ScriptStep>),
    Error(ApiError),
    /// Never returns, like a server that accepts and sends no headers
    Hang,
}

/// Counts dropped answer bodies
struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Mock service that replays queued scripts and records every request
#[derive(Default)]
pub struct ScriptedChatApi {
    streams: Mutex<VecDeque<ScriptedOpen>>,
    submit_replies: Mutex<VecDeque<Result<GateReply, ApiError>>>,
    skip_replies: Mutex<VecDeque<Result<GateReply, ApiError>>>,
    health: Mutex<Option<HealthStatus>>,
    /// Record of all requests made
    pub stream_requests: Mutex<Vec<ChatRequest>>,
    pub email_requests: Mutex<Vec<EmailRequest>>,
    pub skip_requests: Mutex<Vec<SessionRequest>>,
    pub clear_requests: Mutex<Vec<SessionRequest>>,
    dropped_streams: Arc<AtomicUsize>,
}

impl ScriptedChatApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the body of the next answer
    pub fn queue_stream(&self, steps: Vec<ScriptStep>) {
        self.streams.lock().unwrap().push_back(ScriptedOpen::Body(steps));
    }

    /// Queue an answer made of whole frames, closed after the last one
    pub fn queue_frames(&self, payloads: &[&str]) {
        self.queue_stream(payloads.iter().map(|p| ScriptStep::json(p)).collect());
    }

    /// Make the next answer request itself fail
    pub fn queue_stream_error(&self, error: ApiError) {
        self.streams.lock().unwrap().push_back(ScriptedOpen::Error(error));
    }

    /// Make the next answer request wait forever for response headers
    pub fn queue_hung_open(&self) {
        self.streams.lock().unwrap().push_back(ScriptedOpen::Hang);
    }

    pub fn queue_submit_reply(&self, reply: Result<GateReply, ApiError>) {
        self.submit_replies.lock().unwrap().push_back(reply);
    }

    pub fn queue_skip_reply(&self, reply: Result<GateReply, ApiError>) {
        self.skip_replies.lock().unwrap().push_back(reply);
    }

    pub fn set_health(&self, health: HealthStatus) {
        *self.health.lock().unwrap() = Some(health);
    }

    pub fn recorded_streams(&self) -> Vec<ChatRequest> {
        self.stream_requests.lock().unwrap().clone()
    }

    pub fn recorded_emails(&self) -> Vec<EmailRequest> {
        self.email_requests.lock().unwrap().clone()
    }

    pub fn recorded_skips(&self) -> Vec<SessionRequest> {
        self.skip_requests.lock().unwrap().clone()
    }

    pub fn recorded_clears(&self) -> Vec<SessionRequest> {
        self.clear_requests.lock().unwrap().clone()
    }

    /// Answer bodies released so far, by exhaustion or by being closed
    pub fn dropped_streams(&self) -> usize {
        self.dropped_streams.load(Ordering::SeqCst)
    }

    fn build_body(&self, steps: Vec<ScriptStep>) -> ByteStream {
        let stall = matches!(steps.last(), Some(ScriptStep::Stall));
        let items: Vec<Result<Vec<u8>, ApiError>> = steps
            .into_iter()
            .filter_map(|step| match step {
                ScriptStep::Chunk(bytes) => Some(Ok(bytes)),
                ScriptStep::Fail(error) => Some(Err(error)),
                ScriptStep::Stall => None,
            })
            .collect();

        let body = futures::stream::iter(items);
        let body: ByteStream = if stall {
            body.chain(futures::stream::pending()).boxed()
        } else {
            body.boxed()
        };

        let guard = DropCounter(Arc::clone(&self.dropped_streams));
        body.map(move |item| {
            let _ = &guard;
            item
        })
        .boxed()
    }
}

#[async_trait]
impl ChatApi for ScriptedChatApi {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ResponseStream, ApiError> {
        self.stream_requests.lock().unwrap().push(request.clone());
        let script = self.streams.lock().unwrap().pop_front();
        match script {
            Some(ScriptedOpen::Body(steps)) => Ok(ResponseStream::new(self.build_body(steps))),
            Some(ScriptedOpen::Error(error)) => Err(error),
            Some(ScriptedOpen::Hang) => futures::future::pending().await,
            None => Err(ApiError::network("No mock stream queued")),
        }
    }

    async fn submit_email(&self, request: &EmailRequest) -> Result<GateReply, ApiError> {
        self.email_requests.lock().unwrap().push(request.clone());
        self.submit_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::network("No mock reply queued")))
    }

    async fn skip_email(&self, request: &SessionRequest) -> Result<GateReply, ApiError> {
        self.skip_requests.lock().unwrap().push(request.clone());
        self.skip_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::network("No mock reply queued")))
    }

    async fn clear_session(&self, request: &SessionRequest) -> Result<GateReply, ApiError> {
        self.clear_requests.lock().unwrap().push(request.clone());
        Ok(GateReply::accepted())
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.health
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::network("Connection refused"))
    }
}

// ============================================================================
// In-memory session store
// ============================================================================

#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<String>>,
    /// Every successful save, in order
    pub saves: Mutex<Vec<String>>,
    fail_writes: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session_id: &str) -> Self {
        let store = Self::new();
        *store.session.lock().unwrap() = Some(session_id.to_string());
        store
    }

    /// Make every later save fail
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn current(&self) -> Option<String> {
        self.session.lock().unwrap().clone()
    }

    pub fn recorded_saves(&self) -> Vec<String> {
        self.saves.lock().unwrap().clone()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.current())
    }

    fn save(&self, session_id: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        *self.session.lock().unwrap() = Some(session_id.to_string());
        self.saves.lock().unwrap().push(session_id.to_string());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest {
        ChatRequest {
            message: "hi".to_string(),
            session_id: "s1".to_string(),
            email: None,
        }
    }

    #[tokio::test]
    async fn test_scripted_stream_replays_chunks_and_counts_drop() {
        let api = ScriptedChatApi::new();
        api.queue_stream(vec![ScriptStep::raw("data: {}\n"), ScriptStep::raw("\n")]);

        let mut body = api.open_stream(&request()).await.unwrap();
        assert_eq!(body.next_chunk().await, Some(Ok(b"data: {}\n".to_vec())));
        assert_eq!(body.next_chunk().await, Some(Ok(b"\n".to_vec())));
        assert_eq!(body.next_chunk().await, None);
        assert_eq!(api.dropped_streams(), 1);
        assert_eq!(api.recorded_streams(), vec![request()]);
    }

    #[tokio::test]
    async fn test_closing_a_stalled_stream_drops_it() {
        let api = ScriptedChatApi::new();
        api.queue_stream(vec![ScriptStep::raw("data: {}\n"), ScriptStep::Stall]);

        let mut body = api.open_stream(&request()).await.unwrap();
        assert!(body.next_chunk().await.is_some());
        assert_eq!(api.dropped_streams(), 0);
        body.close();
        assert_eq!(api.dropped_streams(), 1);
    }

    #[tokio::test]
    async fn test_unqueued_calls_fail() {
        let api = ScriptedChatApi::new();
        assert!(api.open_stream(&request()).await.is_err());
        assert!(api
            .skip_email(&SessionRequest {
                session_id: "s1".to_string()
            })
            .await
            .is_err());
        assert!(api.health().await.is_err());
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::with_session("s1");
        assert_eq!(store.load().unwrap().as_deref(), Some("s1"));
        store.save("s2").unwrap();
        assert_eq!(store.recorded_saves(), vec!["s2".to_string()]);

        store.fail_writes();
        assert!(store.save("s3").is_err());
        assert_eq!(store.current().as_deref(), Some("s2"));
    }
}
