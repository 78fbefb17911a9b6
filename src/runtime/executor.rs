//! Session controller
//!
//! Owns the conversation state, runs transitions and executes their effects:
//! opening and closing answer streams, persisting the session id, and
//! broadcasting view events.

use super::traits::{ChatApi, SessionStore};
use super::ViewEvent;
use crate::api::{
    ApiError, ChatRequest, EmailRequest, GateReply, HealthStatus, ResponseStream, SessionRequest,
};
use crate::config::ClientConfig;
use crate::email::is_valid_email;
use crate::protocol::FrameDecoder;
use crate::state_machine::{
    transition, ChatContext, ChatPhase, ChatState, Effect, Event, GatePrompt, Message, MessageId,
    TransitionError,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

const GATE_FAILURE_TEXT: &str = "Something went wrong, please try again.";

/// Errors surfaced to the caller of a controller operation
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Message is too long ({length} characters, the limit is {limit})")]
    MessageTooLong { length: usize, limit: usize },
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Skipping is not available, please provide your email")]
    SkipNotAllowed,
    /// Server declined the email or skip, or could not be reached
    #[error("{0}")]
    GateRejected(String),
}

/// How the user answers an open gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateResolution {
    Submit(String),
    Skip,
}

pub fn new_session_id() -> String {
    format!("session_{}", uuid::Uuid::new_v4().simple())
}

/// Outcome of waiting for the next chunk
enum Pull {
    Chunk(Vec<u8>),
    Failed(ApiError),
    Ended { cancelled: bool },
    Stalled(Duration),
}

/// Drives one conversation against any [`ChatApi`] and [`SessionStore`]
pub struct SessionController<A, S>
where
    A: ChatApi + 'static,
    S: SessionStore,
{
    context: ChatContext,
    state: ChatState,
    api: Arc<A>,
    store: S,
    config: ClientConfig,
    broadcast_tx: broadcast::Sender<ViewEvent>,
    /// Body of the answer currently being read
    stream: Option<ResponseStream>,
}

impl<A, S> SessionController<A, S>
where
    A: ChatApi + 'static,
    S: SessionStore,
{
    /// Resume the stored session, or start and persist a new one
    pub fn new(api: A, store: S, config: ClientConfig) -> Self {
        let session_id = match store.load() {
            Ok(Some(id)) => {
                tracing::info!(session_id = %id, "Resuming stored session");
                id
            }
            Ok(None) => {
                let id = new_session_id();
                tracing::info!(session_id = %id, "Starting new session");
                persist_session(&store, &id);
                id
            }
            Err(e) => {
                let id = new_session_id();
                tracing::warn!(error = %e, session_id = %id, "Failed to load session id, starting new session");
                persist_session(&store, &id);
                id
            }
        };

        let (broadcast_tx, _) = broadcast::channel(256);
        Self {
            context: ChatContext::new(config.skip_policy),
            state: ChatState::new(session_id),
            api: Arc::new(api),
            store,
            config,
            broadcast_tx,
            stream: None,
        }
    }

    // ==================== Observation ====================

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.broadcast_tx.subscribe()
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn phase(&self) -> &ChatPhase {
        &self.state.phase
    }

    pub fn messages(&self) -> &BTreeMap<MessageId, Message> {
        &self.state.messages
    }

    pub fn gate(&self) -> Option<&GatePrompt> {
        self.state.phase.gate()
    }

    pub fn pending_query(&self) -> Option<&str> {
        self.state.phase.pending_query()
    }

    pub fn session_id(&self) -> &str {
        &self.state.session_id
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.api.health().await
    }

    // ==================== Operations ====================

    /// Ask a question and stream the answer to completion (or to a gate)
    pub async fn send_query(&mut self, text: &str) -> Result<(), ChatError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let length = text.chars().count();
        let limit = self.config.max_message_chars;
        if length > limit {
            return Err(ChatError::MessageTooLong { length, limit });
        }

        self.process_event(Event::user_query(text)).await?;
        self.pump_stream().await;
        Ok(())
    }

    /// Answer the open gate. On success the parked query is replayed and
    /// streamed; on failure the gate stays open with an inline error.
    pub async fn resolve_gate(&mut self, resolution: GateResolution) -> Result<(), ChatError> {
        let Some(gate) = self.state.phase.gate() else {
            return Err(TransitionError::NoGateOpen.into());
        };
        let skip_allowed = gate.skip_allowed;
        let session_id = self.state.session_id.clone();

        let (reply, email) = match resolution {
            GateResolution::Submit(raw) => {
                let email = raw.trim().to_string();
                if !is_valid_email(&email) {
                    return Err(self.refuse_locally(ChatError::InvalidEmail));
                }
                tracing::info!(session_id = %session_id, "Submitting email");
                let request = EmailRequest {
                    email: email.clone(),
                    session_id,
                };
                (self.api.submit_email(&request).await, Some(email))
            }
            GateResolution::Skip => {
                if !skip_allowed {
                    return Err(self.refuse_locally(ChatError::SkipNotAllowed));
                }
                tracing::info!(session_id = %session_id, "Skipping email");
                (self.api.skip_email(&SessionRequest { session_id }).await, None)
            }
        };

        match reply {
            Ok(GateReply { success: true, .. }) => {
                self.process_event(Event::GateResolved { email }).await?;
                self.pump_stream().await;
                Ok(())
            }
            Ok(GateReply { message, .. }) => {
                let message = message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| GATE_FAILURE_TEXT.to_string());
                tracing::info!(reason = %message, "Gate resolution rejected");
                self.reject_gate(message).await
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind, "Gate request failed");
                self.reject_gate(format!("Could not reach the server: {}", e.message))
                    .await
            }
        }
    }

    /// Start over: new session id, empty transcript, no gate
    pub fn reset(&mut self) {
        let session_id = new_session_id();
        tracing::info!(
            old_session = %self.state.session_id,
            new_session = %session_id,
            "Resetting session"
        );

        match self.apply(Event::Reset { session_id }) {
            Ok(effects) => {
                for effect in effects {
                    if let Some(request) = self.execute_effect(effect) {
                        tracing::warn!(session_id = %request.session_id, "Ignoring stream request during reset");
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "Reset rejected"),
        }
    }

    // ==================== Event processing ====================

    /// Run the transition and swap in the new state
    fn apply(&mut self, event: Event) -> Result<Vec<Effect>, TransitionError> {
        let event_name = event.name();
        let result = transition(&self.state, &self.context, event).inspect_err(|e| {
            tracing::debug!(event = event_name, error = %e, "Transition rejected");
        })?;

        let from = self.state.phase.name();
        self.state = result.new_state;
        let to = self.state.phase.name();
        if from != to {
            tracing::debug!(event = event_name, from, to, "Phase changed");
        }
        Ok(result.effects)
    }

    async fn process_event(&mut self, event: Event) -> Result<(), ChatError> {
        // Effects may produce follow-up events (a stream that fails to open)
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            for effect in self.apply(current_event)? {
                if let Some(request) = self.execute_effect(effect) {
                    if let Some(follow_up) = self.open_stream(request).await {
                        events_to_process.push(follow_up);
                    }
                }
            }
        }

        Ok(())
    }

    /// Execute a synchronous effect. A stream request is handed back for the
    /// caller to open.
    fn execute_effect(&mut self, effect: Effect) -> Option<ChatRequest> {
        match effect {
            Effect::OpenStream { request } => Some(request),
            Effect::CloseStream => {
                self.close_stream();
                None
            }
            Effect::PersistSession { session_id } => {
                persist_session(&self.store, &session_id);
                None
            }
            Effect::ClearRemoteSession { session_id } => {
                self.clear_remote_session(session_id);
                None
            }
            Effect::Notify(event) => {
                // No subscribers is fine
                let _ = self.broadcast_tx.send(event);
                None
            }
        }
    }

    async fn open_stream(&mut self, request: ChatRequest) -> Option<Event> {
        self.close_stream();
        tracing::info!(
            session_id = %request.session_id,
            with_email = request.email.is_some(),
            "Opening answer stream"
        );

        // Waiting for response headers counts against the idle bound too
        let opened = match self.config.stream_idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.api.open_stream(&request)).await {
                Ok(opened) => opened,
                Err(_) => {
                    tracing::warn!(
                        idle_secs = limit.as_secs_f64(),
                        "Answer stream did not open in time"
                    );
                    return Some(Event::StreamFailed {
                        message: stall_message(limit),
                    });
                }
            },
            None => self.api.open_stream(&request).await,
        };

        match opened {
            Ok(stream) => {
                self.stream = Some(stream);
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind, "Failed to open answer stream");
                Some(Event::StreamFailed { message: e.message })
            }
        }
    }

    fn close_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
            tracing::debug!("Answer stream closed");
        }
    }

    /// Read the open stream until the state machine closes it or it ends
    async fn pump_stream(&mut self) {
        let mut decoder = FrameDecoder::new();

        while self.stream.is_some() {
            let events: Vec<Event> = match self.pull().await {
                Pull::Chunk(chunk) => decoder
                    .feed(&chunk)
                    .into_iter()
                    .map(Event::StreamFrame)
                    .collect(),
                Pull::Failed(e) => {
                    tracing::warn!(error = %e, "Answer stream failed");
                    vec![Event::StreamFailed { message: e.message }]
                }
                Pull::Ended { cancelled: true } => vec![Event::StreamFailed {
                    message: "Answer stream cancelled".to_string(),
                }],
                Pull::Ended { cancelled: false } => {
                    let dropped = std::mem::take(&mut decoder).finish();
                    tracing::warn!(
                        dropped_bytes = dropped,
                        "Answer stream closed without a terminal frame"
                    );
                    vec![Event::StreamEnded]
                }
                Pull::Stalled(limit) => {
                    tracing::warn!(idle_secs = limit.as_secs_f64(), "Answer stream stalled");
                    vec![Event::StreamFailed {
                        message: stall_message(limit),
                    }]
                }
            };

            for event in events {
                if let Err(e) = self.process_event(event).await {
                    tracing::warn!(error = %e, "Failed to apply stream event");
                }
            }
        }
    }

    async fn pull(&mut self) -> Pull {
        let Some(stream) = self.stream.as_mut() else {
            return Pull::Ended { cancelled: false };
        };

        let next = match self.config.stream_idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, stream.next_chunk()).await {
                Ok(next) => next,
                Err(_) => {
                    self.close_stream();
                    return Pull::Stalled(limit);
                }
            },
            None => stream.next_chunk().await,
        };

        match next {
            Some(Ok(chunk)) => Pull::Chunk(chunk),
            Some(Err(e)) => {
                self.close_stream();
                Pull::Failed(e)
            }
            None => {
                let cancelled = stream.is_cancelled();
                self.close_stream();
                Pull::Ended { cancelled }
            }
        }
    }

    /// Reject a gate action before any network call. No state change.
    fn refuse_locally(&self, error: ChatError) -> ChatError {
        tracing::debug!(error = %error, "Gate action refused locally");
        let _ = self.broadcast_tx.send(ViewEvent::GateError {
            message: error.to_string(),
        });
        error
    }

    async fn reject_gate(&mut self, message: String) -> Result<(), ChatError> {
        self.process_event(Event::GateRejected {
            message: message.clone(),
        })
        .await?;
        Err(ChatError::GateRejected(message))
    }

    /// Fire-and-forget server cleanup for an abandoned session
    fn clear_remote_session(&self, session_id: String) {
        if !self.config.clear_remote_on_reset {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime, skipping remote session clear");
            return;
        };

        let api = Arc::clone(&self.api);
        handle.spawn(async move {
            let request = SessionRequest { session_id };
            match api.clear_session(&request).await {
                Ok(reply) if reply.success => {
                    tracing::debug!(session_id = %request.session_id, "Remote session cleared");
                }
                Ok(reply) => {
                    tracing::debug!(message = ?reply.message, "Server declined session clear");
                }
                Err(e) => tracing::debug!(error = %e, "Remote session clear failed"),
            }
        });
    }
}

fn stall_message(limit: Duration) -> String {
    format!(
        "No response from the server for {:.1} seconds",
        limit.as_secs_f64()
    )
}

fn persist_session<S: SessionStore>(store: &S, session_id: &str) {
    if let Err(e) = store.save(session_id) {
        tracing::error!(error = %e, session_id = %session_id, "Failed to persist session id");
    }
}
