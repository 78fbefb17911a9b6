//! chatgate - streaming chat client with an email gate
//!
//! Talks to a question-answering service that streams answers as
//! `data: {json}` lines and may interrupt a conversation to ask for an email
//! address before answering. The [`runtime::SessionController`] owns the
//! conversation; views attach through [`runtime::ViewEvent`]s.

pub mod api;
pub mod config;
pub mod db;
pub mod email;
pub mod protocol;
pub mod runtime;
pub mod state_machine;

pub use api::HttpChatApi;
pub use config::ClientConfig;
pub use db::SqliteSessionStore;
pub use runtime::{ChatError, GateResolution, SessionController, ViewEvent};
