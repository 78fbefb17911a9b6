//! Client configuration

use crate::state_machine::SkipPolicy;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Longest query the service accepts, in characters
pub const MAX_MESSAGE_CHARS: usize = 1000;

const DEFAULT_STREAM_IDLE_SECS: u64 = 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub db_path: PathBuf,
    /// Longest wait for the next chunk before the stream counts as failed.
    /// `None` waits forever.
    pub stream_idle_timeout: Option<Duration>,
    /// Connect timeout, and total timeout for the non-streaming calls
    pub request_timeout: Duration,
    pub skip_policy: SkipPolicy,
    pub max_message_chars: usize,
    /// Ask the server to drop the old session on reset
    pub clear_remote_on_reset: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            db_path: default_db_path(),
            stream_idle_timeout: Some(Duration::from_secs(DEFAULT_STREAM_IDLE_SECS)),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            skip_policy: SkipPolicy::default(),
            max_message_chars: MAX_MESSAGE_CHARS,
            clear_remote_on_reset: true,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("CHATGATE_BASE_URL").filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        if let Some(path) = lookup("CHATGATE_DB_PATH").filter(|v| !v.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(secs) = lookup("CHATGATE_STREAM_IDLE_SECS").and_then(|v| v.trim().parse::<u64>().ok()) {
            config.stream_idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(secs) = lookup("CHATGATE_REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
        {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup("CHATGATE_SKIP_POLICY") {
            match raw.parse() {
                Ok(policy) => config.skip_policy = policy,
                Err(e) => tracing::warn!(error = %e, "Ignoring CHATGATE_SKIP_POLICY"),
            }
        }
        if let Some(flag) = lookup("CHATGATE_CLEAR_REMOTE_ON_RESET") {
            config.clear_remote_on_reset = !matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }

        config
    }
}

fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".chatgate").join("session.db")
}
