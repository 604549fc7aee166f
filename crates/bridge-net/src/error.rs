//! Error types for bridge-net

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// bridge-net error types. `TransportError`'s `kind` discriminant lets
/// callers choose a fallback path without downcasting.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error ({kind}): {message}")]
    Transport { kind: &'static str, message: String },

    #[error("operation timed out after {deadline_ms}ms")]
    Timeout { deadline_ms: u64 },

    #[error(transparent)]
    Core(#[from] bridge_core::Error),
}

impl Error {
    pub fn transport(kind: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
        }
    }

    pub fn nostr(message: impl Into<String>) -> Self {
        Self::transport("nostr", message)
    }

    pub fn bt(message: impl Into<String>) -> Self {
        Self::transport("bt", message)
    }

    pub fn core(message: impl Into<String>) -> Self {
        Self::transport("core", message)
    }
}
