//! Error types for the elchi client runtime.
//!
//! The taxonomy mirrors how failures propagate: `Transport` recovers locally
//! (monitor + session retry), `Registration` is fatal to the process, and
//! the rest surface as per-command failures without terminating the stream.

use thiserror::Error;

/// Result type alias for elchi client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the elchi client runtime
#[derive(Debug, Error)]
pub enum Error {
    /// Bad input from the controller or malformed local state
    #[error("Command validation failed: {0}")]
    Validation(String),

    /// Connect/stream/TLS/keepalive failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Register rejected by the controller or empty session token
    #[error("Registration failed: {0}")]
    Registration(String),

    /// OS syscall, subprocess or file I/O failure at the command level
    #[error("Operation failed: {0}")]
    Operation(String),

    /// FRR/vtysh output or netplan document rejected
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Circuit breaker rejected the call without invoking the handler
    #[error("breaker open")]
    BreakerOpen,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Transport errors are the only kind the session retries; everything
    /// else either answers on the stream or kills the process.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Registration failures terminate the process (operator
    /// misconfiguration, not a transient condition).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Registration(_))
    }

    /// The single string that lands in `CommandResponse.error`.
    pub fn wire_message(&self) -> String {
        self.to_string()
    }
}
