//! Error types for the SSH transport layer.
//!
//! Key-material errors use exactly three canonical messages so nothing
//! about the operator's filesystem layout leaks to the assistant channel.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SshError {
    /// Path failed validation (traversal, forbidden prefix, bad `~`).
    #[error("Invalid path")]
    InvalidPath,

    /// Key file missing or unreadable for a non-permission reason.
    #[error("Key file not accessible")]
    KeyNotAccessible,

    /// Key file exists but the process may not read it.
    #[error("Permission denied accessing key file")]
    KeyPermissionDenied,

    /// The server rejected the credentials, or the key failed to parse.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The transport did not come up within the fixed connect deadline.
    #[error("connection timed out")]
    ConnectTimeout,

    /// TCP or protocol-level connection failure.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

pub type Result<T> = std::result::Result<T, SshError>;
