//! Error taxonomy for session operations.

use sshmux_core::BrowserCommandEntry;
use thiserror::Error;

/// All errors that can originate from session operations.
///
/// The gate is modeled as an error variant because the tool surface returns
/// it through the same channel as real failures, but it is a well-formed
/// contract signal, not a fault: it carries the full human-entry ledger at
/// gate time.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Session names must be non-empty, without whitespace or `@`.
    #[error("invalid session name: {0:?}")]
    InvalidName(String),

    /// The wire token was not one of `human`, `assistant`, `system`.
    #[error("invalid command source: {0:?}")]
    InvalidSource(String),

    /// Correlation ids are 1-128 chars from `[A-Za-z0-9_.-]`.
    #[error("invalid command id: {0:?}")]
    InvalidCommandId(String),

    /// A required field was absent from a decoded request.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The per-session pending queue is at capacity.
    #[error("command queue is full")]
    QueueFull,

    /// The request sat in the queue past the staleness bound.
    #[error("command expired in queue before execution")]
    Expired,

    /// The command exceeded its execution deadline.
    #[error("command timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Assistant command refused because the human ran commands first.
    /// Carries every human ledger entry present at gate time.
    #[error("user executed commands directly in browser")]
    Gated(Vec<BrowserCommandEntry>),

    /// No session with that name exists in the registry.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A session with that name already exists.
    #[error("session name already in use: {0}")]
    NameTaken(String),

    /// The SSH server rejected the supplied credentials or key.
    #[error("authentication failed: {0}")]
    AuthError(String),

    /// The SSH transport could not be established within the deadline.
    #[error("connection timed out")]
    ConnectTimeout,

    /// `exit` would destroy the shared connection's notion of a shell.
    #[error("command would terminate the shell")]
    ShellTerminating,

    /// The request was interrupted or rejected before completion.
    #[error("command cancelled")]
    Cancelled,

    /// `cancel` is scoped to assistant commands and none is in flight.
    #[error("no active assistant command")]
    NoActiveAssistantCommand,

    /// Transport fault during execution; the session remains usable.
    #[error("I/O error: {0}")]
    Io(String),
}

impl SessionError {
    /// Wire-stable error code for envelopes and `command_error` frames.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidName(_) => "INVALID_NAME",
            Self::InvalidSource(_) => "INVALID_SOURCE",
            Self::InvalidCommandId(_) => "INVALID_COMMAND_ID",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::QueueFull => "QUEUE_FULL",
            Self::Expired => "EXPIRED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Gated(_) => "BROWSER_COMMANDS_EXECUTED",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::NameTaken(_) => "NAME_TAKEN",
            Self::AuthError(_) => "AUTH_ERROR",
            Self::ConnectTimeout => "CONNECT_TIMEOUT",
            Self::ShellTerminating => "SHELL_TERMINATING",
            Self::Cancelled => "CANCELLED",
            Self::NoActiveAssistantCommand => "NO_ACTIVE_ASSISTANT_COMMAND",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, SessionError>;
