//! Session-internal data types: requests, transcript entries, events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sshmux_core::{CommandId, ExecOutcome, Source};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;

/// Completion channel payload: the final result of one submitted command.
pub type CommandResult = std::result::Result<ExecOutcome, SessionError>;

// ---------------------------------------------------------------------------
// CommandRequest
// ---------------------------------------------------------------------------

/// A command waiting in (or drained from) the per-session queue.
///
/// The source is fixed before the request enters the queue; completion fires
/// the oneshot exactly once with resolve, reject, or cancel.
#[derive(Debug)]
pub struct CommandRequest {
    pub command: String,
    pub source: Source,
    pub timeout: Option<Duration>,
    pub command_id: CommandId,
    pub enqueued_at: Instant,
    done: oneshot::Sender<CommandResult>,
}

impl CommandRequest {
    pub fn new(
        command: impl Into<String>,
        source: Source,
        timeout: Option<Duration>,
        command_id: CommandId,
    ) -> (Self, oneshot::Receiver<CommandResult>) {
        let (done, rx) = oneshot::channel();
        (
            Self {
                command: command.into(),
                source,
                timeout,
                command_id,
                enqueued_at: Instant::now(),
                done,
            },
            rx,
        )
    }

    /// Fire the completion channel. The receiver may already be gone (a
    /// viewer that disconnected); that is not an error.
    pub fn complete(self, result: CommandResult) {
        let _ = self.done.send(result);
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.enqueued_at)
    }
}

// ---------------------------------------------------------------------------
// ActiveCommand
// ---------------------------------------------------------------------------

/// The single in-flight command. At most one exists per session.
#[derive(Debug)]
pub struct ActiveCommand {
    pub command: String,
    pub command_id: CommandId,
    pub source: Source,
    pub started_at: Instant,
    /// Cancelling this token interrupts the remote stream.
    pub cancel: CancellationToken,
}

// ---------------------------------------------------------------------------
// TranscriptEntry
// ---------------------------------------------------------------------------

/// One fragment of terminal output, replayable to reattaching viewers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub timestamp: DateTime<Utc>,
    pub data: String,
    pub source: Source,
}

impl TranscriptEntry {
    pub fn new(data: impl Into<String>, source: Source) -> Self {
        Self {
            timestamp: Utc::now(),
            data: data.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Session events and sinks
// ---------------------------------------------------------------------------

/// Execution lifecycle as announced to viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Executing,
    Completed,
    Error,
}

/// Everything a live viewer can observe from a session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Terminal data; also stored in the transcript ring.
    Output(TranscriptEntry),
    /// Execution lifecycle, attributed to the initiating source.
    Lifecycle { state: CommandState, source: Source },
    /// A command failed; code/message match the tool-surface envelope.
    CommandFailed { code: &'static str, message: String },
    /// The session is free to accept the next command.
    Ready,
}

/// A delivery sink for one attached viewer.
///
/// `deliver` returns `false` when the sink is dead; dead sinks are removed
/// from the fan-out and never retried.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &SessionEvent) -> bool;
    fn is_alive(&self) -> bool;
}

// ---------------------------------------------------------------------------
// SessionMetadata
// ---------------------------------------------------------------------------

/// Connection status surfaced by `listSessions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Connected,
    Disconnected,
}

/// Snapshot of a session's connection metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub name: String,
    pub host: String,
    pub username: String,
    pub status: SessionStatus,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}
