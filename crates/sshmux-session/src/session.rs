//! One multiplexed SSH session: buffers, state machine, and control ops.

use chrono::{DateTime, Utc};
use sshmux_core::{config, BrowserCommandEntry, CommandId, ExecOutcome, Source};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator;
use crate::error::{Result, SessionError};
use crate::ledger::BrowserCommandBuffer;
use crate::prompt::PromptSynthesizer;
use crate::queue::CommandQueue;
use crate::transcript::Transcript;
use crate::transport::CommandTransport;
use crate::types::{
    ActiveCommand, CommandRequest, CommandResult, EventSink, SessionEvent, SessionMetadata,
    SessionStatus, TranscriptEntry,
};

/// Per-session knobs. Defaults come from the wire-stable constants; the
/// recovery timeout stays off unless the operator configures it.
#[derive(Debug, Clone)]
pub struct SessionTunables {
    pub command_timeout: Duration,
    pub queue_capacity: usize,
    pub queue_staleness: Duration,
    pub ledger_capacity: usize,
    pub transcript_capacity: usize,
    pub recovery_timeout: Option<Duration>,
}

impl Default for SessionTunables {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_millis(config::COMMAND_TIMEOUT_MS),
            queue_capacity: config::QUEUE_CAPACITY,
            queue_staleness: Duration::from_millis(config::QUEUE_STALENESS_MS),
            ledger_capacity: config::LEDGER_CAPACITY,
            transcript_capacity: config::TRANSCRIPT_CAPACITY,
            recovery_timeout: None,
        }
    }
}

/// Coordinator state guarded by the session mutex. Every transition of the
/// WAITING ⇄ EXECUTING machine happens inside one short critical section.
pub(crate) struct CoordinatorState {
    pub queue: CommandQueue,
    pub active: Option<ActiveCommand>,
    pub cwd: Option<String>,
    pub status: SessionStatus,
    pub last_activity: DateTime<Utc>,
    pub last_reset: Option<String>,
}

pub struct Session {
    name: String,
    host: String,
    username: String,
    connected_at: DateTime<Utc>,
    pub(crate) transport: Arc<dyn CommandTransport>,
    pub(crate) tunables: SessionTunables,
    pub(crate) state: Mutex<CoordinatorState>,
    pub(crate) ledger: Mutex<BrowserCommandBuffer>,
    pub(crate) transcript: Mutex<Transcript>,
    pub(crate) synthesizer: PromptSynthesizer,
    pub(crate) wake: Notify,
    pub(crate) shutdown: CancellationToken,
}

impl Session {
    /// Build a session and start its drain task.
    pub fn spawn(
        name: impl Into<String>,
        host: impl Into<String>,
        username: impl Into<String>,
        transport: Arc<dyn CommandTransport>,
        tunables: SessionTunables,
    ) -> Arc<Self> {
        let name = name.into();
        let host = host.into();
        let username = username.into();
        let session = Arc::new(Self {
            synthesizer: PromptSynthesizer::new(username.clone(), host.clone()),
            state: Mutex::new(CoordinatorState {
                queue: CommandQueue::new(tunables.queue_capacity, tunables.queue_staleness),
                active: None,
                cwd: None,
                status: SessionStatus::Connected,
                last_activity: Utc::now(),
                last_reset: None,
            }),
            ledger: Mutex::new(BrowserCommandBuffer::new(tunables.ledger_capacity)),
            transcript: Mutex::new(Transcript::new(tunables.transcript_capacity)),
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
            connected_at: Utc::now(),
            name,
            host,
            username,
            transport,
            tunables,
        });
        coordinator::spawn_drain(session.clone());
        session
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> SessionMetadata {
        let state = self.state.lock().unwrap();
        SessionMetadata {
            name: self.name.clone(),
            host: self.host.clone(),
            username: self.username.clone(),
            status: state.status,
            connected_at: self.connected_at,
            last_activity: state.last_activity,
        }
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Submit a command for execution. Returns the completion receiver; the
    /// oneshot fires exactly once with resolve, reject, or cancel.
    ///
    /// Assistant submissions are gated: when the ledger holds any human
    /// entry, the gate fires synchronously, the ledger is cleared, and no
    /// SSH work occurs.
    pub fn submit(
        &self,
        command: &str,
        source: Source,
        timeout: Option<Duration>,
        command_id: Option<CommandId>,
    ) -> Result<oneshot::Receiver<CommandResult>> {
        if source == Source::Assistant {
            let mut ledger = self.ledger.lock().unwrap();
            let humans = ledger.human_entries();
            if !humans.is_empty() {
                debug!(session = %self.name, gated = humans.len(), "assistant command gated");
                ledger.clear();
                return Err(SessionError::Gated(humans));
            }
        }

        let trimmed = command.trim();
        if trimmed == "exit" || trimmed.starts_with("exit ") {
            return Err(SessionError::ShellTerminating);
        }

        let command_id = command_id.unwrap_or_default();
        let (req, rx) = CommandRequest::new(command, source, timeout, command_id.clone());

        {
            let mut state = self.state.lock().unwrap();
            if state.queue.is_full() {
                return Err(SessionError::QueueFull);
            }
            if source != Source::System {
                self.ledger
                    .lock()
                    .unwrap()
                    .append(BrowserCommandEntry::pending(command, command_id, source));
            }
            if state.queue.enqueue(req).is_err() {
                return Err(SessionError::QueueFull);
            }
        }
        self.wake.notify_one();
        Ok(rx)
    }

    // -----------------------------------------------------------------------
    // Viewers
    // -----------------------------------------------------------------------

    /// Attach a viewer sink; returns the transcript snapshot to replay
    /// before live events. Snapshot-and-subscribe is atomic.
    pub fn attach(&self, sink: Box<dyn EventSink>) -> Vec<TranscriptEntry> {
        self.transcript.lock().unwrap().attach(sink)
    }

    pub(crate) fn publish(&self, event: SessionEvent) {
        self.transcript.lock().unwrap().publish(&event);
    }

    /// Current gating-ledger contents, oldest first.
    pub fn ledger_snapshot(&self) -> Vec<BrowserCommandEntry> {
        self.ledger.lock().unwrap().snapshot()
    }

    /// Reason recorded by the most recent recovery reset, if any.
    pub fn last_reset(&self) -> Option<String> {
        self.state.lock().unwrap().last_reset.clone()
    }

    // -----------------------------------------------------------------------
    // Cancellation, reset, teardown
    // -----------------------------------------------------------------------

    /// Browser-side SIGINT: interrupt whatever is running and reject every
    /// queued request. The gating ledger is untouched.
    pub fn interrupt(&self) {
        let (rejected, had_active) = {
            let mut state = self.state.lock().unwrap();
            let had_active = match &state.active {
                Some(active) => {
                    active.cancel.cancel();
                    true
                }
                None => false,
            };
            (state.queue.reject_all(), had_active)
        };
        info!(session = %self.name, queued = rejected.len(), had_active, "interrupt");
        self.fail_cancelled(rejected);
        if !had_active {
            self.publish(SessionEvent::Ready);
        }
    }

    /// Assistant-scoped cancel: interrupts the in-flight command only if the
    /// assistant started it, rejects queued assistant requests, and removes
    /// assistant entries from the ledger. Human history survives.
    pub fn cancel_assistant(&self) -> Result<()> {
        let rejected = {
            let mut state = self.state.lock().unwrap();
            match &state.active {
                Some(active) if active.source == Source::Assistant => active.cancel.cancel(),
                _ => return Err(SessionError::NoActiveAssistantCommand),
            }
            state.queue.reject_source(Source::Assistant)
        };
        self.ledger.lock().unwrap().remove_assistant_entries();
        for req in rejected {
            req.complete(Err(SessionError::Cancelled));
        }
        Ok(())
    }

    /// The nuclear fallback: abandon in-flight work, reject the queue, clear
    /// the gate, drop the cached directory, and record why. Idempotent.
    pub fn recovery_reset(&self, reason: &str) {
        warn!(session = %self.name, reason, "recovery reset");
        let rejected = {
            let mut state = self.state.lock().unwrap();
            if let Some(active) = &state.active {
                active.cancel.cancel();
            }
            state.cwd = None;
            state.last_reset = Some(reason.to_string());
            state.queue.reject_all()
        };
        self.ledger.lock().unwrap().clear();
        for req in rejected {
            req.complete(Err(SessionError::Cancelled));
        }
    }

    /// Disconnect: stop the drain task, reject all pending work, tell
    /// viewers, and close the transport.
    pub async fn teardown(&self, reason: &str) {
        info!(session = %self.name, reason, "teardown");
        self.shutdown.cancel();
        let rejected = {
            let mut state = self.state.lock().unwrap();
            state.status = SessionStatus::Disconnected;
            if let Some(active) = &state.active {
                active.cancel.cancel();
            }
            state.queue.reject_all()
        };
        for req in rejected {
            req.complete(Err(SessionError::Cancelled));
        }
        self.transcript
            .lock()
            .unwrap()
            .append(TranscriptEntry::new(format!("{reason}\r\n"), Source::System));
        self.transport.close().await;
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Fail a batch of not-yet-executed requests as cancelled, finalizing
    /// their ledger entries with the interrupted marker.
    pub(crate) fn fail_cancelled(&self, reqs: Vec<CommandRequest>) {
        if reqs.is_empty() {
            return;
        }
        {
            let mut ledger = self.ledger.lock().unwrap();
            for req in reqs.iter().filter(|r| r.source != Source::System) {
                ledger.update_result(&req.command_id, ExecOutcome::interrupted());
            }
        }
        for req in reqs {
            self.publish(SessionEvent::CommandFailed {
                code: SessionError::Cancelled.code(),
                message: SessionError::Cancelled.to_string(),
            });
            req.complete(Err(SessionError::Cancelled));
        }
    }
}
