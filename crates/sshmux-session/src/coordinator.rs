//! The drain task: serializes execution to one in-flight command.
//!
//! One task per session. It sleeps on the wake notifier, then drains the
//! queue head-by-head. Installing the `ActiveCommand` and releasing it are
//! both single critical sections under the session mutex, so at most one
//! command is ever in flight.

use sshmux_core::{ExecOutcome, Source};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SessionError;
use crate::prompt::{self, normalize_crlf};
use crate::scrub;
use crate::session::Session;
use crate::transport::ExecEvent;
use crate::types::{
    ActiveCommand, CommandRequest, CommandResult, CommandState, SessionEvent, TranscriptEntry,
};

/// Stand-in deadline when no recovery timeout is configured.
fn far_future() -> tokio::time::Instant {
    tokio::time::Instant::now() + Duration::from_secs(86_400 * 365)
}

pub(crate) fn spawn_drain(session: Arc<Session>) {
    tokio::spawn(drain_loop(session));
}

async fn drain_loop(session: Arc<Session>) {
    loop {
        tokio::select! {
            _ = session.wake.notified() => {}
            _ = session.shutdown.cancelled() => return,
        }
        while let Some((req, cancel)) = next_job(&session) {
            execute(&session, req, cancel).await;
        }
    }
}

/// Take the queue head and enter EXECUTING, or return `None` when a command
/// is already in flight or the queue is empty. Stale entries encountered on
/// the way are failed with `Expired`.
fn next_job(session: &Session) -> Option<(CommandRequest, CancellationToken)> {
    let (job, expired) = {
        let mut state = session.state.lock().unwrap();
        if state.active.is_some() {
            (None, Vec::new())
        } else {
            let drained = state.queue.drain_one(Instant::now());
            let job = drained.next.map(|req| {
                let cancel = CancellationToken::new();
                state.active = Some(ActiveCommand {
                    command: req.command.clone(),
                    command_id: req.command_id.clone(),
                    source: req.source,
                    started_at: Instant::now(),
                    cancel: cancel.clone(),
                });
                (req, cancel)
            });
            (job, drained.expired)
        }
    };
    fail_expired(session, expired);
    job
}

fn fail_expired(session: &Session, reqs: Vec<CommandRequest>) {
    if reqs.is_empty() {
        return;
    }
    {
        let mut ledger = session.ledger.lock().unwrap();
        for req in reqs.iter().filter(|r| r.source != Source::System) {
            ledger.update_result(
                &req.command_id,
                ExecOutcome {
                    stdout: String::new(),
                    stderr: SessionError::Expired.to_string(),
                    exit_code: -1,
                },
            );
        }
    }
    for req in reqs {
        session.publish(SessionEvent::CommandFailed {
            code: SessionError::Expired.code(),
            message: SessionError::Expired.to_string(),
        });
        req.complete(Err(SessionError::Expired));
    }
}

enum Ending {
    Done,
    Cancelled,
    TimedOut,
    Stuck,
}

async fn execute(session: &Session, req: CommandRequest, cancel: CancellationToken) {
    debug!(session = %session.name(), source = %req.source, command = %req.command, "executing");
    session.publish(SessionEvent::Lifecycle {
        state: CommandState::Executing,
        source: req.source,
    });

    let mut stream = match session.transport.exec(&req.command).await {
        Ok(s) => s,
        Err(e) => {
            let message = e.to_string();
            let ledger_result = ExecOutcome {
                stdout: String::new(),
                stderr: message.clone(),
                exit_code: -1,
            };
            finish(session, req, Err(SessionError::Io(message)), ledger_result, String::new())
                .await;
            return;
        }
    };

    let timeout = req.timeout.unwrap_or(session.tunables.command_timeout);
    let mut stdout: Vec<u8> = Vec::new();
    let mut stderr: Vec<u8> = Vec::new();
    let mut exit_code: Option<i32> = None;

    // Idle deadline resets on every stdout chunk; the recovery deadline, if
    // configured, bounds total command residency.
    let idle = tokio::time::sleep(timeout);
    tokio::pin!(idle);
    let recovery = tokio::time::sleep_until(
        session
            .tunables
            .recovery_timeout
            .map(|d| tokio::time::Instant::now() + d)
            .unwrap_or_else(far_future),
    );
    tokio::pin!(recovery);

    let ending = loop {
        tokio::select! {
            ev = stream.events.recv() => match ev {
                Some(ExecEvent::Stdout(chunk)) => {
                    stdout.extend_from_slice(&chunk);
                    idle.as_mut().reset(tokio::time::Instant::now() + timeout);
                }
                Some(ExecEvent::Stderr(chunk)) => stderr.extend_from_slice(&chunk),
                Some(ExecEvent::Exit(code)) => exit_code = Some(code),
                None => break Ending::Done,
            },
            _ = cancel.cancelled() => {
                stream.cancel.cancel();
                break Ending::Cancelled;
            }
            _ = &mut idle => {
                stream.cancel.cancel();
                break Ending::TimedOut;
            }
            _ = &mut recovery => {
                stream.cancel.cancel();
                break Ending::Stuck;
            }
        }
    };

    let stdout = String::from_utf8_lossy(&stdout).into_owned();
    let stderr = String::from_utf8_lossy(&stderr).into_owned();

    match ending {
        Ending::Done => {
            let outcome = ExecOutcome {
                stdout: stdout.clone(),
                stderr: stderr.clone(),
                exit_code: exit_code.unwrap_or(0),
            };
            let display = format!("{stdout}{stderr}");
            finish(session, req, Ok(outcome.clone()), outcome, display).await;
        }
        Ending::Cancelled => {
            let ledger_result = ExecOutcome {
                stdout: stdout.clone(),
                stderr: "^C".to_string(),
                exit_code: 130,
            };
            let display = format!("{stdout}^C\r\n");
            finish(session, req, Err(SessionError::Cancelled), ledger_result, display).await;
        }
        Ending::TimedOut => {
            let ms = timeout.as_millis() as u64;
            let ledger_result = ExecOutcome {
                stdout: stdout.clone(),
                stderr: stderr.clone(),
                exit_code: exit_code.unwrap_or(124),
            };
            let display = format!("{stdout}{stderr}");
            finish(session, req, Err(SessionError::Timeout { ms }), ledger_result, display).await;
        }
        Ending::Stuck => {
            let ledger_result = ExecOutcome {
                stdout: stdout.clone(),
                stderr: "^C".to_string(),
                exit_code: 130,
            };
            let display = format!("{stdout}^C\r\n");
            finish(session, req, Err(SessionError::Cancelled), ledger_result, display).await;
            session.recovery_reset("command exceeded the configured recovery timeout");
        }
    }
}

/// Post-execution sequencing: ledger result, directory invalidation,
/// transcript append, lifecycle events, slot release, request completion.
/// Runs before the next command starts, so viewers always see a complete
/// prompt+echo turn per command.
async fn finish(
    session: &Session,
    req: CommandRequest,
    result: CommandResult,
    ledger_result: ExecOutcome,
    display: String,
) {
    if req.source != Source::System {
        session
            .ledger
            .lock()
            .unwrap()
            .update_result(&req.command_id, ledger_result);
    }

    if prompt::is_directory_changing(&req.command) {
        session.state.lock().unwrap().cwd = None;
    }

    match req.source {
        Source::Human | Source::Assistant => {
            let prompt = current_prompt(session).await;
            let entry =
                session
                    .synthesizer
                    .assemble_echo(&prompt, &req.command, &display, req.source);
            session.transcript.lock().unwrap().append(entry);
        }
        Source::System => {
            let cooked = normalize_crlf(&scrub::scrub(&display));
            if !cooked.is_empty() {
                session
                    .transcript
                    .lock()
                    .unwrap()
                    .append(TranscriptEntry::new(cooked, Source::System));
            }
        }
    }

    let failure = match &result {
        Ok(_) => None,
        Err(e) => Some((e.code(), e.to_string())),
    };
    session.publish(SessionEvent::Lifecycle {
        state: if failure.is_none() {
            CommandState::Completed
        } else {
            CommandState::Error
        },
        source: req.source,
    });
    if let Some((code, message)) = failure {
        session.publish(SessionEvent::CommandFailed { code, message });
    }

    {
        let mut state = session.state.lock().unwrap();
        if let Some(active) = state.active.take() {
            debug!(
                command = %active.command,
                command_id = %active.command_id,
                elapsed_ms = active.started_at.elapsed().as_millis() as u64,
                "slot released"
            );
        }
        state.last_activity = chrono::Utc::now();
    }
    session.publish(SessionEvent::Ready);
    req.complete(result);
}

/// Render the prompt for the current directory, refreshing the cache with a
/// silent `pwd` when a directory change invalidated it. The refresh is
/// invisible: not queued, not in the ledger, not in the transcript.
async fn current_prompt(session: &Session) -> String {
    let cached = session.state.lock().unwrap().cwd.clone();
    let dir = match cached {
        Some(dir) => dir,
        None => match silent_pwd(session).await {
            Some(dir) => {
                session.state.lock().unwrap().cwd = Some(dir.clone());
                dir
            }
            None => "~".to_string(),
        },
    };
    session.synthesizer.prompt(&dir)
}

async fn silent_pwd(session: &Session) -> Option<String> {
    let mut stream = session.transport.exec("pwd").await.ok()?;
    let deadline = tokio::time::Instant::now() + session.tunables.command_timeout;
    let mut stdout = Vec::new();
    loop {
        match tokio::time::timeout_at(deadline, stream.events.recv()).await {
            Ok(Some(ExecEvent::Stdout(chunk))) => stdout.extend_from_slice(&chunk),
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(_) => {
                stream.cancel.cancel();
                return None;
            }
        }
    }
    let dir = String::from_utf8_lossy(&stdout).trim().to_string();
    (!dir.is_empty()).then_some(dir)
}
