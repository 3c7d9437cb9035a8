//! `/session/{name}` — the live terminal attachment.
//!
//! On attach: replay the transcript snapshot as `terminal_output` frames,
//! then forward live session events. Inbound frames submit human commands,
//! deliver signals, or request recovery; malformed input is answered, never
//! disconnected.

use axum::{
    extract::{ws::Message, ws::WebSocket, Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::stream::SplitSink;
use futures_util::StreamExt;
use sshmux_core::{config::SUBSCRIBER_BUFFER, CommandId, Source};
use sshmux_protocol::{InboundFrame, OutboundFrame, ProcessingState};
use sshmux_session::{
    CommandState, EventSink, Session, SessionError, SessionEvent, TranscriptEntry,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::ws::send_json;

type WsSender = SplitSink<WebSocket, Message>;

/// Axum handler — rejects unknown sessions before the upgrade.
pub async fn session_handler(
    ws: WebSocketUpgrade,
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if !state.registry.contains(&name) {
        return StatusCode::NOT_FOUND.into_response();
    }
    ws.on_upgrade(move |socket| handle_session_socket(socket, state, name))
        .into_response()
}

/// Bridges the session's event fan-out into this connection's WS sender.
struct WsSink(mpsc::Sender<SessionEvent>);

impl EventSink for WsSink {
    fn deliver(&self, event: &SessionEvent) -> bool {
        self.0.try_send(event.clone()).is_ok()
    }

    fn is_alive(&self) -> bool {
        !self.0.is_closed()
    }
}

async fn handle_session_socket(socket: WebSocket, state: Arc<AppState>, name: String) {
    let session = match state.registry.get(&name) {
        Ok(s) => s,
        // Session disappeared between the upgrade check and now.
        Err(_) => return,
    };
    info!(session = %name, "viewer attached");

    let (mut tx, mut rx) = socket.split();
    let (event_tx, mut events) = mpsc::channel::<SessionEvent>(SUBSCRIBER_BUFFER);

    // Snapshot-and-subscribe is atomic, so replaying the snapshot before
    // draining the live channel preserves chronological order.
    let replay = session.attach(Box::new(WsSink(event_tx)));
    for entry in replay {
        if send_json(&mut tx, &output_frame(&name, entry)).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            msg = rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    handle_incoming(&name, &text, &session, &mut tx).await;
                }
                Some(Ok(Message::Ping(data))) => {
                    use futures_util::SinkExt;
                    let _ = tx.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(_)) => break,
                _ => {}
            },

            event = events.recv() => match event {
                Some(event) => {
                    for frame in frames_for(&name, event) {
                        if send_json(&mut tx, &frame).await.is_err() {
                            info!(session = %name, "viewer send failed, detaching");
                            return;
                        }
                    }
                }
                // Sink was dropped by the session fan-out (session gone).
                None => break,
            },
        }
    }
    info!(session = %name, "viewer detached");
}

/// Handle one inbound text frame. Malformed input gets an answer frame; the
/// connection always survives.
async fn handle_incoming(name: &str, text: &str, session: &Arc<Session>, tx: &mut WsSender) {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(session = %name, error = %e, "malformed frame");
            let _ = send_json(
                tx,
                &OutboundFrame::MalformedMessageHandled {
                    message: "unrecognized message type".to_string(),
                },
            )
            .await;
            return;
        }
    };

    match frame {
        InboundFrame::TerminalInput { command, command_id }
        | InboundFrame::TerminalInputRaw { command, command_id } => {
            submit_input(name, command, command_id, session, tx).await;
        }

        InboundFrame::TerminalSignal { signal } => {
            let signal = signal.unwrap_or_default();
            if signal == "SIGINT" {
                session.interrupt();
            } else {
                // Exec-only model: nothing to deliver the signal to.
                debug!(session = %name, signal, "non-SIGINT signal acknowledged only");
            }
            let _ = send_json(
                tx,
                &OutboundFrame::TerminalSignalSent {
                    session_name: name.to_string(),
                    signal,
                },
            )
            .await;
        }

        InboundFrame::RequestStateRecovery {} => {
            session.recovery_reset("viewer requested state recovery");
            let _ = send_json(
                tx,
                &OutboundFrame::GracefulRecovery {
                    session_name: name.to_string(),
                    message: "session state reset".to_string(),
                },
            )
            .await;
        }
    }
}

async fn submit_input(
    name: &str,
    command: Option<String>,
    command_id: Option<String>,
    session: &Arc<Session>,
    tx: &mut WsSender,
) {
    let (Some(command), Some(raw_id)) = (command, command_id) else {
        send_command_error(name, tx, "MISSING_FIELD", "command and commandId are required").await;
        return;
    };
    let Some(command_id) = CommandId::parse(&raw_id) else {
        send_command_error(
            name,
            tx,
            SessionError::InvalidCommandId(raw_id).code(),
            "commandId must be 1-128 chars of [A-Za-z0-9_.-]",
        )
        .await;
        return;
    };

    match session.submit(&command, Source::Human, None, Some(command_id)) {
        // Completion is observed through the event fan-out (terminal_output,
        // terminal_ready); nothing waits on the receiver here.
        Ok(_rx) => {}
        Err(e) => {
            send_command_error(name, tx, e.code(), &e.to_string()).await;
            let _ = send_json(
                tx,
                &OutboundFrame::TerminalReady {
                    session_name: name.to_string(),
                },
            )
            .await;
        }
    }
}

async fn send_command_error(name: &str, tx: &mut WsSender, code: &str, message: &str) {
    let _ = send_json(
        tx,
        &OutboundFrame::CommandError {
            session_name: name.to_string(),
            error: code.to_string(),
            message: message.to_string(),
        },
    )
    .await;
}

fn output_frame(name: &str, entry: TranscriptEntry) -> OutboundFrame {
    OutboundFrame::TerminalOutput {
        session_name: name.to_string(),
        timestamp: entry.timestamp,
        data: entry.data,
        source: entry.source,
    }
}

fn processing_state(state: CommandState) -> ProcessingState {
    match state {
        CommandState::Executing => ProcessingState::Executing,
        CommandState::Completed => ProcessingState::Completed,
        CommandState::Error => ProcessingState::Error,
    }
}

/// Translate one session event into the frames a viewer sees.
fn frames_for(name: &str, event: SessionEvent) -> Vec<OutboundFrame> {
    match event {
        SessionEvent::Output(entry) => vec![output_frame(name, entry)],
        SessionEvent::Lifecycle { state, source } => vec![
            OutboundFrame::ProcessingState {
                session_name: name.to_string(),
                state: processing_state(state),
            },
            OutboundFrame::VisualStateIndicator {
                session_name: name.to_string(),
                source,
                state: processing_state(state),
            },
        ],
        SessionEvent::CommandFailed { code, message } => vec![OutboundFrame::CommandError {
            session_name: name.to_string(),
            error: code.to_string(),
            message,
        }],
        SessionEvent::Ready => vec![OutboundFrame::TerminalReady {
            session_name: name.to_string(),
        }],
    }
}
