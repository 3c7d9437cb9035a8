//! Browser terminal WebSocket frames.
//!
//! Every frame on the wire is a single JSON object with a `type`
//! discriminator. Both directions are closed sets: an inbound frame whose
//! type is not listed here fails to parse, and the connection answers with
//! `malformed_message_handled` instead of disconnecting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sshmux_core::Source;

/// Viewer → server.
///
/// `command`/`commandId` are optional at the parse layer so the handler can
/// distinguish "known type, missing field" (answered with `command_error`)
/// from an unknown type (answered with `malformed_message_handled`).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    #[serde(rename_all = "camelCase")]
    TerminalInput {
        command: Option<String>,
        command_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    TerminalInputRaw {
        command: Option<String>,
        command_id: Option<String>,
    },
    TerminalSignal { signal: Option<String> },
    RequestStateRecovery {},
}

/// Execution lifecycle announced over `processing_state` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    Executing,
    Completed,
    Error,
}

/// Server → viewer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Sole frame on the passive `/monitoring` endpoint.
    Connected,
    #[serde(rename_all = "camelCase")]
    TerminalOutput {
        session_name: String,
        timestamp: DateTime<Utc>,
        data: String,
        source: Source,
    },
    #[serde(rename_all = "camelCase")]
    ProcessingState {
        session_name: String,
        state: ProcessingState,
    },
    #[serde(rename_all = "camelCase")]
    VisualStateIndicator {
        session_name: String,
        source: Source,
        state: ProcessingState,
    },
    #[serde(rename_all = "camelCase")]
    CommandError {
        session_name: String,
        error: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    TerminalReady { session_name: String },
    #[serde(rename_all = "camelCase")]
    TerminalSignalSent {
        session_name: String,
        signal: String,
    },
    MalformedMessageHandled { message: String },
    #[serde(rename_all = "camelCase")]
    GracefulRecovery {
        session_name: String,
        message: String,
    },
}

impl OutboundFrame {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
