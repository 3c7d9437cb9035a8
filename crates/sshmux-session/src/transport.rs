//! The seam between the coordinator and the SSH layer.
//!
//! The coordinator never sees russh types: it consumes a
//! [`CommandTransport`] that runs one command per call and streams output
//! events back. `sshmux-ssh` provides the production implementation; tests
//! drive the coordinator with scripted mocks.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One unit of output from a running remote command.
#[derive(Debug, Clone)]
pub enum ExecEvent {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    Exit(i32),
}

/// Handle to a running remote command.
///
/// The event channel closes when the remote channel does; cancelling the
/// token signals the remote side with an interrupt and tears the stream
/// down.
pub struct ExecStream {
    pub events: mpsc::Receiver<ExecEvent>,
    pub cancel: CancellationToken,
}

/// A connection that can run discrete commands.
///
/// Implementations must be `Send + Sync`: one transport is shared between
/// the drain task and the prompt synthesizer's silent `pwd` refresh.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    /// Start `command` on the remote side and return its output stream.
    async fn exec(&self, command: &str) -> std::io::Result<ExecStream>;

    /// Close the underlying connection. Idempotent.
    async fn close(&self);
}
