//! sshmux-session — the per-session core of the SSH multiplexer.
//!
//! A [`Session`](session::Session) owns one SSH connection (behind the
//! [`CommandTransport`](transport::CommandTransport) seam) and the four
//! buffers that make dual-channel use safe: the command queue, the gating
//! ledger, the transcript, and the in-flight execution slot. The
//! coordinator drain task serializes execution to exactly one remote exec
//! at a time; the [`SessionRegistry`](registry::SessionRegistry) owns all
//! sessions by name.

pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod prompt;
pub mod queue;
pub mod registry;
pub mod scrub;
pub mod session;
pub mod transcript;
pub mod transport;
pub mod types;

pub use error::{Result, SessionError};
pub use registry::SessionRegistry;
pub use session::{Session, SessionTunables};
pub use transport::{CommandTransport, ExecEvent, ExecStream};
pub use types::{
    CommandState, EventSink, SessionEvent, SessionMetadata, SessionStatus, TranscriptEntry,
};
