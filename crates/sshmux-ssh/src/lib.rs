//! sshmux-ssh — the russh-backed command transport.
//!
//! One `SshClient` per session. Commands run as discrete exec channels on
//! the shared connection; there is no long-lived remote shell.

pub mod client;
pub mod error;
pub mod keys;

pub use client::{AuthMethod, SshClient};
pub use error::SshError;
