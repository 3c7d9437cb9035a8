//! sshmux-core — configuration and shared types for the sshmux workspace.

pub mod config;
pub mod types;

pub use types::{BrowserCommandEntry, CommandId, ExecOutcome, Source};
