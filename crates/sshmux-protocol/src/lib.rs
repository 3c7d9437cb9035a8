//! sshmux-protocol — wire shapes for the two surfaces the core exposes.
//!
//! `frames` covers the browser terminal WebSocket protocol; `envelope`
//! covers the assistant tool-call result envelopes, including the gating
//! envelope. Both are wire-stable: existing clients parse these shapes.

pub mod envelope;
pub mod frames;

pub use frames::{InboundFrame, OutboundFrame, ProcessingState};
