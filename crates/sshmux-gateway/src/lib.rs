//! sshmux-gateway — the two wire surfaces over the session core.
//!
//! The browser terminal attaches over WebSocket (`/session/{name}`,
//! `/monitoring`); the assistant channel feeds decoded tool calls into
//! [`tools::dispatch`]. Both surfaces hold only session names and consult
//! the registry.

pub mod app;
pub mod portfile;
pub mod stdio;
pub mod tools;
pub mod ws;
