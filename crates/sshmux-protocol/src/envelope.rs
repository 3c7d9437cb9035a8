//! Assistant tool-call result envelopes.
//!
//! Every tool result is `{ success: true, … }` or
//! `{ success: false, error, message, … }`. The gating envelope is the one
//! shape assistants programmatically branch on, so it is constructed here in
//! full rather than assembled ad hoc at call sites.

use serde_json::{json, Value};
use sshmux_core::BrowserCommandEntry;

/// Wire-stable error code for the gate.
pub const GATING_ERROR_CODE: &str = "BROWSER_COMMANDS_EXECUTED";
/// Wire-stable gate message.
pub const GATING_MESSAGE: &str = "User executed commands directly in browser";

/// Success envelope. `payload` must serialize to a JSON object; its fields
/// are merged beside `success: true`.
pub fn ok(payload: Value) -> Value {
    let mut map = serde_json::Map::new();
    map.insert("success".to_string(), Value::Bool(true));
    if let Value::Object(fields) = payload {
        map.extend(fields);
    }
    Value::Object(map)
}

/// Error envelope.
pub fn err(code: &str, message: impl Into<String>) -> Value {
    json!({
        "success": false,
        "error": code,
        "message": message.into(),
    })
}

/// The gating envelope: the complete human-entry ledger at gate time, with
/// each entry's completed result, and a retry invitation.
pub fn gating(browser_commands: &[BrowserCommandEntry]) -> Value {
    json!({
        "success": false,
        "error": GATING_ERROR_CODE,
        "message": GATING_MESSAGE,
        "browserCommands": browser_commands,
        "retryAllowed": true,
    })
}
