//! Shared data types for the sshmux workspace.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Who initiated a command.
///
/// The surface boundary normalizes everything to these three values; the
/// legacy `claude` token some clients still send maps to `Assistant` on
/// ingress and is never emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Human,
    #[serde(alias = "claude")]
    Assistant,
    System,
}

impl Source {
    /// Parse a wire token. Returns `None` for anything outside the accepted
    /// set so callers can surface `InvalidSource`.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "human" => Some(Self::Human),
            "assistant" | "claude" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CommandId
// ---------------------------------------------------------------------------

/// Correlation id for a command: 1–128 chars from `[A-Za-z0-9_.-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandId(pub String);

impl CommandId {
    /// Generate a fresh random id (UUIDv4).
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Validate an externally supplied id.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.len() > 128 {
            return None;
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ExecOutcome
// ---------------------------------------------------------------------------

/// Final result of one remote exec invocation.
///
/// `exit_code = -1` marks "not yet complete" in the gating ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutcome {
    pub fn pending() -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: -1,
        }
    }

    /// The canonical interrupted result: exit 130, `^C` on stderr.
    pub fn interrupted() -> Self {
        Self {
            stdout: String::new(),
            stderr: "^C".to_string(),
            exit_code: 130,
        }
    }
}

// ---------------------------------------------------------------------------
// BrowserCommandEntry
// ---------------------------------------------------------------------------

/// One row of the gating ledger.
///
/// Serialized form is what the assistant sees inside the gating envelope's
/// `browserCommands` array, so field names are wire-stable camelCase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserCommandEntry {
    pub command: String,
    pub command_id: CommandId,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub source: Source,
    pub result: ExecOutcome,
}

impl BrowserCommandEntry {
    /// A fresh entry with the "not yet complete" result marker.
    pub fn pending(command: impl Into<String>, command_id: CommandId, source: Source) -> Self {
        Self {
            command: command.into(),
            command_id,
            timestamp: chrono::Utc::now(),
            source,
            result: ExecOutcome::pending(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session name validation
// ---------------------------------------------------------------------------

/// Session names: non-empty, no whitespace, no `@`.
pub fn valid_session_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('@') && !name.chars().any(char::is_whitespace)
}
