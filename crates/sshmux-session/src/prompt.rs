//! Synthetic prompt and echo construction.
//!
//! The remote shell never prints a prompt — every command runs as a
//! discrete exec — so the terminal illusion is built here: a
//! `[user@host dir]$ ` prompt, the echoed command line, and the command's
//! output normalized to CRLF line endings.

use sshmux_core::Source;

use crate::types::TranscriptEntry;

/// Per-session prompt builder. The working-directory cache itself lives in
/// the coordinator state; this type only knows how to render.
#[derive(Debug, Clone)]
pub struct PromptSynthesizer {
    username: String,
    host: String,
}

impl PromptSynthesizer {
    pub fn new(username: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            host: host.into(),
        }
    }

    /// Render `[{username}@{host} {display_dir}]$ `.
    pub fn prompt(&self, cwd: &str) -> String {
        format!("[{}@{} {}]$ ", self.username, self.host, self.display_dir(cwd))
    }

    /// `/home/{username}` becomes `~`-relative; `/` stays `/`; any other
    /// absolute path is unchanged.
    fn display_dir(&self, path: &str) -> String {
        let home = format!("/home/{}", self.username);
        if path == home {
            return "~".to_string();
        }
        if let Some(rest) = path.strip_prefix(&format!("{home}/")) {
            return format!("~/{rest}");
        }
        path.to_string()
    }

    /// The single raw fragment a viewer sees for one command turn:
    /// `{prompt}{command}\r\n{normalized_output}`.
    pub fn assemble_echo(
        &self,
        prompt: &str,
        command: &str,
        output: &str,
        source: Source,
    ) -> TranscriptEntry {
        let data = format!("{prompt}{command}\r\n{}", normalize_crlf(output));
        TranscriptEntry::new(data, source)
    }
}

/// Convert every `\n` not already preceded by `\r` into `\r\n`.
pub fn normalize_crlf(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev = '\0';
    for c in text.chars() {
        if c == '\n' && prev != '\r' {
            out.push('\r');
        }
        out.push(c);
        prev = c;
    }
    out
}

/// Commands that move the shell's notion of the working directory. A match
/// invalidates the cached directory before the next prompt is synthesized.
pub fn is_directory_changing(command: &str) -> bool {
    let trimmed = command.trim();
    trimmed == "cd"
        || trimmed.starts_with("cd ")
        || trimmed.starts_with("pushd ")
        || trimmed == "popd"
        || trimmed.starts_with("popd ")
        || trimmed.contains("cd;")
        || trimmed.contains("cd&&")
}
