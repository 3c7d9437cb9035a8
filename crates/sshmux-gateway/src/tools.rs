//! The assistant tool-call surface.
//!
//! Accepts decoded calls (method name + camelCase JSON params) and returns
//! envelope values. The framing that carries these calls — stdio JSON-RPC
//! or anything else — stays outside; see `stdio.rs` for the built-in feed.

use serde::Deserialize;
use serde_json::{json, Value};
use sshmux_core::{types::valid_session_name, Source};
use sshmux_protocol::envelope;
use sshmux_session::{Session, SessionError};
use sshmux_ssh::{AuthMethod, SshClient, SshError};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::app::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectParams {
    name: String,
    host: String,
    #[serde(default = "default_ssh_port")]
    port: u16,
    username: String,
    password: Option<String>,
    private_key_content: Option<String>,
    key_file_path: Option<String>,
    passphrase: Option<String>,
}

fn default_ssh_port() -> u16 {
    22
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecParams {
    session_name: String,
    command: String,
    /// Milliseconds; the 15 s default applies when absent.
    timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionParams {
    session_name: String,
}

/// Route one decoded tool call. Method names are wire-stable.
pub async fn dispatch(app: &Arc<AppState>, method: &str, params: Value) -> Value {
    debug!(method, "tool call");
    match method {
        "connect" => match serde_json::from_value(params) {
            Ok(p) => connect(app, p).await,
            Err(e) => envelope::err("MISSING_FIELD", e.to_string()),
        },
        "exec" => match serde_json::from_value(params) {
            Ok(p) => exec(app, p).await,
            Err(e) => envelope::err("MISSING_FIELD", e.to_string()),
        },
        "listSessions" => envelope::ok(json!({ "sessions": app.registry.list() })),
        "disconnect" => with_session_name(params, |name| async move {
            match app.registry.remove(&name, "session disconnected").await {
                Ok(()) => envelope::ok(json!({ "sessionName": name })),
                Err(e) => session_error(e),
            }
        })
        .await,
        "cancel" => with_session_name(params, |name| async move {
            match app.registry.get(&name) {
                Ok(session) => match session.cancel_assistant() {
                    Ok(()) => envelope::ok(json!({ "sessionName": name })),
                    Err(e) => session_error(e),
                },
                Err(e) => session_error(e),
            }
        })
        .await,
        "getMonitoringUrl" => with_session_name(params, |name| async move {
            match app.registry.get(&name) {
                Ok(_) => envelope::ok(json!({
                    "url": format!(
                        "http://127.0.0.1:{}/session/{}",
                        app.config.gateway.port,
                        encode_component(&name)
                    ),
                })),
                Err(e) => session_error(e),
            }
        })
        .await,
        "resetSession" => with_session_name(params, |name| async move {
            match app.registry.get(&name) {
                Ok(session) => {
                    session.recovery_reset("assistant requested reset");
                    envelope::ok(json!({ "sessionName": name }))
                }
                Err(e) => session_error(e),
            }
        })
        .await,
        other => envelope::err("METHOD_NOT_FOUND", format!("unknown tool '{other}'")),
    }
}

async fn with_session_name<F, Fut>(params: Value, f: F) -> Value
where
    F: FnOnce(String) -> Fut,
    Fut: std::future::Future<Output = Value>,
{
    match serde_json::from_value::<SessionParams>(params) {
        Ok(p) => f(p.session_name).await,
        Err(e) => envelope::err("MISSING_FIELD", e.to_string()),
    }
}

async fn connect(app: &Arc<AppState>, p: ConnectParams) -> Value {
    if !valid_session_name(&p.name) {
        return envelope::err(
            "INVALID_NAME",
            "session names must be non-empty, without whitespace or '@'",
        );
    }
    if app.registry.contains(&p.name) {
        return session_error(SessionError::NameTaken(p.name));
    }

    let auth = match (p.password, p.private_key_content, p.key_file_path) {
        (Some(password), None, None) => AuthMethod::Password(password),
        (None, Some(content), None) => AuthMethod::KeyContent {
            content,
            passphrase: p.passphrase,
        },
        (None, None, Some(path)) => AuthMethod::KeyFile {
            path,
            passphrase: p.passphrase,
        },
        _ => {
            return envelope::err(
                "MISSING_FIELD",
                "exactly one of password, privateKeyContent, keyFilePath is required",
            )
        }
    };

    let client = match SshClient::connect(&p.host, p.port, &p.username, auth).await {
        Ok(client) => client,
        Err(e) => return ssh_error(e),
    };

    let session = Session::spawn(
        p.name.clone(),
        p.host,
        p.username,
        Arc::new(client),
        app.tunables(),
    );
    match app.registry.insert(session.clone()) {
        Ok(()) => envelope::ok(json!({ "session": session.metadata() })),
        Err(e) => {
            // Lost the naming race; drop the fresh connection.
            session.teardown("session disconnected").await;
            session_error(e)
        }
    }
}

async fn exec(app: &Arc<AppState>, p: ExecParams) -> Value {
    let session = match app.registry.get(&p.session_name) {
        Ok(s) => s,
        Err(e) => return session_error(e),
    };

    let timeout = p.timeout.map(Duration::from_millis);
    let rx = match session.submit(&p.command, Source::Assistant, timeout, None) {
        Ok(rx) => rx,
        Err(e) => return session_error(e),
    };

    match rx.await {
        Ok(Ok(outcome)) => envelope::ok(json!({
            "stdout": outcome.stdout,
            "stderr": outcome.stderr,
            "exitCode": outcome.exit_code,
        })),
        Ok(Err(e)) => session_error(e),
        Err(_) => envelope::err("IO_ERROR", "command completion channel dropped"),
    }
}

/// Session errors map straight onto envelopes; the gate gets its dedicated
/// bit-stable shape.
fn session_error(e: SessionError) -> Value {
    match e {
        SessionError::Gated(entries) => envelope::gating(&entries),
        other => envelope::err(other.code(), other.to_string()),
    }
}

fn ssh_error(e: SshError) -> Value {
    let code = match &e {
        SshError::InvalidPath => "INVALID_PATH",
        SshError::KeyNotAccessible | SshError::KeyPermissionDenied | SshError::AuthFailed(_) => {
            "AUTH_ERROR"
        }
        SshError::ConnectTimeout => "CONNECT_TIMEOUT",
        SshError::ConnectionFailed(_) => "IO_ERROR",
    };
    envelope::err(code, e.to_string())
}

/// Percent-encode a session name for the monitoring URL. Unreserved
/// characters pass through; everything else is %XX-escaped.
fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_component_passes_unreserved() {
        assert_eq!(encode_component("prod-db.1_x~"), "prod-db.1_x~");
    }

    #[test]
    fn encode_component_escapes_reserved() {
        assert_eq!(encode_component("a/b"), "a%2Fb");
        assert_eq!(encode_component("a%b"), "a%25b");
    }
}
