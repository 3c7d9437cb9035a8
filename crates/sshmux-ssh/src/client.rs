//! russh client implementing the session transport seam.

use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::keys::key;
use russh::{ChannelMsg, Disconnect, Sig};
use russh_keys::decode_secret_key;
use sshmux_core::config::CONNECT_TIMEOUT_SECS;
use sshmux_session::transport::{CommandTransport, ExecEvent, ExecStream};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, SshError};
use crate::keys;

/// How a `connect` call authenticates. Exactly one is supplied per call.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    Password(String),
    /// PEM/OpenSSH key material supplied inline.
    KeyContent {
        content: String,
        passphrase: Option<String>,
    },
    /// Key loaded from a validated filesystem path.
    KeyFile {
        path: String,
        passphrase: Option<String>,
    },
}

pub struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        // Host keys are accepted as supplied; verification policy lives with
        // the operator's known-hosts tooling, not this multiplexer.
        Ok(true)
    }
}

/// One SSH connection, exclusively held by its session.
pub struct SshClient {
    session: tokio::sync::Mutex<Handle<ClientHandler>>,
    host: String,
}

impl SshClient {
    /// Connect and authenticate within the fixed 10-second deadline.
    pub async fn connect(
        host: &str,
        port: u16,
        username: &str,
        auth: AuthMethod,
    ) -> Result<Self> {
        let addr = format!("{host}:{port}");
        info!(%addr, username, "connecting");

        let config = Arc::new(Config::default());
        let connect_future = client::connect(config, &addr, ClientHandler);
        let mut session =
            tokio::time::timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS), connect_future)
                .await
                .map_err(|_| SshError::ConnectTimeout)?
                .map_err(|e| SshError::ConnectionFailed(e.to_string()))?;

        authenticate(&mut session, username, auth).await?;
        info!(host, username, "authenticated");

        Ok(Self {
            session: tokio::sync::Mutex::new(session),
            host: host.to_string(),
        })
    }
}

async fn authenticate(
    session: &mut Handle<ClientHandler>,
    username: &str,
    auth: AuthMethod,
) -> Result<()> {
    match auth {
        AuthMethod::Password(password) => {
            let accepted = session
                .authenticate_password(username, &password)
                .await
                .map_err(|e| SshError::AuthFailed(e.to_string()))?;
            if !accepted {
                return Err(SshError::AuthFailed(
                    "server rejected password".to_string(),
                ));
            }
        }
        AuthMethod::KeyContent { content, passphrase } => {
            let secret = decode_secret_key(&content, passphrase.as_deref())
                .map_err(|e| SshError::AuthFailed(format!("key parse failed: {e}")))?;
            let accepted = session
                .authenticate_publickey(username, Arc::new(secret))
                .await
                .map_err(|e| SshError::AuthFailed(e.to_string()))?;
            if !accepted {
                return Err(SshError::AuthFailed(
                    "server rejected public key".to_string(),
                ));
            }
        }
        AuthMethod::KeyFile { path, passphrase } => {
            // Path validation and the read both yield sanitized errors.
            let content = keys::read_key_file(&path)?;
            let secret = decode_secret_key(&content, passphrase.as_deref())
                .map_err(|e| SshError::AuthFailed(format!("key parse failed: {e}")))?;
            let accepted = session
                .authenticate_publickey(username, Arc::new(secret))
                .await
                .map_err(|e| SshError::AuthFailed(e.to_string()))?;
            if !accepted {
                return Err(SshError::AuthFailed(
                    "server rejected public key".to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn io_other(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

#[async_trait]
impl CommandTransport for SshClient {
    async fn exec(&self, command: &str) -> std::io::Result<ExecStream> {
        let mut channel = {
            let session = self.session.lock().await;
            session.channel_open_session().await.map_err(io_other)?
        };
        channel.exec(true, command).await.map_err(io_other)?;
        debug!(host = %self.host, command, "exec channel opened");

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        // Interrupt the remote side, then end our half.
                        let _ = channel.signal(Sig::INT).await;
                        let _ = channel.eof().await;
                        break;
                    }
                    msg = channel.wait() => match msg {
                        Some(ChannelMsg::Data { data }) => {
                            if tx.send(ExecEvent::Stdout(data.to_vec())).await.is_err() {
                                break;
                            }
                        }
                        Some(ChannelMsg::ExtendedData { data, ext }) if ext == 1 => {
                            if tx.send(ExecEvent::Stderr(data.to_vec())).await.is_err() {
                                break;
                            }
                        }
                        Some(ChannelMsg::ExitStatus { exit_status }) => {
                            let _ = tx.send(ExecEvent::Exit(exit_status as i32)).await;
                        }
                        Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                            warn!(?signal_name, "remote command killed by signal");
                            let _ = tx.send(ExecEvent::Exit(130)).await;
                        }
                        Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                        _ => {}
                    }
                }
            }
            // Dropping tx closes the event stream; the coordinator observes
            // the close and finalizes the command.
        });

        Ok(ExecStream { events: rx, cancel })
    }

    async fn close(&self) {
        let session = self.session.lock().await;
        if let Err(e) = session
            .disconnect(Disconnect::ByApplication, "session closed", "en")
            .await
        {
            debug!(host = %self.host, error = %e, "disconnect already down");
        }
    }
}
