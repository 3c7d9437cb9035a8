use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use sshmux_gateway::{app, portfile, stdio};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sshmux_gateway=info,tower_http=debug".into()),
        )
        .init();

    // load config: SSHMUX_CONFIG path > ./sshmux.toml > defaults
    let config_path = std::env::var("SSHMUX_CONFIG").ok();
    let config = sshmux_core::config::SshmuxConfig::load(config_path.as_deref())
        .unwrap_or_else(|e| {
            warn!("Config load failed ({}), using defaults", e);
            sshmux_core::config::SshmuxConfig::default()
        });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let state = Arc::new(app::AppState::new(config));
    let router = app::build_router(state.clone());

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    portfile::write(Path::new("."), local.port())?;
    info!("sshmux gateway listening on {}", local);

    // Assistant tool calls arrive over stdio alongside the HTTP/WS surface.
    tokio::spawn(stdio::run(state.clone()));

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.registry.teardown_all("session disconnected").await;
    portfile::remove(Path::new("."));
    info!("sshmux gateway stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM; both take the same graceful-stop path.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
