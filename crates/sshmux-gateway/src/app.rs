use axum::{extract::State, routing::get, Json, Router};
use sshmux_core::config::SshmuxConfig;
use sshmux_session::{SessionRegistry, SessionTunables};
use std::sync::Arc;
use std::time::Duration;

/// Central shared state — passed as Arc<AppState> to all Axum handlers and
/// to the tool dispatcher.
pub struct AppState {
    pub config: SshmuxConfig,
    pub registry: SessionRegistry,
}

impl AppState {
    pub fn new(config: SshmuxConfig) -> Self {
        Self {
            config,
            registry: SessionRegistry::new(),
        }
    }

    /// Session knobs derived from the operator config; everything else uses
    /// the wire-stable defaults.
    pub fn tunables(&self) -> SessionTunables {
        SessionTunables {
            recovery_timeout: self
                .config
                .session
                .recovery_timeout_ms
                .map(Duration::from_millis),
            ..SessionTunables::default()
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/monitoring", get(crate::ws::monitoring_handler))
        .route("/session/{name}", get(crate::ws::session_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "sshmux",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.registry.len(),
    }))
}
