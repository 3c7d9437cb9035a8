use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Wire-stable protocol constants.
pub const DEFAULT_PORT: u16 = 8022;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Per-command execution timeout, reset on every stdout chunk.
pub const COMMAND_TIMEOUT_MS: u64 = 15_000;
/// Fixed deadline for establishing the SSH transport.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Pending command requests per session before `QueueFull`.
pub const QUEUE_CAPACITY: usize = 100;
/// Queued requests older than this are failed with `Expired` at drain time.
pub const QUEUE_STALENESS_MS: u64 = 15_000;
/// Gating ledger ring capacity; oldest entries drop on overflow.
pub const LEDGER_CAPACITY: usize = 500;
/// Transcript ring capacity for replay to reattaching viewers.
pub const TRANSCRIPT_CAPACITY: usize = 1_000;
/// Buffered events per subscriber before the sink is considered dead.
pub const SUBSCRIBER_BUFFER: usize = 1_024;
/// The single piece of on-disk state: the listening port as ASCII.
pub const PORT_FILE_NAME: &str = "sshmux.port";

/// Top-level config (sshmux.toml + SSHMUX_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshmuxConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Operator-set session knobs. Everything here has a safe default; the
/// recovery timeout is off unless configured, which makes the recovery
/// reset manual-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Upper bound on total command residency, in milliseconds. When a
    /// command is still in flight past this bound, the session performs a
    /// recovery reset.
    #[serde(default)]
    pub recovery_timeout_ms: Option<u64>,
}

impl Default for SshmuxConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

impl SshmuxConfig {
    /// Load config: explicit path > ./sshmux.toml, then SSHMUX_* env vars on top.
    ///
    /// Example override: `SSHMUX_GATEWAY__PORT=9000`.
    pub fn load(path: Option<&str>) -> Result<Self, figment::Error> {
        let toml_path = path.unwrap_or("sshmux.toml");
        Figment::new()
            .merge(Toml::file(toml_path))
            .merge(Env::prefixed("SSHMUX_").split("__"))
            .extract()
    }
}
