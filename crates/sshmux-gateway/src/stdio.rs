//! Line-delimited feed for the assistant channel.
//!
//! One JSON object per stdin line, `{"method": "...", "params": {...}}`;
//! one envelope per stdout line. The richer JSON-RPC framing some assistant
//! hosts speak is layered outside this process — by the time a call reaches
//! here it is already decoded.

use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::app::AppState;
use crate::tools;

/// Run the stdio loop until stdin closes.
pub async fn run(app: Arc<AppState>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("assistant channel closed");
                return;
            }
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                return;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = handle_line(&app, trimmed).await;
        let mut payload = response.to_string();
        payload.push('\n');
        if stdout.write_all(payload.as_bytes()).await.is_err() {
            return;
        }
        let _ = stdout.flush().await;
    }
}

async fn handle_line(app: &Arc<AppState>, line: &str) -> Value {
    let request: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            return sshmux_protocol::envelope::err("MISSING_FIELD", format!("parse error: {e}"))
        }
    };
    let method = request
        .get("method")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let params = request.get("params").cloned().unwrap_or(Value::Null);
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    tools::dispatch(app, &method, params).await
}
