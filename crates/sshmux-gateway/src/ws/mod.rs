//! Browser terminal WebSocket surface.

mod monitoring;
mod session_ws;

pub use monitoring::monitoring_handler;
pub use session_ws::session_handler;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;

/// Serialize any value to JSON and send it over the WS connection.
pub(crate) async fn send_json<T: serde::Serialize>(
    tx: &mut SplitSink<WebSocket, Message>,
    payload: &T,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(payload).unwrap_or_default();
    tx.send(Message::Text(json.into()))
        .await
        .map_err(axum::Error::new)
}
