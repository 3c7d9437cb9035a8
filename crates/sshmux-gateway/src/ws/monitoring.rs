//! `/monitoring` — passive endpoint: one `connected` frame, then silence.

use axum::{
    extract::{ws::Message, ws::WebSocket, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::StreamExt;
use sshmux_protocol::OutboundFrame;
use tracing::debug;

use crate::ws::send_json;

pub async fn monitoring_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(handle_monitoring)
}

async fn handle_monitoring(socket: WebSocket) {
    let (mut tx, mut rx) = socket.split();
    if send_json(&mut tx, &OutboundFrame::Connected).await.is_err() {
        return;
    }

    // Drain until the client leaves; inbound frames have no effect here.
    while let Some(msg) = rx.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => debug!("monitoring endpoint ignoring inbound frame"),
        }
    }
}
