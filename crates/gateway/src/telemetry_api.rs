//! Telemetry scoring endpoint and the live WebSocket stream.

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use voltdesk_core::telemetry::TelemetryReading;
use voltdesk_scorer::feature_vector;

use crate::SharedState;

#[derive(Serialize)]
pub struct TelemetryResponse {
    pub telemetry: TelemetryReading,
    /// Anomaly score; `null` when no model is loaded
    pub score: Option<f64>,
    /// `-1` anomalous, `1` normal; `null` when no model is loaded
    pub label: Option<i8>,
}

/// Score one telemetry reading. Without a loaded model the reading is
/// echoed back with null score and label.
pub async fn telemetry_handler(
    State(state): State<SharedState>,
    Json(reading): Json<TelemetryReading>,
) -> Json<TelemetryResponse> {
    let (score, label) = match &state.scorer {
        Some(model) => {
            let features = feature_vector(&reading);
            (Some(model.score(&features)), Some(model.predict(&features)))
        }
        None => (None, None),
    };

    Json(TelemetryResponse {
        telemetry: reading,
        score,
        label,
    })
}

#[derive(Deserialize)]
pub struct StreamParams {
    /// Access token passed as a query parameter — browsers cannot set an
    /// Authorization header on a WebSocket handshake.
    pub token: Option<String>,
}

/// Upgrade to the live telemetry stream.
///
/// Token verification happens after the upgrade so the client receives a
/// proper close frame (1008 policy violation) rather than a failed
/// handshake it cannot distinguish from a network error.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<StreamParams>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    let identity = params
        .token
        .as_deref()
        .and_then(|token| state.tokens.decode_subject(token).ok());

    ws.on_upgrade(move |socket| handle_stream(socket, identity))
}

async fn handle_stream(mut socket: WebSocket, identity: Option<(String, voltdesk_core::Role)>) {
    let Some((username, _role)) = identity else {
        warn!("WebSocket rejected: missing or invalid token");
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: "policy violation".into(),
            })))
            .await;
        return;
    };

    info!(user = %username, "Telemetry stream opened");

    while let Some(msg) = socket.recv().await {
        match msg {
            Ok(Message::Text(_)) => {
                if socket.send(Message::Text("ack".into())).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            // Binary frames and pings are ignored; axum answers pings itself.
            Ok(_) => continue,
        }
    }

    info!(user = %username, "Telemetry stream closed");
}
