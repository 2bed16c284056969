//! API handlers

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::ApiState;

/// Map a store failure onto a 500 response.
fn internal_error<E: std::fmt::Display>(e: E) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
        .into_response()
}

/// POST /api/telemetry - feed one raw reading into the ingest stage.
///
/// 202 with the stored record on success; 400 with the parse error on
/// malformed input (in which case nothing was written, broadcast, or queued).
pub async fn ingest_telemetry(State(state): State<Arc<ApiState>>, body: Bytes) -> Response {
    match state.ingest.ingest(&body).await {
        Ok(record) => (StatusCode::ACCEPTED, Json(record)).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// GET /api/vehicles - distinct vehicle ids.
pub async fn list_vehicles(State(state): State<Arc<ApiState>>) -> Response {
    match state.store.distinct_vehicles().await {
        Ok(vehicles) => Json(vehicles).into_response(),
        Err(e) => internal_error(e),
    }
}

/// How much history one request returns.
const HISTORY_LIMIT: usize = 20;

/// GET /api/history/:vehicle_id - latest records, newest first.
pub async fn vehicle_history(
    State(state): State<Arc<ApiState>>,
    Path(vehicle_id): Path<String>,
) -> Response {
    match state
        .store
        .query_by_vehicle(&vehicle_id, HISTORY_LIMIT)
        .await
    {
        Ok(records) => Json(records).into_response(),
        Err(e) => internal_error(e),
    }
}

/// DELETE /api/telemetry/:vehicle_id - drop one vehicle's records.
pub async fn delete_vehicle_telemetry(
    State(state): State<Arc<ApiState>>,
    Path(vehicle_id): Path<String>,
) -> Response {
    match state.store.delete_by_vehicle(&vehicle_id).await {
        Ok(deleted) => {
            info!(vehicle_id = %vehicle_id, deleted = deleted, "Deleted vehicle telemetry");
            Json(serde_json::json!({ "deleted": deleted })).into_response()
        }
        Err(e) => internal_error(e),
    }
}

/// DELETE /api/telemetry - drop everything.
pub async fn delete_all_telemetry(State(state): State<Arc<ApiState>>) -> Response {
    match state.store.delete_all().await {
        Ok(deleted) => {
            info!(deleted = deleted, "Deleted all telemetry");
            Json(serde_json::json!({ "deleted": deleted })).into_response()
        }
        Err(e) => internal_error(e),
    }
}

/// GET /api/health - liveness snapshot.
pub async fn health(State(state): State<Arc<ApiState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "ws_subscribers": state.hub.subscriber_count(),
    }))
}

/// GET /ws - upgrade and stream broadcast events to the client.
pub async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> Response {
    let rx = state.hub.subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, rx))
}

/// Forward hub frames to one WebSocket client until either side closes.
async fn stream_events(mut socket: WebSocket, mut rx: broadcast::Receiver<String>) {
    loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Ok(frame) => {
                    if socket.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "WebSocket subscriber lagged - frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }
}
