//! Dashboard & operator API
//!
//! Provides the HTTP surface around the relay pipeline:
//! - `POST /api/telemetry` - submit a raw reading (transport stand-in for the
//!   device event stream)
//! - `GET /api/vehicles` - distinct vehicle ids seen so far
//! - `GET /api/history/:vehicle_id` - latest records, newest first
//! - `DELETE /api/telemetry` / `DELETE /api/telemetry/:vehicle_id` -
//!   administrative cleanup (the pipeline itself never deletes)
//! - `GET /ws` - live `newTelemetry` / `newAdvice` event stream
//! - `GET /api/health` - liveness

mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::hub::TelemetryHub;
use crate::relay::IngestStage;
use crate::store::DocumentStore;

/// Shared state for API handlers.
pub struct ApiState {
    pub store: Arc<dyn DocumentStore>,
    pub hub: TelemetryHub,
    pub ingest: Arc<IngestStage>,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(store: Arc<dyn DocumentStore>, hub: TelemetryHub, ingest: Arc<IngestStage>) -> Self {
        Self {
            store,
            hub,
            ingest,
            started_at: Instant::now(),
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route(
            "/api/telemetry",
            post(handlers::ingest_telemetry).delete(handlers::delete_all_telemetry),
        )
        .route(
            "/api/telemetry/:vehicle_id",
            delete(handlers::delete_vehicle_telemetry),
        )
        .route("/api/vehicles", get(handlers::list_vehicles))
        .route("/api/history/:vehicle_id", get(handlers::vehicle_history))
        .route("/api/health", get(handlers::health))
        .route("/ws", get(handlers::ws_upgrade))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
