//! EcoFleet: Vehicle Telemetry Relay
//!
//! Two-stage pipeline for fleet telemetry:
//!
//! - **Ingest stage** (fast path): persists raw readings, broadcasts them to
//!   dashboard subscribers, and queues an enrichment request.
//! - **Enrichment stage** (slow path): attaches a driving-advice verdict to
//!   the stored record, broadcasts the advisory, and pushes feedback to the
//!   originating vehicle over the one-way downlink.
//!
//! Record identity is content-derived (SHA-256 of the raw message bytes), so
//! every step is idempotent under at-least-once delivery.

pub mod advisor;
pub mod api;
pub mod config;
pub mod feedback;
pub mod gateway;
pub mod hub;
pub mod identity;
pub mod queue;
pub mod relay;
pub mod store;
pub mod types;

// Re-export the pipeline building blocks
pub use advisor::AdvisoryEngine;
pub use config::EcoFleetConfig;
pub use feedback::{FeedbackDispatcher, FeedbackPolicy};
pub use gateway::{DeviceGateway, HttpGateway, NullGateway};
pub use hub::{Broadcast, BroadcastEvent, TelemetryHub};
pub use queue::{AdviceQueue, DurableQueue};
pub use relay::{run_enrichment_worker, EnrichmentStage, IngestStage};
pub use store::{DocumentStore, MemoryStore, PartitionKeyField, SledStore};

// Re-export commonly used types
pub use types::{
    AdviceEvent, AdvisoryVerdict, AlertLevel, EnrichmentRequest, TelemetryReading,
    TelemetryRecord,
};
