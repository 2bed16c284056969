//! Shared data structures for the telemetry relay pipeline
//!
//! - [`TelemetryReading`]: one sample as sent by a vehicle (wire format)
//! - [`TelemetryRecord`]: the persisted, enrichable representation
//! - [`EnrichmentRequest`]: the queued hand-off between the two stages
//! - [`AdvisoryVerdict`] / [`AlertLevel`]: the advisory engine's output
//! - [`AdviceEvent`]: the lightweight broadcast emitted after enrichment

mod advisory;
mod telemetry;

pub use advisory::{AdviceEvent, AdvisoryVerdict, AlertLevel};
pub use telemetry::{EnrichmentRequest, ParseError, TelemetryReading, TelemetryRecord};
