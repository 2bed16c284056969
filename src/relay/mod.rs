//! The two-stage relay pipeline
//!
//! ```text
//! raw reading ──► IngestStage ──► { store, broadcast, advice queue }
//!                                            │
//!                                            ▼
//!             EnrichmentStage ──► { store patch, broadcast, feedback }
//! ```
//!
//! Both stages are independent message consumers: one invocation per inbound
//! event, no shared mutable state between invocations besides the store.
//! Side effects within an invocation are independent and best-effort - a
//! failing collaborator is logged and the remaining steps still run.

mod enrich;
mod ingest;
mod worker;

pub use enrich::EnrichmentStage;
pub use ingest::IngestStage;
pub use worker::run_enrichment_worker;
