//! Advisory enrichment stage (slow path)
//!
//! Consumes enrichment requests from the advice queue: evaluates the
//! advisory engine, patches the stored record, broadcasts the verdict, and
//! dispatches feedback to the vehicle. The engine call always succeeds (it
//! falls back internally); the three downstream steps are independent and
//! best-effort, mirroring the ingest stage's failure isolation.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::advisor::AdvisoryEngine;
use crate::feedback::FeedbackDispatcher;
use crate::hub::{Broadcast, BroadcastEvent};
use crate::store::{DocumentStore, PartitionKeyField};
use crate::types::{AdviceEvent, AdvisoryVerdict, EnrichmentRequest};

pub struct EnrichmentStage {
    engine: AdvisoryEngine,
    store: Arc<dyn DocumentStore>,
    hub: Arc<dyn Broadcast>,
    dispatcher: FeedbackDispatcher,
}

impl EnrichmentStage {
    pub fn new(
        engine: AdvisoryEngine,
        store: Arc<dyn DocumentStore>,
        hub: Arc<dyn Broadcast>,
        dispatcher: FeedbackDispatcher,
    ) -> Self {
        Self {
            engine,
            store,
            hub,
            dispatcher,
        }
    }

    /// Process one enrichment request. Returns the verdict that was applied.
    pub async fn enrich(&self, request: &EnrichmentRequest) -> AdvisoryVerdict {
        let verdict = self
            .engine
            .evaluate(request.speed, request.rpm, request.fuel_level)
            .await;

        info!(
            record_id = %request.record_id,
            vehicle_id = %request.vehicle_id,
            level = %verdict.alert_level,
            advice = %verdict.advice,
            "Advisory verdict"
        );

        self.patch_record(request, &verdict).await;

        let event = AdviceEvent {
            record_id: request.record_id.clone(),
            vehicle_id: request.vehicle_id.clone(),
            advice: verdict.advice.clone(),
            alert_level: verdict.alert_level,
        };
        if let Err(e) = self.hub.publish(BroadcastEvent::NewAdvice(event)) {
            error!(record_id = %request.record_id, error = %e, "Failed to broadcast advisory");
        }

        self.dispatcher
            .dispatch(&request.vehicle_id, &verdict)
            .await;

        verdict
    }

    /// Read-modify-write the stored record's advice fields.
    ///
    /// Not atomic: if two enrichments of the same record ever race (outside
    /// the normal one-request-per-ingest flow), last-write-wins on the advice
    /// fields is the accepted outcome. A record that is not there yet - for
    /// example when racing store propagation - is logged and skipped, never a
    /// crash.
    async fn patch_record(&self, request: &EnrichmentRequest, verdict: &AdvisoryVerdict) {
        let partition_key = match self.store.partition_key_field() {
            PartitionKeyField::Id => request.record_id.as_str(),
            PartitionKeyField::VehicleId => request.vehicle_id.as_str(),
        };

        match self.store.get(&request.record_id, partition_key).await {
            Ok(Some(mut record)) => {
                record.advice = verdict.advice.clone();
                record.alert_level = verdict.alert_level;
                if let Err(e) = self.store.upsert(&record).await {
                    warn!(
                        record_id = %request.record_id,
                        error = %e,
                        "Could not patch record with advice"
                    );
                }
            }
            Ok(None) => {
                warn!(
                    record_id = %request.record_id,
                    "Record not found for enrichment - skipping patch"
                );
            }
            Err(e) => {
                warn!(
                    record_id = %request.record_id,
                    error = %e,
                    "Could not read record for enrichment"
                );
            }
        }
    }
}
