//! Enrichment consumer loop
//!
//! Drains the durable advice queue, one enrichment invocation per entry,
//! acking only after the invocation returns. A periodic sweep re-delivers
//! anything left over from a crash or missed wake-up - safe because the
//! pipeline is idempotent under the content-derived record id.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::queue::DurableQueue;
use crate::relay::EnrichmentStage;

/// Interval for the redelivery sweep (seconds).
const SWEEP_INTERVAL_SECS: u64 = 30;

/// Run the enrichment consumer until cancelled.
pub async fn run_enrichment_worker(
    queue: Arc<DurableQueue>,
    stage: Arc<EnrichmentStage>,
    cancel: CancellationToken,
) {
    info!("Enrichment worker started");

    let mut sweep = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = queue.notified() => {}
            _ = sweep.tick() => {}
        }

        let pending = match queue.drain() {
            Ok(pending) => pending,
            Err(e) => {
                error!(error = %e, "Could not drain advice queue");
                continue;
            }
        };

        for request in pending {
            if cancel.is_cancelled() {
                break;
            }
            stage.enrich(&request).await;
            if let Err(e) = queue.ack(&request.record_id) {
                warn!(
                    record_id = %request.record_id,
                    error = %e,
                    "Could not ack enrichment request - it will be redelivered"
                );
            }
        }
    }

    info!("Enrichment worker stopped");
}
