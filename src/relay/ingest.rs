//! Telemetry ingest stage (fast path)
//!
//! One invocation per inbound raw message: parse, derive the content
//! identity, persist, broadcast, enqueue for enrichment. A malformed payload
//! aborts the invocation before any side effect. The three side effects are
//! independent and best-effort: failure in one is logged and must not stop
//! the others - a lost enrichment request just leaves the record permanently
//! un-advised, which downstream consumers tolerate.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::hub::{Broadcast, BroadcastEvent};
use crate::identity;
use crate::queue::AdviceQueue;
use crate::store::DocumentStore;
use crate::types::{EnrichmentRequest, ParseError, TelemetryRecord, TelemetryReading};

pub struct IngestStage {
    store: Arc<dyn DocumentStore>,
    hub: Arc<dyn Broadcast>,
    queue: Arc<dyn AdviceQueue>,
}

impl IngestStage {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        hub: Arc<dyn Broadcast>,
        queue: Arc<dyn AdviceQueue>,
    ) -> Self {
        Self { store, hub, queue }
    }

    /// Process one raw telemetry message.
    ///
    /// Returns the persisted record, or the parse error if the payload was
    /// malformed (in which case nothing was written, broadcast, or queued).
    pub async fn ingest(&self, raw: &[u8]) -> Result<TelemetryRecord, ParseError> {
        let reading = TelemetryReading::parse(raw)?;

        // The idempotency key for the entire pipeline: redelivery of the
        // identical payload converges on the same record.
        let id = identity::stable_hash(raw);
        let now = Utc::now();
        let record = TelemetryRecord::new(id, &reading, now);

        info!(
            id = %record.id,
            vehicle_id = %record.vehicle_id,
            speed = record.speed,
            rpm = record.rpm,
            fuel_level = record.fuel_level,
            "Telemetry received"
        );

        if let Err(e) = self.store.upsert(&record).await {
            error!(id = %record.id, error = %e, "Failed to persist telemetry record");
        }

        if let Err(e) = self
            .hub
            .publish(BroadcastEvent::NewTelemetry(record.clone()))
        {
            error!(id = %record.id, error = %e, "Failed to broadcast telemetry");
        }

        let request = EnrichmentRequest::for_record(&record);
        if let Err(e) = self.queue.enqueue(&request) {
            error!(id = %record.id, error = %e, "Failed to enqueue enrichment request");
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{BroadcastError, TelemetryHub};
    use crate::queue::QueueError;
    use crate::store::{MemoryStore, PartitionKeyField, StoreError};
    use crate::types::AlertLevel;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingQueue {
        requests: Mutex<Vec<EnrichmentRequest>>,
        fail: bool,
    }

    impl AdviceQueue for RecordingQueue {
        fn enqueue(&self, request: &EnrichmentRequest) -> Result<(), QueueError> {
            if self.fail {
                return Err(QueueError::Io("queue offline".to_string()));
            }
            self.requests
                .lock()
                .unwrap()
                .push(request.clone());
            Ok(())
        }
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl DocumentStore for FailingStore {
        async fn upsert(&self, _record: &TelemetryRecord) -> Result<(), StoreError> {
            Err(StoreError::Database("store offline".to_string()))
        }
        async fn get(&self, _: &str, _: &str) -> Result<Option<TelemetryRecord>, StoreError> {
            Err(StoreError::Database("store offline".to_string()))
        }
        async fn query_by_vehicle(
            &self,
            _: &str,
            _: usize,
        ) -> Result<Vec<TelemetryRecord>, StoreError> {
            Ok(Vec::new())
        }
        async fn distinct_vehicles(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
        async fn delete_by_vehicle(&self, _: &str) -> Result<usize, StoreError> {
            Ok(0)
        }
        async fn delete_all(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
        fn partition_key_field(&self) -> PartitionKeyField {
            PartitionKeyField::Id
        }
    }

    struct FailingHub;

    impl Broadcast for FailingHub {
        fn publish(&self, _event: BroadcastEvent) -> Result<(), BroadcastError> {
            Err(BroadcastError::Serialization(serde::de::Error::custom(
                "hub offline",
            )))
        }
    }

    const RAW: &[u8] = br#"{"vehicle_id":"Bus-01","speed":150.0,"rpm":2000,"fuel_level":50.0}"#;

    #[tokio::test]
    async fn test_ingest_writes_all_three_effects() {
        let store = Arc::new(MemoryStore::new(PartitionKeyField::Id));
        let hub = TelemetryHub::default();
        let mut rx = hub.subscribe();
        let queue = Arc::new(RecordingQueue::default());

        let stage = IngestStage::new(store.clone(), Arc::new(hub), queue.clone());
        let record = stage.ingest(RAW).await.unwrap();

        assert_eq!(record.vehicle_id, "Bus-01");
        assert_eq!(record.alert_level, AlertLevel::Info);
        assert!(record.advice.is_empty());

        // Persisted
        assert!(store.get(&record.id, &record.id).await.unwrap().is_some());
        // Broadcast
        let frame = rx.try_recv().unwrap();
        assert!(frame.contains("newTelemetry"));
        // Queued, carrying the numeric fields
        let requests = queue.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].record_id, record.id);
        assert_eq!(requests[0].speed, 150.0);
    }

    #[tokio::test]
    async fn test_malformed_input_has_no_side_effects() {
        let store = Arc::new(MemoryStore::new(PartitionKeyField::Id));
        let hub = TelemetryHub::default();
        let mut rx = hub.subscribe();
        let queue = Arc::new(RecordingQueue::default());

        let stage = IngestStage::new(store.clone(), Arc::new(hub), queue.clone());
        assert!(stage.ingest(b"not-json").await.is_err());

        assert!(store.distinct_vehicles().await.unwrap().is_empty());
        assert!(rx.try_recv().is_err());
        assert!(queue.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_does_not_stop_broadcast_or_enqueue() {
        let hub = TelemetryHub::default();
        let mut rx = hub.subscribe();
        let queue = Arc::new(RecordingQueue::default());

        let stage = IngestStage::new(Arc::new(FailingStore), Arc::new(hub), queue.clone());
        let record = stage.ingest(RAW).await.unwrap();

        assert!(rx.try_recv().is_ok());
        assert_eq!(queue.requests.lock().unwrap().len(), 1);
        assert_eq!(record.vehicle_id, "Bus-01");
    }

    #[tokio::test]
    async fn test_broadcast_and_queue_failures_do_not_stop_persist() {
        let store = Arc::new(MemoryStore::new(PartitionKeyField::Id));
        let queue = Arc::new(RecordingQueue {
            fail: true,
            ..RecordingQueue::default()
        });

        let stage = IngestStage::new(store.clone(), Arc::new(FailingHub), queue);
        let record = stage.ingest(RAW).await.unwrap();

        assert!(store.get(&record.id, &record.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_redelivery_converges_on_one_record() {
        let store = Arc::new(MemoryStore::new(PartitionKeyField::Id));
        let hub = TelemetryHub::default();
        let queue = Arc::new(RecordingQueue::default());

        let stage = IngestStage::new(store.clone(), Arc::new(hub), queue);
        let first = stage.ingest(RAW).await.unwrap();
        let second = stage.ingest(RAW).await.unwrap();

        assert_eq!(first.id, second.id);
        let history = store.query_by_vehicle("Bus-01", 10).await.unwrap();
        assert_eq!(history.len(), 1);
    }
}
