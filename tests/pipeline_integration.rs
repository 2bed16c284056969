//! End-to-end pipeline scenarios
//!
//! Exercises ingest → advice queue → enrichment against real collaborators:
//! a sled-backed store, the disk-backed advice queue, and the broadcast hub,
//! with a recording gateway standing in for the device-messaging service.

use std::sync::{Arc, Mutex};

use ecofleet::advisor::AdvisoryEngine;
use ecofleet::feedback::{FeedbackDispatcher, FeedbackPolicy};
use ecofleet::gateway::{DeviceGateway, GatewayError};
use ecofleet::hub::TelemetryHub;
use ecofleet::queue::DurableQueue;
use ecofleet::relay::{EnrichmentStage, IngestStage};
use ecofleet::store::{DocumentStore, PartitionKeyField, SledStore};
use ecofleet::types::{AlertLevel, EnrichmentRequest, TelemetryRecord};

#[derive(Default)]
struct RecordingGateway {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait::async_trait]
impl DeviceGateway for RecordingGateway {
    async fn send_to_device(&self, device_id: &str, text: &str) -> Result<(), GatewayError> {
        self.sent
            .lock()
            .unwrap()
            .push((device_id.to_string(), text.to_string()));
        Ok(())
    }
}

struct Pipeline {
    store: Arc<SledStore>,
    queue: Arc<DurableQueue>,
    hub: TelemetryHub,
    gateway: Arc<RecordingGateway>,
    ingest: IngestStage,
    enrich: EnrichmentStage,
    _tmp: tempfile::TempDir,
}

fn pipeline(partition_key: PartitionKeyField, policy: FeedbackPolicy) -> Pipeline {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(SledStore::open(tmp.path().join("db"), partition_key).unwrap());
    let queue = Arc::new(DurableQueue::open(tmp.path().join("queue")).unwrap());
    let hub = TelemetryHub::default();
    let gateway = Arc::new(RecordingGateway::default());

    let ingest = IngestStage::new(store.clone(), Arc::new(hub.clone()), queue.clone());
    let enrich = EnrichmentStage::new(
        AdvisoryEngine::rule_based(),
        store.clone(),
        Arc::new(hub.clone()),
        FeedbackDispatcher::new(gateway.clone(), policy),
    );

    Pipeline {
        store,
        queue,
        hub,
        gateway,
        ingest,
        enrich,
        _tmp: tmp,
    }
}

/// Run one message through both stages, acking like the worker does.
async fn relay_once(p: &Pipeline, raw: &[u8]) -> TelemetryRecord {
    let record = p.ingest.ingest(raw).await.unwrap();
    let pending = p.queue.drain().unwrap();
    for request in &pending {
        p.enrich.enrich(request).await;
        p.queue.ack(&request.record_id).unwrap();
    }
    let partition_key = match p.store.partition_key_field() {
        PartitionKeyField::Id => record.id.clone(),
        PartitionKeyField::VehicleId => record.vehicle_id.clone(),
    };
    p.store
        .get(&record.id, &partition_key)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_speeding_bus_scenario() {
    let p = pipeline(PartitionKeyField::Id, FeedbackPolicy::WarnAndCritical);
    let raw = br#"{"vehicle_id":"BUS-01","speed":150,"rpm":2000,"fuel_level":50}"#;

    // Fast path: record lands un-advised
    let record = p.ingest.ingest(raw).await.unwrap();
    assert_eq!(record.alert_level, AlertLevel::Info);
    assert!(record.advice.is_empty());

    // Slow path: enrichment attaches the dominant-rule verdict
    let pending = p.queue.drain().unwrap();
    assert_eq!(pending.len(), 1);
    let verdict = p.enrich.enrich(&pending[0]).await;
    p.queue.ack(&pending[0].record_id).unwrap();
    assert_eq!(verdict.alert_level, AlertLevel::Critical);

    let stored = p.store.get(&record.id, &record.id).await.unwrap().unwrap();
    assert_eq!(stored.alert_level, AlertLevel::Critical);
    assert!(!stored.advice.is_empty());

    // Feedback went to the originating vehicle
    let sent = p.gateway.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "BUS-01");
}

#[tokio::test]
async fn test_idle_bus_scenario() {
    let p = pipeline(PartitionKeyField::Id, FeedbackPolicy::WarnAndCritical);
    let raw = br#"{"vehicle_id":"BUS-02","speed":5,"rpm":1500,"fuel_level":80}"#;

    let stored = relay_once(&p, raw).await;
    assert_eq!(stored.alert_level, AlertLevel::Warn);
    assert!(!stored.advice.is_empty());
}

#[tokio::test]
async fn test_malformed_input_leaves_no_trace() {
    let p = pipeline(PartitionKeyField::Id, FeedbackPolicy::WarnAndCritical);
    let mut rx = p.hub.subscribe();

    assert!(p.ingest.ingest(b"not-json").await.is_err());

    assert!(p.store.distinct_vehicles().await.unwrap().is_empty());
    assert_eq!(p.queue.pending_count().unwrap(), 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_redelivery_is_idempotent() {
    let p = pipeline(PartitionKeyField::Id, FeedbackPolicy::WarnAndCritical);
    let raw = br#"{"vehicle_id":"BUS-03","speed":90,"rpm":2200,"fuel_level":40}"#;

    let first = p.ingest.ingest(raw).await.unwrap();
    let second = p.ingest.ingest(raw).await.unwrap();
    let third = p.ingest.ingest(raw).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.id, third.id);

    // Exactly one stored record and one pending enrichment
    let history = p.store.query_by_vehicle("BUS-03", 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(p.queue.pending_count().unwrap(), 1);
}

#[tokio::test]
async fn test_double_enrichment_last_write_wins() {
    let p = pipeline(PartitionKeyField::Id, FeedbackPolicy::WarnAndCritical);
    let raw = br#"{"vehicle_id":"BUS-04","speed":150,"rpm":2000,"fuel_level":50}"#;
    let record = p.ingest.ingest(raw).await.unwrap();

    // First enrichment sees the speeding values
    let speeding = EnrichmentRequest::for_record(&record);
    p.enrich.enrich(&speeding).await;

    // A second enrichment of the same record with different values (a
    // redelivered, stale request) wins on the advice fields
    let calm = EnrichmentRequest {
        speed: 60.0,
        rpm: 2000,
        ..speeding.clone()
    };
    p.enrich.enrich(&calm).await;

    let stored = p.store.get(&record.id, &record.id).await.unwrap().unwrap();
    assert_eq!(stored.alert_level, AlertLevel::Info);
    // Non-advice fields keep their ingested values
    assert_eq!(stored.speed, 150.0);
}

#[tokio::test]
async fn test_broadcast_sequence() {
    let p = pipeline(PartitionKeyField::Id, FeedbackPolicy::WarnAndCritical);
    let mut rx = p.hub.subscribe();
    let raw = br#"{"vehicle_id":"BUS-05","speed":150,"rpm":2000,"fuel_level":50}"#;

    relay_once(&p, raw).await;

    let first = rx.try_recv().unwrap();
    assert!(first.contains("newTelemetry"));
    let second = rx.try_recv().unwrap();
    assert!(second.contains("newAdvice"));
    assert!(second.contains("CRITICAL"));
}

#[tokio::test]
async fn test_partition_key_independence() {
    let raw = br#"{"vehicle_id":"BUS-06","speed":150,"rpm":2000,"fuel_level":50}"#;

    let by_id = pipeline(PartitionKeyField::Id, FeedbackPolicy::WarnAndCritical);
    let by_vehicle = pipeline(PartitionKeyField::VehicleId, FeedbackPolicy::WarnAndCritical);

    let record_a = relay_once(&by_id, raw).await;
    let record_b = relay_once(&by_vehicle, raw).await;

    // Identical outcome regardless of the store's partition key field
    assert_eq!(record_a.id, record_b.id);
    assert_eq!(record_a.alert_level, record_b.alert_level);
    assert_eq!(record_a.advice, record_b.advice);
    assert_eq!(
        by_id.gateway.sent.lock().unwrap().len(),
        by_vehicle.gateway.sent.lock().unwrap().len()
    );
}

#[tokio::test]
async fn test_always_policy_dispatches_info_feedback() {
    let p = pipeline(PartitionKeyField::Id, FeedbackPolicy::Always);
    let raw = br#"{"vehicle_id":"BUS-07","speed":80,"rpm":2000,"fuel_level":60}"#;

    let stored = relay_once(&p, raw).await;
    assert_eq!(stored.alert_level, AlertLevel::Info);
    assert_eq!(p.gateway.sent.lock().unwrap().len(), 1);
}
