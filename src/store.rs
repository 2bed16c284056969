//! Record store
//!
//! The store is the only cross-invocation state the pipeline stages share.
//! `upsert` is atomic per key, so repeated ingests of the same id are safe
//! under concurrent or retried delivery. `get` follows document-store
//! semantics: a lookup must present the partition key value the document
//! lives under, and a wrong value behaves as not-found. Which record field is
//! the partition key (`id` or `vehicle_id`) is store configuration; callers
//! ask via [`DocumentStore::partition_key_field`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::TelemetryRecord;

/// Which record field the store partitions on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKeyField {
    #[default]
    Id,
    VehicleId,
}

impl PartitionKeyField {
    /// The partition key value a given record lives under.
    pub fn value_of<'a>(&self, record: &'a TelemetryRecord) -> &'a str {
        match self {
            PartitionKeyField::Id => &record.id,
            PartitionKeyField::VehicleId => &record.vehicle_id,
        }
    }
}

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Partitioned document store for telemetry records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace the record stored under its id.
    async fn upsert(&self, record: &TelemetryRecord) -> Result<(), StoreError>;

    /// Fetch a record by id. `partition_key` must be the record's value for
    /// the store's partition key field; a mismatch reads as `None`.
    async fn get(
        &self,
        id: &str,
        partition_key: &str,
    ) -> Result<Option<TelemetryRecord>, StoreError>;

    /// Latest records for one vehicle, newest first.
    async fn query_by_vehicle(
        &self,
        vehicle_id: &str,
        limit: usize,
    ) -> Result<Vec<TelemetryRecord>, StoreError>;

    /// Distinct vehicle ids present in the store.
    async fn distinct_vehicles(&self) -> Result<Vec<String>, StoreError>;

    /// Delete every record for one vehicle. Returns the number deleted.
    async fn delete_by_vehicle(&self, vehicle_id: &str) -> Result<usize, StoreError>;

    /// Delete every record. Returns the number deleted.
    async fn delete_all(&self) -> Result<usize, StoreError>;

    /// Which field this store partitions on.
    fn partition_key_field(&self) -> PartitionKeyField;
}

// ============================================================================
// Sled-backed store
// ============================================================================

/// Embedded store keyed by record id, values JSON-serialized records.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    partition_key: PartitionKeyField,
}

impl SledStore {
    /// Open or create the store at the given path.
    pub fn open<P: AsRef<Path>>(
        path: P,
        partition_key: PartitionKeyField,
    ) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        debug!(records = db.len(), partition_key = ?partition_key, "Record store opened");
        Ok(Self { db, partition_key })
    }

    fn iter_records(&self) -> impl Iterator<Item = TelemetryRecord> + '_ {
        self.db.iter().filter_map(|item| {
            let (_key, value) = item.ok()?;
            serde_json::from_slice(&value).ok()
        })
    }
}

#[async_trait]
impl DocumentStore for SledStore {
    async fn upsert(&self, record: &TelemetryRecord) -> Result<(), StoreError> {
        let value = serde_json::to_vec(record)?;
        self.db.insert(record.id.as_bytes(), value)?;
        Ok(())
    }

    async fn get(
        &self,
        id: &str,
        partition_key: &str,
    ) -> Result<Option<TelemetryRecord>, StoreError> {
        let Some(value) = self.db.get(id.as_bytes())? else {
            return Ok(None);
        };
        let record: TelemetryRecord = serde_json::from_slice(&value)?;
        if self.partition_key.value_of(&record) != partition_key {
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn query_by_vehicle(
        &self,
        vehicle_id: &str,
        limit: usize,
    ) -> Result<Vec<TelemetryRecord>, StoreError> {
        let mut records: Vec<TelemetryRecord> = self
            .iter_records()
            .filter(|r| r.vehicle_id == vehicle_id)
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit);
        Ok(records)
    }

    async fn distinct_vehicles(&self) -> Result<Vec<String>, StoreError> {
        let mut vehicles: Vec<String> = self.iter_records().map(|r| r.vehicle_id).collect();
        vehicles.sort();
        vehicles.dedup();
        Ok(vehicles)
    }

    async fn delete_by_vehicle(&self, vehicle_id: &str) -> Result<usize, StoreError> {
        let ids: Vec<String> = self
            .iter_records()
            .filter(|r| r.vehicle_id == vehicle_id)
            .map(|r| r.id)
            .collect();
        for id in &ids {
            self.db.remove(id.as_bytes())?;
        }
        Ok(ids.len())
    }

    async fn delete_all(&self) -> Result<usize, StoreError> {
        let count = self.db.len();
        self.db.clear()?;
        Ok(count)
    }

    fn partition_key_field(&self) -> PartitionKeyField {
        self.partition_key
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-memory store with the same partition semantics as [`SledStore`].
///
/// Used by tests and ephemeral deployments; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, TelemetryRecord>>,
    partition_key: PartitionKeyField,
}

impl MemoryStore {
    pub fn new(partition_key: PartitionKeyField) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            partition_key,
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert(&self, record: &TelemetryRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(
        &self,
        id: &str,
        partition_key: &str,
    ) -> Result<Option<TelemetryRecord>, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .get(id)
            .filter(|r| self.partition_key.value_of(r) == partition_key)
            .cloned())
    }

    async fn query_by_vehicle(
        &self,
        vehicle_id: &str,
        limit: usize,
    ) -> Result<Vec<TelemetryRecord>, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut matching: Vec<TelemetryRecord> = records
            .values()
            .filter(|r| r.vehicle_id == vehicle_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn distinct_vehicles(&self) -> Result<Vec<String>, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut vehicles: Vec<String> = records.values().map(|r| r.vehicle_id.clone()).collect();
        vehicles.sort();
        vehicles.dedup();
        Ok(vehicles)
    }

    async fn delete_by_vehicle(&self, vehicle_id: &str) -> Result<usize, StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|_, r| r.vehicle_id != vehicle_id);
        Ok(before - records.len())
    }

    async fn delete_all(&self) -> Result<usize, StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let count = records.len();
        records.clear();
        Ok(count)
    }

    fn partition_key_field(&self) -> PartitionKeyField {
        self.partition_key
    }
}
