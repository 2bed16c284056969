//! Advice queue - durable hand-off between the ingest and enrichment stages
//!
//! Enrichment requests are stored on disk as JSON files named by record id,
//! so a repeated delivery of the same raw message collapses into one pending
//! entry. Entries are removed only after the enrichment invocation returns
//! (`ack`), which gives at-least-once delivery across restarts - safe because
//! the whole pipeline is idempotent under the content-derived record id. A
//! notifier wakes the paired consumer on every enqueue.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::types::EnrichmentRequest;

/// Default maximum queue size (number of pending entries)
const DEFAULT_MAX_QUEUE_SIZE: usize = 10_000;

/// Queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Producer side of the advice queue.
pub trait AdviceQueue: Send + Sync {
    /// Enqueue a request for the enrichment consumer, at-least-once.
    fn enqueue(&self, request: &EnrichmentRequest) -> Result<(), QueueError>;
}

/// Disk-backed advice queue.
pub struct DurableQueue {
    queue_dir: PathBuf,
    max_size: usize,
    notify: Notify,
}

impl DurableQueue {
    /// Create or open a queue at the given directory.
    ///
    /// Entries left over from a previous run are picked up again by the next
    /// drain - redelivery, not loss, is the failure mode here.
    pub fn open<P: AsRef<Path>>(queue_dir: P) -> Result<Self, QueueError> {
        let queue_dir = queue_dir.as_ref().to_path_buf();
        fs::create_dir_all(&queue_dir).map_err(|e| QueueError::Io(e.to_string()))?;

        let queue = Self {
            queue_dir,
            max_size: DEFAULT_MAX_QUEUE_SIZE,
            notify: Notify::new(),
        };

        let pending = queue.pending_count()?;
        if pending > 0 {
            info!(pending = pending, "Advice queue opened with pending entries");
        } else {
            debug!("Advice queue opened (empty)");
        }

        Ok(queue)
    }

    /// Wait until at least one enqueue has happened since the last drain.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    /// Drain all pending requests, oldest first.
    ///
    /// Entries are NOT removed from disk - call [`DurableQueue::ack`] after a
    /// request has been processed. Corrupted entries are removed on sight.
    pub fn drain(&self) -> Result<Vec<EnrichmentRequest>, QueueError> {
        let mut entries: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();

        let dir = fs::read_dir(&self.queue_dir).map_err(|e| QueueError::Io(e.to_string()))?;
        for entry in dir {
            let entry = entry.map_err(|e| QueueError::Io(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            entries.push((path, modified));
        }
        entries.sort_by_key(|(_, modified)| *modified);

        let mut requests = Vec::with_capacity(entries.len());
        for (path, _) in entries {
            match fs::read(&path) {
                Ok(data) => match serde_json::from_slice::<EnrichmentRequest>(&data) {
                    Ok(request) => requests.push(request),
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "Corrupted queue entry - removing");
                        let _ = fs::remove_file(&path);
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not read queue entry");
                }
            }
        }

        Ok(requests)
    }

    /// Mark a request as processed (removes its entry).
    pub fn ack(&self, record_id: &str) -> Result<(), QueueError> {
        let path = self.entry_path(record_id);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| QueueError::Io(e.to_string()))?;
            debug!(record_id = record_id, "Enrichment request acked");
        }
        Ok(())
    }

    /// Number of pending entries.
    pub fn pending_count(&self) -> Result<usize, QueueError> {
        let dir = fs::read_dir(&self.queue_dir).map_err(|e| QueueError::Io(e.to_string()))?;
        Ok(dir
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|ext| ext.to_str()) == Some("json"))
            .count())
    }

    /// Drop the oldest entry to make room.
    fn drop_oldest(&self) -> Result<(), QueueError> {
        let dir = fs::read_dir(&self.queue_dir).map_err(|e| QueueError::Io(e.to_string()))?;

        let mut oldest: Option<(PathBuf, std::time::SystemTime)> = None;
        for entry in dir.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                match &oldest {
                    Some((_, oldest_time)) if modified >= *oldest_time => {}
                    _ => oldest = Some((path, modified)),
                }
            }
        }

        if let Some((path, _)) = oldest {
            fs::remove_file(&path).map_err(|e| QueueError::Io(e.to_string()))?;
            debug!(path = %path.display(), "Dropped oldest queue entry");
        }
        Ok(())
    }

    /// File path for a request, named by its record id.
    fn entry_path(&self, record_id: &str) -> PathBuf {
        // Record ids are hex digests, but sanitize anyway
        let safe_id: String = record_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.queue_dir.join(format!("{}.json", safe_id))
    }
}

impl AdviceQueue for DurableQueue {
    fn enqueue(&self, request: &EnrichmentRequest) -> Result<(), QueueError> {
        let current = self.pending_count()?;
        if current >= self.max_size {
            warn!(
                max = self.max_size,
                current = current,
                "Advice queue full - dropping oldest entry"
            );
            self.drop_oldest()?;
        }

        let path = self.entry_path(&request.record_id);

        // Idempotent: a redelivered message is already pending
        if path.exists() {
            debug!(record_id = %request.record_id, "Request already queued, skipping");
            self.notify.notify_one();
            return Ok(());
        }

        let json =
            serde_json::to_vec(request).map_err(|e| QueueError::Serialization(e.to_string()))?;
        fs::write(&path, &json).map_err(|e| QueueError::Io(e.to_string()))?;

        debug!(record_id = %request.record_id, "Enrichment request queued");
        self.notify.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(record_id: &str) -> EnrichmentRequest {
        EnrichmentRequest {
            record_id: record_id.to_string(),
            vehicle_id: "Bus-01".to_string(),
            speed: 80.0,
            rpm: 2000,
            fuel_level: 60.0,
        }
    }

    #[test]
    fn test_enqueue_and_drain() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = DurableQueue::open(tmp.path().join("queue")).unwrap();

        queue.enqueue(&make_request("rec-1")).unwrap();
        queue.enqueue(&make_request("rec-2")).unwrap();

        assert_eq!(queue.pending_count().unwrap(), 2);
        let requests = queue.drain().unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[test]
    fn test_idempotent_enqueue() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = DurableQueue::open(tmp.path().join("queue")).unwrap();

        queue.enqueue(&make_request("rec-1")).unwrap();
        queue.enqueue(&make_request("rec-1")).unwrap(); // redelivery

        assert_eq!(queue.pending_count().unwrap(), 1);
    }

    #[test]
    fn test_ack_removes_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = DurableQueue::open(tmp.path().join("queue")).unwrap();

        queue.enqueue(&make_request("rec-1")).unwrap();
        queue.ack("rec-1").unwrap();
        assert_eq!(queue.pending_count().unwrap(), 0);

        // Acking twice is harmless
        queue.ack("rec-1").unwrap();
    }

    #[test]
    fn test_survives_restart() {
        let tmp = tempfile::tempdir().unwrap();
        let queue_dir = tmp.path().join("queue");

        {
            let queue = DurableQueue::open(&queue_dir).unwrap();
            queue.enqueue(&make_request("rec-1")).unwrap();
        }

        // "Restart" - the pending entry is redelivered
        {
            let queue = DurableQueue::open(&queue_dir).unwrap();
            let requests = queue.drain().unwrap();
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].record_id, "rec-1");
        }
    }

    #[test]
    fn test_corrupted_entry_is_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let queue_dir = tmp.path().join("queue");
        let queue = DurableQueue::open(&queue_dir).unwrap();

        std::fs::write(queue_dir.join("bad.json"), b"not-json").unwrap();
        queue.enqueue(&make_request("rec-1")).unwrap();

        let requests = queue.drain().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(queue.pending_count().unwrap(), 1); // bad entry gone
    }

    #[tokio::test]
    async fn test_enqueue_wakes_consumer() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = std::sync::Arc::new(DurableQueue::open(tmp.path().join("queue")).unwrap());

        let waiter = queue.clone();
        let handle = tokio::spawn(async move { waiter.notified().await });

        // Give the waiter a chance to park first
        tokio::task::yield_now().await;
        queue.enqueue(&make_request("rec-1")).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("consumer was not woken")
            .unwrap();
    }
}
