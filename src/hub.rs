//! Telemetry hub - fire-and-forget broadcast of pipeline events
//!
//! Events fan out over a tokio broadcast channel and are forwarded to
//! WebSocket subscribers by the API layer. Publishing never blocks and never
//! fails the pipeline; with no subscriber connected the event is simply
//! dropped, and a slow subscriber that lags past the channel capacity loses
//! the oldest frames.
//!
//! Wire frames keep the `{"target": ..., "arguments": [...]}` shape the
//! dashboard already speaks.

use thiserror::Error;
use tokio::sync::broadcast;

use crate::types::{AdviceEvent, TelemetryRecord};

/// Default per-subscriber backlog before old frames are dropped.
const DEFAULT_CAPACITY: usize = 256;

/// An event published to dashboard subscribers.
#[derive(Debug, Clone)]
pub enum BroadcastEvent {
    /// A raw reading was ingested (full record payload)
    NewTelemetry(TelemetryRecord),
    /// A record was enriched with an advisory verdict
    NewAdvice(AdviceEvent),
}

impl BroadcastEvent {
    /// The dashboard message target for this event.
    pub fn target(&self) -> &'static str {
        match self {
            BroadcastEvent::NewTelemetry(_) => "newTelemetry",
            BroadcastEvent::NewAdvice(_) => "newAdvice",
        }
    }

    /// Serialize to the dashboard wire frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        let payload = match self {
            BroadcastEvent::NewTelemetry(record) => serde_json::to_value(record)?,
            BroadcastEvent::NewAdvice(event) => serde_json::to_value(event)?,
        };
        serde_json::to_string(&serde_json::json!({
            "target": self.target(),
            "arguments": [payload],
        }))
    }
}

/// Errors from publishing an event.
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Broadcast channel collaborator: publish with no acknowledgment.
pub trait Broadcast: Send + Sync {
    fn publish(&self, event: BroadcastEvent) -> Result<(), BroadcastError>;
}

/// In-process broadcast hub backed by `tokio::sync::broadcast`.
#[derive(Clone)]
pub struct TelemetryHub {
    tx: broadcast::Sender<String>,
}

impl TelemetryHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to serialized event frames.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Number of currently connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Broadcast for TelemetryHub {
    fn publish(&self, event: BroadcastEvent) -> Result<(), BroadcastError> {
        let frame = event.to_frame()?;
        // send() errs only when nobody is subscribed - that is normal here
        let _ = self.tx.send(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlertLevel;

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let hub = TelemetryHub::default();
        let event = BroadcastEvent::NewAdvice(AdviceEvent {
            record_id: "r".to_string(),
            vehicle_id: "Bus-01".to_string(),
            advice: "Slow down".to_string(),
            alert_level: AlertLevel::Critical,
        });
        assert!(hub.publish(event).is_ok());
    }

    #[tokio::test]
    async fn test_frame_shape() {
        let hub = TelemetryHub::default();
        let mut rx = hub.subscribe();

        hub.publish(BroadcastEvent::NewAdvice(AdviceEvent {
            record_id: "rec-1".to_string(),
            vehicle_id: "Bus-01".to_string(),
            advice: "Shift up".to_string(),
            alert_level: AlertLevel::Warn,
        }))
        .unwrap();

        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["target"], "newAdvice");
        assert_eq!(value["arguments"][0]["vehicle_id"], "Bus-01");
        assert_eq!(value["arguments"][0]["alert_level"], "WARN");
    }

    #[tokio::test]
    async fn test_all_subscribers_receive() {
        let hub = TelemetryHub::default();
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        hub.publish(BroadcastEvent::NewAdvice(AdviceEvent {
            record_id: "rec-1".to_string(),
            vehicle_id: "Bus-01".to_string(),
            advice: "ok".to_string(),
            alert_level: AlertLevel::Info,
        }))
        .unwrap();

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }
}
