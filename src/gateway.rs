//! Device-messaging gateway - one-way downlink to vehicles
//!
//! The gateway delivers short text messages to a single addressed device and
//! never waits for device receipt. [`HttpGateway`] talks to a real messaging
//! service; [`NullGateway`] stands in when no gateway is configured, so the
//! rest of the pipeline runs unchanged with feedback disabled.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(reqwest::Error),

    #[error("gateway returned status {0}")]
    ServerError(reqwest::StatusCode),

    #[error("downlink timed out after {0}s")]
    Timeout(u64),
}

/// One-way device messaging: no acknowledgment of device receipt.
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    async fn send_to_device(&self, device_id: &str, text: &str) -> Result<(), GatewayError>;
}

/// HTTP client for a device-messaging service.
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(GatewayError::Http)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }
}

#[async_trait]
impl DeviceGateway for HttpGateway {
    async fn send_to_device(&self, device_id: &str, text: &str) -> Result<(), GatewayError> {
        let body = serde_json::json!({ "text": text });
        let resp = self
            .http
            .post(format!(
                "{}/api/devices/{}/messages",
                self.base_url, device_id
            ))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.timeout_secs)
                } else {
                    GatewayError::Http(e)
                }
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(GatewayError::ServerError(resp.status()))
        }
    }
}

/// No-op gateway used when downlink feedback is not configured.
pub struct NullGateway;

#[async_trait]
impl DeviceGateway for NullGateway {
    async fn send_to_device(&self, device_id: &str, _text: &str) -> Result<(), GatewayError> {
        debug!(device_id = device_id, "Downlink disabled - dropping feedback");
        Ok(())
    }
}
