//! Feedback dispatch - pushing verdicts back to vehicles
//!
//! Whether every verdict goes back to the driver or only WARN/CRITICAL ones
//! is an operating-mode choice (always-on aids debugging, gated reduces
//! downlink chatter), so it is configuration rather than code. Delivery is
//! lossy by design: a failed send is logged and dropped, and the next
//! enrichment cycle re-advises.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::gateway::DeviceGateway;
use crate::types::{AdvisoryVerdict, AlertLevel};

/// When to push a verdict to the originating vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedbackPolicy {
    /// Dispatch every verdict, including INFO
    Always,
    /// Dispatch only verdicts worth acting on
    #[default]
    WarnAndCritical,
}

impl FeedbackPolicy {
    /// Whether a verdict at this level should be dispatched.
    pub fn allows(&self, level: AlertLevel) -> bool {
        match self {
            FeedbackPolicy::Always => true,
            FeedbackPolicy::WarnAndCritical => level >= AlertLevel::Warn,
        }
    }
}

/// Delivers advisory verdicts to vehicles over the one-way downlink.
pub struct FeedbackDispatcher {
    gateway: Arc<dyn DeviceGateway>,
    policy: FeedbackPolicy,
}

impl FeedbackDispatcher {
    pub fn new(gateway: Arc<dyn DeviceGateway>, policy: FeedbackPolicy) -> Self {
        Self { gateway, policy }
    }

    pub fn policy(&self) -> FeedbackPolicy {
        self.policy
    }

    /// Dispatch a verdict if the policy allows it.
    ///
    /// Returns whether a send was attempted and succeeded. No retry: the
    /// downlink is fire-and-forget and losing one message is acceptable.
    pub async fn dispatch(&self, vehicle_id: &str, verdict: &AdvisoryVerdict) -> bool {
        if !self.policy.allows(verdict.alert_level) {
            debug!(
                vehicle_id = vehicle_id,
                level = %verdict.alert_level,
                "Feedback gated by policy"
            );
            return false;
        }

        match self
            .gateway
            .send_to_device(vehicle_id, &verdict.advice)
            .await
        {
            Ok(()) => {
                info!(
                    vehicle_id = vehicle_id,
                    level = %verdict.alert_level,
                    "Feedback dispatched"
                );
                true
            }
            Err(e) => {
                error!(
                    vehicle_id = vehicle_id,
                    error = %e,
                    "Failed to dispatch feedback"
                );
                false
            }
        }
    }
}
