//! Advisory engine: telemetry reading → advisory verdict
//!
//! `evaluate()` is a total function. With a generative backend configured it
//! asks the model first and silently falls back to the rule table on any
//! failure; without one it is the rule table alone. Callers never observe an
//! error or a partial result.

pub mod rules;

mod generative;

pub use generative::{BackendError, GenerativeBackend};

use tracing::{debug, warn};

use crate::types::AdvisoryVerdict;

/// The advisory decision component.
pub struct AdvisoryEngine {
    backend: Option<GenerativeBackend>,
}

impl AdvisoryEngine {
    /// Engine using only the deterministic rule table.
    pub fn rule_based() -> Self {
        Self { backend: None }
    }

    /// Engine preferring the generative backend, with rule-table fallback.
    pub fn with_backend(backend: GenerativeBackend) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Whether a generative backend is configured.
    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Produce a verdict for one reading. Never fails.
    pub async fn evaluate(&self, speed: f64, rpm: u32, fuel_level: f64) -> AdvisoryVerdict {
        if let Some(backend) = &self.backend {
            match backend.generate(speed, rpm, fuel_level).await {
                Ok(verdict) => {
                    debug!(level = %verdict.alert_level, "Verdict from generative backend");
                    return verdict;
                }
                Err(e) => {
                    warn!(error = %e, "Advisory backend failed - falling back to rule table");
                }
            }
        }
        rules::evaluate(speed, rpm, fuel_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlertLevel;

    #[tokio::test]
    async fn test_rule_based_engine() {
        let engine = AdvisoryEngine::rule_based();
        let verdict = engine.evaluate(150.0, 2000, 50.0).await;
        assert_eq!(verdict.alert_level, AlertLevel::Critical);
    }

    #[tokio::test]
    async fn test_fallback_totality() {
        // A dead backend must never surface an error: evaluate falls back to
        // the rule table and still returns the dominant-rule verdict.
        let backend = GenerativeBackend::new("http://127.0.0.1:1", "test-model", 1).unwrap();
        let engine = AdvisoryEngine::with_backend(backend);

        let verdict = engine.evaluate(150.0, 2000, 50.0).await;
        assert_eq!(verdict.alert_level, AlertLevel::Critical);

        let verdict = engine.evaluate(5.0, 1500, 80.0).await;
        assert_eq!(verdict.alert_level, AlertLevel::Warn);

        let verdict = engine.evaluate(80.0, 2000, 60.0).await;
        assert_eq!(verdict.alert_level, AlertLevel::Info);
    }
}
