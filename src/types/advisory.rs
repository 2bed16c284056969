//! Advisory verdict types: AlertLevel, AdvisoryVerdict, AdviceEvent

use serde::{Deserialize, Serialize};

/// Alert level attached to an advisory verdict.
///
/// Ordered by urgency so policy gates can compare levels directly
/// (`level >= AlertLevel::Warn`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    /// Normal, optimal driving - nothing to correct
    #[default]
    Info,
    /// Behaviour to correct (high revs, long idling, low fuel)
    Warn,
    /// Dangerous situation (excessive speed, fuel nearly empty)
    Critical,
}

impl AlertLevel {
    /// Parse a free-form level string as produced by a language model.
    ///
    /// Case-insensitive and tolerant of decoration ("**CRITICAL**",
    /// "warning"). Returns `None` for anything that names no known level, so
    /// the caller can treat the whole response as malformed.
    pub fn parse_loose(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        if lower.contains("critical") || lower.contains("danger") || lower.contains("severe") {
            Some(AlertLevel::Critical)
        } else if lower.contains("warn") || lower.contains("caution") {
            Some(AlertLevel::Warn)
        } else if lower.contains("info") || lower.contains("normal") || lower.contains("ok") {
            Some(AlertLevel::Info)
        } else {
            None
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::Info => write!(f, "INFO"),
            AlertLevel::Warn => write!(f, "WARN"),
            AlertLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// The advisory engine's output: a short advice text plus its alert level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryVerdict {
    /// Short, actionable advice for the driver
    pub advice: String,
    pub alert_level: AlertLevel,
}

/// Lightweight advisory event broadcast after a record is enriched.
///
/// Deliberately smaller than the full record: dashboard clients already hold
/// the telemetry from the fast-path broadcast and only need the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceEvent {
    pub record_id: String,
    pub vehicle_id: String,
    pub advice: String,
    pub alert_level: AlertLevel,
}
