//! Rule-based advisory decision table
//!
//! First match wins. The table is ordered so that safety conditions (speed,
//! fuel reserve) dominate efficiency conditions (high revs, idling) - a
//! speeding vehicle with an empty tank is told to slow down, not to refuel.

use crate::types::{AdvisoryVerdict, AlertLevel};

/// Speed above which driving is considered dangerous (km/h)
pub const EXCESSIVE_SPEED_KMH: f64 = 130.0;

/// Fuel reserve threshold (percent)
pub const RESERVE_FUEL_PCT: f64 = 5.0;

/// Revs above which the driver should shift up
pub const HIGH_RPM: u32 = 3000;

/// Speed below which the vehicle counts as stationary (km/h)
pub const IDLE_SPEED_KMH: f64 = 10.0;

/// Revs above which a stationary engine counts as idling
pub const IDLE_RPM: u32 = 1000;

/// Evaluate the decision table for one reading.
pub fn evaluate(speed: f64, rpm: u32, fuel_level: f64) -> AdvisoryVerdict {
    if speed > EXCESSIVE_SPEED_KMH {
        return AdvisoryVerdict {
            advice: "You are over the limit. Slow down for safety and fuel economy.".to_string(),
            alert_level: AlertLevel::Critical,
        };
    }
    if fuel_level < RESERVE_FUEL_PCT {
        return AdvisoryVerdict {
            advice: "Fuel almost empty! Stop at the first filling station.".to_string(),
            alert_level: AlertLevel::Critical,
        };
    }
    if rpm > HIGH_RPM {
        return AdvisoryVerdict {
            advice: "Revs too high! Shift up to save fuel.".to_string(),
            alert_level: AlertLevel::Warn,
        };
    }
    if speed < IDLE_SPEED_KMH && rpm > IDLE_RPM {
        return AdvisoryVerdict {
            advice: "You are stopped or nearly so. Switch the engine off if the stop is long."
                .to_string(),
            alert_level: AlertLevel::Warn,
        };
    }
    AdvisoryVerdict {
        advice: "Optimal driving. Keep it up!".to_string(),
        alert_level: AlertLevel::Info,
    }
}
