//! Content-derived record identity
//!
//! Every raw telemetry message maps to a stable id: the SHA-256 digest of the
//! message bytes exactly as delivered. Redelivery of the same payload lands on
//! the same record id, which is what makes storage and enrichment idempotent
//! under at-least-once transports.

use sha2::{Digest, Sha256};

/// Stable identity for a raw telemetry message.
pub fn stable_hash(raw: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    format!("{:x}", hasher.finalize())
}
