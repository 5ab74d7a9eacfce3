use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Persisted state of the shared lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// Identity of the current holder; empty once released.
    pub holder: String,
    pub lease_duration_ms: u64,
    pub acquired_at: DateTime<Utc>,
    pub renewed_at: DateTime<Utc>,
    /// Number of times the lease changed hands.
    pub transitions: u32,
}

impl LeaseRecord {
    pub fn lease_duration(&self) -> Duration {
        Duration::from_millis(self.lease_duration_ms)
    }

    /// A lease with no holder or one not renewed within its duration is up for grabs.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.holder.is_empty() {
            return true;
        }
        let duration = chrono::Duration::milliseconds(self.lease_duration_ms as i64);
        self.renewed_at + duration < now
    }

    pub fn is_held_by(&self, identity: &str) -> bool {
        !self.holder.is_empty() && self.holder == identity
    }
}

/// Result of an acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The caller now holds the lease (fresh acquisition or renewal).
    Acquired(LeaseRecord),
    /// Someone else holds an unexpired lease.
    HeldBy(LeaseRecord),
}

impl AcquireOutcome {
    pub fn record(&self) -> &LeaseRecord {
        match self {
            AcquireOutcome::Acquired(r) | AcquireOutcome::HeldBy(r) => r,
        }
    }

    pub fn is_acquired(&self) -> bool {
        matches!(self, AcquireOutcome::Acquired(_))
    }
}

/// Mutual-exclusion primitive with TTL semantics.
///
/// Holder changes are observed through the records returned by `get` and
/// `acquire`; the elector turns them into new-leader notifications.
#[async_trait]
pub trait Lease: Send + Sync {
    /// Current lease state, `None` if it was never taken.
    async fn get(&self) -> Result<Option<LeaseRecord>>;

    /// Take the lease if it is free, expired, or already ours.
    async fn acquire(&self, identity: &str, duration: Duration) -> Result<AcquireOutcome>;

    /// Extend our hold. Returns `false` if we no longer hold the lease.
    async fn renew(&self, identity: &str) -> Result<bool>;

    /// Give the lease up so a challenger need not wait for expiry.
    /// Releasing a lease we do not hold is a no-op.
    async fn release(&self, identity: &str) -> Result<()>;
}

/// Shared acquisition rule used by every backend.
pub(crate) fn next_record(
    current: Option<&LeaseRecord>,
    identity: &str,
    duration: Duration,
    now: DateTime<Utc>,
) -> AcquireOutcome {
    let lease_duration_ms = duration.as_millis() as u64;
    match current {
        Some(r) if r.is_held_by(identity) => AcquireOutcome::Acquired(LeaseRecord {
            lease_duration_ms,
            renewed_at: now,
            ..r.clone()
        }),
        Some(r) if !r.is_expired(now) => AcquireOutcome::HeldBy(r.clone()),
        Some(r) => AcquireOutcome::Acquired(LeaseRecord {
            holder: identity.to_string(),
            lease_duration_ms,
            acquired_at: now,
            renewed_at: now,
            transitions: r.transitions + 1,
        }),
        None => AcquireOutcome::Acquired(LeaseRecord {
            holder: identity.to_string(),
            lease_duration_ms,
            acquired_at: now,
            renewed_at: now,
            transitions: 0,
        }),
    }
}
