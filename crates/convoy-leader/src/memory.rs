use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::lease::{next_record, AcquireOutcome, Lease, LeaseRecord};

/// In-process lease. Share one instance (behind an `Arc`) between electors
/// to simulate replicas in tests.
#[derive(Debug, Default)]
pub struct MemoryLease {
    state: Mutex<Option<LeaseRecord>>,
}

impl MemoryLease {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Lease for MemoryLease {
    async fn get(&self) -> Result<Option<LeaseRecord>> {
        Ok(self.state.lock().await.clone())
    }

    async fn acquire(&self, identity: &str, duration: Duration) -> Result<AcquireOutcome> {
        let mut state = self.state.lock().await;
        let outcome = next_record(state.as_ref(), identity, duration, Utc::now());
        if let AcquireOutcome::Acquired(record) = &outcome {
            *state = Some(record.clone());
        }
        Ok(outcome)
    }

    async fn renew(&self, identity: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.as_mut() {
            Some(record) if record.is_held_by(identity) => {
                record.renewed_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, identity: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(record) = state.as_mut() {
            if record.is_held_by(identity) {
                record.holder.clear();
            }
        }
        Ok(())
    }
}
