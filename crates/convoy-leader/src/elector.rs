use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{LeaderError, Result};
use crate::lease::Lease;

/// Timing and identity of the shared lease.
#[derive(Debug, Clone)]
pub struct ElectorConfig {
    pub lease_name: String,
    pub namespace: String,
    /// How long a lease stays valid without renewal.
    pub lease_duration: Duration,
    /// How long the leader keeps retrying a failed renewal before giving up.
    pub renew_deadline: Duration,
    /// Polling interval for acquisition and renewal attempts.
    pub retry_period: Duration,
}

impl Default for ElectorConfig {
    fn default() -> Self {
        Self {
            lease_name: "convoy-schedule-worker".to_string(),
            namespace: "default".to_string(),
            lease_duration: Duration::from_secs(15),
            renew_deadline: Duration::from_secs(10),
            retry_period: Duration::from_secs(2),
        }
    }
}

impl ElectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lease_duration <= self.renew_deadline {
            return Err(LeaderError::InvalidConfig(
                "lease_duration must be greater than renew_deadline".to_string(),
            ));
        }
        if self.renew_deadline <= self.retry_period {
            return Err(LeaderError::InvalidConfig(
                "renew_deadline must be greater than retry_period".to_string(),
            ));
        }
        if self.retry_period.is_zero() {
            return Err(LeaderError::InvalidConfig("retry_period must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Callbacks driven by [`LeaderElector::run`].
#[async_trait]
pub trait LeadershipHandler: Send + Sync {
    /// This identity now holds the lease. `leader_token` is cancelled as
    /// soon as leadership ends; work started here should observe it.
    async fn started_leading(&self, leader_token: CancellationToken);

    /// Leadership ended (lost, renewal deadline missed, or shutdown).
    /// Implementations must stop leader-only work before returning.
    async fn stopped_leading(&self);

    /// Informational: the observed lease holder changed.
    async fn new_leader(&self, _identity: &str) {}
}

/// `hostname-<8 hex chars>`, unique per process instance.
pub fn generate_identity() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "convoy".to_string());
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", host, &suffix[..8])
}

/// Runs the election protocol for one identity against one lease.
pub struct LeaderElector {
    lease: Arc<dyn Lease>,
    identity: String,
    config: ElectorConfig,
}

impl LeaderElector {
    pub fn new(
        lease: Arc<dyn Lease>,
        identity: impl Into<String>,
        config: ElectorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            lease,
            identity: identity.into(),
            config,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn config(&self) -> &ElectorConfig {
        &self.config
    }

    /// Block until `cancel` fires, competing for the lease and leading
    /// whenever it is won. After losing the lease the elector goes back to
    /// competing. On cancellation a held lease is released.
    pub async fn run(&self, cancel: CancellationToken, handler: &dyn LeadershipHandler) {
        info!(
            identity = %self.identity,
            lease = %self.config.lease_name,
            namespace = %self.config.namespace,
            "leader election started"
        );
        let mut observed_holder = String::new();

        loop {
            if !self.acquire(&cancel, handler, &mut observed_holder).await {
                break;
            }

            info!(identity = %self.identity, "acquired leadership");
            let leader_token = cancel.child_token();
            handler.started_leading(leader_token.clone()).await;

            self.renew_until_lost(&cancel).await;

            leader_token.cancel();
            handler.stopped_leading().await;

            if cancel.is_cancelled() {
                if let Err(e) = self.lease.release(&self.identity).await {
                    warn!(
                        identity = %self.identity,
                        error = %e,
                        "failed to release lease on shutdown"
                    );
                } else {
                    info!(identity = %self.identity, "lease released");
                }
                break;
            }
            warn!(identity = %self.identity, "leadership lost, rejoining election");
            observed_holder.clear();
        }
        info!(identity = %self.identity, "leader election stopped");
    }

    /// Poll until the lease is ours (`true`) or we are cancelled (`false`).
    async fn acquire(
        &self,
        cancel: &CancellationToken,
        handler: &dyn LeadershipHandler,
        observed_holder: &mut String,
    ) -> bool {
        loop {
            match self.lease.acquire(&self.identity, self.config.lease_duration).await {
                Ok(outcome) => {
                    let holder = &outcome.record().holder;
                    if *holder != *observed_holder {
                        observed_holder.clone_from(holder);
                        info!(leader = %holder, "new leader observed");
                        handler.new_leader(holder).await;
                    }
                    if outcome.is_acquired() {
                        return true;
                    }
                    debug!(identity = %self.identity, "lease held elsewhere");
                }
                Err(e) => error!(identity = %self.identity, error = %e, "lease acquire failed"),
            }

            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.config.retry_period) => {}
            }
        }
    }

    /// Renew every `retry_period` until cancelled or until renewal has been
    /// failing for longer than `renew_deadline`.
    async fn renew_until_lost(&self, cancel: &CancellationToken) {
        let mut last_renewed = Instant::now();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.config.retry_period) => {}
            }

            match self.lease.renew(&self.identity).await {
                Ok(true) => {
                    last_renewed = Instant::now();
                    continue;
                }
                Ok(false) => {
                    warn!(identity = %self.identity, "lease taken by another holder");
                    return;
                }
                Err(e) => warn!(identity = %self.identity, error = %e, "lease renewal failed"),
            }

            if last_renewed.elapsed() >= self.config.renew_deadline {
                error!(identity = %self.identity, "renew deadline exceeded, stepping down");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_has_random_suffix() {
        let a = generate_identity();
        let b = generate_identity();
        assert_ne!(a, b);
        let suffix = a.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 8);
    }

    #[test]
    fn config_ordering_is_enforced() {
        assert!(ElectorConfig::default().validate().is_ok());

        let bad = ElectorConfig {
            renew_deadline: Duration::from_secs(20),
            ..ElectorConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = ElectorConfig {
            retry_period: Duration::from_secs(10),
            ..ElectorConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
