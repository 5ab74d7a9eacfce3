use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use convoy_leader::{LeaderElector, LeadershipHandler};

use crate::worker::Worker;

/// Runs the [`Worker`] only while this replica holds the lease.
pub struct LeaderWorker {
    elector: LeaderElector,
    worker: Arc<Worker>,
}

impl LeaderWorker {
    pub fn new(elector: LeaderElector, worker: Arc<Worker>) -> Self {
        Self { elector, worker }
    }

    pub fn worker(&self) -> &Arc<Worker> {
        &self.worker
    }

    /// Take part in the election until `cancel` fires. The worker is stopped
    /// before this returns.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(identity = %self.elector.identity(), "joining schedule worker election");
        self.elector.run(cancel, self).await;
        self.worker.stop().await;
    }
}

#[async_trait]
impl LeadershipHandler for LeaderWorker {
    async fn started_leading(&self, leader_token: CancellationToken) {
        info!(identity = %self.elector.identity(), "became leader, starting schedule worker");
        self.worker.start(leader_token);
    }

    async fn stopped_leading(&self) {
        info!(identity = %self.elector.identity(), "lost leadership, stopping schedule worker");
        self.worker.stop().await;
    }

    async fn new_leader(&self, identity: &str) {
        if identity != self.elector.identity() {
            info!(leader = %identity, "schedule worker led by another replica");
        }
    }
}
