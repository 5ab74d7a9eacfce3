use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tracing::info;

use convoy_core::config::ConvoyConfig;
use convoy_leader::{generate_identity, ElectorConfig, LeaderElector, SqliteLease};
use convoy_records::SqliteBackend;
use convoy_scheduler::{
    LeaderWorker, RecordScheduleStore, ScheduleExecutor, ScheduleService, StoreLayout, Worker,
    WorkerConfig,
};
use convoy_sessions::HttpSessionManager;

/// Everything a subcommand needs, wired from one config.
pub struct App {
    pub config: ConvoyConfig,
    pub store: Arc<RecordScheduleStore>,
    pub executor: Arc<ScheduleExecutor>,
    pub service: ScheduleService,
}

impl App {
    pub fn build(config: ConvoyConfig) -> anyhow::Result<Self> {
        let db_path = config.database.path.clone();
        ensure_parent_dir(&db_path);
        info!(path = %db_path, "opening SQLite database");

        let db = open_db(&db_path)?;
        db.execute_batch("PRAGMA journal_mode=WAL;")?;

        // each subsystem gets its own connection
        let backend = SqliteBackend::new(open_db(&db_path)?, config.store.namespace.clone())
            .context("initialising record backend")?;
        let store = Arc::new(RecordScheduleStore::new(
            Arc::new(backend),
            StoreLayout::from(&config.store),
        ));

        let sessions = HttpSessionManager::new(
            &config.sessions.base_url,
            config.sessions.api_token.clone(),
            Duration::from_secs(config.sessions.request_timeout_secs),
        )
        .context("building session runtime client")?;
        let executor = Arc::new(ScheduleExecutor::new(store.clone(), Arc::new(sessions)));
        let service = ScheduleService::new(store.clone(), executor.clone());

        Ok(Self {
            config,
            store,
            executor,
            service,
        })
    }

    /// Run the worker until `cancel` fires, behind leader election when
    /// enabled.
    pub async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        if self.config.store.migrate_on_start {
            let report = self.store.migrate_from_legacy().await?;
            if report.migrated > 0 {
                info!(migrated = report.migrated, "legacy schedules migrated on startup");
            }
        }

        if !self.config.scheduler.enabled {
            info!("schedule worker disabled, waiting for shutdown");
            cancel.cancelled().await;
            return Ok(());
        }

        let worker = Arc::new(Worker::new(
            self.store.clone(),
            self.executor.clone(),
            WorkerConfig {
                check_interval: Duration::from_secs(self.config.scheduler.check_interval_secs),
            },
        ));

        let leader = &self.config.leader;
        if !leader.enabled {
            info!("leader election disabled, running worker unconditionally");
            worker.start(cancel.clone());
            cancel.cancelled().await;
            worker.stop().await;
            return Ok(());
        }

        let lease = SqliteLease::new(
            open_db(&self.config.database.path)?,
            leader.namespace.clone(),
            leader.lease_name.clone(),
        )
        .context("initialising lease table")?;
        let elector_config = ElectorConfig {
            lease_name: leader.lease_name.clone(),
            namespace: leader.namespace.clone(),
            lease_duration: Duration::from_secs(leader.lease_duration_secs),
            renew_deadline: Duration::from_secs(leader.renew_deadline_secs),
            retry_period: Duration::from_secs(leader.retry_period_secs),
        };
        let elector = LeaderElector::new(Arc::new(lease), generate_identity(), elector_config)?;

        LeaderWorker::new(elector, worker).run(cancel).await;
        Ok(())
    }
}

/// Replicas share the database file, so every connection waits on locks
/// instead of failing with SQLITE_BUSY.
fn open_db(path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
