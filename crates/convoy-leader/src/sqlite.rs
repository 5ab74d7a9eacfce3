use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use crate::db::init_db;
use crate::error::{LeaderError, Result};
use crate::lease::{next_record, AcquireOutcome, Lease, LeaseRecord};

/// Lease stored as one SQLite row with expiry + heartbeat columns.
///
/// Acquisition runs inside an `IMMEDIATE` transaction so two replicas
/// sharing the database file cannot both win.
pub struct SqliteLease {
    conn: Mutex<Connection>,
    namespace: String,
    name: String,
}

impl SqliteLease {
    pub fn new(
        conn: Connection,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            namespace: namespace.into(),
            name: name.into(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LeaderError::Backend("sqlite connection mutex poisoned".to_string()))
    }

    fn read(conn: &Connection, namespace: &str, name: &str) -> Result<Option<LeaseRecord>> {
        let row = conn
            .query_row(
                "SELECT holder, lease_duration_ms, acquired_at_ms, renewed_at_ms, transitions
                 FROM leases WHERE namespace = ?1 AND name = ?2",
                rusqlite::params![namespace, name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, u32>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((holder, duration_ms, acquired_ms, renewed_ms, transitions)) = row else {
            return Ok(None);
        };
        Ok(Some(LeaseRecord {
            holder,
            lease_duration_ms: duration_ms.max(0) as u64,
            acquired_at: from_millis(acquired_ms)?,
            renewed_at: from_millis(renewed_ms)?,
            transitions,
        }))
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| LeaderError::Backend(format!("timestamp out of range: {ms}")))
}

#[async_trait]
impl Lease for SqliteLease {
    async fn get(&self) -> Result<Option<LeaseRecord>> {
        let conn = self.lock()?;
        Self::read(&conn, &self.namespace, &self.name)
    }

    async fn acquire(&self, identity: &str, duration: Duration) -> Result<AcquireOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = Self::read(&tx, &self.namespace, &self.name)?;
        let outcome = next_record(current.as_ref(), identity, duration, Utc::now());

        if let AcquireOutcome::Acquired(record) = &outcome {
            tx.execute(
                "INSERT INTO leases
                 (namespace, name, holder, lease_duration_ms, acquired_at_ms, renewed_at_ms, transitions)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (namespace, name) DO UPDATE SET
                    holder = excluded.holder,
                    lease_duration_ms = excluded.lease_duration_ms,
                    acquired_at_ms = excluded.acquired_at_ms,
                    renewed_at_ms = excluded.renewed_at_ms,
                    transitions = excluded.transitions",
                rusqlite::params![
                    self.namespace,
                    self.name,
                    record.holder,
                    record.lease_duration_ms as i64,
                    record.acquired_at.timestamp_millis(),
                    record.renewed_at.timestamp_millis(),
                    record.transitions,
                ],
            )?;
        }
        tx.commit()?;
        debug!(
            lease = %self.name,
            identity,
            acquired = outcome.is_acquired(),
            "lease acquire attempt"
        );
        Ok(outcome)
    }

    async fn renew(&self, identity: &str) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE leases SET renewed_at_ms = ?1
             WHERE namespace = ?2 AND name = ?3 AND holder = ?4 AND holder != ''",
            rusqlite::params![Utc::now().timestamp_millis(), self.namespace, self.name, identity],
        )?;
        Ok(changed == 1)
    }

    async fn release(&self, identity: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE leases SET holder = ''
             WHERE namespace = ?1 AND name = ?2 AND holder = ?3",
            rusqlite::params![self.namespace, self.name, identity],
        )?;
        Ok(())
    }
}
