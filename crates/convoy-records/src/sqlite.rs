use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::backend::{KeyValueStore, LabelIndex};
use crate::db::init_db;
use crate::error::{RecordError, Result};
use crate::types::Record;

/// SQLite-backed record store scoped to one namespace.
///
/// Wraps a single connection in a `Mutex`; every operation is a short
/// synchronous statement batch so the lock is never held across an await.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    namespace: String,
}

impl SqliteBackend {
    /// Wrap a connection, creating the schema if needed.
    pub fn new(conn: Connection, namespace: impl Into<String>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            namespace: namespace.into(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RecordError::Backend("sqlite connection mutex poisoned".to_string()))
    }

    fn load_labels(
        conn: &Connection,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>> {
        let mut stmt = conn.prepare_cached(
            "SELECT key, value FROM record_labels WHERE namespace = ?1 AND name = ?2",
        )?;
        let labels = stmt
            .query_map(rusqlite::params![namespace, name], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
        Ok(labels)
    }

    fn write_labels(
        tx: &rusqlite::Transaction<'_>,
        namespace: &str,
        record: &Record,
    ) -> Result<()> {
        tx.execute(
            "DELETE FROM record_labels WHERE namespace = ?1 AND name = ?2",
            rusqlite::params![namespace, record.name],
        )?;
        let mut stmt = tx.prepare_cached(
            "INSERT INTO record_labels (namespace, name, key, value) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (key, value) in &record.labels {
            stmt.execute(rusqlite::params![namespace, record.name, key, value])?;
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteBackend {
    async fn create(&self, record: &Record) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO records (namespace, name, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            rusqlite::params![self.namespace, record.name, record.data, now],
        )?;
        if inserted == 0 {
            return Err(RecordError::AlreadyExists {
                name: record.name.clone(),
            });
        }
        Self::write_labels(&tx, &self.namespace, record)?;
        tx.commit()?;
        debug!(namespace = %self.namespace, name = %record.name, "record created");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Record>> {
        let conn = self.lock()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM records WHERE namespace = ?1 AND name = ?2",
                rusqlite::params![self.namespace, name],
                |row| row.get(0),
            )
            .optional()?;
        let Some(data) = data else {
            return Ok(None);
        };
        let labels = Self::load_labels(&conn, &self.namespace, name)?;
        Ok(Some(Record {
            name: name.to_string(),
            labels,
            data,
        }))
    }

    async fn update(&self, record: &Record) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE records SET data = ?1, updated_at = ?2 WHERE namespace = ?3 AND name = ?4",
            rusqlite::params![record.data, Utc::now().to_rfc3339(), self.namespace, record.name],
        )?;
        if changed == 0 {
            return Err(RecordError::NotFound {
                name: record.name.clone(),
            });
        }
        Self::write_labels(&tx, &self.namespace, record)?;
        tx.commit()?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "DELETE FROM records WHERE namespace = ?1 AND name = ?2",
            rusqlite::params![self.namespace, name],
        )?;
        if changed == 0 {
            return Err(RecordError::NotFound {
                name: name.to_string(),
            });
        }
        tx.execute(
            "DELETE FROM record_labels WHERE namespace = ?1 AND name = ?2",
            rusqlite::params![self.namespace, name],
        )?;
        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl LabelIndex for SqliteBackend {
    async fn list_by_label(&self, key: &str, value: &str) -> Result<Vec<Record>> {
        let conn = self.lock()?;
        let rows: Vec<(String, String)> = {
            let mut stmt = conn.prepare_cached(
                "SELECT r.name, r.data
                 FROM records r
                 JOIN record_labels l ON l.namespace = r.namespace AND l.name = r.name
                 WHERE r.namespace = ?1 AND l.key = ?2 AND l.value = ?3
                 ORDER BY r.name",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![self.namespace, key, value], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        rows.into_iter()
            .map(|(name, data)| {
                let labels = Self::load_labels(&conn, &self.namespace, &name)?;
                Ok(Record { name, labels, data })
            })
            .collect()
    }
}
