use rusqlite::Connection;

use crate::error::Result;

/// Initialise the record tables.
///
/// `records` holds one row per document; `record_labels` is the secondary
/// index consulted by `list_by_label`. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS records (
            namespace   TEXT NOT NULL,
            name        TEXT NOT NULL,
            data        TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            PRIMARY KEY (namespace, name)
        ) STRICT;

        CREATE TABLE IF NOT EXISTS record_labels (
            namespace   TEXT NOT NULL,
            name        TEXT NOT NULL,
            key         TEXT NOT NULL,
            value       TEXT NOT NULL,
            PRIMARY KEY (namespace, name, key)
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_record_labels_kv
            ON record_labels (namespace, key, value);
        ",
    )?;
    Ok(())
}
