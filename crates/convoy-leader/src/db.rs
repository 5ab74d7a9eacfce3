use rusqlite::Connection;

use crate::error::Result;

/// Initialise the `leases` table. Idempotent.
///
/// Timestamps are unix milliseconds so expiry checks stay cheap integer
/// comparisons.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS leases (
            namespace          TEXT    NOT NULL,
            name               TEXT    NOT NULL,
            holder             TEXT    NOT NULL,   -- '' once released
            lease_duration_ms  INTEGER NOT NULL,
            acquired_at_ms     INTEGER NOT NULL,
            renewed_at_ms      INTEGER NOT NULL,
            transitions        INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (namespace, name)
        ) STRICT;
        ",
    )?;
    Ok(())
}
