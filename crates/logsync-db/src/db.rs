//! Metadata store handle: a single rusqlite connection behind a mutex.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use logsync_core::ServiceError;
use rusqlite::Connection;

use crate::migrations::MIGRATIONS;

/// The metadata store. One connection, shared behind a mutex: every query
/// serializes on it, which is stricter than the row-lock-around-the-upsert
/// a chunk upload needs but satisfies it a fortiori. Swapping in a real
/// multi-connection backend later only touches this struct.
#[derive(Clone)]
pub struct Db {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> rusqlite::Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON")?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> rusqlite::Result<T> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        f(&conn)
    }

    /// Run `f` on a blocking thread under a request deadline. A request
    /// whose metadata-store work doesn't finish in time surfaces as
    /// `ServiceUnavailable` instead of hanging the caller forever.
    ///
    /// `map_err` converts a genuine query error (e.g. distinguishing
    /// `QueryReturnedNoRows` from an internal failure) the way the caller
    /// already would for a plain `with_conn` call.
    pub async fn with_conn_timeout<T, F, M>(&self, deadline: Duration, f: F, map_err: M) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        M: FnOnce(rusqlite::Error) -> ServiceError,
    {
        let db = self.clone();
        match tokio::time::timeout(deadline, tokio::task::spawn_blocking(move || db.with_conn(f))).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => Err(map_err(e)),
            Ok(Err(join_err)) => Err(ServiceError::from_db("metadata store task")(join_err)),
            Err(_elapsed) => Err(ServiceError::service_unavailable("metadata store deadline exceeded")),
        }
    }
}

fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL
        )",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM _migrations WHERE name = ?1)",
            [name],
            |row| row.get(0),
        )?;
        if already_applied {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO _migrations (name, applied_at) VALUES (?1, datetime('now'))",
            [name],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_in_memory_and_applies_migrations_once() {
        let db = Db::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))?;
            assert_eq!(count, MIGRATIONS.len() as i64);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn reopening_an_existing_db_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite3");
        Db::open(&path).unwrap();
        Db::open(&path).unwrap();
    }
}
