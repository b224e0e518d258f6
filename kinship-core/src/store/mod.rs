//! SQLite relationship store.
//!
//! All eight tables live in one database behind a single connection. Every
//! command runs inside [`Store::transaction`], an `IMMEDIATE` transaction
//! that holds the connection lock for the whole guard-then-write sequence,
//! so two commands touching the same users can never interleave.
//!
//! Design notes:
//! - WAL mode for concurrent readers (other tools inspecting the file).
//! - Timestamps are fixed-width RFC 3339 UTC text, so `ORDER BY` on them is
//!   chronological.
//! - Rule refusals commit: the only writes a refused command can have made
//!   are lazy-expiry deletions, which must stick. Faults roll back.
//! - Backup support via SQLite's online-backup API.

mod queries;
mod schema;

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, OpenFlags, Row, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::error::Result;

/// Handle to the relationship database.
///
/// # Usage
///
/// ```no_run
/// # use kinship_core::store::Store;
/// # use kinship_core::config::PersistenceConfig;
/// # use kinship_core::types::UserId;
/// let store = Store::open("kinship.db", &PersistenceConfig::default())?;
/// let married = store.transaction("peek", |tx| tx.active_marriage(UserId(1)))?;
/// # Ok::<(), kinship_core::error::KinshipError>(())
/// ```
pub struct Store {
    conn: Mutex<Connection>,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// One open transaction. Handed to every subsystem operation; all reads and
/// writes of a command go through it.
pub struct Tx<'c> {
    tx: rusqlite::Transaction<'c>,
}

impl Store {
    /// Open (or create) a database at `path` and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns [`KinshipError::Database`](crate::KinshipError::Database) on
    /// SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "busy_timeout", config.busy_timeout_ms)?;

        schema::apply(&conn)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "Kinship store opened"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            config: config.clone(),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`KinshipError::Database`](crate::KinshipError::Database) on
    /// SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::apply(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Run `f` as one atomic unit.
    ///
    /// Commits when `f` succeeds or returns a rule refusal, rolls back on
    /// faults. `op` names the command in logs.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns, or a database error from begin/commit.
    pub fn transaction<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Tx<'_>) -> Result<T>,
    {
        let start = Instant::now();
        let mut conn = self.conn.lock();
        let tx = Tx {
            tx: conn.transaction_with_behavior(TransactionBehavior::Immediate)?,
        };

        let result = f(&tx);
        match &result {
            Ok(_) => tx.tx.commit()?,
            Err(e) if e.is_refusal() => {
                debug!(op, reason = %e, "Command refused");
                tx.tx.commit()?;
            }
            Err(e) => {
                warn!(op, error = %e, "Command failed, rolling back");
                if let Err(rollback) = tx.tx.rollback() {
                    warn!(op, error = %rollback, "Rollback failed");
                }
            }
        }

        debug!(
            op,
            elapsed_us = start.elapsed().as_micros(),
            "Transaction finished"
        );
        result
    }

    // ------------------------------------------------------------------
    // Backup
    // ------------------------------------------------------------------

    /// Copy the database to `dest_path` using SQLite's online-backup API.
    ///
    /// # Errors
    ///
    /// Returns [`KinshipError::Database`](crate::KinshipError::Database) on
    /// SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let conn = self.conn.lock();
        let backup = rusqlite::backup::Backup::new(&conn, &mut dest)?;

        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;

        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Database backup completed"
        );
        Ok(())
    }

    /// Create a numbered backup alongside the database file, rotating old
    /// backups so that at most `backup_count` are kept.
    ///
    /// # Errors
    ///
    /// Returns a database or I/O error on failure.
    pub fn create_rotating_backup(&self) -> Result<()> {
        if self.db_path.as_os_str() == ":memory:" {
            return Ok(());
        }

        let max = self.config.backup_count;
        if max == 0 {
            return Ok(());
        }

        for i in (1..max).rev() {
            let src = self.backup_path(i);
            if src.exists() {
                std::fs::rename(&src, self.backup_path(i + 1))?;
            }
        }

        let oldest = self.backup_path(max + 1);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }

        self.backup(self.backup_path(1))?;
        info!(max_backups = max, "Rotating backup created");
        Ok(())
    }

    /// Path to a numbered backup file (e.g. `kinship.db.bak.1`).
    fn backup_path(&self, n: u32) -> PathBuf {
        let mut p = self.db_path.clone();
        let ext = format!(
            "{}.bak.{n}",
            p.extension()
                .map_or(String::new(), |e| e.to_string_lossy().into_owned())
        );
        p.set_extension(ext);
        p
    }

    // ------------------------------------------------------------------
    // Utility
    // ------------------------------------------------------------------

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `PRAGMA integrity_check`. `Ok(false)` means corruption.
    ///
    /// # Errors
    ///
    /// Returns a database error if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String =
            self.conn
                .lock()
                .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if result != "ok" {
            warn!(result = %result, "Integrity check failed");
        }
        Ok(result == "ok")
    }

    /// Reclaim unused space.
    ///
    /// # Errors
    ///
    /// Returns a database error on failure.
    pub fn vacuum(&self) -> Result<()> {
        self.conn.lock().execute_batch("VACUUM;")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Timestamp encoding
// ---------------------------------------------------------------------------

/// Fixed-width UTC text: `2026-03-01T12:00:00.000000Z`.
pub(crate) fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

/// Read a timestamp column.
pub(crate) fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    decode_ts(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a nullable timestamp column.
pub(crate) fn opt_ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        decode_ts(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}
