//! SQLite attempt ledger.

use rusqlite::{params, Connection, Result as SqlResult, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

use super::models::*;

mod embedded {
    refinery::embed_migrations!("migrations");
}

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("ledger lock poisoned")]
    Poisoned,
}

/// Thread-safe, append-only store of authentication attempts.
///
/// Every read-then-append goes through one mutex and one `IMMEDIATE`
/// transaction, so two racing failures can never both observe a stale count.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the ledger at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), DbError> {
        let mut conn = self.conn()?;
        embedded::migrations::runner()
            .run(&mut *conn)
            .map_err(|e| DbError::Migration(e.to_string()))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Check the lockout and record the attempt atomically.
    ///
    /// `candidate.success` carries the credential check result. When the
    /// `(source, username)` pair already has `max_failures` failures at or
    /// after `window_start`, the attempt is stored as a failure and
    /// [`Admission::LockedOut`] is returned regardless of the credentials.
    pub fn admit_attempt(
        &self,
        candidate: &LoginAttempt,
        window_start: u64,
        max_failures: u32,
    ) -> Result<Admission, DbError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let failures = count_failures(&tx, &candidate.source, &candidate.username, window_start)?;
        let admission = if failures >= max_failures {
            Admission::LockedOut
        } else if candidate.success {
            Admission::Granted
        } else {
            Admission::Denied
        };

        let recorded = LoginAttempt {
            success: admission == Admission::Granted,
            ..candidate.clone()
        };
        insert_attempt(&tx, &recorded)?;

        tx.commit()?;
        Ok(admission)
    }
}

#[cfg(test)]
impl Store {
    /// Append an attempt unconditionally.
    pub fn append_attempt(&self, attempt: &LoginAttempt) -> Result<(), DbError> {
        let conn = self.conn()?;
        insert_attempt(&conn, attempt)?;
        Ok(())
    }

    /// Count failures for `(source, username)` with `ts >= since`.
    pub fn count_failures_since(&self, source: &str, username: &str, since: u64) -> Result<u32, DbError> {
        let conn = self.conn()?;
        Ok(count_failures(&conn, source, username, since)?)
    }

    /// Most recent attempts, newest first.
    pub fn recent_attempts(&self, limit: u32) -> Result<Vec<LoginAttempt>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT ts, ip, username, success FROM login_attempts ORDER BY id DESC LIMIT ?1",
        )?;

        let attempts = stmt
            .query_map(params![limit], |row| {
                let ts: i64 = row.get(0)?;
                Ok(LoginAttempt {
                    timestamp: ts.max(0) as u64,
                    source: row.get(1)?,
                    username: row.get(2)?,
                    success: row.get::<_, i64>(3)? != 0,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(attempts)
    }
}

fn insert_attempt(conn: &Connection, attempt: &LoginAttempt) -> SqlResult<()> {
    conn.execute(
        "INSERT INTO login_attempts (ts, ip, username, success) VALUES (?1, ?2, ?3, ?4)",
        params![
            to_sql_ts(attempt.timestamp),
            attempt.source,
            attempt.username,
            attempt.success,
        ],
    )?;
    Ok(())
}

fn count_failures(conn: &Connection, source: &str, username: &str, since: u64) -> SqlResult<u32> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM login_attempts
         WHERE ip = ?1 AND username = ?2 AND success = 0 AND ts >= ?3",
        params![source, username, to_sql_ts(since)],
        |row| row.get(0),
    )?;
    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

fn to_sql_ts(ts: u64) -> i64 {
    i64::try_from(ts).unwrap_or(i64::MAX)
}
