//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The processor and the runner call store methods and never execute
//! SQL directly.

use crate::{
    clock::{Clock, SystemClock},
    config::HistoryConfig,
    error::FraudResult,
};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use std::sync::Arc;

mod event_log;
mod exception;
mod history;
mod status;

pub use exception::{ExceptionKind, ExceptionRow, FirDetails};
pub use status::ChequeStatus;

pub struct ChequeHistoryStore {
    conn: Connection,
    clock: Arc<dyn Clock>,
    recent: Duration,
}

impl ChequeHistoryStore {
    pub fn open(path: &str) -> FraudResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self::with_connection(conn))
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> FraudResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::with_connection(conn))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn,
            clock: Arc::new(SystemClock),
            recent: Duration::days(i64::from(HistoryConfig::default().recent_days)),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_history_config(mut self, config: &HistoryConfig) -> Self {
        self.recent = Duration::days(i64::from(config.recent_days));
        self
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> FraudResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_cheque_history.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_fraud_event_log.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_cheque_exception.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_cheque_status.sql"))?;
        Ok(())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn recent_since(&self) -> i64 {
        self.clock
            .now()
            .checked_sub_signed(self.recent)
            .map_or(i64::MIN, |since| since.timestamp_millis())
    }
}

/// Read a unix-millis column back into a UTC timestamp.
fn millis_to_utc(col: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(col, millis))
}
