use super::ChequeHistoryStore;
use crate::error::FraudResult;
use rusqlite::{params, types::Type, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a cheque: issued on first sight, processed once posted,
/// canceled on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChequeStatus {
    Issued,
    Processed,
    Canceled,
}

impl ChequeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChequeStatus::Issued    => "issued",
            ChequeStatus::Processed => "processed",
            ChequeStatus::Canceled  => "canceled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "issued"    => Some(ChequeStatus::Issued),
            "processed" => Some(ChequeStatus::Processed),
            "canceled"  => Some(ChequeStatus::Canceled),
            _ => None,
        }
    }
}

impl fmt::Display for ChequeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn status_column(row: &rusqlite::Row<'_>, col: usize) -> rusqlite::Result<ChequeStatus> {
    let raw: String = row.get(col)?;
    ChequeStatus::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            col,
            Type::Text,
            format!("unknown cheque status '{raw}'").into(),
        )
    })
}

impl ChequeHistoryStore {
    // ── Cheque status ─────────────────────────────────────────────

    pub fn set_status(&self, account_id: &str, cheque_number: &str, status: ChequeStatus) -> FraudResult<()> {
        self.conn.execute(
            "INSERT INTO cheque_status (account_id, cheque_number, status, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(account_id, cheque_number) DO UPDATE SET
                 status = excluded.status,
                 updated_at = excluded.updated_at",
            params![account_id, cheque_number, status.as_str(), self.now().timestamp_millis()],
        )?;
        log::debug!("Status of cheque {cheque_number} on {account_id} set to {status}");
        Ok(())
    }

    pub fn status_of(&self, account_id: &str, cheque_number: &str) -> FraudResult<Option<ChequeStatus>> {
        let status = self
            .conn
            .query_row(
                "SELECT status FROM cheque_status WHERE account_id = ?1 AND cheque_number = ?2",
                params![account_id, cheque_number],
                |row| status_column(row, 0),
            )
            .optional()?;
        Ok(status)
    }

    /// Every tracked cheque as (account, cheque number, status).
    pub fn all_statuses(&self) -> FraudResult<Vec<(String, String, ChequeStatus)>> {
        let mut stmt = self.conn.prepare(
            "SELECT account_id, cheque_number, status FROM cheque_status
             ORDER BY account_id ASC, cheque_number ASC",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, status_column(row, 2)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn status_count(&self, status: ChequeStatus) -> FraudResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM cheque_status WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
