use super::{millis_to_utc, ChequeHistoryStore};
use crate::{error::FraudResult, types::EntityId};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, types::Type};
use serde::{Deserialize, Serialize};

const FIR_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    Fraud,
    Bounced,
    /// Recorded for follow-up; processing carries on.
    Delayed,
}

impl ExceptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionKind::Fraud   => "fraud",
            ExceptionKind::Bounced => "bounced",
            ExceptionKind::Delayed => "delayed",
        }
    }
}

/// Legal complaint (FIR) filed against a bounced cheque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirDetails {
    pub fir_number: String,
    pub police_station: String,
    pub fir_date: NaiveDate,
    pub remarks: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionRow {
    pub exception_id: EntityId,
    pub account_id: String,
    pub cheque_number: String,
    pub kind: String,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
    pub fir: Option<FirDetails>,
}

impl ChequeHistoryStore {
    // ── Exceptions ────────────────────────────────────────────────

    /// Record an exception against a cheque. Returns the new exception id.
    pub fn report_exception(
        &self,
        account_id: &str,
        cheque_number: &str,
        kind: ExceptionKind,
        detail: &str,
    ) -> FraudResult<EntityId> {
        let exception_id = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO cheque_exception (exception_id, account_id, cheque_number, kind, detail, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                exception_id,
                account_id,
                cheque_number,
                kind.as_str(),
                detail,
                self.now().timestamp_millis(),
            ],
        )?;
        Ok(exception_id)
    }

    /// Attach FIR details to the cheque's bounced exception. Returns false
    /// when the cheque has no bounced exception; other kinds never carry
    /// FIR details.
    pub fn record_fir_details(
        &self,
        account_id: &str,
        cheque_number: &str,
        fir: &FirDetails,
    ) -> FraudResult<bool> {
        let updated = self.conn.execute(
            "UPDATE cheque_exception
             SET fir_number = ?3, police_station = ?4, fir_date = ?5, fir_remarks = ?6
             WHERE rowid = (
                 SELECT rowid FROM cheque_exception
                 WHERE account_id = ?1 AND cheque_number = ?2 AND kind = ?7
                 ORDER BY recorded_at ASC, rowid ASC
                 LIMIT 1
             )",
            params![
                account_id,
                cheque_number,
                fir.fir_number,
                fir.police_station,
                fir.fir_date.format(FIR_DATE_FORMAT).to_string(),
                fir.remarks,
                ExceptionKind::Bounced.as_str(),
            ],
        )?;
        Ok(updated > 0)
    }

    pub fn exceptions_for_account(&self, account_id: &str) -> FraudResult<Vec<ExceptionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT exception_id, account_id, cheque_number, kind, detail, recorded_at,
                    fir_number, police_station, fir_date, fir_remarks
             FROM cheque_exception WHERE account_id = ?1
             ORDER BY recorded_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![account_id], |row| {
            let fir_number: Option<String> = row.get(6)?;
            let fir = match fir_number {
                Some(fir_number) => {
                    let raw_date: String = row.get(8)?;
                    let fir_date = NaiveDate::parse_from_str(&raw_date, FIR_DATE_FORMAT)
                        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;
                    Some(FirDetails {
                        fir_number,
                        police_station: row.get(7)?,
                        fir_date,
                        remarks: row.get(9)?,
                    })
                }
                None => None,
            };
            Ok(ExceptionRow {
                exception_id: row.get(0)?,
                account_id: row.get(1)?,
                cheque_number: row.get(2)?,
                kind: row.get(3)?,
                detail: row.get(4)?,
                recorded_at: millis_to_utc(5, row.get(5)?)?,
                fir,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// FIR details on the cheque's bounced exception, if any were recorded.
    pub fn fir_details(&self, account_id: &str, cheque_number: &str) -> FraudResult<Option<FirDetails>> {
        let found = self
            .exceptions_for_account(account_id)?
            .into_iter()
            .find(|e| e.cheque_number == cheque_number && e.fir.is_some())
            .and_then(|e| e.fir);
        Ok(found)
    }

    pub fn exception_count(&self, kind: ExceptionKind) -> FraudResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM cheque_exception WHERE kind = ?1",
            params![kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
