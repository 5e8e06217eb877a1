use super::{millis_to_utc, ChequeHistoryStore};
use crate::{
    error::FraudResult,
    history::{ChequeRecord, HistoryProvider},
    signal::amount_similarity,
    types::{Amount, ChequeNumber},
};
use chrono::{DateTime, Utc};
use rusqlite::params;

impl ChequeHistoryStore {
    // ── Cheque history ────────────────────────────────────────────

    pub fn record_cheque(&self, record: &ChequeRecord) -> FraudResult<()> {
        self.conn.execute(
            "INSERT INTO cheque_history (account_id, cheque_number, currency, amount, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.account_id,
                record.cheque_number,
                record.currency,
                record.amount,
                record.occurred_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    pub fn history_for(&self, account_id: &str) -> FraudResult<Vec<ChequeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT account_id, cheque_number, currency, amount, recorded_at
             FROM cheque_history WHERE account_id = ?1
             ORDER BY recorded_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![account_id], map_record)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Every cheque recorded in `[from, to]`, all accounts.
    pub fn records_in_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> FraudResult<Vec<ChequeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT account_id, cheque_number, currency, amount, recorded_at
             FROM cheque_history WHERE recorded_at BETWEEN ?1 AND ?2
             ORDER BY recorded_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(
            params![from.timestamp_millis(), to.timestamp_millis()],
            map_record,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn recent_amounts(&self, account_id: &str) -> FraudResult<Vec<Amount>> {
        let mut stmt = self.conn.prepare(
            "SELECT amount FROM cheque_history
             WHERE account_id = ?1 AND recorded_at >= ?2",
        )?;
        let rows = stmt.query_map(params![account_id, self.recent_since()], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn map_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChequeRecord> {
    Ok(ChequeRecord {
        account_id: row.get(0)?,
        cheque_number: row.get(1)?,
        currency: row.get(2)?,
        amount: row.get(3)?,
        occurred_at: millis_to_utc(4, row.get(4)?)?,
    })
}

impl HistoryProvider for ChequeHistoryStore {
    fn cheque_numbers(&self, account_id: &str) -> FraudResult<Vec<ChequeNumber>> {
        let mut stmt = self.conn.prepare(
            "SELECT cheque_number FROM cheque_history WHERE account_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![account_id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn total_cheque_count(&self, account_id: &str) -> FraudResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM cheque_history WHERE account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn recent_cheque_count(&self, account_id: &str) -> FraudResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM cheque_history WHERE account_id = ?1 AND recorded_at >= ?2",
            params![account_id, self.recent_since()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn has_similar_recent_cheque(
        &self,
        account_id: &str,
        amount: Amount,
        similarity_threshold: f64,
    ) -> FraudResult<bool> {
        Ok(self
            .recent_amounts(account_id)?
            .into_iter()
            .any(|past| amount_similarity(past, amount) >= similarity_threshold))
    }
}
