use super::{millis_to_utc, ChequeHistoryStore};
use crate::{
    error::FraudResult,
    event::{EventLogEntry, FraudEvent},
};
use rusqlite::params;

impl ChequeHistoryStore {
    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, event: &FraudEvent) -> FraudResult<()> {
        let entry = EventLogEntry::from_event(event, self.now())?;
        self.conn.execute(
            "INSERT INTO fraud_event_log (account_id, event_type, payload, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.account_id,
                entry.event_type,
                entry.payload,
                entry.recorded_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_account(&self, account_id: &str) -> FraudResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, event_type, payload, recorded_at
             FROM fraud_event_log WHERE account_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![account_id], |row| {
                Ok(EventLogEntry {
                    id:          Some(row.get(0)?),
                    account_id:  row.get(1)?,
                    event_type:  row.get(2)?,
                    payload:     row.get(3)?,
                    recorded_at: millis_to_utc(4, row.get(4)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, event_type: &str) -> FraudResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM fraud_event_log WHERE event_type = ?1",
            params![event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
