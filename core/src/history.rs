//! Read access to an account's persisted cheque history.
//!
//! The evaluator only ever reads history. Writing it is the job of the
//! surrounding workflow (see processor.rs), which records a cheque once
//! it has cleared fraud checks.

use crate::{
    clock::Clock,
    error::FraudResult,
    signal::amount_similarity,
    types::{AccountId, Amount, ChequeNumber},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One cheque as it sits in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChequeRecord {
    pub account_id: AccountId,
    pub cheque_number: ChequeNumber,
    pub currency: String,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// The evaluator's view of persisted history.
///
/// Errors are reported, never raised past the evaluator: a failing call
/// disables the signal that needed it for that evaluation.
pub trait HistoryProvider: Send {
    fn cheque_numbers(&self, account_id: &str) -> FraudResult<Vec<ChequeNumber>>;

    fn total_cheque_count(&self, account_id: &str) -> FraudResult<u64>;

    fn recent_cheque_count(&self, account_id: &str) -> FraudResult<u64>;

    /// True if a recent cheque's amount has similarity `>= similarity_threshold`
    /// to `amount`.
    fn has_similar_recent_cheque(
        &self,
        account_id: &str,
        amount: Amount,
        similarity_threshold: f64,
    ) -> FraudResult<bool>;
}

/// Vec-backed history for tests and demos.
pub struct InMemoryHistory {
    records: Vec<ChequeRecord>,
    clock: Arc<dyn Clock>,
    recent: Duration,
}

impl InMemoryHistory {
    pub fn new(clock: Arc<dyn Clock>, recent_days: u32) -> Self {
        Self {
            records: Vec::new(),
            clock,
            recent: Duration::days(i64::from(recent_days)),
        }
    }

    pub fn record(&mut self, record: ChequeRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ChequeRecord] {
        &self.records
    }

    fn for_account<'a>(&'a self, account_id: &'a str) -> impl Iterator<Item = &'a ChequeRecord> + 'a {
        self.records.iter().filter(move |r| r.account_id == account_id)
    }

    fn recent_for<'a>(&'a self, account_id: &'a str) -> impl Iterator<Item = &'a ChequeRecord> + 'a {
        let since = self.clock.now().checked_sub_signed(self.recent);
        self.for_account(account_id)
            .filter(move |r| since.map_or(true, |since| r.occurred_at >= since))
    }
}

impl HistoryProvider for InMemoryHistory {
    fn cheque_numbers(&self, account_id: &str) -> FraudResult<Vec<ChequeNumber>> {
        Ok(self.for_account(account_id).map(|r| r.cheque_number.clone()).collect())
    }

    fn total_cheque_count(&self, account_id: &str) -> FraudResult<u64> {
        Ok(self.for_account(account_id).count() as u64)
    }

    fn recent_cheque_count(&self, account_id: &str) -> FraudResult<u64> {
        Ok(self.recent_for(account_id).count() as u64)
    }

    fn has_similar_recent_cheque(
        &self,
        account_id: &str,
        amount: Amount,
        similarity_threshold: f64,
    ) -> FraudResult<bool> {
        Ok(self
            .recent_for(account_id)
            .any(|r| amount_similarity(r.amount, amount) >= similarity_threshold))
    }
}
