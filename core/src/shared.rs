//! Thread-safe handle around a single evaluator.
//!
//! One global lock: at most one evaluation is in flight at a time, so
//! registry insertion and window append/prune never interleave for an
//! account.

use crate::{
    evaluator::{EvaluatorStats, FraudAssessment, FraudEvaluator},
    types::Amount,
};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct SharedEvaluator {
    inner: Arc<Mutex<FraudEvaluator>>,
}

impl SharedEvaluator {
    pub fn new(evaluator: FraudEvaluator) -> Self {
        Self { inner: Arc::new(Mutex::new(evaluator)) }
    }

    pub fn evaluate(&self, account_id: &str, cheque_number: &str, amount: Amount) -> FraudAssessment {
        self.lock().evaluate(account_id, cheque_number, amount)
    }

    pub fn stats(&self) -> EvaluatorStats {
        self.lock().stats().clone()
    }

    pub fn evict_idle(&self) -> usize {
        self.lock().evict_idle()
    }

    // A panic mid-evaluation leaves state that is still internally
    // consistent per account, so a poisoned lock is recovered.
    fn lock(&self) -> MutexGuard<'_, FraudEvaluator> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
