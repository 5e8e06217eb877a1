//! Cheque processing step that wraps the evaluator.
//!
//! Order per cheque:
//!   0. Untracked cheques are marked issued.
//!   1. Fraud evaluation against the persisted history.
//!   2. Fraudulent → exception + notification, stop.
//!   3. Over the bounce amount → exception + notification, stop.
//!   4. Delayed suffix → delayed exception, carry on.
//!   5. The cheque is posted to history and marked processed.
//!
//! Every step is appended to the fraud event log.

use crate::{
    config::FraudConfig,
    error::FraudResult,
    evaluator::{FraudAssessment, FraudEvaluator},
    event::FraudEvent,
    history::{ChequeRecord, HistoryProvider},
    store::{ChequeHistoryStore, ChequeStatus, ExceptionKind, FirDetails},
    types::{Amount, EntityId},
};
use serde::{Deserialize, Serialize};

// ── Notifications ────────────────────────────────────────────────────────────

/// Outbound notification to the account holder.
pub trait Notifier: Send {
    fn notify(&self, account_id: &str, subject: &str, body: &str);
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, account_id: &str, subject: &str, body: &str) {
        log::info!("notify {account_id}@bank: [{subject}] {body}");
    }
}

// ── Outcome ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChequeOutcome {
    Processed {
        assessment: FraudAssessment,
        status: ChequeStatus,
        /// Set when the cheque was posted with a delayed exception.
        delayed_exception: Option<EntityId>,
    },
    Rejected {
        assessment: FraudAssessment,
        status: ChequeStatus,
        exception_id: EntityId,
    },
    Bounced {
        assessment: FraudAssessment,
        status: ChequeStatus,
        exception_id: EntityId,
    },
}

impl ChequeOutcome {
    pub fn assessment(&self) -> &FraudAssessment {
        match self {
            ChequeOutcome::Processed { assessment, .. }
            | ChequeOutcome::Rejected { assessment, .. }
            | ChequeOutcome::Bounced { assessment, .. } => assessment,
        }
    }

    /// Cheque status once processing finished.
    pub fn status(&self) -> ChequeStatus {
        match self {
            ChequeOutcome::Processed { status, .. }
            | ChequeOutcome::Rejected { status, .. }
            | ChequeOutcome::Bounced { status, .. } => *status,
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, ChequeOutcome::Processed { .. })
    }
}

// ── Processor ────────────────────────────────────────────────────────────────

pub struct ChequeProcessor {
    evaluator: FraudEvaluator,
    store: ChequeHistoryStore,
    notifier: Box<dyn Notifier>,
    bounce_amount: Amount,
    delayed_suffix: Option<String>,
}

impl ChequeProcessor {
    /// The evaluator is consulted with `store` as its history provider;
    /// any provider already attached to it is ignored.
    pub fn new(evaluator: FraudEvaluator, store: ChequeHistoryStore) -> Self {
        let bounce_amount = evaluator.config().processor.bounce_amount;
        let delayed_suffix = evaluator.config().processor.delayed_suffix.clone();
        Self {
            evaluator,
            store,
            notifier: Box::new(LogNotifier),
            bounce_amount,
            delayed_suffix,
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Build an evaluator and store sharing one config.
    pub fn from_config(config: FraudConfig, store: ChequeHistoryStore) -> Self {
        let store = store.with_history_config(&config.history);
        Self::new(FraudEvaluator::new(config), store)
    }

    pub fn evaluator(&self) -> &FraudEvaluator {
        &self.evaluator
    }

    pub fn store(&self) -> &ChequeHistoryStore {
        &self.store
    }

    pub fn process(
        &mut self,
        account_id: &str,
        cheque_number: &str,
        currency: &str,
        amount: Amount,
    ) -> FraudResult<ChequeOutcome> {
        let status = match self.store.status_of(account_id, cheque_number)? {
            Some(status) => status,
            None => {
                self.store.set_status(account_id, cheque_number, ChequeStatus::Issued)?;
                ChequeStatus::Issued
            }
        };
        log::info!("Processing cheque {cheque_number} for account {account_id}");

        let history: &dyn HistoryProvider = &self.store;
        let assessment = self
            .evaluator
            .evaluate_with(account_id, cheque_number, amount, Some(history));

        self.store.append_event(&FraudEvent::ChequeEvaluated {
            account_id: account_id.to_string(),
            cheque_number: cheque_number.to_string(),
            amount,
            score: assessment.score,
            alert_level: assessment.alert_level,
            fired: assessment.signals.fired(),
        })?;

        if assessment.is_fraudulent {
            let detail = format!(
                "Fraudulent or duplicate cheque detected (level {}, score {})",
                assessment.alert_level, assessment.score
            );
            let exception_id = self.reject(account_id, cheque_number, ExceptionKind::Fraud, &detail)?;
            self.notifier.notify(
                account_id,
                "Fraud Detection Alert",
                &format!("Potential fraud detected for cheque {cheque_number} on account {account_id}."),
            );
            return Ok(ChequeOutcome::Rejected { assessment, status, exception_id });
        }

        if amount > self.bounce_amount {
            let exception_id = self.reject(
                account_id,
                cheque_number,
                ExceptionKind::Bounced,
                "Insufficient funds",
            )?;
            self.notifier.notify(
                account_id,
                "Cheque Bounced Notification",
                &format!("Cheque {cheque_number} for account {account_id} has bounced due to insufficient funds."),
            );
            return Ok(ChequeOutcome::Bounced { assessment, status, exception_id });
        }

        let delayed_exception = match &self.delayed_suffix {
            Some(suffix) if cheque_number.ends_with(suffix.as_str()) => {
                let exception_id = self.store.report_exception(
                    account_id,
                    cheque_number,
                    ExceptionKind::Delayed,
                    "Cheque processing delayed",
                )?;
                self.store.append_event(&FraudEvent::ChequeDelayed {
                    account_id: account_id.to_string(),
                    cheque_number: cheque_number.to_string(),
                    exception_id: exception_id.clone(),
                })?;
                log::info!("Cheque processing delayed for cheque {cheque_number} on {account_id}");
                Some(exception_id)
            }
            _ => None,
        };

        self.store.record_cheque(&ChequeRecord {
            account_id: account_id.to_string(),
            cheque_number: cheque_number.to_string(),
            currency: currency.to_string(),
            amount,
            occurred_at: assessment.evaluated_at,
        })?;
        self.store.set_status(account_id, cheque_number, ChequeStatus::Processed)?;
        self.store.append_event(&FraudEvent::ChequeProcessed {
            account_id: account_id.to_string(),
            cheque_number: cheque_number.to_string(),
            currency: currency.to_string(),
            amount,
        })?;
        log::info!("Cheque {cheque_number} processed for account {account_id}");

        Ok(ChequeOutcome::Processed {
            assessment,
            status: ChequeStatus::Processed,
            delayed_exception,
        })
    }

    /// Mark a cheque canceled, whether or not it has been seen before.
    pub fn cancel(&mut self, account_id: &str, cheque_number: &str) -> FraudResult<()> {
        self.store.set_status(account_id, cheque_number, ChequeStatus::Canceled)?;
        self.store.append_event(&FraudEvent::ChequeCanceled {
            account_id: account_id.to_string(),
            cheque_number: cheque_number.to_string(),
        })?;
        log::info!("Cheque {cheque_number} canceled for account {account_id}");
        Ok(())
    }

    /// Attach a legal complaint to a bounced cheque. Returns false when the
    /// cheque has no bounced exception.
    pub fn record_fir_details(
        &mut self,
        account_id: &str,
        cheque_number: &str,
        fir: &FirDetails,
    ) -> FraudResult<bool> {
        let recorded = self.store.record_fir_details(account_id, cheque_number, fir)?;
        if recorded {
            log::info!("FIR {} recorded for bounced cheque {cheque_number} on {account_id}", fir.fir_number);
        } else {
            log::warn!("No bounced exception for cheque {cheque_number} on {account_id}; FIR not recorded");
        }
        Ok(recorded)
    }

    fn reject(
        &self,
        account_id: &str,
        cheque_number: &str,
        kind: ExceptionKind,
        detail: &str,
    ) -> FraudResult<EntityId> {
        let exception_id = self.store.report_exception(account_id, cheque_number, kind, detail)?;
        self.store.append_event(&FraudEvent::ChequeRejected {
            account_id: account_id.to_string(),
            cheque_number: cheque_number.to_string(),
            exception_id: exception_id.clone(),
            reason: kind.as_str().to_string(),
        })?;
        log::warn!("Cheque {cheque_number} on {account_id} rejected ({}): {detail}", kind.as_str());
        Ok(exception_id)
    }
}
