//! Events written to the fraud event log.
//!
//! Variants are appended, never removed or reordered: stored payloads
//! must keep deserializing.

use crate::{
    signal::{AlertLevel, Signal},
    types::{AccountId, Amount, ChequeNumber, EntityId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FraudEvent {
    ChequeEvaluated {
        account_id: AccountId,
        cheque_number: ChequeNumber,
        amount: Amount,
        score: u32,
        alert_level: AlertLevel,
        fired: Vec<Signal>,
    },
    ChequeRejected {
        account_id: AccountId,
        cheque_number: ChequeNumber,
        exception_id: EntityId,
        reason: String,
    },
    ChequeProcessed {
        account_id: AccountId,
        cheque_number: ChequeNumber,
        currency: String,
        amount: Amount,
    },
    ChequeDelayed {
        account_id: AccountId,
        cheque_number: ChequeNumber,
        exception_id: EntityId,
    },
    ChequeCanceled {
        account_id: AccountId,
        cheque_number: ChequeNumber,
    },
}

impl FraudEvent {
    pub fn account_id(&self) -> &str {
        match self {
            FraudEvent::ChequeEvaluated { account_id, .. }
            | FraudEvent::ChequeRejected { account_id, .. }
            | FraudEvent::ChequeProcessed { account_id, .. }
            | FraudEvent::ChequeDelayed { account_id, .. }
            | FraudEvent::ChequeCanceled { account_id, .. } => account_id,
        }
    }

    /// Stable name stored in the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            FraudEvent::ChequeEvaluated { .. } => "cheque_evaluated",
            FraudEvent::ChequeRejected { .. }  => "cheque_rejected",
            FraudEvent::ChequeProcessed { .. } => "cheque_processed",
            FraudEvent::ChequeDelayed { .. }   => "cheque_delayed",
            FraudEvent::ChequeCanceled { .. }  => "cheque_canceled",
        }
    }
}

/// A row in fraud_event_log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub account_id: AccountId,
    pub event_type: String,
    pub payload: String, // JSON-serialized FraudEvent
    pub recorded_at: DateTime<Utc>,
}

impl EventLogEntry {
    pub fn from_event(event: &FraudEvent, recorded_at: DateTime<Utc>) -> serde_json::Result<Self> {
        Ok(Self {
            id: None,
            account_id: event.account_id().to_string(),
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(event)?,
            recorded_at,
        })
    }

    pub fn decode(&self) -> serde_json::Result<FraudEvent> {
        serde_json::from_str(&self.payload)
    }
}
