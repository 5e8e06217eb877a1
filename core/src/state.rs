//! Per-account evaluator state.
//!
//! Every account the evaluator has seen owns one AccountState. The two
//! transaction windows are independent: each is appended and pruned on
//! its own schedule and never shares entries with the other.

use crate::types::{Amount, ChequeNumber};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ── Windows ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowEntry {
    pub amount: Amount,
    pub at: DateTime<Utc>,
}

/// How a window decides an entry has aged out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCutoff {
    /// Keep entries whose calendar date is on or after `today - span`.
    CalendarDay,
    /// Keep entries strictly newer than `now - span`.
    Exact,
}

#[derive(Debug, Clone)]
pub struct TransactionWindow {
    span: Duration,
    cutoff: WindowCutoff,
    entries: Vec<WindowEntry>,
}

impl TransactionWindow {
    pub fn new(span_days: u32, cutoff: WindowCutoff) -> Self {
        Self {
            span: Duration::days(i64::from(span_days)),
            cutoff,
            entries: Vec::new(),
        }
    }

    /// Append then drop everything that has aged out relative to `now`.
    pub fn push(&mut self, amount: Amount, now: DateTime<Utc>) {
        self.entries.push(WindowEntry { amount, at: now });
        self.prune(now);
    }

    /// A span reaching past the representable calendar keeps everything.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let span = self.span;
        match self.cutoff {
            WindowCutoff::CalendarDay => {
                if let Some(cutoff) = now.date_naive().checked_sub_signed(span) {
                    self.entries.retain(|e| e.at.date_naive() >= cutoff);
                }
            }
            WindowCutoff::Exact => {
                if let Some(cutoff) = now.checked_sub_signed(span) {
                    self.entries.retain(|e| e.at > cutoff);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn amounts(&self) -> impl Iterator<Item = Amount> + '_ {
        self.entries.iter().map(|e| e.amount)
    }

    pub fn entries(&self) -> &[WindowEntry] {
        &self.entries
    }
}

// ── Profile ──────────────────────────────────────────────────────────────────

/// Running statistics over every amount evaluated for an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub total_amount: Amount,
    pub transaction_count: u64,
    pub max_amount: Amount,
    pub min_amount: Amount,
}

impl Default for AccountProfile {
    fn default() -> Self {
        Self {
            total_amount: 0.0,
            transaction_count: 0,
            max_amount: 0.0,
            min_amount: f64::MAX,
        }
    }
}

impl AccountProfile {
    pub fn record(&mut self, amount: Amount) {
        self.total_amount += amount;
        self.transaction_count += 1;
        self.max_amount = self.max_amount.max(amount);
        self.min_amount = self.min_amount.min(amount);
    }

    pub fn average(&self) -> Option<Amount> {
        (self.transaction_count > 0).then(|| self.total_amount / self.transaction_count as f64)
    }
}

// ── Account ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AccountState {
    /// Cheque numbers seen by this evaluator. Not the persisted history.
    pub registry: HashSet<ChequeNumber>,
    /// Sum of every amount ever evaluated.
    pub activity_total: Amount,
    /// Suspicious-activity history.
    pub history: TransactionWindow,
    pub profile: AccountProfile,
    /// Velocity and pattern window.
    pub velocity: TransactionWindow,
    pub last_seen: DateTime<Utc>,
}

impl AccountState {
    pub fn new(history_days: u32, velocity_days: u32, now: DateTime<Utc>) -> Self {
        Self {
            registry: HashSet::new(),
            activity_total: 0.0,
            history: TransactionWindow::new(history_days, WindowCutoff::Exact),
            profile: AccountProfile::default(),
            velocity: TransactionWindow::new(velocity_days, WindowCutoff::CalendarDay),
            last_seen: now,
        }
    }

    /// Insert the cheque number. Returns true if it was already present.
    pub fn register_cheque(&mut self, cheque_number: &str) -> bool {
        if self.registry.contains(cheque_number) {
            return true;
        }
        self.registry.insert(cheque_number.to_string());
        false
    }

    pub fn record_activity(&mut self, amount: Amount, now: DateTime<Utc>) {
        self.activity_total += amount;
        self.history.push(amount, now);
        self.profile.record(amount);
    }

    pub fn record_velocity(&mut self, amount: Amount, now: DateTime<Utc>) {
        self.velocity.push(amount, now);
    }
}
