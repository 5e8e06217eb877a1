//! Cheque fraud evaluator.
//!
//! An evaluation is two steps:
//!   1. record: fold the cheque into the account's state (registry,
//!      activity total, 90-day history, profile, 7-day velocity window).
//!   2. assess: compute the eight signals against the post-record state
//!      and, when attached, the persisted history.
//!
//! Recording happens on every call, whatever the signals say, so
//! evaluating the same cheque twice never gives the same answer.

use crate::{
    clock::{Clock, SystemClock},
    config::FraudConfig,
    history::HistoryProvider,
    report::FraudReport,
    signal::{amount_similarity, AlertLevel, SignalSet},
    state::AccountState,
    types::{AccountId, Amount, ChequeNumber},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Months of history the unusual-frequency baseline averages over.
const FREQUENCY_BASELINE_MONTHS: f64 = 3.0;

// ── Results ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAssessment {
    pub account_id: AccountId,
    pub cheque_number: ChequeNumber,
    pub amount: Amount,
    pub evaluated_at: DateTime<Utc>,
    pub signals: SignalSet,
    pub score: u32,
    pub alert_level: AlertLevel,
    /// Any signal fired. Not derived from the score.
    pub is_fraudulent: bool,
    pub history_consulted: bool,
}

/// What the record step observed before it mutated state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recorded {
    pub seen_before: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorStats {
    pub total: u64,
    pub flagged: u64,
    /// Indexed by AlertLevel order.
    pub by_level: [u64; 4],
}

impl EvaluatorStats {
    pub fn count(&self, level: AlertLevel) -> u64 {
        self.by_level[level.index()]
    }

    fn observe(&mut self, assessment: &FraudAssessment) {
        self.total += 1;
        if assessment.is_fraudulent {
            self.flagged += 1;
        }
        self.by_level[assessment.alert_level.index()] += 1;
    }
}

// ── Evaluator ────────────────────────────────────────────────────────────────

pub struct FraudEvaluator {
    config: FraudConfig,
    clock: Arc<dyn Clock>,
    history: Option<Box<dyn HistoryProvider>>,
    accounts: HashMap<AccountId, AccountState>,
    stats: EvaluatorStats,
    since_sweep: u64,
}

impl FraudEvaluator {
    pub fn new(config: FraudConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            history: None,
            accounts: HashMap::new(),
            stats: EvaluatorStats::default(),
            since_sweep: 0,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_history(mut self, history: Box<dyn HistoryProvider>) -> Self {
        self.history = Some(history);
        self
    }

    /// Attach or detach the history provider. `None` disables the
    /// history-backed signals.
    pub fn set_history(&mut self, history: Option<Box<dyn HistoryProvider>>) {
        self.history = history;
    }

    pub fn has_history(&self) -> bool {
        self.history.is_some()
    }

    pub fn config(&self) -> &FraudConfig {
        &self.config
    }

    pub fn stats(&self) -> &EvaluatorStats {
        &self.stats
    }

    pub fn account(&self, account_id: &str) -> Option<&AccountState> {
        self.accounts.get(account_id)
    }

    pub fn tracked_accounts(&self) -> usize {
        self.accounts.len()
    }

    /// Evaluate against the attached history provider, if any.
    pub fn evaluate(
        &mut self,
        account_id: &str,
        cheque_number: &str,
        amount: Amount,
    ) -> FraudAssessment {
        let history = self.history.take();
        let assessment = self.evaluate_with(account_id, cheque_number, amount, history.as_deref());
        self.history = history;
        assessment
    }

    /// Evaluate against an explicit history provider, ignoring the
    /// attached one.
    pub fn evaluate_with(
        &mut self,
        account_id: &str,
        cheque_number: &str,
        amount: Amount,
        history: Option<&dyn HistoryProvider>,
    ) -> FraudAssessment {
        let recorded = self.record(account_id, cheque_number, amount);
        let signals = self.assess(account_id, cheque_number, amount, recorded, history);
        let score = signals.score(&self.config.weights);
        let alert_level = AlertLevel::classify(&signals, score, &self.config.alert_thresholds);

        let assessment = FraudAssessment {
            account_id: account_id.to_string(),
            cheque_number: cheque_number.to_string(),
            amount,
            evaluated_at: recorded.at,
            signals,
            score,
            alert_level,
            is_fraudulent: signals.any(),
            history_consulted: history.is_some(),
        };

        log::debug!("\n{}", FraudReport::new(&assessment));
        if assessment.is_fraudulent {
            log::warn!(
                "Fraud alert: account={account_id} cheque={cheque_number} amount={amount:.2} level={alert_level} signals={:?}",
                signals.fired()
            );
        } else {
            log::info!("Cheque {cheque_number} on {account_id} passed fraud checks");
        }

        self.stats.observe(&assessment);
        self.since_sweep += 1;
        if self.since_sweep >= self.config.retention.sweep_every {
            self.since_sweep = 0;
            self.evict_idle();
        }

        assessment
    }

    /// Fold one cheque into the account's state. Creates the account on
    /// first sight.
    pub fn record(&mut self, account_id: &str, cheque_number: &str, amount: Amount) -> Recorded {
        let now = self.clock.now();
        let history_days = self.config.history_window_days;
        let velocity_days = self.config.velocity_window_days;
        let state = self
            .accounts
            .entry(account_id.to_string())
            .or_insert_with(|| AccountState::new(history_days, velocity_days, now));

        let seen_before = state.register_cheque(cheque_number);
        state.record_activity(amount, now);
        state.record_velocity(amount, now);
        state.last_seen = now;

        Recorded { seen_before, at: now }
    }

    /// Compute signals for a cheque already passed through `record`.
    /// Reads state only.
    pub fn assess(
        &self,
        account_id: &str,
        cheque_number: &str,
        amount: Amount,
        recorded: Recorded,
        history: Option<&dyn HistoryProvider>,
    ) -> SignalSet {
        let mut signals = SignalSet {
            duplicate_cheque: recorded.seen_before,
            abnormal_amount: amount > self.config.abnormal_amount_threshold,
            ..Default::default()
        };

        if let Some(state) = self.accounts.get(account_id) {
            signals.suspicious_activity = self.is_suspicious(state, amount);
            signals.velocity = state.velocity.len() > self.config.velocity_threshold;
            signals.pattern = self.is_pattern(state, amount);
        }

        if let Some(history) = history {
            signals.historical_duplicate = self.is_historical_duplicate(history, account_id, cheque_number);
            signals.unusual_frequency = self.is_unusual_frequency(history, account_id);
            signals.similar_to_recent = self.is_similar_to_recent(history, account_id, amount);
        }

        signals
    }

    /// Drop accounts idle for longer than the retention policy allows.
    /// Returns how many were dropped.
    pub fn evict_idle(&mut self) -> usize {
        let Some(idle_days) = self.config.retention.idle_days else {
            return 0;
        };
        let Some(cutoff) = self.clock.now().checked_sub_signed(Duration::days(i64::from(idle_days))) else {
            return 0;
        };
        let before = self.accounts.len();
        self.accounts.retain(|_, state| state.last_seen >= cutoff);
        let evicted = before - self.accounts.len();
        if evicted > 0 {
            log::info!("Evicted {evicted} idle accounts (idle > {idle_days} days)");
        }
        evicted
    }

    // ── Signals ──────────────────────────────────────────────────────────────

    fn is_suspicious(&self, state: &AccountState, amount: Amount) -> bool {
        if state.activity_total > self.config.suspicious_activity_limit() {
            return true;
        }

        let profile = &state.profile;
        if profile.transaction_count < self.config.min_profile_transactions {
            return false;
        }
        match profile.average() {
            Some(avg) => {
                let variance = (amount - avg).abs() / avg;
                variance > self.config.amount_variance_threshold && amount > avg
            }
            None => false,
        }
    }

    fn is_pattern(&self, state: &AccountState, amount: Amount) -> bool {
        let min_matches = self.config.pattern_min_matches;
        if state.velocity.len() < min_matches {
            return false;
        }
        let similar = state
            .velocity
            .amounts()
            .filter(|past| amount_similarity(*past, amount) > self.config.pattern_similarity_threshold)
            .count();
        similar >= min_matches
    }

    fn is_historical_duplicate(
        &self,
        history: &dyn HistoryProvider,
        account_id: &str,
        cheque_number: &str,
    ) -> bool {
        match history.cheque_numbers(account_id) {
            Ok(numbers) => numbers.iter().any(|n| n == cheque_number),
            Err(e) => {
                log::warn!("History lookup failed for {account_id}: {e}; historical duplicate check skipped");
                false
            }
        }
    }

    fn is_unusual_frequency(&self, history: &dyn HistoryProvider, account_id: &str) -> bool {
        let counts = history
            .total_cheque_count(account_id)
            .and_then(|total| Ok((total, history.recent_cheque_count(account_id)?)));
        match counts {
            Ok((total, recent)) => {
                if total < self.config.unusual_frequency_min_total {
                    return false;
                }
                let monthly_average = total as f64 / FREQUENCY_BASELINE_MONTHS;
                recent as f64 > monthly_average * self.config.unusual_frequency_multiplier
            }
            Err(e) => {
                log::warn!("History lookup failed for {account_id}: {e}; frequency check skipped");
                false
            }
        }
    }

    fn is_similar_to_recent(
        &self,
        history: &dyn HistoryProvider,
        account_id: &str,
        amount: Amount,
    ) -> bool {
        history
            .has_similar_recent_cheque(account_id, amount, self.config.similar_amount_threshold)
            .unwrap_or_else(|e| {
                log::warn!("History lookup failed for {account_id}: {e}; similar amount check skipped");
                false
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::RetentionPolicy;
    use chrono::TimeZone;

    fn evaluator() -> (FraudEvaluator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap(),
        ));
        let evaluator = FraudEvaluator::new(FraudConfig::default()).with_clock(clock.clone());
        (evaluator, clock)
    }

    #[test]
    fn record_then_assess_matches_evaluate() {
        let (mut split, _) = evaluator();
        let recorded = split.record("A", "1", 250.0);
        assert!(!recorded.seen_before);
        let signals = split.assess("A", "1", 250.0, recorded, None);

        let (mut whole, _) = evaluator();
        let assessment = whole.evaluate("A", "1", 250.0);
        assert_eq!(signals, assessment.signals);
    }

    #[test]
    fn assess_without_record_sees_no_state() {
        let (evaluator, clock) = evaluator();
        let recorded = Recorded { seen_before: false, at: clock.now() };
        let signals = evaluator.assess("ghost", "1", 20_000.0, recorded, None);
        assert!(signals.abnormal_amount);
        assert!(!signals.velocity && !signals.pattern && !signals.suspicious_activity);
        assert_eq!(evaluator.tracked_accounts(), 0);
    }

    #[test]
    fn profile_spike_is_suspicious_after_five_transactions() {
        let (mut evaluator, clock) = evaluator();
        // Spread across weeks so velocity and pattern stay quiet.
        for (i, amount) in [100.0, 100.0, 100.0, 100.0].iter().enumerate() {
            let a = evaluator.evaluate("A", &format!("c{i}"), *amount);
            assert!(!a.signals.suspicious_activity);
            clock.advance_days(8);
        }
        // Fifth transaction: average (100*4 + 200) / 5 = 120, 200 is 66% above.
        let spike = evaluator.evaluate("A", "c4", 200.0);
        assert!(spike.signals.suspicious_activity);
        assert_eq!(spike.alert_level, AlertLevel::Medium);
    }

    #[test]
    fn below_average_amount_is_not_suspicious() {
        let (mut evaluator, clock) = evaluator();
        for i in 0..5 {
            evaluator.evaluate("A", &format!("c{i}"), 1000.0);
            clock.advance_days(8);
        }
        let low = evaluator.evaluate("A", "c5", 10.0);
        assert!(!low.signals.suspicious_activity);
    }

    #[test]
    fn stats_count_levels() {
        let (mut evaluator, _) = evaluator();
        evaluator.evaluate("A", "1", 100.0);
        evaluator.evaluate("A", "1", 100.0);
        evaluator.evaluate("B", "9", 20_000.0);

        let stats = evaluator.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.flagged, 2);
        assert_eq!(stats.count(AlertLevel::Low), 1);
        assert_eq!(stats.count(AlertLevel::Medium), 1);
        assert_eq!(stats.count(AlertLevel::Critical), 1);
    }

    #[test]
    fn idle_accounts_evicted_when_policy_set() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap(),
        ));
        let config = FraudConfig {
            retention: RetentionPolicy { idle_days: Some(30), sweep_every: 1024 },
            ..FraudConfig::default()
        };
        let mut evaluator = FraudEvaluator::new(config).with_clock(clock.clone());

        evaluator.evaluate("old", "1", 10.0);
        clock.advance_days(31);
        evaluator.evaluate("new", "1", 10.0);
        assert_eq!(evaluator.tracked_accounts(), 2);

        assert_eq!(evaluator.evict_idle(), 1);
        assert!(evaluator.account("old").is_none());
        assert!(evaluator.account("new").is_some());

        // State is gone, so the old cheque number is no longer a duplicate.
        let again = evaluator.evaluate("old", "1", 10.0);
        assert!(!again.signals.duplicate_cheque);
    }

    #[test]
    fn automatic_sweep_runs_every_n_evaluations() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap(),
        ));
        let config = FraudConfig {
            retention: RetentionPolicy { idle_days: Some(1), sweep_every: 2 },
            ..FraudConfig::default()
        };
        let mut evaluator = FraudEvaluator::new(config).with_clock(clock.clone());

        evaluator.evaluate("a", "1", 10.0);
        clock.advance_days(2);
        evaluator.evaluate("b", "1", 10.0);
        assert_eq!(evaluator.tracked_accounts(), 1);
    }

    /// Configs built in code skip validation; oversized spans must still
    /// leave evaluation total.
    #[test]
    fn oversized_spans_do_not_panic() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap(),
        ));
        let config = FraudConfig {
            velocity_window_days: u32::MAX,
            history_window_days: 100_000_000,
            retention: RetentionPolicy { idle_days: Some(u32::MAX), sweep_every: 1 },
            ..FraudConfig::default()
        };
        let mut evaluator = FraudEvaluator::new(config).with_clock(clock.clone());

        evaluator.evaluate("A", "1", 10.0);
        clock.advance_days(400);
        let a = evaluator.evaluate("A", "2", 10.0);
        assert_eq!(evaluator.account("A").unwrap().velocity.len(), 2);
        assert!(!a.signals.duplicate_cheque);
        assert_eq!(evaluator.evict_idle(), 0);
    }

    #[test]
    fn default_policy_never_evicts() {
        let (mut evaluator, clock) = evaluator();
        evaluator.evaluate("a", "1", 10.0);
        clock.advance_days(3650);
        assert_eq!(evaluator.evict_idle(), 0);
        assert_eq!(evaluator.tracked_accounts(), 1);
    }
}
