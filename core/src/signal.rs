//! Fraud signals, the weighted score and the alert ladder.

use crate::config::{AlertThresholds, SignalWeights};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One independent fraud check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    DuplicateCheque,
    AbnormalAmount,
    SuspiciousActivity,
    Velocity,
    Pattern,
    HistoricalDuplicate,
    UnusualFrequency,
    SimilarToRecent,
}

impl Signal {
    pub const ALL: [Signal; 8] = [
        Signal::DuplicateCheque,
        Signal::AbnormalAmount,
        Signal::SuspiciousActivity,
        Signal::Velocity,
        Signal::Pattern,
        Signal::HistoricalDuplicate,
        Signal::UnusualFrequency,
        Signal::SimilarToRecent,
    ];

    /// Signals that need a history provider to be evaluated.
    pub fn needs_history(&self) -> bool {
        matches!(
            self,
            Signal::HistoricalDuplicate | Signal::UnusualFrequency | Signal::SimilarToRecent
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Signal::DuplicateCheque     => "Duplicate Check",
            Signal::AbnormalAmount      => "Abnormal Amount Check",
            Signal::SuspiciousActivity  => "Suspicious Activity Check",
            Signal::Velocity            => "Velocity Check",
            Signal::Pattern             => "Pattern Analysis",
            Signal::HistoricalDuplicate => "Historical Duplicate Check",
            Signal::UnusualFrequency    => "Unusual Frequency Check",
            Signal::SimilarToRecent     => "Similar Recent Amount Check",
        }
    }
}

/// The eight booleans produced by one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSet {
    pub duplicate_cheque: bool,
    pub abnormal_amount: bool,
    pub suspicious_activity: bool,
    pub velocity: bool,
    pub pattern: bool,
    pub historical_duplicate: bool,
    pub unusual_frequency: bool,
    pub similar_to_recent: bool,
}

impl SignalSet {
    pub fn get(&self, signal: Signal) -> bool {
        match signal {
            Signal::DuplicateCheque     => self.duplicate_cheque,
            Signal::AbnormalAmount      => self.abnormal_amount,
            Signal::SuspiciousActivity  => self.suspicious_activity,
            Signal::Velocity            => self.velocity,
            Signal::Pattern             => self.pattern,
            Signal::HistoricalDuplicate => self.historical_duplicate,
            Signal::UnusualFrequency    => self.unusual_frequency,
            Signal::SimilarToRecent     => self.similar_to_recent,
        }
    }

    /// True if any signal fired. Independent of the weighted score.
    pub fn any(&self) -> bool {
        Signal::ALL.iter().any(|s| self.get(*s))
    }

    pub fn any_duplicate(&self) -> bool {
        self.duplicate_cheque || self.historical_duplicate
    }

    /// Fired signals in declaration order.
    pub fn fired(&self) -> Vec<Signal> {
        Signal::ALL.iter().copied().filter(|s| self.get(*s)).collect()
    }

    pub fn score(&self, weights: &SignalWeights) -> u32 {
        let mut score = 0;
        if self.any_duplicate()       { score += weights.duplicate; }
        if self.abnormal_amount       { score += weights.abnormal_amount; }
        if self.suspicious_activity   { score += weights.suspicious_activity; }
        if self.velocity              { score += weights.velocity; }
        if self.pattern               { score += weights.pattern; }
        if self.unusual_frequency     { score += weights.unusual_frequency; }
        if self.similar_to_recent     { score += weights.similar_to_recent; }
        score
    }
}

/// Severity of an evaluation. Ordered `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertLevel {
    /// Any duplicate signal is Critical regardless of score.
    pub fn classify(signals: &SignalSet, score: u32, thresholds: &AlertThresholds) -> Self {
        if score >= thresholds.critical || signals.any_duplicate() {
            AlertLevel::Critical
        } else if score >= thresholds.high {
            AlertLevel::High
        } else if score >= thresholds.medium {
            AlertLevel::Medium
        } else {
            AlertLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Low      => "low",
            AlertLevel::Medium   => "medium",
            AlertLevel::High     => "high",
            AlertLevel::Critical => "critical",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let upper = match self {
            AlertLevel::Low      => "LOW",
            AlertLevel::Medium   => "MEDIUM",
            AlertLevel::High     => "HIGH",
            AlertLevel::Critical => "CRITICAL",
        };
        f.write_str(upper)
    }
}

/// `1 - |a - b| / max(a, b)`. Two zero amounts give NaN, which never
/// compares above a threshold.
pub fn amount_similarity(a: f64, b: f64) -> f64 {
    1.0 - (a - b).abs() / a.max(b)
}
