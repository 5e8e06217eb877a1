use crate::error::{FraudError, FraudResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Longest window or retention span accepted, in days.
pub const MAX_SPAN_DAYS: u32 = 36_500;

// ── Signal weights ─────────────────────────────────────────────────

/// Points each fired signal adds to the severity score.
/// Both duplicate signals share one weight and count once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub duplicate: u32,
    pub abnormal_amount: u32,
    pub suspicious_activity: u32,
    pub velocity: u32,
    pub pattern: u32,
    pub unusual_frequency: u32,
    pub similar_to_recent: u32,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            duplicate: 3,
            abnormal_amount: 2,
            suspicious_activity: 2,
            velocity: 2,
            pattern: 2,
            unusual_frequency: 1,
            similar_to_recent: 1,
        }
    }
}

/// Minimum score for each alert level above Low.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self { critical: 5, high: 3, medium: 2 }
    }
}

// ── Retention ──────────────────────────────────────────────────────

/// Per-account state retention.
///
/// `idle_days: None` keeps every account for the life of the evaluator.
/// With `Some(n)`, accounts untouched for more than `n` days are dropped
/// on the next sweep. A sweep runs every `sweep_every` evaluations and
/// whenever `FraudEvaluator::evict_idle` is called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    pub idle_days: Option<u32>,
    pub sweep_every: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { idle_days: None, sweep_every: 1024 }
    }
}

// ── History store ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// A persisted cheque counts as "recent" inside this many days.
    pub recent_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { recent_days: 30 }
    }
}

// ── Processor ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Cheques above this amount bounce for insufficient funds.
    pub bounce_amount: f64,
    /// Cheque numbers ending in this suffix get a delayed exception but
    /// are still posted. `None` disables it.
    pub delayed_suffix: Option<String>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self { bounce_amount: 50_000.0, delayed_suffix: Some("9".into()) }
    }
}

// ── Top level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudConfig {
    pub abnormal_amount_threshold: f64,
    pub suspicious_activity_multiplier: f64,
    pub amount_variance_threshold: f64,
    pub min_profile_transactions: u64,
    pub history_window_days: u32,
    pub velocity_window_days: u32,
    pub velocity_threshold: usize,
    pub pattern_similarity_threshold: f64,
    pub pattern_min_matches: usize,
    pub similar_amount_threshold: f64,
    pub unusual_frequency_min_total: u64,
    pub unusual_frequency_multiplier: f64,
    pub weights: SignalWeights,
    pub alert_thresholds: AlertThresholds,
    pub retention: RetentionPolicy,
    pub history: HistoryConfig,
    pub processor: ProcessorConfig,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            abnormal_amount_threshold: 10_000.0,
            suspicious_activity_multiplier: 10.0,
            amount_variance_threshold: 0.05,
            min_profile_transactions: 5,
            history_window_days: 90,
            velocity_window_days: 7,
            velocity_threshold: 5,
            pattern_similarity_threshold: 0.95,
            pattern_min_matches: 3,
            similar_amount_threshold: 0.90,
            unusual_frequency_min_total: 10,
            unusual_frequency_multiplier: 3.0,
            weights: SignalWeights::default(),
            alert_thresholds: AlertThresholds::default(),
            retention: RetentionPolicy::default(),
            history: HistoryConfig::default(),
            processor: ProcessorConfig::default(),
        }
    }
}

impl FraudConfig {
    /// Read a JSON config file. Keys left out keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> FraudResult<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Cannot read fraud config {}: {e}", path.display());
                return Err(e.into());
            }
        };
        let config = Self::from_json(&content)?;
        log::debug!("Loaded fraud config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(content: &str) -> FraudResult<Self> {
        let config: FraudConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Cumulative activity above which every evaluation is suspicious.
    pub fn suspicious_activity_limit(&self) -> f64 {
        self.abnormal_amount_threshold * self.suspicious_activity_multiplier
    }

    pub fn validate(&self) -> FraudResult<()> {
        let non_negative = [
            ("abnormal_amount_threshold", self.abnormal_amount_threshold),
            ("suspicious_activity_multiplier", self.suspicious_activity_multiplier),
            ("amount_variance_threshold", self.amount_variance_threshold),
            ("unusual_frequency_multiplier", self.unusual_frequency_multiplier),
            ("processor.bounce_amount", self.processor.bounce_amount),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(field, format!("must be finite and >= 0, got {value}")));
            }
        }

        let ratios = [
            ("pattern_similarity_threshold", self.pattern_similarity_threshold),
            ("similar_amount_threshold", self.similar_amount_threshold),
        ];
        for (field, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("must lie in [0, 1], got {value}")));
            }
        }

        let spans = [
            ("history_window_days", Some(self.history_window_days)),
            ("velocity_window_days", Some(self.velocity_window_days)),
            ("history.recent_days", Some(self.history.recent_days)),
            ("retention.idle_days", self.retention.idle_days),
        ];
        for (field, days) in spans {
            match days {
                Some(d) if d == 0 || d > MAX_SPAN_DAYS => {
                    return Err(invalid(field, format!("must lie in 1..={MAX_SPAN_DAYS} days, got {d}")));
                }
                _ => {}
            }
        }
        if self.processor.delayed_suffix.as_deref() == Some("") {
            return Err(invalid("processor.delayed_suffix", "must not be empty; use null to disable".into()));
        }
        if self.pattern_min_matches == 0 {
            return Err(invalid("pattern_min_matches", "must be at least 1".into()));
        }
        if self.retention.sweep_every == 0 {
            return Err(invalid("retention.sweep_every", "must be at least 1".into()));
        }

        let t = &self.alert_thresholds;
        if !(t.medium <= t.high && t.high <= t.critical) {
            return Err(invalid(
                "alert_thresholds",
                format!("expected medium <= high <= critical, got {}/{}/{}", t.medium, t.high, t.critical),
            ));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> FraudError {
    FraudError::InvalidConfig { field, reason }
}
