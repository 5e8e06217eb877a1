//! Cheque fraud evaluation.
//!
//! `FraudEvaluator` scores one cheque at a time against per-account state
//! it owns and, optionally, the account's persisted cheque history.
//! `ChequeProcessor` wraps it with the SQLite history store, the exception
//! register and the event log.

pub mod clock;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod history;
pub mod processor;
pub mod report;
pub mod rng;
pub mod shared;
pub mod signal;
pub mod state;
pub mod store;
pub mod stream;
pub mod types;

pub use config::FraudConfig;
pub use error::{FraudError, FraudResult};
pub use evaluator::{FraudAssessment, FraudEvaluator};
pub use history::HistoryProvider;
pub use signal::{AlertLevel, SignalSet};
