//! Shared primitive types used across the fraud evaluator.

/// Opaque account key. Format is never validated.
pub type AccountId = String;

/// Cheque number as printed on the instrument.
pub type ChequeNumber = String;

/// Monetary amount in the account's base currency.
pub type Amount = f64;

/// Stable identifier for a persisted event or exception row.
pub type EntityId = String;
