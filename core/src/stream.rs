//! Seeded generator of cheque traffic for the runner and tests.

use crate::{
    rng::SeededRng,
    types::{AccountId, Amount, ChequeNumber},
};
use serde::{Deserialize, Serialize};

const CURRENCIES: [&str; 4] = ["USD", "USD", "EUR", "GBP"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCheque {
    pub account_id: AccountId,
    pub cheque_number: ChequeNumber,
    pub currency: String,
    pub amount: Amount,
}

#[derive(Debug, Clone)]
pub struct StreamProfile {
    pub accounts: u64,
    /// Pareto minimum and shape for cheque amounts.
    pub amount_min: f64,
    pub amount_alpha: f64,
    /// Probability a cheque reuses a number already issued on the account.
    pub replay_probability: f64,
    /// Probability a cheque repeats the account's previous amount.
    pub repeat_amount_probability: f64,
}

impl Default for StreamProfile {
    fn default() -> Self {
        Self {
            accounts: 20,
            amount_min: 100.0,
            amount_alpha: 1.6,
            replay_probability: 0.03,
            repeat_amount_probability: 0.10,
        }
    }
}

pub struct ChequeStream {
    rng: SeededRng,
    profile: StreamProfile,
    issued: Vec<u64>,
    last_amount: Vec<Option<Amount>>,
}

impl ChequeStream {
    pub fn new(seed: u64, profile: StreamProfile) -> Self {
        let accounts = profile.accounts.max(1) as usize;
        Self {
            rng: SeededRng::new(seed, 0),
            profile,
            issued: vec![0; accounts],
            last_amount: vec![None; accounts],
        }
    }

    fn next_cheque(&mut self) -> GeneratedCheque {
        let idx = self.rng.next_u64_below(self.issued.len() as u64) as usize;

        let number = if self.issued[idx] > 0 && self.rng.chance(self.profile.replay_probability) {
            1 + self.rng.next_u64_below(self.issued[idx])
        } else {
            self.issued[idx] += 1;
            self.issued[idx]
        };

        let amount = match self.last_amount[idx] {
            Some(prev) if self.rng.chance(self.profile.repeat_amount_probability) => prev,
            _ => {
                let raw = self.rng.pareto(self.profile.amount_min, self.profile.amount_alpha);
                (raw * 100.0).round() / 100.0
            }
        };
        self.last_amount[idx] = Some(amount);

        let currency = CURRENCIES[self.rng.next_u64_below(CURRENCIES.len() as u64) as usize];

        GeneratedCheque {
            account_id: format!("ACC{idx:04}"),
            cheque_number: format!("CHQ{number:06}"),
            currency: currency.to_string(),
            amount,
        }
    }
}

impl Iterator for ChequeStream {
    type Item = GeneratedCheque;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_cheque())
    }
}
