//! Human-readable fraud check report for one evaluation.

use crate::{evaluator::FraudAssessment, signal::Signal};
use std::fmt;

pub struct FraudReport<'a> {
    assessment: &'a FraudAssessment,
}

impl<'a> FraudReport<'a> {
    pub fn new(assessment: &'a FraudAssessment) -> Self {
        Self { assessment }
    }
}

fn outcome(fired: bool) -> &'static str {
    if fired { "FAILED" } else { "Passed" }
}

impl fmt::Display for FraudReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.assessment;
        writeln!(f, "===== FRAUD CHECK REPORT =====")?;
        writeln!(
            f,
            "Account: {}, Cheque: {}, Amount: {:.2}",
            a.account_id, a.cheque_number, a.amount
        )?;

        writeln!(f, "--- Basic Checks ---")?;
        for signal in Signal::ALL.iter().filter(|s| !s.needs_history()) {
            writeln!(f, "{}: {}", signal.label(), outcome(a.signals.get(*signal)))?;
        }

        if a.history_consulted {
            writeln!(f, "--- Advanced Checks ---")?;
            for signal in Signal::ALL.iter().filter(|s| s.needs_history()) {
                writeln!(f, "{}: {}", signal.label(), outcome(a.signals.get(*signal)))?;
            }
        }

        writeln!(f, "--- Summary ---")?;
        if a.is_fraudulent {
            writeln!(f, "FRAUD ALERT: Potential fraud detected!")?;
        } else {
            writeln!(f, "No fraud detected.")?;
        }
        writeln!(f, "Score: {}, Alert Level: {}", a.score, a.alert_level)?;
        write!(f, "==============================")
    }
}
