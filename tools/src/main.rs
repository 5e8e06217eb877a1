//! cheque-runner: feeds cheques through the fraud processor.
//!
//! Usage:
//!   cheque-runner --seed 12345 --cheques 5000 --accounts 50 --db run.db
//!   cheque-runner --config fraud.json --ipc-mode

use anyhow::Result;
use cheque_fraud_core::{
    evaluator::EvaluatorStats,
    processor::{ChequeOutcome, ChequeProcessor},
    store::{ChequeHistoryStore, ChequeStatus, ExceptionKind},
    stream::{ChequeStream, StreamProfile},
    AlertLevel, FraudConfig,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Evaluate {
        account_id: String,
        cheque_number: String,
        amount: f64,
        #[serde(default = "default_currency")]
        currency: String,
    },
    Cancel {
        account_id: String,
        cheque_number: String,
    },
    Stats,
    Quit,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(serde::Serialize)]
struct RunStats {
    evaluated: u64,
    flagged: u64,
    low: u64,
    medium: u64,
    high: u64,
    critical: u64,
    fraud_exceptions: i64,
    bounced: i64,
    delayed: i64,
    canceled: i64,
    tracked_accounts: usize,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let cheques = parse_arg(&args, "--cheques", 1000u64);
    let accounts = parse_arg(&args, "--accounts", StreamProfile::default().accounts);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");

    let config = match flag_value(&args, "--config") {
        Some(path) => FraudConfig::load(path)?,
        None => FraudConfig::default(),
    };
    config.validate()?;

    if !ipc_mode {
        println!("Cheque fraud runner");
        println!("  started:   {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
        println!("  seed:      {seed}");
        println!("  cheques:   {cheques}");
        println!("  accounts:  {accounts}");
        println!("  db:        {db}");
        println!();
    }

    let store = if db == ":memory:" {
        ChequeHistoryStore::in_memory()?
    } else {
        ChequeHistoryStore::open(db)?
    };
    store.migrate()?;

    let mut processor = ChequeProcessor::from_config(config, store);

    if ipc_mode {
        run_ipc_loop(&mut processor)?;
    } else {
        let profile = StreamProfile { accounts, ..StreamProfile::default() };
        for cheque in ChequeStream::new(seed, profile).take(cheques as usize) {
            let outcome = processor.process(
                &cheque.account_id,
                &cheque.cheque_number,
                &cheque.currency,
                cheque.amount,
            )?;
            log::debug!(
                "{} {} -> {} ({})",
                cheque.account_id,
                cheque.cheque_number,
                outcome.status(),
                outcome.assessment().alert_level
            );
        }
        print_summary(&processor)?;
    }

    Ok(())
}

fn run_ipc_loop(processor: &mut ChequeProcessor) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Bad IPC line {:?}: {e}", buffer.trim_end());
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Evaluate { account_id, cheque_number, amount, currency } => {
                let outcome: ChequeOutcome =
                    processor.process(&account_id, &cheque_number, &currency, amount)?;
                writeln!(stdout, "{}", serde_json::to_string(&outcome)?)?;
            }
            IpcCommand::Cancel { account_id, cheque_number } => {
                processor.cancel(&account_id, &cheque_number)?;
                let reply = serde_json::json!({
                    "account_id": account_id,
                    "cheque_number": cheque_number,
                    "status": ChequeStatus::Canceled,
                });
                writeln!(stdout, "{}", reply)?;
            }
            IpcCommand::Stats => {
                let stats = run_stats(processor)?;
                writeln!(stdout, "{}", serde_json::to_string(&stats)?)?;
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

fn run_stats(processor: &ChequeProcessor) -> Result<RunStats> {
    let stats: &EvaluatorStats = processor.evaluator().stats();
    Ok(RunStats {
        evaluated: stats.total,
        flagged: stats.flagged,
        low: stats.count(AlertLevel::Low),
        medium: stats.count(AlertLevel::Medium),
        high: stats.count(AlertLevel::High),
        critical: stats.count(AlertLevel::Critical),
        fraud_exceptions: processor.store().exception_count(ExceptionKind::Fraud)?,
        bounced: processor.store().exception_count(ExceptionKind::Bounced)?,
        delayed: processor.store().exception_count(ExceptionKind::Delayed)?,
        canceled: processor.store().status_count(ChequeStatus::Canceled)?,
        tracked_accounts: processor.evaluator().tracked_accounts(),
    })
}

fn print_summary(processor: &ChequeProcessor) -> Result<()> {
    let stats = run_stats(processor)?;
    let flagged_pct = if stats.evaluated == 0 {
        0.0
    } else {
        stats.flagged as f64 * 100.0 / stats.evaluated as f64
    };

    println!("=== RUN SUMMARY ===");
    println!("  evaluated:        {}", stats.evaluated);
    println!("  flagged:          {} ({flagged_pct:.1}%)", stats.flagged);
    println!("  fraud exceptions: {}", stats.fraud_exceptions);
    println!("  bounced:          {}", stats.bounced);
    println!("  delayed:          {}", stats.delayed);
    println!("  canceled:         {}", stats.canceled);
    println!("  accounts tracked: {}", stats.tracked_accounts);
    println!();
    println!("=== ALERT LEVELS ===");
    println!("  LOW:      {}", stats.low);
    println!("  MEDIUM:   {}", stats.medium);
    println!("  HIGH:     {}", stats.high);
    println!("  CRITICAL: {}", stats.critical);
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}
