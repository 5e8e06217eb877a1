//! Cheque processing against the SQLite history store.

use cheque_fraud_core::{
    clock::ManualClock,
    event::FraudEvent,
    history::ChequeRecord,
    processor::{ChequeOutcome, ChequeProcessor, Notifier},
    config::HistoryConfig,
    store::{ChequeHistoryStore, ChequeStatus, ExceptionKind, FirDetails},
    AlertLevel, FraudConfig, FraudEvaluator, HistoryProvider,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct RecordingNotifier {
    sent: Arc<Mutex<Vec<String>>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, account_id: &str, subject: &str, _body: &str) {
        self.sent.lock().unwrap().push(format!("{account_id}:{subject}"));
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 8, 30, 0).unwrap()
}

fn store(clock: &Arc<ManualClock>) -> ChequeHistoryStore {
    let store = ChequeHistoryStore::in_memory()
        .expect("in-memory store")
        .with_clock(clock.clone());
    store.migrate().expect("migration");
    store
}

fn build(config: FraudConfig) -> (ChequeProcessor, Arc<ManualClock>, RecordingNotifier) {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = Arc::new(ManualClock::new(start()));
    let store = store(&clock);
    let evaluator = FraudEvaluator::new(config).with_clock(clock.clone());
    let notifier = RecordingNotifier::default();
    let processor = ChequeProcessor::new(evaluator, store).with_notifier(Box::new(notifier.clone()));
    (processor, clock, notifier)
}

#[test]
fn clean_cheque_is_posted_to_history() {
    let (mut processor, _, notifier) = build(FraudConfig::default());

    let outcome = processor.process("ACC1", "CHQ001", "USD", 5_000.0).unwrap();
    assert!(outcome.is_processed());
    assert_eq!(outcome.assessment().alert_level, AlertLevel::Low);

    let history = processor.store().history_for("ACC1").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].cheque_number, "CHQ001");
    assert_eq!(history[0].amount, 5_000.0);
    assert_eq!(history[0].occurred_at, start());

    let events = processor.store().events_for_account("ACC1").unwrap();
    let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["cheque_evaluated", "cheque_processed"]);
    assert!(notifier.sent.lock().unwrap().is_empty());
}

#[test]
fn repeated_cheque_is_rejected_with_exception() {
    let (mut processor, _, notifier) = build(FraudConfig::default());

    processor.process("ACC1", "CHQ001", "USD", 5_000.0).unwrap();
    let outcome = processor.process("ACC1", "CHQ001", "USD", 5_000.0).unwrap();

    let ChequeOutcome::Rejected { assessment, exception_id, .. } = outcome else {
        panic!("expected the repeated cheque to be rejected");
    };
    assert!(assessment.signals.duplicate_cheque);
    assert!(assessment.signals.historical_duplicate);
    assert_eq!(assessment.alert_level, AlertLevel::Critical);

    let exceptions = processor.store().exceptions_for_account("ACC1").unwrap();
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].exception_id, exception_id);
    assert_eq!(exceptions[0].kind, "fraud");

    // The rejected copy is not posted.
    assert_eq!(processor.store().total_cheque_count("ACC1").unwrap(), 1);
    assert_eq!(
        notifier.sent.lock().unwrap().as_slice(),
        ["ACC1:Fraud Detection Alert".to_string()]
    );
}

/// A fresh evaluator has an empty registry, so only persisted history
/// can catch a replayed cheque.
#[test]
fn persisted_history_catches_replay_across_restarts() {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = Arc::new(ManualClock::new(start()));
    let store = store(&clock);
    store
        .record_cheque(&ChequeRecord {
            account_id: "ACC9".into(),
            cheque_number: "OLD-1".into(),
            currency: "EUR".into(),
            amount: 320.0,
            occurred_at: start() - Duration::days(60),
        })
        .unwrap();

    let evaluator = FraudEvaluator::new(FraudConfig::default()).with_clock(clock.clone());
    let mut processor = ChequeProcessor::new(evaluator, store);

    let outcome = processor.process("ACC9", "OLD-1", "EUR", 320.0).unwrap();
    let assessment = outcome.assessment();
    assert!(!assessment.signals.duplicate_cheque);
    assert!(assessment.signals.historical_duplicate);
    // Sixty days back is outside the 30-day recent window.
    assert!(!assessment.signals.similar_to_recent);
    assert_eq!(assessment.alert_level, AlertLevel::Critical);
    assert!(matches!(outcome, ChequeOutcome::Rejected { .. }));
}

#[test]
fn similar_recent_amount_from_store() {
    let (mut processor, clock, _) = build(FraudConfig::default());

    processor.process("ACC2", "A", "USD", 2_000.0).unwrap();
    clock.advance_days(10);
    let outcome = processor.process("ACC2", "B", "USD", 1_950.0).unwrap();

    let assessment = outcome.assessment();
    assert!(assessment.signals.similar_to_recent);
    assert_eq!(assessment.alert_level, AlertLevel::Low);
    assert!(matches!(outcome, ChequeOutcome::Rejected { .. }));
}

/// Bouncing only happens when the amount clears fraud checks, which with
/// the default 10000 abnormal threshold never holds above 50000.
#[test]
fn large_clean_cheque_bounces() {
    let config = FraudConfig {
        abnormal_amount_threshold: 100_000.0,
        ..FraudConfig::default()
    };
    let (mut processor, _, notifier) = build(config);

    let outcome = processor.process("ACC3", "BIG", "USD", 60_000.0).unwrap();
    assert!(matches!(outcome, ChequeOutcome::Bounced { .. }));
    assert!(!outcome.assessment().is_fraudulent);

    assert_eq!(processor.store().exception_count(ExceptionKind::Bounced).unwrap(), 1);
    assert_eq!(processor.store().exception_count(ExceptionKind::Fraud).unwrap(), 0);
    assert!(processor.store().history_for("ACC3").unwrap().is_empty());
    assert_eq!(
        notifier.sent.lock().unwrap().as_slice(),
        ["ACC3:Cheque Bounced Notification".to_string()]
    );
}

#[test]
fn default_config_rejects_before_bouncing() {
    let (mut processor, _, _) = build(FraudConfig::default());
    let outcome = processor.process("ACC3", "BIG", "USD", 60_000.0).unwrap();
    assert!(matches!(outcome, ChequeOutcome::Rejected { .. }));
}

#[test]
fn event_payloads_decode() {
    let (mut processor, _, _) = build(FraudConfig::default());
    processor.process("ACC4", "1", "GBP", 75.5).unwrap();
    processor.process("ACC4", "1", "GBP", 75.5).unwrap();

    let events: Vec<FraudEvent> = processor
        .store()
        .events_for_account("ACC4")
        .unwrap()
        .iter()
        .map(|e| e.decode().unwrap())
        .collect();

    assert_eq!(events.len(), 4);
    assert!(matches!(events[1], FraudEvent::ChequeProcessed { ref currency, .. } if currency == "GBP"));
    match &events[2] {
        FraudEvent::ChequeEvaluated { alert_level, score, .. } => {
            assert_eq!(*alert_level, AlertLevel::Critical);
            // Local duplicate, historical duplicate and similar-to-recent.
            assert_eq!(*score, 7);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(matches!(events[3], FraudEvent::ChequeRejected { ref reason, .. } if reason == "fraud"));
    assert_eq!(processor.store().event_count("cheque_evaluated").unwrap(), 2);
}

#[test]
fn records_in_period_spans_accounts() {
    let (mut processor, clock, _) = build(FraudConfig::default());

    processor.process("A", "1", "USD", 10.0).unwrap();
    clock.advance_days(5);
    processor.process("B", "1", "USD", 900.0).unwrap();
    clock.advance_days(5);
    processor.process("C", "1", "USD", 4_000.0).unwrap();

    let window = processor
        .store()
        .records_in_period(start() + Duration::days(1), start() + Duration::days(6))
        .unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].account_id, "B");

    let all = processor
        .store()
        .records_in_period(start(), start() + Duration::days(30))
        .unwrap();
    assert_eq!(all.len(), 3);
}

fn posted_then_recent_count(config: FraudConfig, days_later: i64) -> u64 {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = Arc::new(ManualClock::new(start()));
    let processor = ChequeProcessor::from_config(config, store(&clock));
    processor
        .store()
        .record_cheque(&ChequeRecord {
            account_id: "ACC5".into(),
            cheque_number: "R1".into(),
            currency: "USD".into(),
            amount: 100.0,
            occurred_at: start(),
        })
        .unwrap();
    clock.advance_days(days_later);
    processor.store().recent_cheque_count("ACC5").unwrap()
}

/// `history.recent_days` reaches the store through `from_config`.
#[test]
fn processor_from_config_applies_recent_window() {
    let mut short = FraudConfig::default();
    short.history.recent_days = 3;

    assert_eq!(posted_then_recent_count(short.clone(), 2), 1);
    assert_eq!(posted_then_recent_count(short, 4), 0);
    assert_eq!(posted_then_recent_count(FraudConfig::default(), 4), 1);
}

#[test]
fn store_recent_window_follows_history_config() {
    let clock = Arc::new(ManualClock::new(start()));
    let store = store(&clock).with_history_config(&HistoryConfig { recent_days: 3 });
    store
        .record_cheque(&ChequeRecord {
            account_id: "ACC6".into(),
            cheque_number: "R1".into(),
            currency: "USD".into(),
            amount: 1_000.0,
            occurred_at: start(),
        })
        .unwrap();

    assert!(store.has_similar_recent_cheque("ACC6", 1_000.0, 0.9).unwrap());
    clock.advance_days(4);
    assert_eq!(store.recent_cheque_count("ACC6").unwrap(), 0);
    assert_eq!(store.total_cheque_count("ACC6").unwrap(), 1);
    assert!(!store.has_similar_recent_cheque("ACC6", 1_000.0, 0.9).unwrap());
}

/// A number ending in 9 gets a delayed exception but is still posted.
#[test]
fn delayed_suffix_records_exception_and_posts() {
    let (mut processor, _, notifier) = build(FraudConfig::default());

    let outcome = processor.process("ACC7", "CHQ009", "USD", 750.0).unwrap();
    let ChequeOutcome::Processed { status, delayed_exception, .. } = &outcome else {
        panic!("a delayed cheque is still processed");
    };
    assert_eq!(*status, ChequeStatus::Processed);
    let delayed_id = delayed_exception.clone().expect("delayed exception id");

    let exceptions = processor.store().exceptions_for_account("ACC7").unwrap();
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].exception_id, delayed_id);
    assert_eq!(exceptions[0].kind, "delayed");
    assert_eq!(processor.store().history_for("ACC7").unwrap().len(), 1);
    assert!(notifier.sent.lock().unwrap().is_empty());

    let types: Vec<_> = processor
        .store()
        .events_for_account("ACC7")
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(types, vec!["cheque_evaluated", "cheque_delayed", "cheque_processed"]);

    let plain = processor.process("ACC7", "CHQ010", "USD", 20.0).unwrap();
    assert!(matches!(plain, ChequeOutcome::Processed { delayed_exception: None, .. }));
}

#[test]
fn delayed_suffix_can_be_disabled() {
    let mut config = FraudConfig::default();
    config.processor.delayed_suffix = None;
    let (mut processor, _, _) = build(config);

    processor.process("ACC7", "CHQ009", "USD", 750.0).unwrap();
    assert_eq!(processor.store().exception_count(ExceptionKind::Delayed).unwrap(), 0);
}

/// Issued on first sight, processed once posted; rejection leaves it issued.
#[test]
fn status_follows_cheque_lifecycle() {
    let (mut processor, _, _) = build(FraudConfig::default());

    let posted = processor.process("ACC8", "S1", "USD", 300.0).unwrap();
    assert_eq!(posted.status(), ChequeStatus::Processed);
    assert_eq!(processor.store().status_of("ACC8", "S1").unwrap(), Some(ChequeStatus::Processed));

    let big = processor.process("ACC8", "S2", "USD", 20_000.0).unwrap();
    assert!(matches!(big, ChequeOutcome::Rejected { .. }));
    assert_eq!(big.status(), ChequeStatus::Issued);
    assert_eq!(processor.store().status_of("ACC8", "S2").unwrap(), Some(ChequeStatus::Issued));

    assert_eq!(processor.store().status_of("ACC8", "never").unwrap(), None);
}

#[test]
fn cancel_marks_cheque_canceled() {
    let (mut processor, _, _) = build(FraudConfig::default());

    processor.process("ACC8", "S1", "USD", 300.0).unwrap();
    processor.cancel("ACC8", "S1").unwrap();
    processor.cancel("ACC8", "UNSEEN").unwrap();

    assert_eq!(processor.store().status_of("ACC8", "S1").unwrap(), Some(ChequeStatus::Canceled));
    assert_eq!(processor.store().status_of("ACC8", "UNSEEN").unwrap(), Some(ChequeStatus::Canceled));
    assert_eq!(processor.store().status_count(ChequeStatus::Canceled).unwrap(), 2);
    assert_eq!(
        processor.store().all_statuses().unwrap(),
        vec![
            ("ACC8".to_string(), "S1".to_string(), ChequeStatus::Canceled),
            ("ACC8".to_string(), "UNSEEN".to_string(), ChequeStatus::Canceled),
        ]
    );
    assert_eq!(processor.store().event_count("cheque_canceled").unwrap(), 2);
}

fn fir() -> FirDetails {
    FirDetails {
        fir_number: "FIR-2024-118".into(),
        police_station: "Central".into(),
        fir_date: NaiveDate::from_ymd_opt(2024, 9, 10).unwrap(),
        remarks: "Drawer unreachable".into(),
    }
}

/// FIR details attach to bounced exceptions only.
#[test]
fn fir_details_attach_to_bounced_cheques_only() {
    let config = FraudConfig {
        abnormal_amount_threshold: 100_000.0,
        ..FraudConfig::default()
    };
    let (mut processor, _, _) = build(config);

    processor.process("ACC3", "BIG", "USD", 60_000.0).unwrap();
    processor.process("ACC3", "BIG", "USD", 60_000.0).unwrap();
    processor.process("ACC3", "OK", "USD", 100.0).unwrap();

    assert!(processor.record_fir_details("ACC3", "BIG", &fir()).unwrap());
    // The second copy was a fraud rejection, and OK never bounced.
    assert!(!processor.record_fir_details("ACC3", "OK", &fir()).unwrap());
    assert!(!processor.record_fir_details("ACC9", "BIG", &fir()).unwrap());

    let exceptions = processor.store().exceptions_for_account("ACC3").unwrap();
    let with_fir: Vec<_> = exceptions.iter().filter(|e| e.fir.is_some()).collect();
    assert_eq!(with_fir.len(), 1);
    assert_eq!(with_fir[0].kind, "bounced");
    assert_eq!(processor.store().fir_details("ACC3", "BIG").unwrap(), Some(fir()));
    assert_eq!(processor.store().fir_details("ACC3", "OK").unwrap(), None);
}
