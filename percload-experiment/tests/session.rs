use std::collections::VecDeque;
use std::fs::File;
use std::time::Duration;

use percload_core::{
    AssetId, BackgroundCategory, ExperimentError, Load, SessionState, Trial, TrialResult,
};
use percload_experiment::{
    AssetPool, CsvResultLog, ExperimentConfig, HeadlessPresenter, InvalidKeyPolicy, LogRow,
    Presenter, Responder, ResponseEvent, ResultLog, ResponseRules, SessionOutcome,
    SimulatedParticipant, TrialOutcome, TrialSequencer, count_by_condition, generate_trial_list,
    read_log, run_session, run_trial,
};
use percload_timing::ManualTimer;
use rand::SeedableRng;
use rand::rngs::StdRng;

struct ScriptedResponder {
    events: VecDeque<ResponseEvent>,
    calls: usize,
}

impl ScriptedResponder {
    fn new(events: Vec<ResponseEvent>) -> Self {
        Self {
            events: events.into(),
            calls: 0,
        }
    }
}

impl Responder for ScriptedResponder {
    fn await_response(&mut self, _onset_ns: u64, _timeout: Option<Duration>) -> ResponseEvent {
        self.calls += 1;
        self.events.pop_front().unwrap_or(ResponseEvent::Timeout)
    }
}

/// Presents fine until the `fail_at`-th stimulus (1-based).
struct CountingPresenter {
    shown: usize,
    fail_at: Option<usize>,
}

impl CountingPresenter {
    fn new() -> Self {
        Self {
            shown: 0,
            fail_at: None,
        }
    }
}

impl Presenter for CountingPresenter {
    fn present(&mut self, background: &AssetId, _letters: &str) -> Result<u64, ExperimentError> {
        if Some(self.shown + 1) == self.fail_at {
            return Err(ExperimentError::Presentation(format!(
                "cannot decode {background}"
            )));
        }
        self.shown += 1;
        Ok(self.shown as u64 * 1_000_000_000)
    }
}

/// Accepts rows until the `fail_at`-th write (1-based).
struct FullDisk {
    written: Vec<TrialResult>,
    fail_at: usize,
    flushes: usize,
}

impl ResultLog for FullDisk {
    fn write_result(&mut self, result: &TrialResult) -> Result<(), ExperimentError> {
        if self.written.len() + 1 == self.fail_at {
            return Err(ExperimentError::Log("disk full".into()));
        }
        self.written.push(result.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ExperimentError> {
        self.flushes += 1;
        Ok(())
    }
}

fn pool() -> AssetPool {
    let mut pool = AssetPool::new();
    for cat in BackgroundCategory::ALL {
        pool.insert(cat, AssetId::new(format!("{cat}/1.png")));
        pool.insert(cat, AssetId::new(format!("{cat}/2.png")));
    }
    pool
}

fn config(seed: u64) -> ExperimentConfig {
    ExperimentConfig {
        rng_seed: Some(seed),
        ..ExperimentConfig::default()
    }
}

fn trial(target_present: bool, letters: &str) -> Trial {
    Trial {
        index: 1,
        load: Load::Low,
        background_category: BackgroundCategory::Ai,
        background_asset: AssetId::from("ai/1.png"),
        target_present,
        letter_string: letters.into(),
        fixation_ms: 3500,
    }
}

fn csv_rows(path: &std::path::Path) -> Vec<LogRow> {
    read_log(File::open(path).unwrap()).unwrap()
}

#[test]
fn full_session_logs_forty_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("p01.csv");
    let config = config(21);

    let trials = generate_trial_list(&config, &pool()).unwrap();
    assert_eq!(trials.len(), 40);
    assert!(count_by_condition(&trials).values().all(|&n| n == 5));

    let log = CsvResultLog::create(&path, "p01", "1").unwrap();
    let mut seq = TrialSequencer::new(trials.clone(), ResponseRules::from_config(&config), log);

    let timer = ManualTimer::new();
    let mut presenter = HeadlessPresenter::new(timer.clone());
    presenter.pace_fixation = true;
    let mut participant = SimulatedParticipant::new(
        timer.clone(),
        StdRng::seed_from_u64(8),
        presenter.screen(),
        ResponseRules::from_config(&config).keys,
    );

    let outcome = run_session(&mut seq, &mut presenter, &mut participant).unwrap();
    assert_eq!(outcome, SessionOutcome::Completed { trials: 40 });
    assert_eq!(seq.state(), SessionState::Finished);
    assert_eq!(presenter.presented.len(), 40);

    let rows = csv_rows(&path);
    assert_eq!(rows.len(), 40);
    for (row, trial) in rows.iter().zip(&trials) {
        assert_eq!(row.trial_index, trial.index);
        assert_eq!(row.letter_string, trial.letter_string);
        assert_eq!(row.background_asset, trial.background_asset);
        assert_eq!(row.participant, "p01");
    }
    let results: Vec<_> = rows.into_iter().map(LogRow::into_result).collect();
    assert_eq!(results, seq.results());
}

#[test]
fn timeout_is_logged_and_session_continues() {
    let config = config(3);
    let trials = generate_trial_list(&config, &pool()).unwrap();
    let mut seq = TrialSequencer::new(trials, ResponseRules::from_config(&config), Vec::new());
    let mut responder = ScriptedResponder::new(vec![
        ResponseEvent::key("z", Duration::from_millis(520)),
        ResponseEvent::Timeout,
        ResponseEvent::key("m", Duration::from_millis(610)),
    ]);

    let outcome = run_session(&mut seq, &mut CountingPresenter::new(), &mut responder).unwrap();
    assert_eq!(outcome, SessionOutcome::Completed { trials: 40 });

    let second = &seq.results()[1];
    assert_eq!(second.response_key, None);
    assert_eq!(second.reaction_time_ms, None);
    assert!(!second.correct);
    assert_eq!(seq.results()[2].response_key.as_deref(), Some("m"));
}

#[test]
fn quit_preserves_rows_already_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quit.csv");
    let config = config(4);
    let trials = generate_trial_list(&config, &pool()).unwrap();
    let log = CsvResultLog::create(&path, "p02", "1").unwrap();
    let mut seq = TrialSequencer::new(trials, ResponseRules::from_config(&config), log);
    let mut responder = ScriptedResponder::new(vec![
        ResponseEvent::key("z", Duration::from_millis(500)),
        ResponseEvent::key("m", Duration::from_millis(500)),
        ResponseEvent::key("escape", Duration::from_millis(200)),
    ]);
    let mut presenter = CountingPresenter::new();

    let outcome = run_session(&mut seq, &mut presenter, &mut responder).unwrap();
    assert_eq!(
        outcome,
        SessionOutcome::Aborted {
            completed: 2,
            total: 40
        }
    );
    assert_eq!(presenter.shown, 3);
    assert!(seq.is_aborted());
    assert_eq!(csv_rows(&path).len(), 2);
}

#[test]
fn presentation_failure_halts_and_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.csv");
    let config = config(5);
    let trials = generate_trial_list(&config, &pool()).unwrap();
    let log = CsvResultLog::create(&path, "p03", "1").unwrap();
    let mut seq = TrialSequencer::new(trials, ResponseRules::from_config(&config), log);
    let mut presenter = CountingPresenter {
        shown: 0,
        fail_at: Some(3),
    };
    let mut responder = ScriptedResponder::new(vec![
        ResponseEvent::key("z", Duration::from_millis(500)),
        ResponseEvent::key("z", Duration::from_millis(500)),
    ]);

    let err = run_session(&mut seq, &mut presenter, &mut responder).unwrap_err();
    assert!(matches!(err, ExperimentError::Presentation(_)));
    assert!(seq.is_finished());
    assert_eq!(responder.calls, 2);
    assert_eq!(csv_rows(&path).len(), 2);
}

#[test]
fn log_failure_aborts_and_flushes() {
    let config = config(6);
    let trials = generate_trial_list(&config, &pool()).unwrap();
    let log = FullDisk {
        written: Vec::new(),
        fail_at: 2,
        flushes: 0,
    };
    let mut seq = TrialSequencer::new(trials, ResponseRules::from_config(&config), log);
    let mut responder = ScriptedResponder::new(vec![
        ResponseEvent::key("z", Duration::from_millis(500)),
        ResponseEvent::key("m", Duration::from_millis(500)),
        ResponseEvent::key("z", Duration::from_millis(500)),
    ]);

    let err = run_session(&mut seq, &mut CountingPresenter::new(), &mut responder).unwrap_err();
    assert!(matches!(err, ExperimentError::Log(_)));
    assert_eq!(seq.state(), SessionState::Finished);
    assert!(seq.is_aborted());
    assert_eq!(seq.results().len(), 1);
    assert!(seq.advance().is_none());
    assert_eq!(responder.calls, 2);

    let log = seq.into_log();
    assert_eq!(log.written.len(), 1);
    assert_eq!(log.flushes, 1);
}

#[test]
fn run_trial_scores_non_target_key_on_absent_trial() {
    let rules = ResponseRules::from_config(&ExperimentConfig::default());
    let mut presenter = CountingPresenter::new();
    let mut responder =
        ScriptedResponder::new(vec![ResponseEvent::key("m", Duration::from_millis(480))]);

    let outcome = run_trial(&trial(false, "KKKKKK"), &rules, &mut presenter, &mut responder)
        .unwrap();
    match outcome {
        TrialOutcome::Completed(result) => {
            assert!(result.correct);
            assert_eq!(result.letter_string, "KKKKKK");
            assert_eq!(result.reaction_time_ms, Some(480.0));
        }
        TrialOutcome::Quit => panic!("trial should complete"),
    }
    assert_eq!(presenter.shown, 1);
}

#[test]
fn run_trial_ignores_stray_keys_without_representing() {
    let rules = ResponseRules::from_config(&ExperimentConfig::default());
    let mut presenter = CountingPresenter::new();
    let mut responder = ScriptedResponder::new(vec![
        ResponseEvent::key("space", Duration::from_millis(100)),
        ResponseEvent::key("q", Duration::from_millis(200)),
        ResponseEvent::key("m", Duration::from_millis(700)),
    ]);

    let outcome = run_trial(&trial(true, "XXXXXX"), &rules, &mut presenter, &mut responder)
        .unwrap();
    assert!(matches!(outcome, TrialOutcome::Completed(ref r) if !r.correct));
    assert_eq!(responder.calls, 3);
    assert_eq!(presenter.shown, 1);
}

#[test]
fn run_trial_counts_stray_key_as_incorrect_when_configured() {
    let config = ExperimentConfig {
        invalid_key_policy: InvalidKeyPolicy::CountAsIncorrect,
        ..ExperimentConfig::default()
    };
    let rules = ResponseRules::from_config(&config);
    let mut responder =
        ScriptedResponder::new(vec![ResponseEvent::key("q", Duration::from_millis(300))]);

    let outcome = run_trial(
        &trial(false, "KKKKKK"),
        &rules,
        &mut CountingPresenter::new(),
        &mut responder,
    )
    .unwrap();
    match outcome {
        TrialOutcome::Completed(result) => {
            assert_eq!(result.response_key.as_deref(), Some("q"));
            assert!(!result.correct);
        }
        TrialOutcome::Quit => panic!("trial should complete"),
    }
}

#[test]
fn run_trial_timeout_is_incorrect() {
    let rules = ResponseRules::from_config(&ExperimentConfig::default());
    let outcome = run_trial(
        &trial(true, "XXXXXX"),
        &rules,
        &mut CountingPresenter::new(),
        &mut ScriptedResponder::new(vec![ResponseEvent::Timeout]),
    )
    .unwrap();
    match outcome {
        TrialOutcome::Completed(result) => {
            assert_eq!(result.response_key, None);
            assert!(!result.correct);
        }
        TrialOutcome::Quit => panic!("timeout is not a quit"),
    }
}
