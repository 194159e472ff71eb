use log::{debug, error, info, warn};
use percload_core::{ExperimentError, SessionState, Trial, TrialResult};
use std::time::Duration;

use crate::record::ResultLog;
use crate::response::{Resolution, ResponseEvent, ResponseRules, resolve_response};

/// Drives a session one trial at a time:
/// `NotStarted -> Presenting(i) -> AwaitingResponse(i) -> Logging(i) -> Presenting(i+1) | Finished`.
///
/// The sequencer is the only writer of the result log. No transition goes
/// backwards, so no trial is presented twice.
pub struct TrialSequencer<L: ResultLog> {
    trials: Vec<Trial>,
    rules: ResponseRules,
    state: SessionState,
    onset_ns: Option<u64>,
    results: Vec<TrialResult>,
    log: L,
    aborted: bool,
}

impl<L: ResultLog> TrialSequencer<L> {
    pub fn new(trials: Vec<Trial>, rules: ResponseRules, log: L) -> Self {
        Self {
            trials,
            rules,
            state: SessionState::NotStarted,
            onset_ns: None,
            results: Vec::new(),
            log,
            aborted: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn rules(&self) -> &ResponseRules {
        &self.rules
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn current_trial(&self) -> Option<&Trial> {
        self.state.position().and_then(|i| self.trials.get(i))
    }

    /// Onset of the stimulus currently awaiting a response.
    pub fn onset_ns(&self) -> Option<u64> {
        self.onset_ns
    }

    /// Enters the first trial, or finishes straight away for an empty list.
    pub fn start(&mut self) -> Option<&Trial> {
        if self.state != SessionState::NotStarted {
            return None;
        }
        info!("Session started with {} trials", self.trials.len());
        self.enter(0)
    }

    /// Marks the current stimulus as on screen.
    pub fn stimulus_presented(&mut self, onset_ns: u64) -> bool {
        match self.state {
            SessionState::Presenting(i) => {
                self.state = SessionState::AwaitingResponse(i);
                self.onset_ns = Some(onset_ns);
                debug!("Trial {} stimulus onset at {} ns", i + 1, onset_ns);
                true
            }
            _ => false,
        }
    }

    /// True once the response window of the current trial has run out.
    pub fn response_window_elapsed(&self, now_ns: u64) -> bool {
        match (self.state, self.onset_ns, self.rules.timeout) {
            (SessionState::AwaitingResponse(_), Some(onset), Some(timeout)) => {
                Duration::from_nanos(now_ns.saturating_sub(onset)) >= timeout
            }
            _ => false,
        }
    }

    /// Scores and records a response event for the trial awaiting one.
    pub fn respond(&mut self, event: ResponseEvent) -> Result<Resolution, ExperimentError> {
        let Some(trial) = self.awaiting_trial() else {
            return Ok(Resolution::KeepWaiting);
        };
        let resolution = resolve_response(trial, event, &self.rules);
        self.record(resolution)
    }

    /// Applies an already scored resolution.
    ///
    /// `Completed` appends to the log and moves to `Logging`; `Quit` aborts
    /// the session; `KeepWaiting` leaves the state untouched.
    pub fn record(&mut self, resolution: Resolution) -> Result<Resolution, ExperimentError> {
        let SessionState::AwaitingResponse(i) = self.state else {
            return Ok(Resolution::KeepWaiting);
        };
        match &resolution {
            Resolution::KeepWaiting => {}
            Resolution::Quit => {
                info!("Quit requested during trial {}", i + 1);
                self.abort()?;
            }
            Resolution::Completed(result) => {
                self.state = SessionState::Logging(i);
                match (&result.response_key, result.reaction_time_ms) {
                    (Some(key), Some(rt)) => info!(
                        "Trial {} response '{}' RT = {:.3} ms, correct = {}",
                        result.trial_index, key, rt, result.correct
                    ),
                    _ => warn!("Trial {} timed out", result.trial_index),
                }
                if let Err(e) = self.log.write_result(result) {
                    error!("Trial {} could not be logged: {}", result.trial_index, e);
                    if let Err(flush) = self.abort() {
                        warn!("Failed to flush result log: {}", flush);
                    }
                    return Err(e);
                }
                self.results.push(result.clone());
            }
        }
        Ok(resolution)
    }

    /// Leaves `Logging(i)` for the next trial or `Finished`.
    pub fn advance(&mut self) -> Option<&Trial> {
        match self.state {
            SessionState::Logging(i) => self.enter(i + 1),
            _ => None,
        }
    }

    /// Ends the session early. Results logged so far are flushed and kept.
    pub fn abort(&mut self) -> Result<(), ExperimentError> {
        if self.state.is_finished() {
            return Ok(());
        }
        self.state = SessionState::Finished;
        self.onset_ns = None;
        self.aborted = true;
        warn!(
            "Session aborted after {} of {} trials",
            self.results.len(),
            self.trials.len()
        );
        self.log.flush()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn results(&self) -> &[TrialResult] {
        &self.results
    }

    /// `(completed, total)`
    pub fn progress(&self) -> (usize, usize) {
        (self.results.len(), self.trials.len())
    }

    pub fn into_log(self) -> L {
        self.log
    }

    fn awaiting_trial(&self) -> Option<&Trial> {
        match self.state {
            SessionState::AwaitingResponse(i) => self.trials.get(i),
            _ => None,
        }
    }

    fn enter(&mut self, i: usize) -> Option<&Trial> {
        self.onset_ns = None;
        if i < self.trials.len() {
            self.state = SessionState::Presenting(i);
            let trial = &self.trials[i];
            debug!(
                "Trial {} started: {} {} '{}'",
                trial.index, trial.load, trial.background_category, trial.letter_string
            );
            Some(trial)
        } else {
            self.state = SessionState::Finished;
            info!("Session finished: {} trials logged", self.results.len());
            if let Err(e) = self.log.flush() {
                warn!("Failed to flush result log: {}", e);
            }
            None
        }
    }
}
