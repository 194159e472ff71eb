use std::time::Duration;

use log::error;
use percload_core::{AssetId, ExperimentError, Trial, TrialResult};

use crate::record::ResultLog;
use crate::response::{Resolution, ResponseEvent, ResponseRules, resolve_response};
use crate::state::TrialSequencer;

/// Rendering collaborator
pub trait Presenter {
    /// Shows the fixation cross for `duration` before the search display.
    fn show_fixation(&mut self, _duration: Duration) -> Result<(), ExperimentError> {
        Ok(())
    }

    /// Puts the background and letters on screen and returns the onset
    /// timestamp in nanoseconds, once the stimulus is actually visible.
    fn present(&mut self, background: &AssetId, letters: &str) -> Result<u64, ExperimentError>;
}

/// Input collaborator
pub trait Responder {
    /// Blocks until a key is pressed or `timeout` (counted from `onset_ns`)
    /// runs out. Reaction times are measured from `onset_ns`.
    fn await_response(&mut self, onset_ns: u64, timeout: Option<Duration>) -> ResponseEvent;
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrialOutcome {
    Completed(TrialResult),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed { trials: usize },
    Aborted { completed: usize, total: usize },
}

fn collect_response<R: Responder + ?Sized>(
    trial: &Trial,
    onset_ns: u64,
    rules: &ResponseRules,
    responder: &mut R,
) -> Resolution {
    loop {
        let event = responder.await_response(onset_ns, rules.timeout);
        match resolve_response(trial, event, rules) {
            Resolution::KeepWaiting => continue,
            resolution => return resolution,
        }
    }
}

/// Fixation, then the search display. Returns the stimulus onset.
pub fn present_trial<P: Presenter + ?Sized>(
    trial: &Trial,
    presenter: &mut P,
) -> Result<u64, ExperimentError> {
    presenter.show_fixation(Duration::from_millis(trial.fixation_ms))?;
    presenter.present(&trial.background_asset, &trial.letter_string)
}

/// Presents one trial exactly once and scores the response.
pub fn run_trial<P, R>(
    trial: &Trial,
    rules: &ResponseRules,
    presenter: &mut P,
    responder: &mut R,
) -> Result<TrialOutcome, ExperimentError>
where
    P: Presenter + ?Sized,
    R: Responder + ?Sized,
{
    let onset_ns = present_trial(trial, presenter)?;
    Ok(match collect_response(trial, onset_ns, rules, responder) {
        Resolution::Completed(result) => TrialOutcome::Completed(result),
        Resolution::Quit | Resolution::KeepWaiting => TrialOutcome::Quit,
    })
}

/// Runs every remaining trial of a sequencer through blocking collaborators.
///
/// A presentation failure aborts the session and is returned after the log
/// has been flushed; rows already written stay intact.
pub fn run_session<L, P, R>(
    sequencer: &mut TrialSequencer<L>,
    presenter: &mut P,
    responder: &mut R,
) -> Result<SessionOutcome, ExperimentError>
where
    L: ResultLog,
    P: Presenter + ?Sized,
    R: Responder + ?Sized,
{
    let mut next = sequencer.start().cloned();
    while let Some(trial) = next {
        let onset_ns = match present_trial(&trial, presenter) {
            Ok(onset_ns) => onset_ns,
            Err(e) => {
                error!("Trial {} could not be presented: {}", trial.index, e);
                sequencer.abort()?;
                return Err(e);
            }
        };
        sequencer.stimulus_presented(onset_ns);

        let resolution = collect_response(&trial, onset_ns, sequencer.rules(), responder);
        if let Resolution::Quit = sequencer.record(resolution)? {
            let (completed, total) = sequencer.progress();
            return Ok(SessionOutcome::Aborted { completed, total });
        }
        next = sequencer.advance().cloned();
    }

    let (completed, total) = sequencer.progress();
    if sequencer.is_aborted() {
        Ok(SessionOutcome::Aborted { completed, total })
    } else {
        Ok(SessionOutcome::Completed { trials: completed })
    }
}
