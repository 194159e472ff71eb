use std::time::Duration;

use log::info;
use percload_experiment::{
    HeadlessPresenter, SessionOutcome, SimulatedParticipant, run_session, seeded_rng,
};
use percload_timing::{HighPrecisionTimer, ManualTimer, Timer};

use crate::cli::Args;
use crate::session::{Finished, Sequencer, Session, THANKS};

/// Runs the whole session without a display. With `--fast` the clock is
/// simulated, otherwise fixation and reaction times take real time.
pub fn run(session: &Session, sequencer: Sequencer, args: &Args) -> Finished {
    if args.fast {
        drive(session, sequencer, args, ManualTimer::new())
    } else {
        drive(session, sequencer, args, HighPrecisionTimer::new())
    }
}

fn drive<T: Timer + Clone>(
    session: &Session,
    mut sequencer: Sequencer,
    args: &Args,
    timer: T,
) -> Finished {
    let config = &session.config;
    let mut presenter = HeadlessPresenter::new(timer.clone());
    presenter.pace_fixation = true;

    // Offset so the participant does not replay the design's random stream.
    let rng = seeded_rng(config.rng_seed.map(|s| s.wrapping_add(1)));
    let mut participant = SimulatedParticipant::new(
        timer.clone(),
        rng,
        presenter.screen(),
        sequencer.rules().keys.clone(),
    );
    participant.accuracy = args.accuracy;

    info!(
        "Simulating participant {} (accuracy {:.2}, {} clock)",
        session.participant,
        args.accuracy,
        if args.fast { "simulated" } else { "real" }
    );

    let error = match run_session(&mut sequencer, &mut presenter, &mut participant) {
        Ok(SessionOutcome::Completed { trials }) => {
            info!("Simulated session completed: {} trials", trials);
            None
        }
        Ok(SessionOutcome::Aborted { completed, total }) => {
            info!("Simulated session aborted after {}/{}", completed, total);
            None
        }
        Err(e) => Some(e),
    };

    if error.is_none() {
        info!("{}", THANKS.replace("\n\n", " "));
        timer.sleep(Duration::from_millis(config.thanks_duration_ms));
    }
    Finished { sequencer, error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use percload_core::{AssetId, BackgroundCategory};
    use percload_experiment::{AssetPool, ExperimentConfig, generate_trial_list, read_log};

    #[test]
    fn fast_simulation_writes_every_trial() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = AssetPool::new();
        for cat in BackgroundCategory::ALL {
            pool.insert(cat, AssetId::new(format!("{cat}/a.png")));
        }
        let config = ExperimentConfig {
            rng_seed: Some(5),
            ..ExperimentConfig::default()
        };
        let trials = generate_trial_list(&config, &pool).unwrap();
        let session = Session {
            participant: "sim".into(),
            session: "1".into(),
            config,
            pool,
            trials,
            csv_path: dir.path().join("sim.csv"),
        };
        let args = Args {
            simulate: true,
            fast: true,
            accuracy: 1.0,
            ..Args::default()
        };

        let finished = run(&session, session.open().unwrap(), &args);
        assert!(finished.error.is_none());
        assert!(!finished.sequencer.is_aborted());
        assert!(finished.sequencer.results().iter().all(|r| r.correct));

        let rows = read_log(std::fs::File::open(&session.csv_path).unwrap()).unwrap();
        assert_eq!(rows.len(), 40);
        assert!(rows.iter().all(|r| r.participant == "sim"));

        let summary = session.summarize(&finished).unwrap();
        assert_eq!(summary.completed_trials, 40);
        assert_eq!(summary.accuracy, 1.0);
        assert!(dir.path().join("sim_summary.json").exists());
    }
}
