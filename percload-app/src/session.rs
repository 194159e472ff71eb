use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{info, warn};
use percload_core::{ExperimentError, Trial};
use percload_experiment::{
    AssetPool, CsvResultLog, ExperimentConfig, ResponseRules, SessionSummary, TrialSequencer,
    generate_trial_list,
};

use crate::cli::Args;

pub type Sequencer = TrialSequencer<CsvResultLog<File>>;

pub const INSTRUCTIONS: &str = "\
Welcome to the Cognitive Psychology Experiment.

You will see a series of letter strings presented on different backgrounds.
Your task is to indicate whether the target letter 'X' is present or absent.

Press '{target}' if the letter X is present.
Press '{non_target}' if the letter X is absent.

Try to respond as quickly and accurately as possible.

Press {start} to begin.";

pub const THANKS: &str = "Thank you for your time!\n\nYou have completed the experiment.";

/// How a host left the session
pub struct Finished {
    pub sequencer: Sequencer,
    pub error: Option<ExperimentError>,
}

/// Everything resolved before the first trial
pub struct Session {
    pub participant: String,
    pub session: String,
    pub config: ExperimentConfig,
    pub pool: AssetPool,
    pub trials: Vec<Trial>,
    pub csv_path: PathBuf,
}

/// Characters outside `[A-Za-z0-9_-]` become `_`.
fn file_safe(id: &str) -> String {
    id.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn output_path(output_dir: &Path, participant: &str, started: &DateTime<Local>) -> PathBuf {
    output_dir.join(format!(
        "percload_{}_{}.csv",
        file_safe(participant),
        started.format("%Y%m%d_%H%M%S")
    ))
}

pub fn summary_path(csv_path: &Path) -> PathBuf {
    let stem = csv_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session".into());
    csv_path.with_file_name(format!("{stem}_summary.json"))
}

pub fn instructions(config: &ExperimentConfig) -> String {
    INSTRUCTIONS
        .replace("{target}", &config.target_key.to_uppercase())
        .replace("{non_target}", &config.non_target_key.to_uppercase())
        .replace("{start}", &config.start_key.to_uppercase())
}

impl Session {
    pub fn prepare(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => ExperimentConfig::load(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => ExperimentConfig::default(),
        };
        if args.seed.is_some() {
            config.rng_seed = args.seed;
        }
        if let Some(dir) = &args.output {
            config.output_dir = dir.clone();
        }
        config.validate().context("invalid configuration")?;
        if args.participant == "anonymous" {
            warn!("No --participant given, logging as 'anonymous'");
        }

        let pool = AssetPool::scan(&config.background_dir, &config.background_categories)
            .with_context(|| format!("scanning {}", config.background_dir.display()))?;
        let trials = generate_trial_list(&config, &pool).context("generating trial list")?;

        info!(
            "Participant {} session {}: {} trials ({} loads x {} backgrounds x {}), seed {:?}",
            args.participant,
            args.session,
            trials.len(),
            config.loads.len(),
            config.background_categories.len(),
            config.trials_per_cell,
            config.rng_seed
        );

        let csv_path = output_path(&config.output_dir, &args.participant, &Local::now());
        Ok(Self {
            participant: args.participant.clone(),
            session: args.session.clone(),
            config,
            pool,
            trials,
            csv_path,
        })
    }

    /// Creates the result file and hands the trial list to a sequencer.
    pub fn open(&self) -> Result<Sequencer> {
        let log = CsvResultLog::create(&self.csv_path, &self.participant, &self.session)
            .with_context(|| format!("creating {}", self.csv_path.display()))?;
        info!("Results will be written to {}", self.csv_path.display());
        Ok(TrialSequencer::new(
            self.trials.clone(),
            ResponseRules::from_config(&self.config),
            log,
        ))
    }

    pub fn summarize(&self, finished: &Finished) -> Result<SessionSummary> {
        let seq = &finished.sequencer;
        let summary = SessionSummary::from_results(
            &self.participant,
            &self.session,
            seq.trials().len(),
            seq.is_aborted(),
            seq.results(),
        );
        summary.log();
        summary
            .write_json(summary_path(&self.csv_path))
            .context("writing session summary")?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn result_file_names() {
        let started = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let csv = output_path(Path::new("data"), "p 07/a", &started);
        assert_eq!(csv, PathBuf::from("data/percload_p_07_a_20240309_140507.csv"));
        assert_eq!(
            summary_path(&csv),
            PathBuf::from("data/percload_p_07_a_20240309_140507_summary.json")
        );
    }

    #[test]
    fn instructions_name_the_configured_keys() {
        let text = instructions(&ExperimentConfig::default());
        assert!(text.contains("Press 'Z' if the letter X is present."));
        assert!(text.contains("Press 'M' if the letter X is absent."));
        assert!(text.ends_with("Press SPACE to begin."));
    }

    #[test]
    fn prepare_and_open_against_a_background_folder() {
        let dir = tempfile::tempdir().unwrap();
        let backgrounds = dir.path().join("backgrounds");
        for cat in ["ai", "internet", "paper", "solid"] {
            std::fs::create_dir_all(backgrounds.join(cat)).unwrap();
            std::fs::write(backgrounds.join(cat).join("1.png"), b"").unwrap();
        }
        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            format!(
                r#"{{ "background_dir": {:?}, "output_dir": {:?} }}"#,
                backgrounds,
                dir.path().join("data")
            ),
        )
        .unwrap();

        let args = Args {
            participant: "p01".into(),
            config: Some(config_path),
            seed: Some(11),
            ..Args::default()
        };
        let session = Session::prepare(&args).unwrap();
        assert_eq!(session.trials.len(), 40);
        assert_eq!(session.config.rng_seed, Some(11));
        assert!(session.csv_path.starts_with(dir.path().join("data")));

        let seq = session.open().unwrap();
        assert!(session.csv_path.exists());
        assert_eq!(seq.progress(), (0, 40));
    }

    #[test]
    fn missing_background_folder_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("c.json");
        std::fs::write(
            &config_path,
            format!(r#"{{ "background_dir": {:?} }}"#, dir.path().join("missing")),
        )
        .unwrap();
        let args = Args {
            config: Some(config_path),
            output: Some(dir.path().join("data")),
            ..Args::default()
        };
        let err = Session::prepare(&args).err().unwrap();
        assert!(format!("{err:#}").contains("no background assets registered"));
    }
}
