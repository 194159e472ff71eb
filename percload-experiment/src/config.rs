use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use percload_core::{
    BackgroundCategory, ConfigurationError, ExperimentError, LETTER_COUNT, Load, TARGET_LETTER,
};
use serde::{Deserialize, Serialize};

use crate::response::is_known_key;

/// How a concrete background image is picked for a trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AssetSelection {
    /// Uniformly from the category's pool.
    Random,
    /// Always the same image; the index wraps around the pool size.
    Fixed { index: usize },
}

/// How target presence is distributed over trials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TargetBalance {
    /// Independent draw per trial.
    Independent { p_present: f64 },
    /// Exactly `present` target-present trials in every cell.
    PerCell { present: usize },
}

/// What to do with a key that is neither response key nor quit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidKeyPolicy {
    Ignore,
    CountAsIncorrect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub loads: Vec<Load>,
    pub background_categories: Vec<BackgroundCategory>,
    pub trials_per_cell: usize,
    pub rng_seed: Option<u64>,
    /// Measured from stimulus onset.
    pub response_timeout_ms: Option<u64>,
    pub target_key: String,
    pub non_target_key: String,
    pub quit_key: String,
    pub start_key: String,
    pub asset_selection: AssetSelection,
    pub target_balance: TargetBalance,
    pub invalid_key_policy: InvalidKeyPolicy,
    pub fixation_range_ms: (u64, u64),
    pub stimulus_duration_ms: u64,
    pub thanks_duration_ms: u64,
    pub filler_alphabet: String,
    pub background_dir: PathBuf,
    pub output_dir: PathBuf,
    pub font_path: PathBuf,
    pub background_size: (u32, u32),
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            loads: Load::ALL.to_vec(),
            background_categories: BackgroundCategory::ALL.to_vec(),
            trials_per_cell: 5,
            rng_seed: None,
            response_timeout_ms: Some(1500),
            target_key: "z".into(),
            non_target_key: "m".into(),
            quit_key: "escape".into(),
            start_key: "space".into(),
            asset_selection: AssetSelection::Random,
            target_balance: TargetBalance::Independent { p_present: 0.5 },
            invalid_key_policy: InvalidKeyPolicy::Ignore,
            fixation_range_ms: (3500, 5500),
            stimulus_duration_ms: 200,
            thanks_duration_ms: 3000,
            filler_alphabet: "ABCDEFGHIJKLMNOPQRSTUVWXYZ".into(),
            background_dir: PathBuf::from("backgrounds"),
            output_dir: PathBuf::from("data"),
            font_path: PathBuf::from("assets/DejaVuSans.ttf"),
            background_size: (800, 1200),
        }
    }
}

impl ExperimentConfig {
    /// Reads a JSON file; absent fields keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ExperimentError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ConfigurationError::Unreadable(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn total_trials(&self) -> usize {
        self.loads.len() * self.background_categories.len() * self.trials_per_cell
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_ms.map(Duration::from_millis)
    }

    /// Distinct upper-case non-target letters, in alphabet order.
    pub fn filler_letters(&self) -> Vec<char> {
        let mut seen = HashSet::new();
        self.filler_alphabet
            .chars()
            .map(|c| c.to_ascii_uppercase())
            .filter(|c| c.is_ascii_alphabetic() && *c != TARGET_LETTER)
            .filter(|c| seen.insert(*c))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.loads.is_empty() {
            return Err(ConfigurationError::EmptyLoads);
        }
        if self.background_categories.is_empty() {
            return Err(ConfigurationError::EmptyCategories);
        }
        if self.trials_per_cell == 0 {
            return Err(ConfigurationError::ZeroTrialsPerCell);
        }

        let mut loads = HashSet::new();
        if let Some(dup) = self.loads.iter().find(|l| !loads.insert(**l)) {
            return Err(ConfigurationError::DuplicateLoad(dup.to_string()));
        }
        let mut categories = HashSet::new();
        if let Some(dup) = self
            .background_categories
            .iter()
            .find(|c| !categories.insert(**c))
        {
            return Err(ConfigurationError::DuplicateCategory(dup.to_string()));
        }

        let keys = [&self.target_key, &self.non_target_key, &self.quit_key];
        let distinct: HashSet<String> = keys.iter().map(|k| k.to_ascii_lowercase()).collect();
        if distinct.len() != keys.len() || keys.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigurationError::ConflictingKeys(format!(
                "target '{}', non-target '{}', quit '{}'",
                self.target_key, self.non_target_key, self.quit_key
            )));
        }
        if self.start_key.eq_ignore_ascii_case(&self.quit_key) {
            return Err(ConfigurationError::ConflictingKeys(format!(
                "start '{}', quit '{}'",
                self.start_key, self.quit_key
            )));
        }
        let start = &self.start_key;
        if let Some(unknown) = keys.into_iter().chain([start]).find(|k| !is_known_key(k)) {
            return Err(ConfigurationError::UnknownKey(unknown.clone()));
        }

        let (min, max) = self.fixation_range_ms;
        if min > max {
            return Err(ConfigurationError::InvalidFixationRange { min, max });
        }

        match self.target_balance {
            TargetBalance::Independent { p_present } if !(0.0..=1.0).contains(&p_present) => {
                return Err(ConfigurationError::InvalidTargetProbability(p_present));
            }
            TargetBalance::PerCell { present } if present > self.trials_per_cell => {
                return Err(ConfigurationError::TargetBalanceExceedsCell {
                    present,
                    trials_per_cell: self.trials_per_cell,
                });
            }
            _ => {}
        }

        let found = self.filler_letters().len();
        if found < LETTER_COUNT {
            return Err(ConfigurationError::FillerAlphabetTooSmall {
                needed: LETTER_COUNT,
                found,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_the_two_by_four_design() {
        let config = ExperimentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.total_trials(), 40);
        assert_eq!(config.response_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.filler_letters().len(), 25);
        assert!(!config.filler_letters().contains(&'X'));
    }

    #[test]
    fn rejects_empty_design() {
        let mut config = ExperimentConfig::default();
        config.loads.clear();
        assert_eq!(config.validate(), Err(ConfigurationError::EmptyLoads));

        let mut config = ExperimentConfig::default();
        config.background_categories.clear();
        assert_eq!(config.validate(), Err(ConfigurationError::EmptyCategories));

        let mut config = ExperimentConfig::default();
        config.trials_per_cell = 0;
        assert_eq!(config.validate(), Err(ConfigurationError::ZeroTrialsPerCell));
    }

    #[test]
    fn rejects_duplicates_and_key_clashes() {
        let mut config = ExperimentConfig::default();
        config.loads = vec![Load::Low, Load::Low];
        assert!(matches!(config.validate(), Err(ConfigurationError::DuplicateLoad(_))));

        let mut config = ExperimentConfig::default();
        config.non_target_key = "Z".into();
        assert!(matches!(config.validate(), Err(ConfigurationError::ConflictingKeys(_))));
    }

    #[test]
    fn start_key_must_not_quit() {
        let mut config = ExperimentConfig::default();
        config.start_key = "Escape".into();
        assert!(matches!(config.validate(), Err(ConfigurationError::ConflictingKeys(_))));
    }

    #[test]
    fn rejects_keys_the_keyboard_never_reports() {
        let mut config = ExperimentConfig::default();
        config.target_key = "f1".into();
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::UnknownKey("f1".into()))
        );

        let mut config = ExperimentConfig::default();
        config.start_key = "enter".into();
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::UnknownKey("enter".into()))
        );

        let mut config = ExperimentConfig::default();
        config.start_key = "Return".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_impossible_balance() {
        let mut config = ExperimentConfig::default();
        config.target_balance = TargetBalance::PerCell { present: 6 };
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::TargetBalanceExceedsCell {
                present: 6,
                trials_per_cell: 5
            })
        );

        config.target_balance = TargetBalance::Independent { p_present: 1.5 };
        assert_eq!(config.validate(), Err(ConfigurationError::InvalidTargetProbability(1.5)));
    }

    #[test]
    fn rejects_small_alphabet() {
        let mut config = ExperimentConfig::default();
        config.filler_alphabet = "aabbcXdE".into();
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::FillerAlphabetTooSmall { needed: 6, found: 5 })
        );
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{
            "loads": ["high"],
            "trials_per_cell": 2,
            "rng_seed": 7,
            "target_balance": { "mode": "per_cell", "present": 1 },
            "asset_selection": { "policy": "fixed", "index": 3 },
            "invalid_key_policy": "count_as_incorrect"
        }"#;
        let config: ExperimentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.loads, vec![Load::High]);
        assert_eq!(config.background_categories.len(), 4);
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.target_balance, TargetBalance::PerCell { present: 1 });
        assert_eq!(config.asset_selection, AssetSelection::Fixed { index: 3 });
        assert_eq!(config.invalid_key_policy, InvalidKeyPolicy::CountAsIncorrect);
        assert_eq!(config.target_key, "z");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_reads_and_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "trials_per_cell": 0 }"#).unwrap();
        let err = ExperimentConfig::load(&path).unwrap_err();
        assert!(err.is_configuration());

        std::fs::write(&path, "not json").unwrap();
        assert!(ExperimentConfig::load(&path).unwrap_err().is_configuration());
    }

    #[test]
    fn bundled_pilot_config_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../config/pilot.json");
        let config = ExperimentConfig::load(path).unwrap();
        assert_eq!(config.target_balance, TargetBalance::PerCell { present: 3 });
        assert_eq!(config.rng_seed, Some(2024));
        assert_eq!(config.total_trials(), 40);
    }
}
