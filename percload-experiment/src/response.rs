use std::time::Duration;

use percload_core::{Trial, TrialResult};

use crate::config::{ExperimentConfig, InvalidKeyPolicy};

/// What the input layer reports back after waiting for a keypress
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent {
    /// `reaction_time` is measured from stimulus onset.
    Key { key: String, reaction_time: Duration },
    Timeout,
}

impl ResponseEvent {
    pub fn key(key: impl Into<String>, reaction_time: Duration) -> Self {
        ResponseEvent::Key {
            key: key.into(),
            reaction_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    TargetPresent,
    TargetAbsent,
    Quit,
    Other,
}

/// Key names a keyboard host can report.
pub const KNOWN_KEYS: &[&str] = &[
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s",
    "t", "u", "v", "w", "x", "y", "z", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "space",
    "return", "escape", "left", "right", "up", "down", "slash", "period", "comma",
];

pub fn is_known_key(name: &str) -> bool {
    KNOWN_KEYS.iter().any(|k| k.eq_ignore_ascii_case(name))
}

/// Case-insensitive mapping from key ids to their meaning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMap {
    pub target: String,
    pub non_target: String,
    pub quit: String,
}

impl KeyMap {
    pub fn new(target: &str, non_target: &str, quit: &str) -> Self {
        Self {
            target: target.to_ascii_lowercase(),
            non_target: non_target.to_ascii_lowercase(),
            quit: quit.to_ascii_lowercase(),
        }
    }

    pub fn classify(&self, key: &str) -> KeyClass {
        let key = key.to_ascii_lowercase();
        if key == self.target {
            KeyClass::TargetPresent
        } else if key == self.non_target {
            KeyClass::TargetAbsent
        } else if key == self.quit {
            KeyClass::Quit
        } else {
            KeyClass::Other
        }
    }
}

/// Everything needed to turn a response event into a trial outcome
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRules {
    pub keys: KeyMap,
    pub invalid_key_policy: InvalidKeyPolicy,
    pub timeout: Option<Duration>,
}

impl ResponseRules {
    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self {
            keys: KeyMap::new(&config.target_key, &config.non_target_key, &config.quit_key),
            invalid_key_policy: config.invalid_key_policy,
            timeout: config.response_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Completed(TrialResult),
    /// Unrecognised key under the ignore policy.
    KeepWaiting,
    Quit,
}

/// Scores one response event against a trial.
///
/// A timeout is a normal outcome: no key, no reaction time, incorrect.
pub fn resolve_response(trial: &Trial, event: ResponseEvent, rules: &ResponseRules) -> Resolution {
    let (key, reaction_time, correct) = match event {
        ResponseEvent::Timeout => (None, None, false),
        ResponseEvent::Key { key, reaction_time } => match rules.keys.classify(&key) {
            KeyClass::Quit => return Resolution::Quit,
            KeyClass::TargetPresent => (Some(key), Some(reaction_time), trial.target_present),
            KeyClass::TargetAbsent => (Some(key), Some(reaction_time), !trial.target_present),
            KeyClass::Other => match rules.invalid_key_policy {
                InvalidKeyPolicy::Ignore => return Resolution::KeepWaiting,
                InvalidKeyPolicy::CountAsIncorrect => (Some(key), Some(reaction_time), false),
            },
        },
    };

    Resolution::Completed(TrialResult {
        trial_index: trial.index,
        load: trial.load,
        background_category: trial.background_category,
        background_asset: trial.background_asset.clone(),
        letter_string: trial.letter_string.clone(),
        target_present: trial.target_present,
        response_key: key,
        reaction_time_ms: reaction_time.map(|rt| rt.as_nanos() as f64 / 1_000_000.0),
        correct,
    })
}
