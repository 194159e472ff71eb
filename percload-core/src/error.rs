use thiserror::Error;

use crate::condition::BackgroundCategory;

/// Problems with the experimental design, detected before any trial runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("no loads configured")]
    EmptyLoads,

    #[error("no background categories configured")]
    EmptyCategories,

    #[error("trials_per_cell must be at least 1")]
    ZeroTrialsPerCell,

    #[error("load '{0}' listed more than once")]
    DuplicateLoad(String),

    #[error("background category '{0}' listed more than once")]
    DuplicateCategory(String),

    #[error("no background assets registered for category '{category}'")]
    EmptyAssetPool { category: BackgroundCategory },

    #[error("response keys must be distinct: {0}")]
    ConflictingKeys(String),

    #[error("'{0}' is not a key name the keyboard reports")]
    UnknownKey(String),

    #[error("fixation range {min}..={max} ms is inverted")]
    InvalidFixationRange { min: u64, max: u64 },

    #[error("{present} target-present trials per cell exceeds trials_per_cell = {trials_per_cell}")]
    TargetBalanceExceedsCell { present: usize, trials_per_cell: usize },

    #[error("target probability {0} is outside [0, 1]")]
    InvalidTargetProbability(f64),

    #[error("filler alphabet needs at least {needed} distinct non-target letters, found {found}")]
    FillerAlphabetTooSmall { needed: usize, found: usize },

    #[error("failed to read configuration: {0}")]
    Unreadable(String),
}

#[derive(Error, Debug)]
pub enum ExperimentError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The rendering collaborator could not put a stimulus on screen.
    #[error("presentation error: {0}")]
    Presentation(String),

    #[error("result log error: {0}")]
    Log(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExperimentError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, ExperimentError::Configuration(_))
    }
}
