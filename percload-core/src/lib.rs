pub mod condition;
pub mod error;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use condition::{BackgroundCategory, Condition, Load};
pub use error::{ConfigurationError, ExperimentError};
pub use phase::Phase;
pub use stimulus::{AssetId, LETTER_COUNT, TARGET_LETTER, is_uniform, target_count};
pub use trial::{SessionState, Trial, TrialResult};
