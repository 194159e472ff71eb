use serde::{Deserialize, Serialize};

use crate::condition::{BackgroundCategory, Condition, Load};
use crate::stimulus::AssetId;

/// One fully resolved presentation: everything needed to draw it is decided
/// when the trial list is generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// 1-based position in the presentation order.
    pub index: usize,
    pub load: Load,
    pub background_category: BackgroundCategory,
    pub background_asset: AssetId,
    pub target_present: bool,
    pub letter_string: String,
    /// Jittered fixation shown before the search display.
    pub fixation_ms: u64,
}

impl Trial {
    pub fn condition(&self) -> Condition {
        Condition::new(self.load, self.background_category)
    }
}

/// Outcome of a single presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_index: usize,
    pub load: Load,
    pub background_category: BackgroundCategory,
    pub background_asset: AssetId,
    pub letter_string: String,
    pub target_present: bool,
    /// `None` when the response window timed out.
    pub response_key: Option<String>,
    /// Milliseconds from stimulus onset; `None` on timeout.
    pub reaction_time_ms: Option<f64>,
    pub correct: bool,
}

impl TrialResult {
    pub fn condition(&self) -> Condition {
        Condition::new(self.load, self.background_category)
    }

    pub fn timed_out(&self) -> bool {
        self.response_key.is_none()
    }
}

/// Session-level state machine. Positions are 0-based offsets into the trial list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    NotStarted,
    Presenting(usize),
    AwaitingResponse(usize),
    Logging(usize),
    Finished,
}

impl SessionState {
    pub fn position(&self) -> Option<usize> {
        match *self {
            SessionState::Presenting(i)
            | SessionState::AwaitingResponse(i)
            | SessionState::Logging(i) => Some(i),
            SessionState::NotStarted | SessionState::Finished => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, SessionState::Finished)
    }
}
