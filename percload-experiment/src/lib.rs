pub mod assets;
pub mod config;
pub mod design;
pub mod letters;
pub mod record;
pub mod response;
pub mod run;
pub mod simulate;
pub mod state;
pub mod summary;

pub use assets::AssetPool;
pub use config::{AssetSelection, ExperimentConfig, InvalidKeyPolicy, TargetBalance};
pub use design::{count_by_condition, generate_trial_list, generate_trial_list_with, seeded_rng};
pub use letters::{LetterGenerator, high_load_string, low_load_string};
pub use record::{CsvResultLog, LogRow, ResultLog, read_log};
pub use response::{
    KNOWN_KEYS, KeyClass, KeyMap, Resolution, ResponseEvent, ResponseRules, is_known_key,
    resolve_response,
};
pub use run::{
    Presenter, Responder, SessionOutcome, TrialOutcome, present_trial, run_session, run_trial,
};
pub use simulate::{HeadlessPresenter, SharedScreen, SimulatedParticipant};
pub use state::TrialSequencer;
pub use summary::{ConditionSummary, SessionSummary};
