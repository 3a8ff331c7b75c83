mod ids;
mod progress;
mod review;
mod settings;

pub use ids::{CardId, LearnerId, ParseIdError};
pub use progress::CardProgress;
pub use review::{
    CORRECT_QUALITY, INCORRECT_QUALITY, MAX_QUALITY, OutcomeSource, PASSING_QUALITY,
    ReviewOutcome,
};
pub use settings::{
    MAX_INTERVAL_DAYS, MasteryCriterion, MasteryRule, SchedulerSettings, SchedulerSettingsDraft,
    SettingsError,
};
