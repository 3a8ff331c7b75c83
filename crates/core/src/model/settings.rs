use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for any interval, configured or computed (about 100 years).
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("{field} must be between 1 and {MAX_INTERVAL_DAYS} days, got {provided}")]
    InvalidInterval { field: &'static str, provided: u32 },

    #[error("ease factor bounds must satisfy 0 < min <= max, got [{min}, {max}]")]
    InvalidEaseBounds { min: f64, max: f64 },

    #[error("default ease factor {provided} is outside [{min}, {max}]")]
    DefaultEaseOutOfBounds { provided: f64, min: f64, max: f64 },

    #[error("{field} must be finite and >= 0, got {provided}")]
    InvalidEaseDelta { field: &'static str, provided: f64 },

    #[error("max streak must be > 0")]
    InvalidMaxStreak,

    #[error("mastery thresholds must be > 0")]
    InvalidMasteryThreshold,
}

//
// ─── MASTERY ───────────────────────────────────────────────────────────────────
//

/// Which secondary condition, besides the repetition count, marks a card as mastered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryCriterion {
    /// Interval reached the threshold, or the ease factor sits at its ceiling.
    #[default]
    IntervalOrMaxEase,
    /// Interval reached the threshold.
    Interval,
    /// Ease factor sits at its ceiling.
    MaxEase,
    /// Both the interval threshold and the ease ceiling.
    IntervalAndMaxEase,
}

impl MasteryCriterion {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MasteryCriterion::IntervalOrMaxEase => "interval_or_max_ease",
            MasteryCriterion::Interval => "interval",
            MasteryCriterion::MaxEase => "max_ease",
            MasteryCriterion::IntervalAndMaxEase => "interval_and_max_ease",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "interval_or_max_ease" => Some(Self::IntervalOrMaxEase),
            "interval" => Some(Self::Interval),
            "max_ease" => Some(Self::MaxEase),
            "interval_and_max_ease" => Some(Self::IntervalAndMaxEase),
            _ => None,
        }
    }
}

/// Threshold at which a card counts as mastered.
///
/// A card is mastered once `repetitions >= min_repetitions` and the configured
/// [`MasteryCriterion`] holds. The default is 5 repetitions with an interval of
/// at least 30 days or an ease factor at the configured maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasteryRule {
    pub min_repetitions: u32,
    pub min_interval_days: u32,
    #[serde(default)]
    pub criterion: MasteryCriterion,
}

impl Default for MasteryRule {
    fn default() -> Self {
        Self {
            min_repetitions: 5,
            min_interval_days: 30,
            criterion: MasteryCriterion::IntervalOrMaxEase,
        }
    }
}

impl MasteryRule {
    /// Evaluates the rule against a freshly scheduled state.
    #[must_use]
    pub fn is_met(
        &self,
        repetitions: u32,
        interval_days: u32,
        ease_factor: f64,
        max_ease_factor: f64,
    ) -> bool {
        if repetitions < self.min_repetitions {
            return false;
        }

        let long_interval = interval_days >= self.min_interval_days;
        let max_ease = ease_factor >= max_ease_factor;

        match self.criterion {
            MasteryCriterion::IntervalOrMaxEase => long_interval || max_ease,
            MasteryCriterion::Interval => long_interval,
            MasteryCriterion::MaxEase => max_ease,
            MasteryCriterion::IntervalAndMaxEase => long_interval && max_ease,
        }
    }
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Validated parameters for one scheduling call.
///
/// Instances are only produced through [`SchedulerSettings::default`] or
/// [`SchedulerSettingsDraft::validate`], so every value held here already
/// satisfies the bounds the scheduler relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    new_card_interval: u32,
    learning_interval_1: u32,
    learning_interval_2: u32,
    default_ease_factor: f64,
    min_ease_factor: f64,
    max_ease_factor: f64,
    ease_factor_increase: f64,
    ease_factor_decrease: f64,
    enable_ease_factor_adjustment: bool,
    max_streak: u32,
    mastery: MasteryRule,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            new_card_interval: 1,
            learning_interval_1: 1,
            learning_interval_2: 6,
            default_ease_factor: 2.5,
            min_ease_factor: 1.3,
            max_ease_factor: 2.5,
            ease_factor_increase: 0.1,
            ease_factor_decrease: 0.2,
            enable_ease_factor_adjustment: true,
            max_streak: 100,
            mastery: MasteryRule::default(),
        }
    }
}

impl SchedulerSettings {
    #[must_use]
    pub fn new_card_interval(&self) -> u32 {
        self.new_card_interval
    }

    #[must_use]
    pub fn learning_interval_1(&self) -> u32 {
        self.learning_interval_1
    }

    #[must_use]
    pub fn learning_interval_2(&self) -> u32 {
        self.learning_interval_2
    }

    #[must_use]
    pub fn default_ease_factor(&self) -> f64 {
        self.default_ease_factor
    }

    #[must_use]
    pub fn min_ease_factor(&self) -> f64 {
        self.min_ease_factor
    }

    #[must_use]
    pub fn max_ease_factor(&self) -> f64 {
        self.max_ease_factor
    }

    #[must_use]
    pub fn ease_factor_increase(&self) -> f64 {
        self.ease_factor_increase
    }

    #[must_use]
    pub fn ease_factor_decrease(&self) -> f64 {
        self.ease_factor_decrease
    }

    #[must_use]
    pub fn enable_ease_factor_adjustment(&self) -> bool {
        self.enable_ease_factor_adjustment
    }

    #[must_use]
    pub fn max_streak(&self) -> u32 {
        self.max_streak
    }

    #[must_use]
    pub fn mastery(&self) -> MasteryRule {
        self.mastery
    }

    /// Clamp an ease factor into the configured bounds.
    #[must_use]
    pub fn clamp_ease(&self, ease_factor: f64) -> f64 {
        ease_factor.clamp(self.min_ease_factor, self.max_ease_factor)
    }

    /// Returns true if `ease_factor` is finite and within the configured bounds.
    #[must_use]
    pub fn ease_in_bounds(&self, ease_factor: f64) -> bool {
        ease_factor.is_finite()
            && ease_factor >= self.min_ease_factor
            && ease_factor <= self.max_ease_factor
    }

    /// Export the settings as a fully populated draft, e.g. for persistence.
    #[must_use]
    pub fn to_draft(&self) -> SchedulerSettingsDraft {
        SchedulerSettingsDraft {
            new_card_interval: Some(self.new_card_interval),
            learning_interval_1: Some(self.learning_interval_1),
            learning_interval_2: Some(self.learning_interval_2),
            default_ease_factor: Some(self.default_ease_factor),
            min_ease_factor: Some(self.min_ease_factor),
            max_ease_factor: Some(self.max_ease_factor),
            ease_factor_increase: Some(self.ease_factor_increase),
            ease_factor_decrease: Some(self.ease_factor_decrease),
            enable_ease_factor_adjustment: Some(self.enable_ease_factor_adjustment),
            max_streak: Some(self.max_streak),
            mastery: Some(self.mastery),
        }
    }
}

/// Unvalidated settings as they arrive from configuration or storage.
///
/// Missing fields fall back to [`SchedulerSettings::default`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerSettingsDraft {
    pub new_card_interval: Option<u32>,
    pub learning_interval_1: Option<u32>,
    pub learning_interval_2: Option<u32>,
    pub default_ease_factor: Option<f64>,
    pub min_ease_factor: Option<f64>,
    pub max_ease_factor: Option<f64>,
    pub ease_factor_increase: Option<f64>,
    pub ease_factor_decrease: Option<f64>,
    pub enable_ease_factor_adjustment: Option<bool>,
    pub max_streak: Option<u32>,
    pub mastery: Option<MasteryRule>,
}

impl SchedulerSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill missing fields with defaults and check every bound.
    ///
    /// # Errors
    ///
    /// Returns the first `SettingsError` encountered.
    pub fn validate(self) -> Result<SchedulerSettings, SettingsError> {
        let defaults = SchedulerSettings::default();

        let settings = SchedulerSettings {
            new_card_interval: self.new_card_interval.unwrap_or(defaults.new_card_interval),
            learning_interval_1: self
                .learning_interval_1
                .unwrap_or(defaults.learning_interval_1),
            learning_interval_2: self
                .learning_interval_2
                .unwrap_or(defaults.learning_interval_2),
            default_ease_factor: self
                .default_ease_factor
                .unwrap_or(defaults.default_ease_factor),
            min_ease_factor: self.min_ease_factor.unwrap_or(defaults.min_ease_factor),
            max_ease_factor: self.max_ease_factor.unwrap_or(defaults.max_ease_factor),
            ease_factor_increase: self
                .ease_factor_increase
                .unwrap_or(defaults.ease_factor_increase),
            ease_factor_decrease: self
                .ease_factor_decrease
                .unwrap_or(defaults.ease_factor_decrease),
            enable_ease_factor_adjustment: self
                .enable_ease_factor_adjustment
                .unwrap_or(defaults.enable_ease_factor_adjustment),
            max_streak: self.max_streak.unwrap_or(defaults.max_streak),
            mastery: self.mastery.unwrap_or(defaults.mastery),
        };

        check_interval("new_card_interval", settings.new_card_interval)?;
        check_interval("learning_interval_1", settings.learning_interval_1)?;
        check_interval("learning_interval_2", settings.learning_interval_2)?;

        let (min, max) = (settings.min_ease_factor, settings.max_ease_factor);
        if !min.is_finite() || !max.is_finite() || min <= 0.0 || min > max {
            return Err(SettingsError::InvalidEaseBounds { min, max });
        }
        if !settings.ease_in_bounds(settings.default_ease_factor) {
            return Err(SettingsError::DefaultEaseOutOfBounds {
                provided: settings.default_ease_factor,
                min,
                max,
            });
        }

        check_delta("ease_factor_increase", settings.ease_factor_increase)?;
        check_delta("ease_factor_decrease", settings.ease_factor_decrease)?;

        if settings.max_streak == 0 {
            return Err(SettingsError::InvalidMaxStreak);
        }
        if settings.mastery.min_repetitions == 0 || settings.mastery.min_interval_days == 0 {
            return Err(SettingsError::InvalidMasteryThreshold);
        }

        Ok(settings)
    }
}

fn check_interval(field: &'static str, provided: u32) -> Result<(), SettingsError> {
    if provided == 0 || provided > MAX_INTERVAL_DAYS {
        return Err(SettingsError::InvalidInterval { field, provided });
    }
    Ok(())
}

fn check_delta(field: &'static str, provided: f64) -> Result<(), SettingsError> {
    if !provided.is_finite() || provided < 0.0 {
        return Err(SettingsError::InvalidEaseDelta { field, provided });
    }
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_draft_validates_to_defaults() {
        let settings = SchedulerSettingsDraft::new().validate().unwrap();
        assert_eq!(settings, SchedulerSettings::default());
    }

    #[test]
    fn to_draft_round_trips() {
        let settings = SchedulerSettingsDraft {
            learning_interval_2: Some(4),
            max_streak: Some(10),
            ..SchedulerSettingsDraft::default()
        }
        .validate()
        .unwrap();

        assert_eq!(settings.to_draft().validate().unwrap(), settings);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = SchedulerSettingsDraft {
            learning_interval_1: Some(0),
            ..SchedulerSettingsDraft::default()
        }
        .validate()
        .unwrap_err();

        assert_eq!(
            err,
            SettingsError::InvalidInterval {
                field: "learning_interval_1",
                provided: 0
            }
        );
    }

    #[test]
    fn interval_above_ceiling_is_rejected() {
        let err = SchedulerSettingsDraft {
            new_card_interval: Some(MAX_INTERVAL_DAYS + 1),
            ..SchedulerSettingsDraft::default()
        }
        .validate()
        .unwrap_err();

        assert!(matches!(
            err,
            SettingsError::InvalidInterval {
                field: "new_card_interval",
                ..
            }
        ));
    }

    #[test]
    fn inverted_ease_bounds_are_rejected() {
        let err = SchedulerSettingsDraft {
            min_ease_factor: Some(2.6),
            ..SchedulerSettingsDraft::default()
        }
        .validate()
        .unwrap_err();

        assert!(matches!(err, SettingsError::InvalidEaseBounds { .. }));
    }

    #[test]
    fn default_ease_outside_bounds_is_rejected() {
        let err = SchedulerSettingsDraft {
            default_ease_factor: Some(3.0),
            ..SchedulerSettingsDraft::default()
        }
        .validate()
        .unwrap_err();

        assert!(matches!(err, SettingsError::DefaultEaseOutOfBounds { .. }));
    }

    #[test]
    fn negative_or_nan_delta_is_rejected() {
        let err = SchedulerSettingsDraft {
            ease_factor_decrease: Some(-0.2),
            ..SchedulerSettingsDraft::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(
            err,
            SettingsError::InvalidEaseDelta {
                field: "ease_factor_decrease",
                ..
            }
        ));

        let err = SchedulerSettingsDraft {
            ease_factor_increase: Some(f64::NAN),
            ..SchedulerSettingsDraft::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidEaseDelta { .. }));
    }

    #[test]
    fn zero_streak_cap_and_mastery_thresholds_are_rejected() {
        let err = SchedulerSettingsDraft {
            max_streak: Some(0),
            ..SchedulerSettingsDraft::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, SettingsError::InvalidMaxStreak);

        let err = SchedulerSettingsDraft {
            mastery: Some(MasteryRule {
                min_repetitions: 0,
                ..MasteryRule::default()
            }),
            ..SchedulerSettingsDraft::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, SettingsError::InvalidMasteryThreshold);
    }

    #[test]
    fn mastery_criteria_evaluate_as_documented() {
        let rule = |criterion| MasteryRule {
            criterion,
            ..MasteryRule::default()
        };

        // not enough repetitions: never mastered
        assert!(!rule(MasteryCriterion::IntervalOrMaxEase).is_met(4, 60, 2.5, 2.5));

        assert!(rule(MasteryCriterion::IntervalOrMaxEase).is_met(5, 30, 1.3, 2.5));
        assert!(rule(MasteryCriterion::IntervalOrMaxEase).is_met(5, 2, 2.5, 2.5));
        assert!(!rule(MasteryCriterion::IntervalOrMaxEase).is_met(5, 29, 2.4, 2.5));

        assert!(rule(MasteryCriterion::Interval).is_met(5, 30, 1.3, 2.5));
        assert!(!rule(MasteryCriterion::Interval).is_met(5, 29, 2.5, 2.5));

        assert!(rule(MasteryCriterion::MaxEase).is_met(5, 1, 2.5, 2.5));
        assert!(!rule(MasteryCriterion::MaxEase).is_met(5, 100, 2.4, 2.5));

        assert!(rule(MasteryCriterion::IntervalAndMaxEase).is_met(6, 31, 2.5, 2.5));
        assert!(!rule(MasteryCriterion::IntervalAndMaxEase).is_met(6, 31, 2.4, 2.5));
    }

    #[test]
    fn mastery_criterion_string_round_trip() {
        for criterion in [
            MasteryCriterion::IntervalOrMaxEase,
            MasteryCriterion::Interval,
            MasteryCriterion::MaxEase,
            MasteryCriterion::IntervalAndMaxEase,
        ] {
            assert_eq!(MasteryCriterion::parse(criterion.as_str()), Some(criterion));
        }
        assert_eq!(MasteryCriterion::parse("sometimes"), None);
    }

    #[test]
    fn draft_deserializes_partial_json() {
        let draft: SchedulerSettingsDraft = serde_json::from_str(
            r#"{ "learning_interval_2": 3, "mastery": { "min_repetitions": 8, "min_interval_days": 21, "criterion": "interval" } }"#,
        )
        .unwrap();
        let settings = draft.validate().unwrap();

        assert_eq!(settings.learning_interval_2(), 3);
        assert_eq!(settings.learning_interval_1(), 1);
        assert_eq!(settings.mastery().min_repetitions, 8);
        assert_eq!(settings.mastery().criterion, MasteryCriterion::Interval);
    }
}
