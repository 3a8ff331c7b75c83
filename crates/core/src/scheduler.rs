use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::{
    CardId, CardProgress, LearnerId, MAX_INTERVAL_DAYS, MAX_QUALITY, OutcomeSource,
    ReviewOutcome, SchedulerSettings,
};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// What is wrong with a progress record handed to the scheduler.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProgressDefect {
    #[error("interval must be at least 1 day, got {0}")]
    IntervalBelowOne(u32),
    #[error("ease factor {provided} is outside [{min}, {max}]")]
    EaseOutOfBounds { provided: f64, min: f64, max: f64 },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("quality must be in 0..={MAX_QUALITY}, got {0}")]
    InvalidQuality(u8),
    #[error("invalid progress for card {card_id} and learner {learner_id}: {defect}")]
    InvalidProgressState {
        card_id: CardId,
        learner_id: LearnerId,
        defect: ProgressDefect,
    },
    #[error("next review date is out of range for card {card_id}")]
    TimestampOutOfRange { card_id: CardId },
}

//
// ─── SCHEDULING ────────────────────────────────────────────────────────────────
//

/// Compute the next progress state for a card after one review.
///
/// This is the only scheduling entry point. It is a pure function of its
/// arguments: the same inputs always produce the same record, and `current`
/// is never modified.
///
/// A correct answer (quality >= 3) advances the card:
/// - the first success uses `learning_interval_1`, the second
///   `learning_interval_2`, and later ones multiply the current interval by
///   the current ease factor;
/// - repetitions and streak grow by one, the streak capped at `max_streak`.
///
/// An incorrect answer is a lapse: repetitions and streak reset to 0 and the
/// interval falls back to `new_card_interval`.
///
/// When ease adjustment is enabled, a lapse lowers the ease factor by
/// `ease_factor_decrease` whatever the outcome source. Correct binary answers
/// raise it by `ease_factor_increase`; correct graded answers use the SM-2
/// formula ([`sm2_ease_delta`]). The result is always clamped to the
/// configured bounds.
///
/// # Errors
///
/// - `InvalidQuality` if the outcome's quality is above 5
/// - `InvalidProgressState` if `current` has an interval below 1 or an ease
///   factor outside the configured bounds
/// - `TimestampOutOfRange` if `now` plus the new interval is not representable
///
/// # Examples
///
/// ```
/// # use srs_core::model::{CardId, CardProgress, LearnerId, ReviewOutcome, SchedulerSettings};
/// # use srs_core::scheduler::schedule;
/// let settings = SchedulerSettings::default();
/// let now = srs_core::time::fixed_now();
/// let fresh = CardProgress::fresh(CardId::new(1), LearnerId::new(1), &settings, now);
///
/// let next = schedule(&fresh, ReviewOutcome::correct(), &settings, now)?;
/// assert_eq!(next.repetitions, 1);
/// assert_eq!(next.interval_days, settings.learning_interval_1());
/// # Ok::<(), srs_core::scheduler::SchedulerError>(())
/// ```
pub fn schedule(
    current: &CardProgress,
    outcome: ReviewOutcome,
    settings: &SchedulerSettings,
    now: DateTime<Utc>,
) -> Result<CardProgress, SchedulerError> {
    if !outcome.is_valid() {
        return Err(SchedulerError::InvalidQuality(outcome.quality()));
    }
    check_progress(current, settings)?;

    let ease_factor = next_ease_factor(current.ease_factor, outcome, settings);
    let mut next = current.clone();

    if outcome.is_correct() {
        next.interval_days = match current.repetitions {
            0 => settings.learning_interval_1(),
            1 => settings.learning_interval_2(),
            _ => grow_interval(current.interval_days, current.ease_factor),
        };
        next.repetitions = current.repetitions.saturating_add(1);
        next.streak = current
            .streak
            .saturating_add(1)
            .min(settings.max_streak());
        next.times_correct = current.times_correct.saturating_add(1);
        next.is_mastered = settings.mastery().is_met(
            next.repetitions,
            next.interval_days,
            ease_factor,
            settings.max_ease_factor(),
        );
    } else {
        next.interval_days = settings.new_card_interval();
        next.repetitions = 0;
        next.streak = 0;
        next.is_mastered = false;
    }

    next.ease_factor = ease_factor;
    next.times_seen = current.times_seen.saturating_add(1);
    next.total_reviews = current.total_reviews.saturating_add(1);
    next.last_reviewed = Some(now);
    next.next_review = now
        .checked_add_signed(Duration::days(i64::from(next.interval_days)))
        .ok_or(SchedulerError::TimestampOutOfRange {
            card_id: current.card_id,
        })?;

    Ok(next)
}

/// Both possible results of a binary review, computed up front.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub on_correct: CardProgress,
    pub on_incorrect: CardProgress,
}

/// Schedule `current` against both binary outcomes without committing to either.
///
/// Useful for showing "next review in N days" on answer buttons.
///
/// # Errors
///
/// Same as [`schedule`].
pub fn preview(
    current: &CardProgress,
    settings: &SchedulerSettings,
    now: DateTime<Utc>,
) -> Result<Preview, SchedulerError> {
    Ok(Preview {
        on_correct: schedule(current, ReviewOutcome::correct(), settings, now)?,
        on_incorrect: schedule(current, ReviewOutcome::incorrect(), settings, now)?,
    })
}

/// SM-2 ease adjustment for a 0-5 quality grade.
///
/// Quality 5 adds 0.1, quality 4 leaves the factor unchanged, and lower grades
/// subtract progressively more (quality 0 subtracts 0.8). The scheduler only
/// applies it to correct graded answers; lapses take the flat decrease.
#[must_use]
pub fn sm2_ease_delta(quality: u8) -> f64 {
    let miss = f64::from(MAX_QUALITY.saturating_sub(quality));
    0.1 - miss * (0.08 + miss * 0.02)
}

fn next_ease_factor(current: f64, outcome: ReviewOutcome, settings: &SchedulerSettings) -> f64 {
    if !settings.enable_ease_factor_adjustment() {
        return current;
    }

    // lapses always take the flat decrease, whatever the source
    let adjusted = match outcome.source() {
        _ if !outcome.is_correct() => current - settings.ease_factor_decrease(),
        OutcomeSource::Graded => current + sm2_ease_delta(outcome.quality()),
        OutcomeSource::Binary => current + settings.ease_factor_increase(),
    };

    settings.clamp_ease(adjusted)
}

fn grow_interval(interval_days: u32, ease_factor: f64) -> u32 {
    let grown = (f64::from(interval_days) * ease_factor).round();
    if grown >= f64::from(MAX_INTERVAL_DAYS) {
        return MAX_INTERVAL_DAYS;
    }

    // grown is finite and within [0, MAX_INTERVAL_DAYS) here
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let days = grown as u32;
    days.max(1)
}

fn check_progress(
    progress: &CardProgress,
    settings: &SchedulerSettings,
) -> Result<(), SchedulerError> {
    let defect = if progress.interval_days < 1 {
        Some(ProgressDefect::IntervalBelowOne(progress.interval_days))
    } else if !settings.ease_in_bounds(progress.ease_factor) {
        Some(ProgressDefect::EaseOutOfBounds {
            provided: progress.ease_factor,
            min: settings.min_ease_factor(),
            max: settings.max_ease_factor(),
        })
    } else {
        None
    };

    match defect {
        Some(defect) => Err(SchedulerError::InvalidProgressState {
            card_id: progress.card_id,
            learner_id: progress.learner_id,
            defect,
        }),
        None => Ok(()),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
