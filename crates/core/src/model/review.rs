use serde::{Deserialize, Serialize};

/// Highest quality grade accepted by the scheduler.
pub const MAX_QUALITY: u8 = 5;

/// Lowest quality grade that counts as a successful recall.
pub const PASSING_QUALITY: u8 = 3;

/// Quality assigned to a binary "correct" answer.
pub const CORRECT_QUALITY: u8 = 4;

/// Quality assigned to a binary "incorrect" answer.
pub const INCORRECT_QUALITY: u8 = 1;

//
// ─── OUTCOME SOURCE ───────────────────────────────────────────────────────────
//

/// Where a review outcome came from.
///
/// Binary answers only carry right/wrong, so the scheduler adjusts the ease
/// factor by the flat deltas from settings. Graded answers carry a real 0-5
/// quality and use the SM-2 ease formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeSource {
    Binary,
    Graded,
}

//
// ─── REVIEW OUTCOME ───────────────────────────────────────────────────────────
//

/// The learner's answer to a single review, as a 0-5 quality grade.
///
/// Quality is the canonical representation. Binary judgments are mapped
/// explicitly through [`ReviewOutcome::from_correct`]: correct becomes quality
/// 4 and incorrect becomes quality 1.
///
/// Graded outcomes are not range-checked on construction; the scheduler rejects
/// anything above 5 with `SchedulerError::InvalidQuality`.
///
/// # Examples
///
/// ```
/// # use srs_core::model::{OutcomeSource, ReviewOutcome};
/// let outcome = ReviewOutcome::from_correct(true);
/// assert_eq!(outcome.quality(), 4);
/// assert!(outcome.is_correct());
/// assert_eq!(outcome.source(), OutcomeSource::Binary);
///
/// assert!(!ReviewOutcome::graded(2).is_correct());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    quality: u8,
    source: OutcomeSource,
}

impl ReviewOutcome {
    /// A graded answer with the given 0-5 quality.
    #[must_use]
    pub fn graded(quality: u8) -> Self {
        Self {
            quality,
            source: OutcomeSource::Graded,
        }
    }

    /// Map a binary right/wrong judgment onto the quality scale.
    #[must_use]
    pub fn from_correct(is_correct: bool) -> Self {
        let quality = if is_correct {
            CORRECT_QUALITY
        } else {
            INCORRECT_QUALITY
        };
        Self {
            quality,
            source: OutcomeSource::Binary,
        }
    }

    #[must_use]
    pub fn correct() -> Self {
        Self::from_correct(true)
    }

    #[must_use]
    pub fn incorrect() -> Self {
        Self::from_correct(false)
    }

    #[must_use]
    pub fn quality(&self) -> u8 {
        self.quality
    }

    #[must_use]
    pub fn source(&self) -> OutcomeSource {
        self.source
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.quality <= MAX_QUALITY
    }

    /// Quality 3 and above is a successful recall.
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.quality >= PASSING_QUALITY
    }
}

impl From<bool> for ReviewOutcome {
    fn from(is_correct: bool) -> Self {
        Self::from_correct(is_correct)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_mapping_is_fixed() {
        assert_eq!(ReviewOutcome::correct().quality(), CORRECT_QUALITY);
        assert_eq!(ReviewOutcome::incorrect().quality(), INCORRECT_QUALITY);
        assert_eq!(ReviewOutcome::from(true), ReviewOutcome::correct());
        assert_eq!(ReviewOutcome::incorrect().source(), OutcomeSource::Binary);
    }

    #[test]
    fn passing_boundary_is_three() {
        assert!(!ReviewOutcome::graded(2).is_correct());
        assert!(ReviewOutcome::graded(3).is_correct());
        assert!(ReviewOutcome::graded(5).is_correct());
        assert!(!ReviewOutcome::graded(0).is_correct());
    }

    #[test]
    fn out_of_range_quality_is_flagged() {
        assert!(ReviewOutcome::graded(5).is_valid());
        assert!(!ReviewOutcome::graded(6).is_valid());
    }
}
