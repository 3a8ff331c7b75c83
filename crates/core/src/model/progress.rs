use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CardId, LearnerId};
use crate::model::settings::SchedulerSettings;

/// Scheduling state of one card for one learner.
///
/// Records are created lazily the first time a learner reviews a card and are
/// replaced wholesale by the scheduler after every review. When
/// `last_reviewed` is set, `next_review` equals `last_reviewed` plus
/// `interval_days` days.
///
/// Fields are public because records round-trip through storage unchanged;
/// the scheduler refuses records whose interval or ease factor is out of
/// range instead of repairing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardProgress {
    pub card_id: CardId,
    pub learner_id: LearnerId,
    pub interval_days: u32,
    pub repetitions: u32,
    pub ease_factor: f64,
    pub streak: u32,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub next_review: DateTime<Utc>,
    pub times_seen: u32,
    pub times_correct: u32,
    pub total_reviews: u32,
    pub is_mastered: bool,
}

impl CardProgress {
    /// Starting state for a card the learner has never reviewed.
    ///
    /// The card is due immediately.
    #[must_use]
    pub fn fresh(
        card_id: CardId,
        learner_id: LearnerId,
        settings: &SchedulerSettings,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            card_id,
            learner_id,
            interval_days: settings.new_card_interval(),
            repetitions: 0,
            ease_factor: settings.default_ease_factor(),
            streak: 0,
            last_reviewed: None,
            next_review: now,
            times_seen: 0,
            times_correct: 0,
            total_reviews: 0,
            is_mastered: false,
        }
    }

    /// Rehydrate a record from persisted storage.
    ///
    /// Values are kept exactly as stored. An out-of-range interval or ease
    /// factor survives the round trip and is rejected later by the scheduler.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        card_id: CardId,
        learner_id: LearnerId,
        interval_days: u32,
        repetitions: u32,
        ease_factor: f64,
        streak: u32,
        last_reviewed: Option<DateTime<Utc>>,
        next_review: DateTime<Utc>,
        times_seen: u32,
        times_correct: u32,
        total_reviews: u32,
        is_mastered: bool,
    ) -> Self {
        Self {
            card_id,
            learner_id,
            interval_days,
            repetitions,
            ease_factor,
            streak,
            last_reviewed,
            next_review,
            times_seen,
            times_correct,
            total_reviews,
            is_mastered,
        }
    }

    /// Storage key of this record.
    #[must_use]
    pub fn key(&self) -> (CardId, LearnerId) {
        (self.card_id, self.learner_id)
    }

    /// Fraction of answers that were correct, or `None` if never seen.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        if self.times_seen == 0 {
            return None;
        }
        Some(f64::from(self.times_correct) / f64::from(self.times_seen))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn fresh_record_uses_settings_and_is_due_now() {
        let settings = SchedulerSettings::default();
        let now = fixed_now();
        let progress = CardProgress::fresh(CardId::new(3), LearnerId::new(1), &settings, now);

        assert_eq!(progress.key(), (CardId::new(3), LearnerId::new(1)));
        assert_eq!(progress.interval_days, settings.new_card_interval());
        assert_eq!(progress.ease_factor, settings.default_ease_factor());
        assert_eq!(progress.next_review, now);
        assert_eq!(progress.last_reviewed, None);
        assert_eq!(progress.total_reviews, 0);
        assert!(!progress.is_mastered);
    }

    #[test]
    fn accuracy_is_none_until_seen() {
        let mut progress = CardProgress::fresh(
            CardId::new(1),
            LearnerId::new(1),
            &SchedulerSettings::default(),
            fixed_now(),
        );
        assert_eq!(progress.accuracy(), None);

        progress.times_seen = 4;
        progress.times_correct = 3;
        assert_eq!(progress.accuracy(), Some(0.75));
    }

    #[test]
    fn persisted_values_are_not_normalised() {
        let now = fixed_now();
        let progress = CardProgress::from_persisted(
            CardId::new(5),
            LearnerId::new(2),
            0,
            7,
            0.4,
            3,
            Some(now),
            now,
            9,
            12,
            9,
            true,
        );

        assert_eq!(progress.key(), (CardId::new(5), LearnerId::new(2)));
        assert_eq!(progress.interval_days, 0);
        assert_eq!(progress.repetitions, 7);
        assert_eq!(progress.ease_factor, 0.4);
        assert_eq!(progress.streak, 3);
        assert_eq!(progress.last_reviewed, Some(now));
        assert_eq!(progress.next_review, now);
        assert_eq!(progress.times_seen, 9);
        assert_eq!(progress.times_correct, 12);
        assert_eq!(progress.total_reviews, 9);
        assert!(progress.is_mastered);
    }

    #[test]
    fn serde_round_trip_keeps_every_field() {
        let progress = CardProgress::fresh(
            CardId::new(8),
            LearnerId::new(2),
            &SchedulerSettings::default(),
            fixed_now(),
        );
        let json = serde_json::to_string(&progress).unwrap();
        let back: CardProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, progress);
    }
}
