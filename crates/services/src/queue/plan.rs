use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use srs_core::due::{days_until, is_due, is_new};
use srs_core::model::{CardId, CardProgress, LearnerId};

/// Presentation bucket, in the order buckets are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewBucket {
    /// Due at least one whole day ago.
    Overdue,
    /// Due, and less than one whole day late.
    DueToday,
    /// Never answered.
    New,
}

/// Caps applied while building a queue. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueLimits {
    /// Overdue and due-today entries combined.
    pub max_reviews: Option<usize>,
    pub max_new: Option<usize>,
}

impl QueueLimits {
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_reviews(mut self, max: usize) -> Self {
        self.max_reviews = Some(max);
        self
    }

    #[must_use]
    pub fn with_max_new(mut self, max: usize) -> Self {
        self.max_new = Some(max);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub card_id: CardId,
    pub bucket: ReviewBucket,
    /// `None` for a card the learner has no record for yet.
    pub progress: Option<CardProgress>,
    /// Whole days until due at build time; negative when overdue.
    pub days_until: i64,
}

/// Ordered cards for one review session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewQueue {
    entries: Vec<QueueEntry>,
}

impl ReviewQueue {
    /// Build a queue with default ordering (no shuffling of new cards).
    ///
    /// See [`QueueBuilder::build`].
    #[must_use]
    pub fn build(
        learner_id: LearnerId,
        records: impl IntoIterator<Item = CardProgress>,
        unseen_cards: impl IntoIterator<Item = CardId>,
        now: DateTime<Utc>,
        limits: QueueLimits,
    ) -> Self {
        QueueBuilder::new(learner_id, now)
            .with_limits(limits)
            .build(records, unseen_cards)
    }

    #[must_use]
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn count(&self, bucket: ReviewBucket) -> usize {
        self.entries.iter().filter(|e| e.bucket == bucket).count()
    }

    pub fn card_ids(&self) -> impl Iterator<Item = CardId> + '_ {
        self.entries.iter().map(|e| e.card_id)
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<QueueEntry> {
        self.entries
    }
}

/// Builds a [`ReviewQueue`]: overdue first, then due today, then new cards.
pub struct QueueBuilder {
    learner_id: LearnerId,
    now: DateTime<Utc>,
    limits: QueueLimits,
    shuffle_new: bool,
}

impl QueueBuilder {
    #[must_use]
    pub fn new(learner_id: LearnerId, now: DateTime<Utc>) -> Self {
        Self {
            learner_id,
            now,
            limits: QueueLimits::default(),
            shuffle_new: false,
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: QueueLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Enable or disable shuffling among new cards before the cap is applied.
    #[must_use]
    pub fn with_shuffle_new(mut self, shuffle: bool) -> Self {
        self.shuffle_new = shuffle;
        self
    }

    /// Sort records into buckets.
    ///
    /// - Records of other learners and records not yet due are skipped.
    /// - Overdue and due-today entries are ordered by `next_review`, ties by
    ///   card id.
    /// - New entries keep input order: unanswered records first, then
    ///   `unseen_cards`. An unseen id that already has a record, or that
    ///   repeats, is skipped.
    #[must_use]
    pub fn build(
        self,
        records: impl IntoIterator<Item = CardProgress>,
        unseen_cards: impl IntoIterator<Item = CardId>,
    ) -> ReviewQueue {
        let mut reviews: Vec<QueueEntry> = Vec::new();
        let mut new: Vec<QueueEntry> = Vec::new();
        let mut known: HashSet<CardId> = HashSet::new();

        for progress in records {
            if progress.learner_id != self.learner_id || !known.insert(progress.card_id) {
                continue;
            }

            let days = days_until(&progress, self.now);
            let bucket = if is_new(&progress) {
                ReviewBucket::New
            } else if !is_due(&progress, self.now) {
                continue;
            } else if days < 0 {
                ReviewBucket::Overdue
            } else {
                ReviewBucket::DueToday
            };

            let entry = QueueEntry {
                card_id: progress.card_id,
                bucket,
                days_until: days,
                progress: Some(progress),
            };
            if bucket == ReviewBucket::New {
                new.push(entry);
            } else {
                reviews.push(entry);
            }
        }

        for card_id in unseen_cards {
            if known.insert(card_id) {
                new.push(QueueEntry {
                    card_id,
                    bucket: ReviewBucket::New,
                    progress: None,
                    days_until: 0,
                });
            }
        }

        reviews.sort_by_key(|e| {
            (
                e.bucket,
                e.progress.as_ref().map(|p| p.next_review),
                e.card_id,
            )
        });
        if let Some(max) = self.limits.max_reviews {
            reviews.truncate(max);
        }

        if self.shuffle_new {
            let mut rng = rng();
            new.as_mut_slice().shuffle(&mut rng);
        }
        if let Some(max) = self.limits.max_new {
            new.truncate(max);
        }

        reviews.extend(new);
        ReviewQueue { entries: reviews }
    }
}
