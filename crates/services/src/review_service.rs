use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use srs_core::{
    model::{CardId, CardProgress, LearnerId, ReviewOutcome, SchedulerSettings},
    scheduler::{Preview, preview, schedule},
    time::Clock,
};
use storage::repository::{
    ProgressRepository, ReviewLogRecord, ReviewPersistence, SettingsRepository, StorageError,
};

use crate::error::ReviewServiceError;

/// Attempts per review before a version conflict is reported to the caller.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

//
// ─── RESULT ────────────────────────────────────────────────────────────────────
//

/// A review that was scheduled and stored together with its log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedReview {
    /// Record before the answer; `None` if the learner had never seen the card.
    pub previous: Option<CardProgress>,
    pub progress: CardProgress,
    pub version: u64,
    pub log_id: i64,
    /// Number of load/schedule/write rounds it took, 1 without contention.
    pub attempts: u32,
}

impl PersistedReview {
    #[must_use]
    pub fn was_new(&self) -> bool {
        self.previous.is_none()
    }

    /// Whether this answer flipped the card into the mastered state.
    #[must_use]
    pub fn newly_mastered(&self) -> bool {
        self.progress.is_mastered && !self.previous.as_ref().is_some_and(|p| p.is_mastered)
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Review driver: load-or-create, schedule, and persist one answer at a time.
///
/// The read-modify-write is optimistic. If another writer updates the same
/// (card, learner) between the load and the write, the review is re-run from
/// a fresh load, up to `max_attempts` times.
#[derive(Clone)]
pub struct ReviewService {
    clock: Clock,
    max_attempts: u32,
    progress: Arc<dyn ProgressRepository>,
    reviews: Arc<dyn ReviewPersistence>,
    settings: Arc<dyn SettingsRepository>,
}

impl ReviewService {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        reviews: Arc<dyn ReviewPersistence>,
        settings: Arc<dyn SettingsRepository>,
    ) -> Self {
        Self {
            clock,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            progress,
            reviews,
            settings,
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Bound the conflict retries. Zero is treated as one attempt.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Current time according to the service's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn settings_for(
        &self,
        learner_id: LearnerId,
    ) -> Result<SchedulerSettings, ReviewServiceError> {
        Ok(self
            .settings
            .get_settings(learner_id)
            .await?
            .unwrap_or_default())
    }

    /// Current record of a card, or the fresh state it would start from.
    ///
    /// # Errors
    ///
    /// Returns storage errors if the record or the learner settings cannot be
    /// loaded.
    pub async fn current(
        &self,
        card_id: CardId,
        learner_id: LearnerId,
    ) -> Result<CardProgress, ReviewServiceError> {
        if let Some(stored) = self.progress.load(card_id, learner_id).await? {
            return Ok(stored.progress);
        }
        let settings = self.settings_for(learner_id).await?;
        Ok(CardProgress::fresh(
            card_id,
            learner_id,
            &settings,
            self.now(),
        ))
    }

    /// Record one answer for a card and persist the result atomically with a
    /// review log entry.
    ///
    /// A card without a stored record starts from [`CardProgress::fresh`] and
    /// is inserted on first answer.
    ///
    /// # Errors
    ///
    /// - `Scheduler` if the outcome is invalid or the stored record is corrupt
    ///   (nothing is written)
    /// - `ConflictRetriesExhausted` if concurrent writers won every attempt
    /// - `Storage` for any other backend failure
    pub async fn review(
        &self,
        card_id: CardId,
        learner_id: LearnerId,
        outcome: ReviewOutcome,
    ) -> Result<PersistedReview, ReviewServiceError> {
        let settings = self.settings_for(learner_id).await?;

        for attempt in 1..=self.max_attempts {
            let reviewed_at = self.now();
            let stored = self.progress.load(card_id, learner_id).await?;
            let (previous, expected_version) = match stored {
                Some(stored) => (Some(stored.progress), Some(stored.version)),
                None => (None, None),
            };

            let scheduled = match &previous {
                Some(current) => schedule(current, outcome, &settings, reviewed_at)?,
                None => {
                    let fresh = CardProgress::fresh(card_id, learner_id, &settings, reviewed_at);
                    schedule(&fresh, outcome, &settings, reviewed_at)?
                }
            };

            let log = ReviewLogRecord::from_review(outcome, &scheduled, reviewed_at);
            match self
                .reviews
                .apply_review(&scheduled, expected_version, log)
                .await
            {
                Ok(applied) => {
                    debug!(
                        %card_id,
                        %learner_id,
                        quality = outcome.quality(),
                        interval_days = scheduled.interval_days,
                        version = applied.version,
                        "review persisted"
                    );
                    return Ok(PersistedReview {
                        previous,
                        progress: scheduled,
                        version: applied.version,
                        log_id: applied.log_id,
                        attempts: attempt,
                    });
                }
                Err(StorageError::Conflict) => {
                    warn!(%card_id, %learner_id, attempt, "review write conflicted, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ReviewServiceError::ConflictRetriesExhausted {
            card_id,
            learner_id,
            attempts: self.max_attempts,
        })
    }

    /// Binary answer shortcut: correct maps to quality 4, incorrect to 1.
    ///
    /// # Errors
    ///
    /// Same as [`ReviewService::review`].
    pub async fn answer(
        &self,
        card_id: CardId,
        learner_id: LearnerId,
        is_correct: bool,
    ) -> Result<PersistedReview, ReviewServiceError> {
        self.review(card_id, learner_id, ReviewOutcome::from_correct(is_correct))
            .await
    }

    /// Review several cards of one learner concurrently.
    ///
    /// Results come back in input order. Each review succeeds or fails on its
    /// own; answers for the same card contend through the version check and
    /// are retried like any other conflict. A review task that panics shows
    /// up as `ReviewServiceError::Task` at its own position.
    pub async fn review_many(
        &self,
        learner_id: LearnerId,
        answers: Vec<(CardId, ReviewOutcome)>,
    ) -> Vec<Result<PersistedReview, ReviewServiceError>> {
        let mut tasks = JoinSet::new();
        let mut slots = HashMap::with_capacity(answers.len());
        for (index, (card_id, outcome)) in answers.into_iter().enumerate() {
            let service = self.clone();
            let handle = tasks.spawn(async move {
                (index, service.review(card_id, learner_id, outcome).await)
            });
            slots.insert(handle.id(), index);
        }

        let mut results: Vec<Option<Result<PersistedReview, ReviewServiceError>>> =
            std::iter::repeat_with(|| None).take(slots.len()).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(err) => match slots.get(&err.id()) {
                    Some(&index) => {
                        warn!(%learner_id, index, error = %err, "review task failed");
                        results[index] = Some(Err(ReviewServiceError::Task(err.to_string())));
                    }
                    None => warn!(%learner_id, error = %err, "unknown review task failed"),
                },
            }
        }

        results
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(ReviewServiceError::Task(
                        "review task did not finish".to_owned(),
                    ))
                })
            })
            .collect()
    }

    /// What a binary answer would do to a card right now, without saving.
    ///
    /// # Errors
    ///
    /// Returns storage errors on load failures and scheduler errors for a
    /// corrupt stored record.
    pub async fn preview(
        &self,
        card_id: CardId,
        learner_id: LearnerId,
    ) -> Result<Preview, ReviewServiceError> {
        let settings = self.settings_for(learner_id).await?;
        let now = self.now();
        let current = match self.progress.load(card_id, learner_id).await? {
            Some(stored) => stored.progress,
            None => CardProgress::fresh(card_id, learner_id, &settings, now),
        };
        Ok(preview(&current, &settings, now)?)
    }

    /// Forget everything a learner has done: progress records and review logs.
    ///
    /// # Errors
    ///
    /// Returns storage errors if the deletion fails.
    pub async fn reset_learner(&self, learner_id: LearnerId) -> Result<u64, ReviewServiceError> {
        let removed = self.progress.reset_learner(learner_id).await?;
        debug!(%learner_id, removed, "learner progress reset");
        Ok(removed)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
