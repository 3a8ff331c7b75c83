use std::sync::Arc;

use srs_core::model::{CardId, CardProgress, LearnerId};
use srs_core::stats::ProgressStats;
use srs_core::time::Clock;
use storage::repository::ProgressRepository;
use tracing::debug;

use super::plan::{QueueBuilder, QueueLimits, ReviewQueue};
use crate::error::QueueError;

/// Read side of a learner's progress: session queues and summary counts.
#[derive(Clone)]
pub struct QueueService {
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
    shuffle_new: bool,
}

impl QueueService {
    #[must_use]
    pub fn new(clock: Clock, progress: Arc<dyn ProgressRepository>) -> Self {
        Self {
            clock,
            progress,
            shuffle_new: false,
        }
    }

    #[must_use]
    pub fn with_shuffle_new(mut self, shuffle: bool) -> Self {
        self.shuffle_new = shuffle;
        self
    }

    /// Build the session queue for a learner.
    ///
    /// `catalog` lists the card ids available to study; ids without a stored
    /// record become new entries.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Storage` if records cannot be loaded.
    pub async fn build_queue(
        &self,
        learner_id: LearnerId,
        catalog: &[CardId],
        limits: QueueLimits,
    ) -> Result<ReviewQueue, QueueError> {
        let records = self.progress.list_for_learner(learner_id).await?;
        let queue = QueueBuilder::new(learner_id, self.clock.now())
            .with_limits(limits)
            .with_shuffle_new(self.shuffle_new)
            .build(records, catalog.iter().copied());

        debug!(%learner_id, size = queue.len(), "built review queue");
        Ok(queue)
    }

    /// Due records, most overdue first.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Storage` on backend failures.
    pub async fn due_cards(
        &self,
        learner_id: LearnerId,
        limit: u32,
    ) -> Result<Vec<CardProgress>, QueueError> {
        Ok(self
            .progress
            .due_for_learner(learner_id, self.clock.now(), limit)
            .await?)
    }

    /// Summary counts over every record of a learner.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Storage` on backend failures.
    pub async fn stats(&self, learner_id: LearnerId) -> Result<ProgressStats, QueueError> {
        let records = self.progress.list_for_learner(learner_id).await?;
        Ok(ProgressStats::collect(&records, self.clock.now()))
    }
}
