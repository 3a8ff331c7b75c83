use std::sync::Arc;

use srs_core::model::{CardId, LearnerId};
use storage::repository::{ReviewLogRecord, ReviewLogRepository, Storage, StorageError};
use tracing::info;

use crate::Clock;
use crate::error::AppServicesError;
use crate::queue::QueueService;
use crate::review_service::ReviewService;
use crate::settings_service::SettingsService;

/// Assembles the services a review driver needs over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    reviews: Arc<ReviewService>,
    queue: Arc<QueueService>,
    settings: Arc<SettingsService>,
    review_logs: Arc<dyn ReviewLogRepository>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, running migrations first.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        info!("app services ready on sqlite");
        Ok(Self::from_storage(&storage, clock))
    }

    /// Build services over a fresh in-memory store.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let reviews = Arc::new(ReviewService::new(
            clock,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.reviews),
            Arc::clone(&storage.settings),
        ));
        let queue = Arc::new(QueueService::new(clock, Arc::clone(&storage.progress)));
        let settings = Arc::new(SettingsService::new(Arc::clone(&storage.settings)));

        Self {
            clock,
            reviews,
            queue,
            settings,
            review_logs: Arc::clone(&storage.review_logs),
        }
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn reviews(&self) -> Arc<ReviewService> {
        Arc::clone(&self.reviews)
    }

    #[must_use]
    pub fn queue(&self) -> Arc<QueueService> {
        Arc::clone(&self.queue)
    }

    #[must_use]
    pub fn settings(&self) -> Arc<SettingsService> {
        Arc::clone(&self.settings)
    }

    /// Answer history of one card for one learner, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    pub async fn review_history(
        &self,
        card_id: CardId,
        learner_id: LearnerId,
    ) -> Result<Vec<ReviewLogRecord>, StorageError> {
        self.review_logs.logs_for_card(card_id, learner_id).await
    }
}
