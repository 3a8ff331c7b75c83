use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use srs_core::model::{
    CardId, CardProgress, LearnerId, OutcomeSource, ReviewOutcome, SchedulerSettings,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// The record changed (or appeared) since it was loaded.
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A progress record together with its optimistic-concurrency version.
///
/// Versions start at 1 on insert and grow by one on every write.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProgress {
    pub progress: CardProgress,
    pub version: u64,
}

/// One answered review, appended after the progress record is updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewLogRecord {
    pub id: Option<i64>,
    pub card_id: CardId,
    pub learner_id: LearnerId,
    pub quality: u8,
    pub source: OutcomeSource,
    pub reviewed_at: DateTime<Utc>,
    pub interval_days: u32,
    pub ease_factor: f64,
    pub next_review: DateTime<Utc>,
}

impl ReviewLogRecord {
    /// Build a log entry from the outcome and the record the scheduler produced.
    #[must_use]
    pub fn from_review(
        outcome: ReviewOutcome,
        scheduled: &CardProgress,
        reviewed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            card_id: scheduled.card_id,
            learner_id: scheduled.learner_id,
            quality: outcome.quality(),
            source: outcome.source(),
            reviewed_at,
            interval_days: scheduled.interval_days,
            ease_factor: scheduled.ease_factor,
            next_review: scheduled.next_review,
        }
    }
}

/// Result of atomically writing a progress record plus its log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedWrite {
    pub version: u64,
    pub log_id: i64,
}

/// Progress Store: one record per (card, learner).
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the record for a card and learner.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures. A card the learner never
    /// reviewed is `Ok(None)`, not an error.
    async fn load(
        &self,
        card_id: CardId,
        learner_id: LearnerId,
    ) -> Result<Option<StoredProgress>, StorageError>;

    /// Unconditional upsert. Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn save(&self, progress: &CardProgress) -> Result<u64, StorageError>;

    /// Write only if the stored version still equals `expected_version`
    /// (`None` meaning no record may exist yet). Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if another writer got there first.
    async fn compare_and_save(
        &self,
        progress: &CardProgress,
        expected_version: Option<u64>,
    ) -> Result<u64, StorageError>;

    /// All records of a learner, ordered by card id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_for_learner(&self, learner_id: LearnerId)
    -> Result<Vec<CardProgress>, StorageError>;

    /// Records with `next_review <= now`, earliest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn due_for_learner(
        &self,
        learner_id: LearnerId,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<CardProgress>, StorageError>;

    /// Delete every record and review log entry of a learner. Returns the
    /// number of progress records removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn reset_learner(&self, learner_id: LearnerId) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait ReviewLogRepository: Send + Sync {
    /// Append a log entry and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be stored.
    async fn append_log(&self, log: ReviewLogRecord) -> Result<i64, StorageError>;

    /// History of one card for one learner, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn logs_for_card(
        &self,
        card_id: CardId,
        learner_id: LearnerId,
    ) -> Result<Vec<ReviewLogRecord>, StorageError>;
}

/// Atomic persistence of a scheduled review.
#[async_trait]
pub trait ReviewPersistence: Send + Sync {
    /// Compare-and-save `progress` and append `log` in one unit of work.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the version check fails or the log
    /// does not belong to `progress`; nothing is written in that case.
    async fn apply_review(
        &self,
        progress: &CardProgress,
        expected_version: Option<u64>,
        log: ReviewLogRecord,
    ) -> Result<AppliedWrite, StorageError>;
}

/// Per-learner scheduler configuration.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures or if stored values no
    /// longer validate.
    async fn get_settings(
        &self,
        learner_id: LearnerId,
    ) -> Result<Option<SchedulerSettings>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the settings cannot be stored.
    async fn save_settings(
        &self,
        learner_id: LearnerId,
        settings: &SchedulerSettings,
    ) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct Tables {
    progress: HashMap<(CardId, LearnerId), StoredProgress>,
    logs: Vec<ReviewLogRecord>,
    next_log_id: i64,
    settings: HashMap<LearnerId, SchedulerSettings>,
}

impl Tables {
    fn upsert(&mut self, progress: &CardProgress) -> u64 {
        let version = self
            .progress
            .get(&progress.key())
            .map_or(1, |stored| stored.version + 1);
        self.progress.insert(
            progress.key(),
            StoredProgress {
                progress: progress.clone(),
                version,
            },
        );
        version
    }

    fn check_version(
        &self,
        key: (CardId, LearnerId),
        expected_version: Option<u64>,
    ) -> Result<(), StorageError> {
        let current = self.progress.get(&key).map(|stored| stored.version);
        if current == expected_version {
            Ok(())
        } else {
            Err(StorageError::Conflict)
        }
    }

    fn push_log(&mut self, mut log: ReviewLogRecord) -> i64 {
        self.next_log_id += 1;
        let id = self.next_log_id;
        log.id = Some(id);
        self.logs.push(log);
        id
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// All tables live behind one mutex, so compare-and-save and
/// `apply_review` are atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load(
        &self,
        card_id: CardId,
        learner_id: LearnerId,
    ) -> Result<Option<StoredProgress>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.progress.get(&(card_id, learner_id)).cloned())
    }

    async fn save(&self, progress: &CardProgress) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        Ok(guard.upsert(progress))
    }

    async fn compare_and_save(
        &self,
        progress: &CardProgress,
        expected_version: Option<u64>,
    ) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        guard.check_version(progress.key(), expected_version)?;
        Ok(guard.upsert(progress))
    }

    async fn list_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<CardProgress>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<CardProgress> = guard
            .progress
            .values()
            .filter(|stored| stored.progress.learner_id == learner_id)
            .map(|stored| stored.progress.clone())
            .collect();
        out.sort_by_key(|p| p.card_id);
        Ok(out)
    }

    async fn due_for_learner(
        &self,
        learner_id: LearnerId,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<CardProgress>, StorageError> {
        let guard = self.lock()?;
        let mut due: Vec<CardProgress> = guard
            .progress
            .values()
            .filter(|stored| {
                stored.progress.learner_id == learner_id && stored.progress.next_review <= now
            })
            .map(|stored| stored.progress.clone())
            .collect();
        due.sort_by_key(|p| (p.next_review, p.card_id));
        due.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(due)
    }

    async fn reset_learner(&self, learner_id: LearnerId) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let before = guard.progress.len();
        guard.progress.retain(|(_, learner), _| *learner != learner_id);
        guard.logs.retain(|log| log.learner_id != learner_id);
        let removed = before - guard.progress.len();
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl ReviewLogRepository for InMemoryRepository {
    async fn append_log(&self, log: ReviewLogRecord) -> Result<i64, StorageError> {
        let mut guard = self.lock()?;
        Ok(guard.push_log(log))
    }

    async fn logs_for_card(
        &self,
        card_id: CardId,
        learner_id: LearnerId,
    ) -> Result<Vec<ReviewLogRecord>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<ReviewLogRecord> = guard
            .logs
            .iter()
            .filter(|log| log.card_id == card_id && log.learner_id == learner_id)
            .cloned()
            .collect();
        out.sort_by_key(|log| (log.reviewed_at, log.id));
        Ok(out)
    }
}

#[async_trait]
impl ReviewPersistence for InMemoryRepository {
    async fn apply_review(
        &self,
        progress: &CardProgress,
        expected_version: Option<u64>,
        log: ReviewLogRecord,
    ) -> Result<AppliedWrite, StorageError> {
        if (log.card_id, log.learner_id) != progress.key() {
            return Err(StorageError::Conflict);
        }

        let mut guard = self.lock()?;
        guard.check_version(progress.key(), expected_version)?;
        let version = guard.upsert(progress);
        let log_id = guard.push_log(log);
        Ok(AppliedWrite { version, log_id })
    }
}

#[async_trait]
impl SettingsRepository for InMemoryRepository {
    async fn get_settings(
        &self,
        learner_id: LearnerId,
    ) -> Result<Option<SchedulerSettings>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.settings.get(&learner_id).cloned())
    }

    async fn save_settings(
        &self,
        learner_id: LearnerId,
        settings: &SchedulerSettings,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.settings.insert(learner_id, settings.clone());
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub review_logs: Arc<dyn ReviewLogRepository>,
    pub reviews: Arc<dyn ReviewPersistence>,
    pub settings: Arc<dyn SettingsRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            progress: Arc::new(repo.clone()),
            review_logs: Arc::new(repo.clone()),
            reviews: Arc::new(repo.clone()),
            settings: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use srs_core::scheduler::schedule;
    use srs_core::time::fixed_now;

    fn fresh(card: u64, learner: u64) -> CardProgress {
        CardProgress::fresh(
            CardId::new(card),
            LearnerId::new(learner),
            &SchedulerSettings::default(),
            fixed_now(),
        )
    }

    #[tokio::test]
    async fn missing_record_loads_as_none() {
        let repo = InMemoryRepository::new();
        let loaded = repo.load(CardId::new(1), LearnerId::new(1)).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn save_bumps_version() {
        let repo = InMemoryRepository::new();
        let progress = fresh(1, 1);

        assert_eq!(repo.save(&progress).await.unwrap(), 1);
        assert_eq!(repo.save(&progress).await.unwrap(), 2);

        let stored = repo
            .load(CardId::new(1), LearnerId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.progress, progress);
    }

    #[tokio::test]
    async fn compare_and_save_rejects_stale_versions() {
        let repo = InMemoryRepository::new();
        let progress = fresh(1, 1);

        assert_eq!(repo.compare_and_save(&progress, None).await.unwrap(), 1);
        // a second "first review" loses the race
        assert!(matches!(
            repo.compare_and_save(&progress, None).await,
            Err(StorageError::Conflict)
        ));
        assert_eq!(repo.compare_and_save(&progress, Some(1)).await.unwrap(), 2);
        assert!(matches!(
            repo.compare_and_save(&progress, Some(1)).await,
            Err(StorageError::Conflict)
        ));
    }

    #[tokio::test]
    async fn apply_review_writes_record_and_log_together() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();
        let settings = SchedulerSettings::default();
        let scheduled = schedule(&fresh(1, 1), ReviewOutcome::correct(), &settings, now).unwrap();
        let log = ReviewLogRecord::from_review(ReviewOutcome::correct(), &scheduled, now);

        let applied = repo.apply_review(&scheduled, None, log.clone()).await.unwrap();
        assert_eq!(applied.version, 1);

        let logs = repo
            .logs_for_card(CardId::new(1), LearnerId::new(1))
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].id, Some(applied.log_id));

        // stale write leaves both tables untouched
        assert!(matches!(
            repo.apply_review(&scheduled, None, log).await,
            Err(StorageError::Conflict)
        ));
        let logs = repo
            .logs_for_card(CardId::new(1), LearnerId::new(1))
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
    }

    #[tokio::test]
    async fn apply_review_rejects_log_for_other_card() {
        let repo = InMemoryRepository::new();
        let progress = fresh(1, 1);
        let other = fresh(2, 1);
        let log = ReviewLogRecord::from_review(ReviewOutcome::correct(), &other, fixed_now());

        assert!(matches!(
            repo.apply_review(&progress, None, log).await,
            Err(StorageError::Conflict)
        ));
        assert!(repo.load(CardId::new(1), LearnerId::new(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn due_for_learner_filters_sorts_and_limits() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();

        for (card, offset) in [(1, -2), (2, -5), (3, 4), (4, 0)] {
            let mut p = fresh(card, 1);
            p.next_review = now + Duration::days(offset);
            repo.save(&p).await.unwrap();
        }
        let mut foreign = fresh(9, 2);
        foreign.next_review = now - Duration::days(9);
        repo.save(&foreign).await.unwrap();

        let due = repo.due_for_learner(LearnerId::new(1), now, 10).await.unwrap();
        let ids: Vec<u64> = due.iter().map(|p| p.card_id.value()).collect();
        assert_eq!(ids, vec![2, 1, 4]);

        let limited = repo.due_for_learner(LearnerId::new(1), now, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].card_id, CardId::new(2));
    }

    #[tokio::test]
    async fn reset_learner_only_touches_that_learner() {
        let repo = InMemoryRepository::new();
        repo.save(&fresh(1, 1)).await.unwrap();
        repo.save(&fresh(2, 1)).await.unwrap();
        repo.save(&fresh(1, 2)).await.unwrap();
        let log = ReviewLogRecord::from_review(ReviewOutcome::correct(), &fresh(1, 1), fixed_now());
        repo.append_log(log).await.unwrap();

        assert_eq!(repo.reset_learner(LearnerId::new(1)).await.unwrap(), 2);
        assert!(repo.list_for_learner(LearnerId::new(1)).await.unwrap().is_empty());
        assert!(
            repo.logs_for_card(CardId::new(1), LearnerId::new(1))
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(repo.list_for_learner(LearnerId::new(2)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn settings_round_trip_per_learner() {
        let repo = InMemoryRepository::new();
        assert!(repo.get_settings(LearnerId::new(1)).await.unwrap().is_none());

        let settings = SchedulerSettings::default();
        repo.save_settings(LearnerId::new(1), &settings).await.unwrap();

        assert_eq!(
            repo.get_settings(LearnerId::new(1)).await.unwrap(),
            Some(settings)
        );
        assert!(repo.get_settings(LearnerId::new(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn in_memory_storage_shares_one_backend() {
        let storage = Storage::in_memory();
        let now = fixed_now();
        let scheduled = schedule(
            &fresh(5, 1),
            ReviewOutcome::incorrect(),
            &SchedulerSettings::default(),
            now,
        )
        .unwrap();
        let log = ReviewLogRecord::from_review(ReviewOutcome::incorrect(), &scheduled, now);

        storage.reviews.apply_review(&scheduled, None, log).await.unwrap();

        let stored = storage
            .progress
            .load(CardId::new(5), LearnerId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.progress, scheduled);
        let logs = storage
            .review_logs
            .logs_for_card(CardId::new(5), LearnerId::new(1))
            .await
            .unwrap();
        assert_eq!(logs[0].quality, ReviewOutcome::incorrect().quality());
    }
}
