//! Shared error types for the services crate.

use thiserror::Error;

use srs_core::model::{CardId, LearnerId, SettingsError};
use srs_core::scheduler::SchedulerError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ReviewService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReviewServiceError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("card {card_id} for learner {learner_id} kept changing after {attempts} attempts")]
    ConflictRetriesExhausted {
        card_id: CardId,
        learner_id: LearnerId,
        attempts: u32,
    },
    #[error("review task failed: {0}")]
    Task(String),
}

/// Errors emitted while parsing or loading settings documents.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid settings document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Errors emitted by `SettingsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsServiceError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QueueService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QueueError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
#[error("tracing subscriber could not be installed: {0}")]
pub struct TelemetryError(pub String);

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
