#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    AppliedWrite, InMemoryRepository, ProgressRepository, ReviewLogRecord, ReviewLogRepository,
    ReviewPersistence, SettingsRepository, Storage, StorageError, StoredProgress,
};
