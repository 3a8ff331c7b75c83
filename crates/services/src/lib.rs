#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod queue;
pub mod review_service;
pub mod settings_service;
pub mod telemetry;

pub use srs_core::Clock;

pub use app_services::AppServices;
pub use error::{
    AppServicesError, ConfigError, QueueError, ReviewServiceError, SettingsServiceError,
    TelemetryError,
};
pub use queue::{QueueLimits, QueueService, ReviewBucket, ReviewQueue};
pub use review_service::{PersistedReview, ReviewService};
pub use settings_service::SettingsService;
