use std::sync::Arc;

use srs_core::model::{LearnerId, SchedulerSettings, SchedulerSettingsDraft};
use storage::repository::SettingsRepository;
use tracing::info;

use crate::config::settings_from_json;
use crate::error::SettingsServiceError;

/// Per-learner scheduler configuration.
#[derive(Clone)]
pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
}

impl SettingsService {
    #[must_use]
    pub fn new(repo: Arc<dyn SettingsRepository>) -> Self {
        Self { repo }
    }

    /// Load persisted settings (or defaults if missing).
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError` on storage failures.
    pub async fn load(
        &self,
        learner_id: LearnerId,
    ) -> Result<SchedulerSettings, SettingsServiceError> {
        let settings = self.repo.get_settings(learner_id).await?;
        Ok(settings.unwrap_or_default())
    }

    /// Validate and persist new settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError` if validation fails or persistence fails.
    pub async fn save(
        &self,
        learner_id: LearnerId,
        draft: SchedulerSettingsDraft,
    ) -> Result<SchedulerSettings, SettingsServiceError> {
        let settings = draft.validate()?;
        self.repo.save_settings(learner_id, &settings).await?;
        info!(%learner_id, "scheduler settings saved");
        Ok(settings)
    }

    /// Validate and persist settings given as a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError::Config` for a bad document, or a
    /// storage error if persistence fails.
    pub async fn import_json(
        &self,
        learner_id: LearnerId,
        json: &str,
    ) -> Result<SchedulerSettings, SettingsServiceError> {
        let settings = settings_from_json(json)?;
        self.repo.save_settings(learner_id, &settings).await?;
        info!(%learner_id, "scheduler settings imported");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use srs_core::model::SettingsError;
    use storage::repository::InMemoryRepository;

    fn service() -> SettingsService {
        SettingsService::new(Arc::new(InMemoryRepository::new()))
    }

    #[tokio::test]
    async fn missing_settings_load_as_defaults() {
        let svc = service();
        assert_eq!(
            svc.load(LearnerId::new(1)).await.unwrap(),
            SchedulerSettings::default()
        );
    }

    #[tokio::test]
    async fn saved_draft_is_returned_on_load() {
        let svc = service();
        let draft = SchedulerSettingsDraft {
            max_streak: Some(7),
            ..SchedulerSettingsDraft::default()
        };

        let saved = svc.save(LearnerId::new(1), draft).await.unwrap();
        assert_eq!(saved.max_streak(), 7);
        assert_eq!(svc.load(LearnerId::new(1)).await.unwrap(), saved);
        assert_eq!(
            svc.load(LearnerId::new(2)).await.unwrap(),
            SchedulerSettings::default()
        );
    }

    #[tokio::test]
    async fn invalid_draft_is_not_stored() {
        let svc = service();
        let draft = SchedulerSettingsDraft {
            max_streak: Some(0),
            ..SchedulerSettingsDraft::default()
        };

        let err = svc.save(LearnerId::new(1), draft).await.unwrap_err();
        assert!(matches!(
            err,
            SettingsServiceError::Settings(SettingsError::InvalidMaxStreak)
        ));
        assert_eq!(
            svc.load(LearnerId::new(1)).await.unwrap(),
            SchedulerSettings::default()
        );
    }

    #[tokio::test]
    async fn json_import_persists_and_rejects_garbage() {
        let svc = service();
        let imported = svc
            .import_json(LearnerId::new(3), r#"{ "learning_interval_1": 2 }"#)
            .await
            .unwrap();
        assert_eq!(imported.learning_interval_1(), 2);
        assert_eq!(svc.load(LearnerId::new(3)).await.unwrap(), imported);

        let err = svc
            .import_json(LearnerId::new(3), "not json")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SettingsServiceError::Config(ConfigError::Json(_))
        ));
    }
}
