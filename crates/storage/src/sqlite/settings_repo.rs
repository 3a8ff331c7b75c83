use srs_core::model::{LearnerId, SchedulerSettings};

use super::{
    SqliteRepository,
    mapping::{id_to_i64, map_settings_row},
};
use crate::repository::{SettingsRepository, StorageError};

#[async_trait::async_trait]
impl SettingsRepository for SqliteRepository {
    async fn get_settings(
        &self,
        learner_id: LearnerId,
    ) -> Result<Option<SchedulerSettings>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    new_card_interval, learning_interval_1, learning_interval_2,
                    default_ease_factor, min_ease_factor, max_ease_factor,
                    ease_factor_increase, ease_factor_decrease,
                    enable_ease_factor_adjustment, max_streak,
                    mastery_min_repetitions, mastery_min_interval_days, mastery_criterion
                FROM scheduler_settings
                WHERE learner_id = ?1
            ",
        )
        .bind(id_to_i64("learner_id", learner_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_settings_row).transpose()
    }

    async fn save_settings(
        &self,
        learner_id: LearnerId,
        settings: &SchedulerSettings,
    ) -> Result<(), StorageError> {
        let mastery = settings.mastery();

        sqlx::query(
            r"
                INSERT INTO scheduler_settings (
                    learner_id, new_card_interval, learning_interval_1, learning_interval_2,
                    default_ease_factor, min_ease_factor, max_ease_factor,
                    ease_factor_increase, ease_factor_decrease,
                    enable_ease_factor_adjustment, max_streak,
                    mastery_min_repetitions, mastery_min_interval_days, mastery_criterion
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                ON CONFLICT(learner_id) DO UPDATE SET
                    new_card_interval = excluded.new_card_interval,
                    learning_interval_1 = excluded.learning_interval_1,
                    learning_interval_2 = excluded.learning_interval_2,
                    default_ease_factor = excluded.default_ease_factor,
                    min_ease_factor = excluded.min_ease_factor,
                    max_ease_factor = excluded.max_ease_factor,
                    ease_factor_increase = excluded.ease_factor_increase,
                    ease_factor_decrease = excluded.ease_factor_decrease,
                    enable_ease_factor_adjustment = excluded.enable_ease_factor_adjustment,
                    max_streak = excluded.max_streak,
                    mastery_min_repetitions = excluded.mastery_min_repetitions,
                    mastery_min_interval_days = excluded.mastery_min_interval_days,
                    mastery_criterion = excluded.mastery_criterion
            ",
        )
        .bind(id_to_i64("learner_id", learner_id.value())?)
        .bind(i64::from(settings.new_card_interval()))
        .bind(i64::from(settings.learning_interval_1()))
        .bind(i64::from(settings.learning_interval_2()))
        .bind(settings.default_ease_factor())
        .bind(settings.min_ease_factor())
        .bind(settings.max_ease_factor())
        .bind(settings.ease_factor_increase())
        .bind(settings.ease_factor_decrease())
        .bind(settings.enable_ease_factor_adjustment())
        .bind(i64::from(settings.max_streak()))
        .bind(i64::from(mastery.min_repetitions))
        .bind(i64::from(mastery.min_interval_days))
        .bind(mastery.criterion.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }
}
