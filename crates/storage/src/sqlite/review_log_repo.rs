use srs_core::model::{CardId, LearnerId};

use super::{
    SqliteRepository,
    mapping::{id_to_i64, map_review_log_row},
    progress_repo::insert_log,
};
use crate::repository::{ReviewLogRecord, ReviewLogRepository, StorageError};

#[async_trait::async_trait]
impl ReviewLogRepository for SqliteRepository {
    async fn append_log(&self, log: ReviewLogRecord) -> Result<i64, StorageError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        insert_log(&mut conn, &log).await
    }

    async fn logs_for_card(
        &self,
        card_id: CardId,
        learner_id: LearnerId,
    ) -> Result<Vec<ReviewLogRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, card_id, learner_id, quality, source, reviewed_at,
                    interval_days, ease_factor, next_review
                FROM review_logs
                WHERE card_id = ?1 AND learner_id = ?2
                ORDER BY reviewed_at ASC, id ASC
            ",
        )
        .bind(id_to_i64("card_id", card_id.value())?)
        .bind(id_to_i64("learner_id", learner_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_review_log_row(&row)?);
        }
        Ok(out)
    }
}
