use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use srs_core::model::{CardId, CardProgress, LearnerId};
use tracing::{debug, warn};

use super::{
    SqliteRepository,
    mapping::{id_to_i64, map_progress_row, source_to_str, version_to_i64},
};
use crate::repository::{
    AppliedWrite, ProgressRepository, ReviewLogRecord, ReviewPersistence, StorageError,
    StoredProgress,
};

fn conn_err(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

const SELECT_PROGRESS: &str = r"
    SELECT
        card_id, learner_id, interval_days, repetitions, ease_factor, streak,
        last_reviewed, next_review, times_seen, times_correct, total_reviews,
        is_mastered, version
    FROM card_progress
";

/// Insert a brand-new record at version 1, or bump an existing one only if it
/// is still at `expected_version`.
pub(crate) async fn write_progress(
    conn: &mut SqliteConnection,
    progress: &CardProgress,
    expected_version: Option<u64>,
) -> Result<u64, StorageError> {
    let card_id = id_to_i64("card_id", progress.card_id.value())?;
    let learner_id = id_to_i64("learner_id", progress.learner_id.value())?;

    let affected = match expected_version {
        None => sqlx::query(
            r"
            INSERT INTO card_progress (
                card_id, learner_id, interval_days, repetitions, ease_factor, streak,
                last_reviewed, next_review, times_seen, times_correct, total_reviews,
                is_mastered, version
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1)
            ON CONFLICT(card_id, learner_id) DO NOTHING
            ",
        )
        .bind(card_id)
        .bind(learner_id)
        .bind(i64::from(progress.interval_days))
        .bind(i64::from(progress.repetitions))
        .bind(progress.ease_factor)
        .bind(i64::from(progress.streak))
        .bind(progress.last_reviewed)
        .bind(progress.next_review)
        .bind(i64::from(progress.times_seen))
        .bind(i64::from(progress.times_correct))
        .bind(i64::from(progress.total_reviews))
        .bind(progress.is_mastered)
        .execute(&mut *conn)
        .await
        .map_err(conn_err)?
        .rows_affected(),
        Some(expected) => sqlx::query(
            r"
            UPDATE card_progress SET
                interval_days = ?3,
                repetitions = ?4,
                ease_factor = ?5,
                streak = ?6,
                last_reviewed = ?7,
                next_review = ?8,
                times_seen = ?9,
                times_correct = ?10,
                total_reviews = ?11,
                is_mastered = ?12,
                version = version + 1
            WHERE card_id = ?1 AND learner_id = ?2 AND version = ?13
            ",
        )
        .bind(card_id)
        .bind(learner_id)
        .bind(i64::from(progress.interval_days))
        .bind(i64::from(progress.repetitions))
        .bind(progress.ease_factor)
        .bind(i64::from(progress.streak))
        .bind(progress.last_reviewed)
        .bind(progress.next_review)
        .bind(i64::from(progress.times_seen))
        .bind(i64::from(progress.times_correct))
        .bind(i64::from(progress.total_reviews))
        .bind(progress.is_mastered)
        .bind(version_to_i64(expected)?)
        .execute(&mut *conn)
        .await
        .map_err(conn_err)?
        .rows_affected(),
    };

    if affected == 0 {
        warn!(
            card_id = %progress.card_id,
            learner_id = %progress.learner_id,
            ?expected_version,
            "progress write lost a version race"
        );
        return Err(StorageError::Conflict);
    }

    Ok(expected_version.map_or(1, |v| v + 1))
}

pub(crate) async fn insert_log(
    conn: &mut SqliteConnection,
    log: &ReviewLogRecord,
) -> Result<i64, StorageError> {
    let res = sqlx::query(
        r"
            INSERT INTO review_logs (
                card_id, learner_id, quality, source, reviewed_at,
                interval_days, ease_factor, next_review
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ",
    )
    .bind(id_to_i64("card_id", log.card_id.value())?)
    .bind(id_to_i64("learner_id", log.learner_id.value())?)
    .bind(i64::from(log.quality))
    .bind(source_to_str(log.source))
    .bind(log.reviewed_at)
    .bind(i64::from(log.interval_days))
    .bind(log.ease_factor)
    .bind(log.next_review)
    .execute(&mut *conn)
    .await
    .map_err(conn_err)?;

    Ok(res.last_insert_rowid())
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load(
        &self,
        card_id: CardId,
        learner_id: LearnerId,
    ) -> Result<Option<StoredProgress>, StorageError> {
        let sql = format!("{SELECT_PROGRESS} WHERE card_id = ?1 AND learner_id = ?2");
        let row = sqlx::query(&sql)
            .bind(id_to_i64("card_id", card_id.value())?)
            .bind(id_to_i64("learner_id", learner_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn_err)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn save(&self, progress: &CardProgress) -> Result<u64, StorageError> {
        let row = sqlx::query(
            r"
            INSERT INTO card_progress (
                card_id, learner_id, interval_days, repetitions, ease_factor, streak,
                last_reviewed, next_review, times_seen, times_correct, total_reviews,
                is_mastered, version
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1)
            ON CONFLICT(card_id, learner_id) DO UPDATE SET
                interval_days = excluded.interval_days,
                repetitions = excluded.repetitions,
                ease_factor = excluded.ease_factor,
                streak = excluded.streak,
                last_reviewed = excluded.last_reviewed,
                next_review = excluded.next_review,
                times_seen = excluded.times_seen,
                times_correct = excluded.times_correct,
                total_reviews = excluded.total_reviews,
                is_mastered = excluded.is_mastered,
                version = card_progress.version + 1
            RETURNING version
            ",
        )
        .bind(id_to_i64("card_id", progress.card_id.value())?)
        .bind(id_to_i64("learner_id", progress.learner_id.value())?)
        .bind(i64::from(progress.interval_days))
        .bind(i64::from(progress.repetitions))
        .bind(progress.ease_factor)
        .bind(i64::from(progress.streak))
        .bind(progress.last_reviewed)
        .bind(progress.next_review)
        .bind(i64::from(progress.times_seen))
        .bind(i64::from(progress.times_correct))
        .bind(i64::from(progress.total_reviews))
        .bind(progress.is_mastered)
        .fetch_one(&self.pool)
        .await
        .map_err(conn_err)?;

        let version: i64 = sqlx::Row::try_get(&row, "version")
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        u64::try_from(version)
            .map_err(|_| StorageError::Serialization(format!("invalid version: {version}")))
    }

    async fn compare_and_save(
        &self,
        progress: &CardProgress,
        expected_version: Option<u64>,
    ) -> Result<u64, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(conn_err)?;
        write_progress(&mut conn, progress, expected_version).await
    }

    async fn list_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<CardProgress>, StorageError> {
        let sql = format!("{SELECT_PROGRESS} WHERE learner_id = ?1 ORDER BY card_id ASC");
        let rows = sqlx::query(&sql)
            .bind(id_to_i64("learner_id", learner_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?.progress);
        }
        Ok(out)
    }

    async fn due_for_learner(
        &self,
        learner_id: LearnerId,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<CardProgress>, StorageError> {
        let sql = format!(
            "{SELECT_PROGRESS} WHERE learner_id = ?1 AND next_review <= ?2 \
             ORDER BY next_review ASC, card_id ASC LIMIT ?3"
        );
        let rows = sqlx::query(&sql)
            .bind(id_to_i64("learner_id", learner_id.value())?)
            .bind(now)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?.progress);
        }
        Ok(out)
    }

    async fn reset_learner(&self, learner_id: LearnerId) -> Result<u64, StorageError> {
        let learner = id_to_i64("learner_id", learner_id.value())?;
        let mut tx = self.pool.begin().await.map_err(conn_err)?;

        let removed = sqlx::query("DELETE FROM card_progress WHERE learner_id = ?1")
            .bind(learner)
            .execute(&mut *tx)
            .await
            .map_err(conn_err)?
            .rows_affected();

        sqlx::query("DELETE FROM review_logs WHERE learner_id = ?1")
            .bind(learner)
            .execute(&mut *tx)
            .await
            .map_err(conn_err)?;

        tx.commit().await.map_err(conn_err)?;
        debug!(%learner_id, removed, "reset learner progress");
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl ReviewPersistence for SqliteRepository {
    async fn apply_review(
        &self,
        progress: &CardProgress,
        expected_version: Option<u64>,
        log: ReviewLogRecord,
    ) -> Result<AppliedWrite, StorageError> {
        if (log.card_id, log.learner_id) != progress.key() {
            return Err(StorageError::Conflict);
        }

        let mut tx = self.pool.begin().await.map_err(conn_err)?;

        // an early return drops `tx`, which rolls back
        let version = write_progress(&mut tx, progress, expected_version).await?;
        let log_id = insert_log(&mut tx, &log).await?;

        tx.commit().await.map_err(conn_err)?;

        Ok(AppliedWrite { version, log_id })
    }
}
