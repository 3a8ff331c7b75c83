use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use super::SqliteInitError;

/// Runs the versioned schema migrations.
///
/// Version 1 creates progress records, review logs, per-learner settings, and
/// their indexes.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS card_progress (
                    card_id INTEGER NOT NULL,
                    learner_id INTEGER NOT NULL,
                    interval_days INTEGER NOT NULL,
                    repetitions INTEGER NOT NULL CHECK (repetitions >= 0),
                    ease_factor REAL NOT NULL,
                    streak INTEGER NOT NULL CHECK (streak >= 0),
                    last_reviewed TEXT,
                    next_review TEXT NOT NULL,
                    times_seen INTEGER NOT NULL CHECK (times_seen >= 0),
                    times_correct INTEGER NOT NULL CHECK (times_correct >= 0),
                    total_reviews INTEGER NOT NULL CHECK (total_reviews >= 0),
                    is_mastered INTEGER NOT NULL,
                    version INTEGER NOT NULL CHECK (version >= 1),
                    PRIMARY KEY (card_id, learner_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS review_logs (
                    id INTEGER PRIMARY KEY,
                    card_id INTEGER NOT NULL,
                    learner_id INTEGER NOT NULL,
                    quality INTEGER NOT NULL CHECK (quality BETWEEN 0 AND 5),
                    source TEXT NOT NULL,
                    reviewed_at TEXT NOT NULL,
                    interval_days INTEGER NOT NULL,
                    ease_factor REAL NOT NULL,
                    next_review TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS scheduler_settings (
                    learner_id INTEGER PRIMARY KEY,
                    new_card_interval INTEGER NOT NULL,
                    learning_interval_1 INTEGER NOT NULL,
                    learning_interval_2 INTEGER NOT NULL,
                    default_ease_factor REAL NOT NULL,
                    min_ease_factor REAL NOT NULL,
                    max_ease_factor REAL NOT NULL,
                    ease_factor_increase REAL NOT NULL,
                    ease_factor_decrease REAL NOT NULL,
                    enable_ease_factor_adjustment INTEGER NOT NULL,
                    max_streak INTEGER NOT NULL,
                    mastery_min_repetitions INTEGER NOT NULL,
                    mastery_min_interval_days INTEGER NOT NULL,
                    mastery_criterion TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_card_progress_learner_next_review
                    ON card_progress (learner_id, next_review);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_review_logs_learner_card_reviewed_at
                    ON review_logs (learner_id, card_id, reviewed_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(version = 1, "applied schema migration");
    }

    Ok(())
}
