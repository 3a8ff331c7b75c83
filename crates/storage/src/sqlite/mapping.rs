use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use srs_core::model::{
    CardId, CardProgress, LearnerId, MasteryCriterion, MasteryRule, OutcomeSource,
    SchedulerSettings, SchedulerSettingsDraft,
};

use crate::repository::{ReviewLogRecord, StorageError, StoredProgress};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn get_u32(row: &SqliteRow, field: &'static str) -> Result<u32, StorageError> {
    i64_to_u32(field, row.try_get::<i64, _>(field).map_err(ser)?)
}

pub(crate) fn card_id_from_i64(v: i64) -> Result<CardId, StorageError> {
    Ok(CardId::new(i64_to_u64("card_id", v)?))
}

pub(crate) fn learner_id_from_i64(v: i64) -> Result<LearnerId, StorageError> {
    Ok(LearnerId::new(i64_to_u64("learner_id", v)?))
}

pub(crate) fn version_to_i64(version: u64) -> Result<i64, StorageError> {
    id_to_i64("version", version)
}

pub(crate) fn source_to_str(source: OutcomeSource) -> &'static str {
    match source {
        OutcomeSource::Binary => "binary",
        OutcomeSource::Graded => "graded",
    }
}

pub(crate) fn parse_source(s: &str) -> Result<OutcomeSource, StorageError> {
    match s {
        "binary" => Ok(OutcomeSource::Binary),
        "graded" => Ok(OutcomeSource::Graded),
        _ => Err(StorageError::Serialization(format!("invalid source: {s}"))),
    }
}

/// Maps a `card_progress` row. Values are taken as stored; range checks on
/// interval and ease factor are left to the scheduler.
pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<StoredProgress, StorageError> {
    let last_reviewed: Option<DateTime<Utc>> = row.try_get("last_reviewed").map_err(ser)?;
    let next_review: DateTime<Utc> = row.try_get("next_review").map_err(ser)?;

    let progress = CardProgress::from_persisted(
        card_id_from_i64(row.try_get::<i64, _>("card_id").map_err(ser)?)?,
        learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        get_u32(row, "interval_days")?,
        get_u32(row, "repetitions")?,
        row.try_get("ease_factor").map_err(ser)?,
        get_u32(row, "streak")?,
        last_reviewed,
        next_review,
        get_u32(row, "times_seen")?,
        get_u32(row, "times_correct")?,
        get_u32(row, "total_reviews")?,
        row.try_get("is_mastered").map_err(ser)?,
    );

    let version = i64_to_u64("version", row.try_get::<i64, _>("version").map_err(ser)?)?;

    Ok(StoredProgress { progress, version })
}

pub(crate) fn map_review_log_row(row: &SqliteRow) -> Result<ReviewLogRecord, StorageError> {
    let quality = row.try_get::<i64, _>("quality").map_err(ser)?;
    let source: String = row.try_get("source").map_err(ser)?;

    Ok(ReviewLogRecord {
        id: Some(row.try_get("id").map_err(ser)?),
        card_id: card_id_from_i64(row.try_get::<i64, _>("card_id").map_err(ser)?)?,
        learner_id: learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        quality: u8::try_from(quality)
            .map_err(|_| StorageError::Serialization(format!("invalid quality: {quality}")))?,
        source: parse_source(&source)?,
        reviewed_at: row.try_get("reviewed_at").map_err(ser)?,
        interval_days: get_u32(row, "interval_days")?,
        ease_factor: row.try_get("ease_factor").map_err(ser)?,
        next_review: row.try_get("next_review").map_err(ser)?,
    })
}

/// Rebuilds settings from a `scheduler_settings` row, re-running validation.
pub(crate) fn map_settings_row(row: &SqliteRow) -> Result<SchedulerSettings, StorageError> {
    let criterion: String = row.try_get("mastery_criterion").map_err(ser)?;
    let criterion = MasteryCriterion::parse(&criterion).ok_or_else(|| {
        StorageError::Serialization(format!("invalid mastery criterion: {criterion}"))
    })?;

    SchedulerSettingsDraft {
        new_card_interval: Some(get_u32(row, "new_card_interval")?),
        learning_interval_1: Some(get_u32(row, "learning_interval_1")?),
        learning_interval_2: Some(get_u32(row, "learning_interval_2")?),
        default_ease_factor: Some(row.try_get("default_ease_factor").map_err(ser)?),
        min_ease_factor: Some(row.try_get("min_ease_factor").map_err(ser)?),
        max_ease_factor: Some(row.try_get("max_ease_factor").map_err(ser)?),
        ease_factor_increase: Some(row.try_get("ease_factor_increase").map_err(ser)?),
        ease_factor_decrease: Some(row.try_get("ease_factor_decrease").map_err(ser)?),
        enable_ease_factor_adjustment: Some(
            row.try_get("enable_ease_factor_adjustment").map_err(ser)?,
        ),
        max_streak: Some(get_u32(row, "max_streak")?),
        mastery: Some(MasteryRule {
            min_repetitions: get_u32(row, "mastery_min_repetitions")?,
            min_interval_days: get_u32(row, "mastery_min_interval_days")?,
            criterion,
        }),
    }
    .validate()
    .map_err(ser)
}
