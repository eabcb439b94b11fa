use quiz_core::model::{AttemptSummary, QuizId};
use sqlx::Row;

use crate::repository::{AttemptRow, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<AttemptSummary, StorageError> {
    let quiz_id = QuizId::new(row.try_get::<String, _>("quiz_id").map_err(ser)?).map_err(ser)?;
    let title: String = row.try_get("title").map_err(ser)?;
    let level = u32_from_i64("level", row.try_get::<i64, _>("level").map_err(ser)?)?;
    let started_at = row.try_get("started_at").map_err(ser)?;
    let completed_at = row.try_get("completed_at").map_err(ser)?;
    let total_questions = u32_from_i64(
        "total_questions",
        row.try_get::<i64, _>("total_questions").map_err(ser)?,
    )?;
    let answered = u32_from_i64("answered", row.try_get::<i64, _>("answered").map_err(ser)?)?;
    let unanswered = u32_from_i64(
        "unanswered",
        row.try_get::<i64, _>("unanswered").map_err(ser)?,
    )?;
    let total_time_taken_secs = u64_from_i64(
        "total_time_taken_secs",
        row.try_get::<i64, _>("total_time_taken_secs").map_err(ser)?,
    )?;

    AttemptSummary::from_persisted(
        quiz_id,
        title,
        level,
        started_at,
        completed_at,
        total_questions,
        answered,
        unanswered,
        total_time_taken_secs,
    )
    .map_err(ser)
}

pub(crate) fn map_attempt_row_with_id(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<AttemptRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    Ok(AttemptRow::new(id, map_attempt_row(row)?))
}
