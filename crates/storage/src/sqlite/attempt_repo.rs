use async_trait::async_trait;
use quiz_core::model::{AttemptSummary, QuizId};

use super::SqliteRepository;
use super::mapping::{conn, map_attempt_row, map_attempt_row_with_id, u64_to_i64};
use crate::repository::{AttemptRepository, AttemptRow, StorageError};

#[async_trait]
impl AttemptRepository for SqliteRepository {
    async fn append_attempt(&self, attempt: &AttemptSummary) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO attempts (
                    quiz_id, title, level, started_at, completed_at,
                    total_questions, answered, unanswered, total_time_taken_secs
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(attempt.quiz_id().as_str())
        .bind(attempt.title())
        .bind(i64::from(attempt.level()))
        .bind(attempt.started_at())
        .bind(attempt.completed_at())
        .bind(i64::from(attempt.total_questions()))
        .bind(i64::from(attempt.answered()))
        .bind(i64::from(attempt.unanswered()))
        .bind(u64_to_i64(
            "total_time_taken_secs",
            attempt.total_time_taken_secs(),
        )?)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_attempt(&self, id: i64) -> Result<AttemptSummary, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    quiz_id, title, level, started_at, completed_at,
                    total_questions, answered, unanswered, total_time_taken_secs
                FROM attempts
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_attempt_row(&row)
    }

    async fn list_attempts(
        &self,
        quiz_id: Option<&QuizId>,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let mut sql = String::from(
            r"
                SELECT
                    id, quiz_id, title, level, started_at, completed_at,
                    total_questions, answered, unanswered, total_time_taken_secs
                FROM attempts
            ",
        );
        if quiz_id.is_some() {
            sql.push_str(" WHERE quiz_id = ?1");
            sql.push_str(" ORDER BY completed_at DESC, id DESC LIMIT ?2");
        } else {
            sql.push_str(" ORDER BY completed_at DESC, id DESC LIMIT ?1");
        }

        let mut query = sqlx::query(&sql);
        if let Some(quiz_id) = quiz_id {
            query = query.bind(quiz_id.as_str());
        }
        query = query.bind(i64::from(limit));

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row_with_id(&row)?);
        }
        Ok(out)
    }
}
