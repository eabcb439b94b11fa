use chrono::{DateTime, Utc};
use std::sync::Arc;

use quiz_core::model::{AttemptSummary, QuizId};
use storage::repository::AttemptRepository;

use crate::error::SessionError;

/// Storage identifier for a recorded attempt.
pub type AttemptId = i64;

/// Presentation-agnostic list item for a recorded attempt.
///
/// No pre-formatted strings; front ends format timestamps and durations themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptListItem {
    pub id: AttemptId,
    pub quiz_id: QuizId,
    pub title: String,
    pub level: u32,
    pub completed_at: DateTime<Utc>,

    pub total: u32,
    pub answered: u32,
    pub unanswered: u32,
    pub total_time_taken_secs: u64,
}

impl AttemptListItem {
    #[must_use]
    pub fn from_summary(id: AttemptId, summary: &AttemptSummary) -> Self {
        Self {
            id,
            quiz_id: summary.quiz_id().clone(),
            title: summary.title().to_owned(),
            level: summary.level(),
            completed_at: summary.completed_at(),
            total: summary.total_questions(),
            answered: summary.answered(),
            unanswered: summary.unanswered(),
            total_time_taken_secs: summary.total_time_taken_secs(),
        }
    }
}

/// Read-only access to the attempt history.
#[derive(Clone)]
pub struct AttemptHistoryService {
    attempts: Arc<dyn AttemptRepository>,
}

impl AttemptHistoryService {
    #[must_use]
    pub fn new(attempts: Arc<dyn AttemptRepository>) -> Self {
        Self { attempts }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(storage::repository::InMemoryRepository::new()))
    }

    /// Most recent attempts first, optionally for a single quiz.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn list_recent(
        &self,
        quiz_id: Option<&QuizId>,
        limit: u32,
    ) -> Result<Vec<AttemptListItem>, SessionError> {
        let rows = self.attempts.list_attempts(quiz_id, limit).await?;
        Ok(rows
            .iter()
            .map(|row| AttemptListItem::from_summary(row.id, &row.attempt))
            .collect())
    }

    /// Load a recorded attempt by id.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the attempt is missing or cannot be read.
    pub async fn get(&self, id: AttemptId) -> Result<AttemptSummary, SessionError> {
        Ok(self.attempts.get_attempt(id).await?)
    }
}
