use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::QuizId;
use crate::model::session::SessionState;
use crate::time::from_unix_secs;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptSummaryError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("session start {0} is not a valid timestamp")]
    InvalidStart(i64),

    #[error("answered ({answered}) + unanswered ({unanswered}) does not match total ({total})")]
    CountMismatch {
        total: u32,
        answered: u32,
        unanswered: u32,
    },

    #[error("too many questions for a single attempt: {len}")]
    TooManyQuestions { len: usize },
}

/// Aggregate record of a submitted quiz attempt, kept for the results history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptSummary {
    quiz_id: QuizId,
    title: String,
    level: u32,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    total_questions: u32,
    answered: u32,
    unanswered: u32,
    total_time_taken_secs: u64,
}

impl AttemptSummary {
    /// Rehydrate an attempt summary from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AttemptSummaryError` if the time range is inverted or counts do not add up.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        quiz_id: QuizId,
        title: String,
        level: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        total_questions: u32,
        answered: u32,
        unanswered: u32,
        total_time_taken_secs: u64,
    ) -> Result<Self, AttemptSummaryError> {
        if completed_at < started_at {
            return Err(AttemptSummaryError::InvalidTimeRange);
        }
        if answered.checked_add(unanswered) != Some(total_questions) {
            return Err(AttemptSummaryError::CountMismatch {
                total: total_questions,
                answered,
                unanswered,
            });
        }
        Ok(Self {
            quiz_id,
            title,
            level,
            started_at,
            completed_at,
            total_questions,
            answered,
            unanswered,
            total_time_taken_secs,
        })
    }

    /// Summarise a finished session state.
    ///
    /// A `completed_at` earlier than the session start (clock stepped back between runs)
    /// is raised to the start, giving a zero-length attempt.
    ///
    /// # Errors
    ///
    /// Returns `AttemptSummaryError` if the stored start time is unusable.
    pub fn from_state(
        quiz_id: QuizId,
        title: impl Into<String>,
        level: u32,
        state: &SessionState,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, AttemptSummaryError> {
        let started_at = from_unix_secs(state.session_started_at())
            .ok_or(AttemptSummaryError::InvalidStart(state.session_started_at()))?;
        let completed_at = completed_at.max(started_at);
        let total = state.total_questions();
        let total_questions = u32::try_from(total)
            .map_err(|_| AttemptSummaryError::TooManyQuestions { len: total })?;
        let answered = u32::try_from(state.answered_count())
            .map_err(|_| AttemptSummaryError::TooManyQuestions { len: total })?;

        Self::from_persisted(
            quiz_id,
            title.into(),
            level,
            started_at,
            completed_at,
            total_questions,
            answered,
            total_questions - answered,
            state.total_time_taken_secs(completed_at),
        )
    }

    #[must_use]
    pub fn quiz_id(&self) -> &QuizId {
        &self.quiz_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn answered(&self) -> u32 {
        self.answered
    }

    #[must_use]
    pub fn unanswered(&self) -> u32 {
        self.unanswered
    }

    #[must_use]
    pub fn total_time_taken_secs(&self) -> u64 {
        self.total_time_taken_secs
    }
}
