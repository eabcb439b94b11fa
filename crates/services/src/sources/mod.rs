//! Contracts for the external quiz content and grading services.

use async_trait::async_trait;
use quiz_core::model::{Quiz, QuizId, SubmissionPayload, SubmissionReceipt};

use crate::error::{SourceError, SubmitError};

mod file;
mod http;

pub use file::{FileQuizSource, LocalSubmissionSink};
pub use http::{ApiConfig, HttpQuizSource, HttpSubmissionSink};

/// Supplies quiz metadata and the ordered question list.
#[async_trait]
pub trait QuizSource: Send + Sync {
    /// Fetch a quiz by id.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::NotAvailable` when the quiz has no content yet, or another
    /// `SourceError` when the request or decoding fails.
    async fn fetch_quiz(&self, id: &QuizId) -> Result<Quiz, SourceError>;
}

/// Accepts a finished attempt for grading.
///
/// A receipt with `status == false` is a recoverable rejection, same as an error.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    /// Submit the answers of a finished attempt.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError` when the request fails or is answered with a non-success status.
    async fn submit(
        &self,
        quiz_id: &QuizId,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, SubmitError>;
}
