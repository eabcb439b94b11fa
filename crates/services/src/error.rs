//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{AttemptSummaryError, SessionStateError};
use storage::repository::StorageError;

/// Errors emitted by a `QuizSource`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    /// The quiz has no content yet; the session waits in `Initializing`.
    #[error("quiz is not available")]
    NotAvailable,
    #[error("quiz request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("cannot read quiz file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot decode quiz: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid quiz: {0}")]
    Invalid(#[from] quiz_core::Error),
}

/// Errors emitted by a `SubmissionSink`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmitError {
    #[error("submission failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session is not accepting answers")]
    NotActive,
    #[error(transparent)]
    State(#[from] SessionStateError),
    #[error(transparent)]
    Summary(#[from] AttemptSummaryError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while configuring app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error("invalid api url: {0}")]
    ApiUrl(String),
}
