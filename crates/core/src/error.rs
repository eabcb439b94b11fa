use thiserror::Error;

use crate::model::{AttemptSummaryError, IdError, QuestionError, QuizError, SessionStateError};

/// Any validation failure raised by the domain model.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    SessionState(#[from] SessionStateError),
    #[error(transparent)]
    AttemptSummary(#[from] AttemptSummaryError),
}
