use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;
use crate::model::session::SessionState;

/// One graded entry of a finished attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerEntry {
    pub question_id: QuestionId,
    /// Selected option text, or an empty string when unanswered.
    pub answer: String,
    pub answered: bool,
    pub time_taken: u32,
}

/// Body sent to the submission endpoint when the last question is completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionPayload {
    pub title: String,
    pub questions: Vec<AnswerEntry>,
}

impl SubmissionPayload {
    /// Build the payload from a finished state, preserving question order.
    #[must_use]
    pub fn from_state(title: impl Into<String>, state: &SessionState) -> Self {
        let questions = state
            .responses()
            .iter()
            .map(|response| AnswerEntry {
                question_id: response.question_id().clone(),
                answer: response.selected_option_text().unwrap_or_default().to_owned(),
                answered: response.is_answered(),
                time_taken: response.time_taken_secs(),
            })
            .collect();
        Self {
            title: title.into(),
            questions,
        }
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.questions.iter().filter(|q| q.answered).count()
    }
}

/// Acknowledgement returned by the submission endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub status: bool,
    #[serde(default)]
    pub message: String,
}

impl SubmissionReceipt {
    #[must_use]
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            status: true,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
        }
    }
}
