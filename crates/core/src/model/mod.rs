mod attempt;
mod ids;
mod question;
mod response;
mod session;
mod submission;

pub use attempt::{AttemptSummary, AttemptSummaryError};
pub use ids::{IdError, QuestionId, QuizId};
pub use question::{Question, QuestionDocument, QuestionError, Quiz, QuizDocument, QuizError};
pub use response::{Response, Selection};
pub use session::{QUESTION_TIME_SECS, SessionState, SessionStateError};
pub use submission::{AnswerEntry, SubmissionPayload, SubmissionReceipt};
