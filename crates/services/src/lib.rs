#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod sessions;
pub mod sources;

pub use quiz_core::Clock;
pub use sessions as session;

pub use app_services::AppServices;
pub use error::{AppServicesError, SessionError, SourceError, SubmitError};
pub use sessions::{
    AdvanceOutcome, AdvanceStep, AttemptHistoryService, AttemptId, AttemptListItem, Countdown,
    Notice, PendingSubmission, QuizLoopService, QuizSession, SessionCommand, SessionDriver,
    SessionEvent, SessionPhase, SessionProgress, SubmissionReply, TerminalOutcome, Tick,
    TickOutcome, TickReceiver,
};
pub use sources::{
    ApiConfig, FileQuizSource, HttpQuizSource, HttpSubmissionSink, LocalSubmissionSink,
    QuizSource, SubmissionSink,
};
