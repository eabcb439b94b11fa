mod countdown;
mod driver;
mod progress;
mod service;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use countdown::{Countdown, Tick, TickReceiver};
pub use driver::{SessionCommand, SessionDriver, SessionEvent};
pub use progress::SessionProgress;
pub use service::{
    AdvanceOutcome, AdvanceStep, Notice, PendingSubmission, QuizSession, SessionPhase,
    SubmissionReply, TerminalOutcome, TickOutcome,
};
pub use view::{AttemptHistoryService, AttemptId, AttemptListItem};
pub use workflow::QuizLoopService;
