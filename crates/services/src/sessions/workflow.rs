use std::sync::Arc;

use quiz_core::model::{Quiz, QuizId};
use storage::repository::{AttemptRepository, ResumeStore};

use super::countdown::{Countdown, TickReceiver};
use super::service::{QuizSession, TerminalOutcome};
use crate::Clock;
use crate::error::{SessionError, SourceError};
use crate::sources::{QuizSource, SubmissionSink};

/// Orchestrates quiz loading, session construction, and attempt bookkeeping.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    source: Arc<dyn QuizSource>,
    sink: Arc<dyn SubmissionSink>,
    resume: Arc<dyn ResumeStore>,
    attempts: Arc<dyn AttemptRepository>,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        source: Arc<dyn QuizSource>,
        sink: Arc<dyn SubmissionSink>,
        resume: Arc<dyn ResumeStore>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            clock,
            source,
            sink,
            resume,
            attempts,
        }
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Fetch a quiz. A quiz that is not available yet comes back with no questions.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Source` for transport, decoding, or validation failures.
    pub async fn load_quiz(&self, id: &QuizId) -> Result<Quiz, SessionError> {
        match self.source.fetch_quiz(id).await {
            Ok(quiz) => Ok(quiz),
            Err(SourceError::NotAvailable) => {
                log::info!("quiz {id} is not available yet");
                Ok(Quiz::pending(id.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Wrap an already loaded quiz in a session using this service's collaborators.
    #[must_use]
    pub fn session_for(&self, quiz: Quiz, countdown: Countdown) -> QuizSession {
        QuizSession::new(
            quiz,
            self.clock,
            Arc::clone(&self.resume),
            Arc::clone(&self.sink),
            countdown,
        )
    }

    /// Load a quiz and build a session driven by a one-second countdown.
    ///
    /// The session is returned uninitialized; `QuizSession::initialize` or
    /// `SessionDriver::run` decides between resuming and starting fresh.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Source` if the quiz cannot be loaded.
    pub async fn start_session(
        &self,
        id: &QuizId,
    ) -> Result<(QuizSession, TickReceiver), SessionError> {
        let quiz = self.load_quiz(id).await?;
        let (countdown, ticks) = Countdown::interval();
        Ok((self.session_for(quiz, countdown), ticks))
    }

    /// Append a successful attempt to the history. Other outcomes are not recorded.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the attempt cannot be stored.
    pub async fn record_attempt(
        &self,
        outcome: &TerminalOutcome,
    ) -> Result<Option<i64>, SessionError> {
        let TerminalOutcome::Success { summary, .. } = outcome else {
            return Ok(None);
        };
        let id = self.attempts.append_attempt(summary).await?;
        log::info!("recorded attempt {id} for quiz {}", summary.quiz_id());
        Ok(Some(id))
    }

    /// Forget any saved in-progress attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the resume store cannot be cleared.
    pub async fn discard_progress(&self) -> Result<(), SessionError> {
        self.resume.clear().await?;
        Ok(())
    }
}
