use std::fmt;
use std::sync::{Arc, Weak};

use quiz_core::model::{
    AttemptSummary, Question, Quiz, QuizId, Response, SessionState, SubmissionPayload,
    SubmissionReceipt,
};
use storage::repository::{ResumeLoad, ResumeStore};

use super::countdown::{Countdown, Tick};
use super::progress::SessionProgress;
use crate::Clock;
use crate::error::{SessionError, SubmitError};
use crate::sources::SubmissionSink;

//
// ─── STATES AND OUTCOMES ──────────────────────────────────────────────────────
//

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for a question list.
    Initializing,
    Active { question_index: usize },
    Submitting,
    Terminal(TerminalOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    Success {
        receipt: SubmissionReceipt,
        summary: AttemptSummary,
    },
    /// The attempt was given up; nothing was submitted.
    Failure { reason: String },
}

/// Result of an `advance` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// A submission was already in flight; nothing changed.
    Suppressed,
    Moved { question_index: usize },
    Completed(Box<TerminalOutcome>),
    /// Submission failed; the session is back on the last question and can retry.
    SubmissionFailed { message: String },
}

/// Result of delivering a countdown tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick belonged to a cancelled run or arrived outside `Active`.
    Ignored,
    Counted { time_left_secs: u32 },
    TimedOut(AdvanceOutcome),
}

/// User-facing notifications raised by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Resumed { question_index: usize },
    DiscardedResume { reason: String },
    SubmissionFailed { message: String },
    Submitted { message: String },
    PersistFailed { message: String },
}

/// Notice text for a submission whose future was dropped before the sink answered.
const INTERRUPTED: &str = "submission was interrupted";

/// Result of `begin_advance`.
#[derive(Debug)]
pub enum AdvanceStep {
    Done(AdvanceOutcome),
    /// The last question was closed; the attempt must be sent.
    Submit(PendingSubmission),
}

pub(crate) enum TickCount {
    Ignored,
    Counted(u32),
    Expired,
}

/// An attempt handed to the sink but not yet settled.
///
/// Dropping it without passing its reply to `QuizSession::finish_submission` counts as a
/// failed submission on the session's next call.
pub struct PendingSubmission {
    sink: Arc<dyn SubmissionSink>,
    quiz_id: QuizId,
    payload: SubmissionPayload,
    token: Arc<()>,
}

impl PendingSubmission {
    pub async fn send(self) -> SubmissionReply {
        let result = self.sink.submit(&self.quiz_id, &self.payload).await;
        SubmissionReply {
            result,
            token: self.token,
        }
    }

    #[must_use]
    pub fn payload(&self) -> &SubmissionPayload {
        &self.payload
    }
}

impl fmt::Debug for PendingSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSubmission")
            .field("quiz_id", &self.quiz_id)
            .field("answers", &self.payload.questions.len())
            .finish_non_exhaustive()
    }
}

/// What the sink answered for a `PendingSubmission`.
#[derive(Debug)]
pub struct SubmissionReply {
    result: Result<SubmissionReceipt, SubmitError>,
    token: Arc<()>,
}

struct InFlight {
    last_index: usize,
    summary: AttemptSummary,
    token: Weak<()>,
}

/// Puts the session back on its last question if `advance` is dropped mid-submission.
struct InterruptOnDrop<'a> {
    session: &'a mut QuizSession,
    armed: bool,
}

impl Drop for InterruptOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.session.interrupt_submission();
        }
    }
}

//
// ─── SESSION ──────────────────────────────────────────────────────────────────
//

/// Timed walk through a quiz's questions, resumable across restarts.
///
/// Every mutation of the `SessionState` is written to the `ResumeStore` before the
/// operation returns. The response array is the only record of selections; the highlighted
/// option is always derived from it.
pub struct QuizSession {
    quiz: Quiz,
    clock: Clock,
    resume: Arc<dyn ResumeStore>,
    sink: Arc<dyn SubmissionSink>,
    countdown: Countdown,
    phase: SessionPhase,
    state: Option<SessionState>,
    in_flight: Option<InFlight>,
    timed_out: bool,
    notices: Vec<Notice>,
}

impl QuizSession {
    #[must_use]
    pub fn new(
        quiz: Quiz,
        clock: Clock,
        resume: Arc<dyn ResumeStore>,
        sink: Arc<dyn SubmissionSink>,
        countdown: Countdown,
    ) -> Self {
        Self {
            quiz,
            clock,
            resume,
            sink,
            countdown,
            phase: SessionPhase::Initializing,
            state: None,
            in_flight: None,
            timed_out: false,
            notices: Vec::new(),
        }
    }

    /// Restore saved progress or start a fresh attempt.
    ///
    /// Without questions the session stays in `Initializing` and any saved progress is
    /// dropped. Saved progress that cannot be decoded or no longer matches the questions is
    /// discarded in favour of a fresh attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the resume store cannot be read, or
    /// `SessionError::State` if a fresh state cannot be built.
    pub async fn initialize(&mut self) -> Result<&SessionPhase, SessionError> {
        if !matches!(self.phase, SessionPhase::Initializing) {
            return Ok(&self.phase);
        }
        if !self.quiz.is_ready() {
            log::debug!("quiz {} has no questions yet", self.quiz.id());
            self.clear_resume().await;
            return Ok(&self.phase);
        }

        let loaded = self.resume.load().await?;
        let restored = match loaded {
            ResumeLoad::Found(state) => match state.validate_against(self.quiz.questions()) {
                Ok(()) => Some(state),
                Err(err) => {
                    self.discard_resume(err.to_string()).await;
                    None
                }
            },
            ResumeLoad::Malformed(reason) => {
                self.discard_resume(reason).await;
                None
            }
            ResumeLoad::Absent => None,
        };

        let (state, resumed) = match restored {
            Some(state) => (state, true),
            None => (
                SessionState::fresh(self.quiz.questions(), self.clock.now())?,
                false,
            ),
        };
        let question_index = state.current_question_index();
        self.state = Some(state);
        self.timed_out = false;
        self.phase = SessionPhase::Active { question_index };
        self.countdown.start(question_index);

        if resumed {
            log::info!(
                "resumed quiz {} at question {}",
                self.quiz.id(),
                question_index + 1
            );
            self.notices.push(Notice::Resumed { question_index });
        } else {
            log::info!(
                "started quiz {} with {} questions",
                self.quiz.id(),
                self.quiz.questions().len()
            );
            self.persist().await;
        }
        Ok(&self.phase)
    }

    /// Record option `index` as the answer to the current question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside `Active`, or `SessionError::State` if the
    /// option does not exist.
    pub async fn select_option(&mut self, index: usize) -> Result<&Response, SessionError> {
        let SessionPhase::Active { question_index } = self.phase else {
            return Err(SessionError::NotActive);
        };
        let state = self.state.as_mut().ok_or(SessionError::NotActive)?;
        let question = &self.quiz.questions()[question_index];
        state.record_selection(question, index)?;
        log::debug!("question {} answered with option {index}", question_index + 1);

        self.persist().await;
        self.state
            .as_ref()
            .map(SessionState::current_response)
            .ok_or(SessionError::NotActive)
    }

    /// Deliver a countdown tick. Reaching zero advances as a timeout, once per question.
    ///
    /// # Errors
    ///
    /// Propagates errors from the timeout advance.
    pub async fn on_tick(&mut self, tick: Tick) -> Result<TickOutcome, SessionError> {
        match self.count_tick(tick).await {
            TickCount::Ignored => Ok(TickOutcome::Ignored),
            TickCount::Counted(time_left_secs) => Ok(TickOutcome::Counted { time_left_secs }),
            TickCount::Expired => Ok(TickOutcome::TimedOut(self.advance(true).await?)),
        }
    }

    /// Apply a tick to the clock without advancing. `Expired` means the caller must
    /// advance with `is_timeout` set.
    pub(crate) async fn count_tick(&mut self, tick: Tick) -> TickCount {
        self.recover_dropped_submission();
        if !self.countdown.accepts(tick)
            || self.timed_out
            || !matches!(self.phase, SessionPhase::Active { .. })
        {
            log::debug!("ignoring stale tick for question {}", tick.question_index + 1);
            return TickCount::Ignored;
        }
        let Some(state) = self.state.as_mut() else {
            return TickCount::Ignored;
        };

        let time_left_secs = state.tick();
        if time_left_secs > 0 {
            self.persist().await;
            return TickCount::Counted(time_left_secs);
        }

        self.timed_out = true;
        log::debug!("question {} timed out", tick.question_index + 1);
        TickCount::Expired
    }

    /// Close the current question and move on, submitting after the last one.
    ///
    /// Returns `Suppressed` without changes while a submission is in flight. Dropping the
    /// returned future during the submission puts the session back on the last question,
    /// as if the submission had failed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` when called before initialization or after the
    /// session ended. Submission failures are not errors: they return
    /// `AdvanceOutcome::SubmissionFailed`.
    pub async fn advance(&mut self, is_timeout: bool) -> Result<AdvanceOutcome, SessionError> {
        let pending = match self.begin_advance(is_timeout).await? {
            AdvanceStep::Done(outcome) => return Ok(outcome),
            AdvanceStep::Submit(pending) => pending,
        };

        let mut guard = InterruptOnDrop {
            session: self,
            armed: true,
        };
        let reply = pending.send().await;
        guard.armed = false;
        Ok(guard.session.finish_submission(reply).await)
    }

    /// First half of `advance`. After the last question the session enters `Submitting`
    /// and hands back the submission; the caller sends it and passes the reply to
    /// `finish_submission`, while other calls observe the submission as in flight.
    ///
    /// # Errors
    ///
    /// Same as `advance`.
    pub async fn begin_advance(&mut self, is_timeout: bool) -> Result<AdvanceStep, SessionError> {
        self.recover_dropped_submission();
        if matches!(self.phase, SessionPhase::Submitting) {
            return Ok(AdvanceStep::Done(AdvanceOutcome::Suppressed));
        }
        if !matches!(self.phase, SessionPhase::Active { .. }) {
            return Err(SessionError::NotActive);
        }

        let now = self.clock.now();
        let state = self.state.as_mut().ok_or(SessionError::NotActive)?;
        if is_timeout {
            state.finalize_timeout();
        } else {
            state.finalize_manual();
        }

        if let Some(question_index) = state.move_to_next(now) {
            self.timed_out = false;
            self.phase = SessionPhase::Active { question_index };
            self.countdown.start(question_index);
            self.persist().await;
            return Ok(AdvanceStep::Done(AdvanceOutcome::Moved { question_index }));
        }

        let state = self.state.as_ref().ok_or(SessionError::NotActive)?;
        let last_index = state.current_question_index();
        let summary = AttemptSummary::from_state(
            self.quiz.id().clone(),
            self.quiz.title(),
            self.quiz.level(),
            state,
            now,
        )?;
        let payload = SubmissionPayload::from_state(self.quiz.title(), state);
        log::info!(
            "submitting quiz {}: {} of {} answered in {}s",
            self.quiz.id(),
            summary.answered(),
            summary.total_questions(),
            summary.total_time_taken_secs()
        );

        let token = Arc::new(());
        self.countdown.stop();
        self.phase = SessionPhase::Submitting;
        self.in_flight = Some(InFlight {
            last_index,
            summary,
            token: Arc::downgrade(&token),
        });
        self.persist().await;

        Ok(AdvanceStep::Submit(PendingSubmission {
            sink: Arc::clone(&self.sink),
            quiz_id: self.quiz.id().clone(),
            payload,
            token,
        }))
    }

    /// Second half of `advance`: settle the session with the sink's reply.
    ///
    /// A reply that does not belong to the submission in flight is ignored and reported as
    /// `Suppressed`.
    pub async fn finish_submission(&mut self, reply: SubmissionReply) -> AdvanceOutcome {
        let (last_index, summary) = match self.in_flight.take() {
            Some(f) if f.token.ptr_eq(&Arc::downgrade(&reply.token)) => (f.last_index, f.summary),
            other => {
                self.in_flight = other;
                log::debug!("ignoring reply for a submission that is no longer in flight");
                return AdvanceOutcome::Suppressed;
            }
        };

        let message = match reply.result {
            Ok(receipt) if receipt.status => {
                self.notices.push(Notice::Submitted {
                    message: receipt.message.clone(),
                });
                let outcome = TerminalOutcome::Success { receipt, summary };
                self.phase = SessionPhase::Terminal(outcome.clone());
                self.clear_resume().await;
                return AdvanceOutcome::Completed(Box::new(outcome));
            }
            Ok(receipt) if receipt.message.is_empty() => "submission was rejected".to_owned(),
            Ok(receipt) => receipt.message,
            Err(err) => err.to_string(),
        };

        log::warn!("submission of quiz {} failed: {message}", self.quiz.id());
        self.return_to_last(last_index, message.clone());
        AdvanceOutcome::SubmissionFailed { message }
    }

    /// Whether a submission has been handed out and not yet settled.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|f| f.token.strong_count() > 0)
    }

    fn return_to_last(&mut self, last_index: usize, message: String) {
        // The countdown stays stopped and `timed_out` keeps its value, so a retry is only
        // ever started by the user.
        self.phase = SessionPhase::Active {
            question_index: last_index,
        };
        self.notices.push(Notice::SubmissionFailed { message });
    }

    fn interrupt_submission(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            log::warn!("submission of quiz {} was interrupted", self.quiz.id());
            self.return_to_last(in_flight.last_index, INTERRUPTED.to_owned());
        }
    }

    fn recover_dropped_submission(&mut self) {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.token.strong_count() == 0)
        {
            self.interrupt_submission();
        }
    }

    /// Give up the attempt without submitting. Saved progress is removed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside `Active`.
    pub async fn abandon(&mut self) -> Result<&SessionPhase, SessionError> {
        self.recover_dropped_submission();
        if !matches!(self.phase, SessionPhase::Active { .. }) {
            return Err(SessionError::NotActive);
        }
        self.countdown.stop();
        self.clear_resume().await;
        log::info!("quiz {} abandoned", self.quiz.id());
        self.phase = SessionPhase::Terminal(TerminalOutcome::Failure {
            reason: "abandoned".to_owned(),
        });
        Ok(&self.phase)
    }

    async fn persist(&mut self) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        if let Err(err) = self.resume.save(state).await {
            log::warn!("failed to save quiz progress: {err}");
            self.notices.push(Notice::PersistFailed {
                message: err.to_string(),
            });
        }
    }

    async fn clear_resume(&mut self) {
        if let Err(err) = self.resume.clear().await {
            log::warn!("failed to clear quiz progress: {err}");
            self.notices.push(Notice::PersistFailed {
                message: err.to_string(),
            });
        }
    }

    async fn discard_resume(&mut self, reason: String) {
        log::warn!("discarding saved progress for {}: {reason}", self.quiz.id());
        self.clear_resume().await;
        self.notices.push(Notice::DiscardedResume { reason });
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    #[must_use]
    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    #[must_use]
    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    #[must_use]
    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, SessionPhase::Terminal(_))
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        let state = self.state.as_ref()?;
        self.quiz.questions().get(state.current_question_index())
    }

    /// Option highlighted for the current question, derived from its response.
    #[must_use]
    pub fn selected_option(&self) -> Option<usize> {
        self.state
            .as_ref()
            .and_then(|s| s.current_response().selected_option_index())
    }

    #[must_use]
    pub fn time_left(&self) -> Option<u32> {
        self.state.as_ref().map(SessionState::time_left_secs)
    }

    #[must_use]
    pub fn progress(&self) -> Option<SessionProgress> {
        let state = self.state.as_ref()?;
        let total = state.total_questions();
        let question_index = state.current_question_index();
        Some(SessionProgress {
            question_index,
            total,
            answered: state.answered_count(),
            remaining: total - question_index,
            time_left_secs: state.time_left_secs(),
        })
    }

    /// Take the notifications raised since the last call.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("quiz_id", self.quiz.id())
            .field("questions", &self.quiz.questions().len())
            .field("phase", &self.phase)
            .field("state", &self.state)
            .field("submitting", &self.is_submitting())
            .field("timed_out", &self.timed_out)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{QUESTION_TIME_SECS, QuestionId, QuizId};
    use quiz_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    use crate::sources::LocalSubmissionSink;

    fn quiz(n: usize) -> Quiz {
        let questions = (0..n)
            .map(|i| {
                Question::new(
                    QuestionId::new(format!("q{i}")).unwrap(),
                    format!("Question {i}"),
                    vec!["a".into(), "b".into(), "c".into()],
                )
                .unwrap()
            })
            .collect();
        Quiz::new(QuizId::new("level-1").unwrap(), "Level 1", 1, questions).unwrap()
    }

    fn session(quiz: Quiz, repo: &InMemoryRepository) -> QuizSession {
        QuizSession::new(
            quiz,
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(LocalSubmissionSink::new()),
            Countdown::manual(),
        )
    }

    #[tokio::test]
    async fn fresh_session_starts_on_first_question_and_persists() {
        let repo = InMemoryRepository::new();
        let mut session = session(quiz(2), &repo);

        let phase = session.initialize().await.unwrap().clone();
        assert_eq!(phase, SessionPhase::Active { question_index: 0 });
        assert_eq!(session.time_left(), Some(QUESTION_TIME_SECS));
        assert!(session.countdown().is_running());
        assert!(matches!(
            repo.load().await.unwrap(),
            ResumeLoad::Found(_)
        ));
    }

    #[tokio::test]
    async fn empty_quiz_stays_initializing_and_clears_saved_progress() {
        let repo = InMemoryRepository::new();
        repo.put_raw_resume("{}").unwrap();
        let mut session = session(Quiz::pending(QuizId::new("level-1").unwrap()), &repo);

        let phase = session.initialize().await.unwrap().clone();
        assert_eq!(phase, SessionPhase::Initializing);
        assert!(!session.countdown().is_running());
        assert_eq!(repo.raw_resume().unwrap(), None);

        let err = session.select_option(0).await.unwrap_err();
        assert!(matches!(err, SessionError::NotActive));
        assert!(matches!(
            session.advance(false).await.unwrap_err(),
            SessionError::NotActive
        ));
    }

    #[tokio::test]
    async fn selection_is_derived_from_responses() {
        let repo = InMemoryRepository::new();
        let mut session = session(quiz(2), &repo);
        session.initialize().await.unwrap();

        assert_eq!(session.selected_option(), None);
        session.select_option(2).await.unwrap();
        assert_eq!(session.selected_option(), Some(2));
        session.select_option(0).await.unwrap();
        assert_eq!(session.selected_option(), Some(0));

        let err = session.select_option(7).await.unwrap_err();
        assert!(matches!(err, SessionError::State(_)));
        assert_eq!(session.selected_option(), Some(0));
    }

    #[tokio::test]
    async fn manual_advance_without_selection_records_elapsed_time() {
        let repo = InMemoryRepository::new();
        let mut session = session(quiz(2), &repo);
        session.initialize().await.unwrap();

        let tick = session.countdown().current().unwrap();
        session.on_tick(tick).await.unwrap();
        session.on_tick(tick).await.unwrap();
        let outcome = session.advance(false).await.unwrap();

        assert_eq!(outcome, AdvanceOutcome::Moved { question_index: 1 });
        let first = &session.state().unwrap().responses()[0];
        assert!(!first.is_answered());
        assert_eq!(first.time_taken_secs(), 2);
        assert_eq!(session.time_left(), Some(QUESTION_TIME_SECS));
    }

    #[tokio::test]
    async fn stale_tick_after_advance_is_ignored() {
        let repo = InMemoryRepository::new();
        let mut session = session(quiz(3), &repo);
        session.initialize().await.unwrap();

        let old = session.countdown().current().unwrap();
        session.advance(false).await.unwrap();

        assert_eq!(session.on_tick(old).await.unwrap(), TickOutcome::Ignored);
        assert_eq!(session.time_left(), Some(QUESTION_TIME_SECS));
    }

    #[tokio::test]
    async fn abandon_ends_with_failure_and_clears_progress() {
        let repo = InMemoryRepository::new();
        let mut session = session(quiz(2), &repo);
        session.initialize().await.unwrap();

        let phase = session.abandon().await.unwrap().clone();
        assert!(matches!(
            phase,
            SessionPhase::Terminal(TerminalOutcome::Failure { .. })
        ));
        assert!(!session.countdown().is_running());
        assert_eq!(repo.load().await.unwrap(), ResumeLoad::Absent);
        assert!(session.abandon().await.is_err());
    }

    #[tokio::test]
    async fn progress_tracks_position_and_answers() {
        let repo = InMemoryRepository::new();
        let mut session = session(quiz(3), &repo);
        assert_eq!(session.progress(), None);
        session.initialize().await.unwrap();
        session.select_option(1).await.unwrap();
        session.advance(false).await.unwrap();

        let progress = session.progress().unwrap();
        assert_eq!(progress.question_index, 1);
        assert_eq!(progress.total, 3);
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.remaining, 2);
    }
}
