use std::future::Future;
use std::pin::Pin;

use quiz_core::model::Question;
use tokio::sync::mpsc;

use super::countdown::TickReceiver;
use super::service::{
    AdvanceOutcome, AdvanceStep, Notice, QuizSession, SessionPhase, SubmissionReply,
    TerminalOutcome, TickCount,
};
use crate::error::SessionError;

type Sending = Pin<Box<dyn Future<Output = SubmissionReply> + Send>>;

const SUBMISSION_IN_PROGRESS: &str = "submission already in progress";

/// User intents delivered to a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Select(usize),
    Next,
    Abandon,
}

/// What a front end needs to render, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    QuestionShown {
        question_index: usize,
        total: usize,
        question: Question,
        selected: Option<usize>,
        time_left_secs: u32,
    },
    Ticked {
        time_left_secs: u32,
    },
    Selected {
        index: usize,
    },
    TimedOut {
        question_index: usize,
    },
    Notice(Notice),
    /// A command that does not apply in the current phase.
    Rejected(String),
    Finished(TerminalOutcome),
}

/// Runs a `QuizSession` against its countdown and a command stream.
///
/// Ticks and commands are handled one at a time, so a timeout and a manual advance can
/// never interleave. A submission is awaited alongside them; commands arriving while it is
/// in flight are rejected.
pub struct SessionDriver {
    session: QuizSession,
    ticks: TickReceiver,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionDriver {
    #[must_use]
    pub fn new(
        session: QuizSession,
        ticks: TickReceiver,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            session,
            ticks,
            events,
        }
    }

    /// Drive the session until it ends or can make no further progress.
    ///
    /// Once `commands` is closed the countdown keeps running, so remaining questions time
    /// out on their own. The loop stops when the session is terminal, when it never became
    /// active, or when nothing is left to wake it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for failures that are not plain command rejections, such as
    /// an unreadable resume store.
    pub async fn run(
        self,
        mut commands: mpsc::Receiver<SessionCommand>,
    ) -> Result<QuizSession, SessionError> {
        let Self {
            mut session,
            mut ticks,
            events,
        } = self;

        session.initialize().await?;
        flush_notices(&mut session, &events);
        if !matches!(session.phase(), SessionPhase::Active { .. }) {
            log::info!("quiz {} is not ready; nothing to run", session.quiz().id());
            return Ok(session);
        }
        show_question(&session, &events);

        let mut commands_open = true;
        let mut sending: Option<Sending> = None;
        while !session.is_terminal() {
            if !commands_open && sending.is_none() && !session.countdown().is_running() {
                break;
            }
            tokio::select! {
                reply = settle(&mut sending), if sending.is_some() => {
                    sending = None;
                    let outcome = session.finish_submission(reply).await;
                    after_advance(&mut session, &events, outcome);
                }
                Some(tick) = ticks.recv() => match session.count_tick(tick).await {
                    TickCount::Ignored => {}
                    TickCount::Counted(time_left_secs) => {
                        emit(&events, SessionEvent::Ticked { time_left_secs });
                    }
                    TickCount::Expired => {
                        emit(&events, SessionEvent::TimedOut {
                            question_index: tick.question_index,
                        });
                        let step = session.begin_advance(true).await?;
                        take_step(&mut session, &events, &mut sending, step);
                    }
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => {
                        handle_command(&mut session, &events, &mut sending, command).await?;
                    }
                    None => {
                        log::debug!("command stream closed");
                        commands_open = false;
                    }
                },
                else => break,
            }
        }
        Ok(session)
    }
}

async fn settle(sending: &mut Option<Sending>) -> SubmissionReply {
    match sending {
        Some(future) => future.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn handle_command(
    session: &mut QuizSession,
    events: &mpsc::UnboundedSender<SessionEvent>,
    sending: &mut Option<Sending>,
    command: SessionCommand,
) -> Result<(), SessionError> {
    match command {
        SessionCommand::Select(index) => match session.select_option(index).await {
            Ok(_) => emit(events, SessionEvent::Selected { index }),
            Err(err) => emit(events, SessionEvent::Rejected(err.to_string())),
        },
        SessionCommand::Next => match session.begin_advance(false).await {
            Ok(step) => take_step(session, events, sending, step),
            Err(SessionError::NotActive) => {
                emit(events, SessionEvent::Rejected(SessionError::NotActive.to_string()));
            }
            Err(err) => return Err(err),
        },
        SessionCommand::Abandon => match session.abandon().await {
            Ok(SessionPhase::Terminal(outcome)) => {
                let outcome = outcome.clone();
                emit(events, SessionEvent::Finished(outcome));
            }
            Ok(_) => {}
            Err(err) => emit(events, SessionEvent::Rejected(err.to_string())),
        },
    }
    flush_notices(session, events);
    Ok(())
}

fn take_step(
    session: &mut QuizSession,
    events: &mpsc::UnboundedSender<SessionEvent>,
    sending: &mut Option<Sending>,
    step: AdvanceStep,
) {
    match step {
        AdvanceStep::Done(outcome) => after_advance(session, events, outcome),
        AdvanceStep::Submit(pending) => {
            flush_notices(session, events);
            let future: Sending = Box::pin(pending.send());
            *sending = Some(future);
        }
    }
}

fn after_advance(
    session: &mut QuizSession,
    events: &mpsc::UnboundedSender<SessionEvent>,
    outcome: AdvanceOutcome,
) {
    flush_notices(session, events);
    match outcome {
        AdvanceOutcome::Suppressed => {
            emit(events, SessionEvent::Rejected(SUBMISSION_IN_PROGRESS.to_owned()));
        }
        // After a failed submission the last question is shown again for a retry.
        AdvanceOutcome::Moved { .. } | AdvanceOutcome::SubmissionFailed { .. } => {
            show_question(session, events);
        }
        AdvanceOutcome::Completed(outcome) => emit(events, SessionEvent::Finished(*outcome)),
    }
}

fn show_question(session: &QuizSession, events: &mpsc::UnboundedSender<SessionEvent>) {
    let (Some(progress), Some(question)) = (session.progress(), session.current_question())
    else {
        return;
    };
    emit(
        events,
        SessionEvent::QuestionShown {
            question_index: progress.question_index,
            total: progress.total,
            question: question.clone(),
            selected: session.selected_option(),
            time_left_secs: progress.time_left_secs,
        },
    );
}

fn flush_notices(session: &mut QuizSession, events: &mpsc::UnboundedSender<SessionEvent>) {
    for notice in session.drain_notices() {
        emit(events, SessionEvent::Notice(notice));
    }
}

fn emit(events: &mpsc::UnboundedSender<SessionEvent>, event: SessionEvent) {
    if events.send(event).is_err() {
        log::trace!("session event dropped; no listener");
    }
}
