use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use quiz_core::model::{
    Question, QuestionId, Quiz, QuizId, SubmissionPayload, SubmissionReceipt, QUESTION_TIME_SECS,
};
use quiz_core::time::{fixed_clock, fixed_now};
use services::{
    AdvanceOutcome, AdvanceStep, Clock, Countdown, LocalSubmissionSink, Notice, QuizSession,
    SessionError, SessionPhase, SubmissionSink, SubmitError, TerminalOutcome, TickOutcome,
};
use tokio::sync::Notify;
use storage::repository::{InMemoryRepository, ResumeLoad, ResumeStore};

fn quiz() -> Quiz {
    let questions = [
        ("q1", ["red", "green", "blue"]),
        ("q2", ["one", "two", "three"]),
        ("q3", ["cat", "dog", "owl"]),
    ]
    .into_iter()
    .map(|(id, options)| {
        Question::new(
            QuestionId::new(id).unwrap(),
            format!("Prompt {id}"),
            options.iter().map(|o| (*o).to_string()).collect(),
        )
        .unwrap()
    })
    .collect();
    Quiz::new(QuizId::new("level-1").unwrap(), "Level 1", 1, questions).unwrap()
}

fn session_with(repo: &InMemoryRepository, sink: Arc<dyn SubmissionSink>) -> QuizSession {
    QuizSession::new(
        quiz(),
        fixed_clock(),
        Arc::new(repo.clone()),
        sink,
        Countdown::manual(),
    )
}

/// Rejects the first submission, then accepts everything.
struct FlakySink {
    script: Mutex<VecDeque<SubmissionReceipt>>,
    calls: Mutex<Vec<SubmissionPayload>>,
}

impl FlakySink {
    fn failing_once() -> Self {
        Self {
            script: Mutex::new(VecDeque::from([SubmissionReceipt::rejected("server busy")])),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SubmissionSink for FlakySink {
    async fn submit(
        &self,
        _quiz_id: &QuizId,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, SubmitError> {
        self.calls.lock().unwrap().push(payload.clone());
        let scripted = self.script.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| SubmissionReceipt::accepted("graded")))
    }
}

/// Holds every submission until `open` is called, then accepts it.
#[derive(Default)]
struct GatedSink {
    gate: Notify,
    calls: AtomicUsize,
}

impl GatedSink {
    fn open(&self) {
        self.gate.notify_one();
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubmissionSink for GatedSink {
    async fn submit(
        &self,
        _quiz_id: &QuizId,
        _payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, SubmitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(SubmissionReceipt::accepted("graded"))
    }
}

/// Answer every question but the last and stop on it.
async fn reach_last_question(session: &mut QuizSession) {
    session.initialize().await.unwrap();
    for index in [1, 0] {
        session.select_option(index).await.unwrap();
        session.advance(false).await.unwrap();
    }
    session.select_option(2).await.unwrap();
}

async fn run_out_clock(session: &mut QuizSession) -> TickOutcome {
    let mut last = TickOutcome::Ignored;
    for _ in 0..QUESTION_TIME_SECS {
        let tick = session.countdown().current().unwrap();
        last = session.on_tick(tick).await.unwrap();
    }
    last
}

#[tokio::test]
async fn happy_path_submits_chosen_option_texts() {
    let repo = InMemoryRepository::new();
    let sink = LocalSubmissionSink::new();
    let mut session = session_with(&repo, Arc::new(sink.clone()));
    session.initialize().await.unwrap();

    let mut last = AdvanceOutcome::Suppressed;
    for index in [1, 0, 2] {
        session.select_option(index).await.unwrap();
        last = session.advance(false).await.unwrap();
    }

    let AdvanceOutcome::Completed(outcome) = last else {
        panic!("expected completion, got {last:?}");
    };
    assert!(matches!(*outcome, TerminalOutcome::Success { .. }));
    assert!(session.is_terminal());
    assert_eq!(repo.load().await.unwrap(), ResumeLoad::Absent);

    let received = sink.received();
    assert_eq!(received.len(), 1);
    let answers: Vec<_> = received[0].1.questions.iter().map(|q| q.answer.as_str()).collect();
    assert_eq!(answers, ["green", "one", "owl"]);
    assert!(received[0].1.questions.iter().all(|q| q.answered));
    assert_eq!(received[0].1.title, "Level 1");
}

#[tokio::test]
async fn timeout_records_unanswered_question_and_moves_on() {
    let repo = InMemoryRepository::new();
    let mut session = session_with(&repo, Arc::new(LocalSubmissionSink::new()));
    session.initialize().await.unwrap();
    session.select_option(0).await.unwrap();
    session.advance(false).await.unwrap();

    let outcome = run_out_clock(&mut session).await;

    assert_eq!(
        outcome,
        TickOutcome::TimedOut(AdvanceOutcome::Moved { question_index: 2 })
    );
    let state = session.state().unwrap();
    let second = &state.responses()[1];
    assert_eq!(second.selected_option_index(), None);
    assert_eq!(second.selected_option_text(), None);
    assert_eq!(second.time_taken_secs(), QUESTION_TIME_SECS);
    assert_eq!(state.current_question_index(), 2);
    assert_eq!(state.time_left_secs(), QUESTION_TIME_SECS);
}

#[tokio::test]
async fn timeout_keeps_existing_selection() {
    let repo = InMemoryRepository::new();
    let mut session = session_with(&repo, Arc::new(LocalSubmissionSink::new()));
    session.initialize().await.unwrap();
    let tick = session.countdown().current().unwrap();
    session.on_tick(tick).await.unwrap();
    session.select_option(2).await.unwrap();

    let tick = session.countdown().current().unwrap();
    for _ in 1..QUESTION_TIME_SECS {
        session.on_tick(tick).await.unwrap();
    }

    let first = &session.state().unwrap().responses()[0];
    assert_eq!(first.selected_option_text(), Some("blue"));
    assert_eq!(first.time_taken_secs(), 1);
}

#[tokio::test]
async fn auto_advance_happens_exactly_once() {
    let repo = InMemoryRepository::new();
    let mut session = session_with(&repo, Arc::new(LocalSubmissionSink::new()));
    session.initialize().await.unwrap();

    let first_run = session.countdown().current().unwrap();
    run_out_clock(&mut session).await;

    // Late ticks from the expired run change nothing.
    for _ in 0..3 {
        assert_eq!(session.on_tick(first_run).await.unwrap(), TickOutcome::Ignored);
    }
    let state = session.state().unwrap();
    assert_eq!(state.current_question_index(), 1);
    assert_eq!(state.time_left_secs(), QUESTION_TIME_SECS);
    assert_eq!(state.responses()[1].time_taken_secs(), 0);
}

#[tokio::test]
async fn failed_submission_can_be_retried() {
    let repo = InMemoryRepository::new();
    let sink = Arc::new(FlakySink::failing_once());
    let mut session = session_with(&repo, sink.clone());
    session.initialize().await.unwrap();
    for index in [1, 0] {
        session.select_option(index).await.unwrap();
        session.advance(false).await.unwrap();
    }
    session.select_option(2).await.unwrap();

    let failed = session.advance(false).await.unwrap();
    assert_eq!(
        failed,
        AdvanceOutcome::SubmissionFailed {
            message: "server busy".into()
        }
    );
    assert_eq!(session.phase(), &SessionPhase::Active { question_index: 2 });
    assert_eq!(session.state().unwrap().answered_count(), 3);
    assert!(matches!(repo.load().await.unwrap(), ResumeLoad::Found(_)));
    assert!(session
        .drain_notices()
        .contains(&Notice::SubmissionFailed { message: "server busy".into() }));

    let retried = session.advance(false).await.unwrap();
    assert!(matches!(retried, AdvanceOutcome::Completed(_)));
    assert!(matches!(
        session.phase(),
        SessionPhase::Terminal(TerminalOutcome::Success { .. })
    ));
    assert_eq!(sink.calls(), 2);
    assert_eq!(repo.load().await.unwrap(), ResumeLoad::Absent);
}

#[tokio::test]
async fn reload_resumes_where_the_attempt_left_off() {
    let repo = InMemoryRepository::new();
    let mut first = session_with(&repo, Arc::new(LocalSubmissionSink::new()));
    first.initialize().await.unwrap();
    first.select_option(1).await.unwrap();
    first.advance(false).await.unwrap();
    let tick = first.countdown().current().unwrap();
    first.on_tick(tick).await.unwrap();
    first.on_tick(tick).await.unwrap();
    first.select_option(2).await.unwrap();
    let before = first.state().unwrap().clone();
    drop(first);

    let mut second = session_with(&repo, Arc::new(LocalSubmissionSink::new()));
    second.initialize().await.unwrap();

    assert_eq!(second.state().unwrap(), &before);
    assert_eq!(second.selected_option(), Some(2));
    assert_eq!(second.phase(), &SessionPhase::Active { question_index: 1 });
    assert_eq!(
        second.drain_notices(),
        vec![Notice::Resumed { question_index: 1 }]
    );
}

#[tokio::test]
async fn corrupted_progress_starts_fresh() {
    let repo = InMemoryRepository::new();
    repo.put_raw_resume(r#"{"current_question_index": "two"}"#).unwrap();
    let mut session = session_with(&repo, Arc::new(LocalSubmissionSink::new()));

    session.initialize().await.unwrap();

    assert_eq!(session.phase(), &SessionPhase::Active { question_index: 0 });
    assert_eq!(session.state().unwrap().answered_count(), 0);
    assert!(matches!(
        session.drain_notices().as_slice(),
        [Notice::DiscardedResume { .. }]
    ));
    assert!(matches!(repo.load().await.unwrap(), ResumeLoad::Found(_)));
}

#[tokio::test]
async fn response_count_never_changes() {
    let repo = InMemoryRepository::new();
    let mut session = session_with(&repo, Arc::new(FlakySink::failing_once()));
    session.initialize().await.unwrap();
    let total = quiz().questions().len();

    session.select_option(0).await.unwrap();
    session.select_option(1).await.unwrap();
    assert_eq!(session.state().unwrap().responses().len(), total);
    run_out_clock(&mut session).await;
    assert_eq!(session.state().unwrap().responses().len(), total);
    session.advance(false).await.unwrap();
    session.advance(false).await.unwrap();
    assert_eq!(session.state().unwrap().responses().len(), total);
    session.advance(false).await.unwrap();
    assert_eq!(session.state().unwrap().responses().len(), total);
}

#[tokio::test]
async fn advance_is_suppressed_while_submission_is_in_flight() {
    let repo = InMemoryRepository::new();
    let sink = Arc::new(GatedSink::default());
    let mut session = session_with(&repo, sink.clone());
    reach_last_question(&mut session).await;

    let AdvanceStep::Submit(pending) = session.begin_advance(false).await.unwrap() else {
        panic!("expected the last question to start a submission");
    };
    assert!(session.is_submitting());
    let before = session.state().unwrap().clone();

    let (reply, (again, abandoned, unchanged)) = tokio::join!(pending.send(), async {
        let again = session.advance(false).await.unwrap();
        let abandoned = session.abandon().await.err();
        let unchanged = session.state() == Some(&before);
        sink.open();
        (again, abandoned, unchanged)
    });

    assert_eq!(again, AdvanceOutcome::Suppressed);
    assert!(matches!(abandoned, Some(SessionError::NotActive)));
    assert!(unchanged);
    assert_eq!(sink.calls(), 1);

    let outcome = session.finish_submission(reply).await;
    assert!(matches!(outcome, AdvanceOutcome::Completed(_)));
    assert!(!session.is_submitting());
    assert!(session.is_terminal());
}

#[tokio::test(start_paused = true)]
async fn cancelled_advance_returns_to_last_question() {
    let repo = InMemoryRepository::new();
    let sink = Arc::new(GatedSink::default());
    let mut session = session_with(&repo, sink.clone());
    reach_last_question(&mut session).await;

    let cancelled = tokio::time::timeout(Duration::from_secs(5), session.advance(false)).await;
    assert!(cancelled.is_err());

    assert_eq!(session.phase(), &SessionPhase::Active { question_index: 2 });
    assert!(!session.is_submitting());
    assert!(session.drain_notices().contains(&Notice::SubmissionFailed {
        message: "submission was interrupted".into()
    }));
    assert!(matches!(repo.load().await.unwrap(), ResumeLoad::Found(_)));

    sink.open();
    let retried = session.advance(false).await.unwrap();
    assert!(matches!(retried, AdvanceOutcome::Completed(_)));
    assert_eq!(sink.calls(), 2);
}

#[tokio::test]
async fn dropped_pending_submission_does_not_block_abandon() {
    let repo = InMemoryRepository::new();
    let sink = Arc::new(GatedSink::default());
    let mut session = session_with(&repo, sink.clone());
    reach_last_question(&mut session).await;

    let step = session.begin_advance(false).await.unwrap();
    assert!(matches!(step, AdvanceStep::Submit(_)));
    drop(step);

    let phase = session.abandon().await.unwrap();
    assert!(matches!(
        phase,
        SessionPhase::Terminal(TerminalOutcome::Failure { .. })
    ));
    assert_eq!(sink.calls(), 0);
}

#[tokio::test]
async fn resume_with_clock_behind_start_still_submits() {
    let repo = InMemoryRepository::new();
    let mut first = session_with(&repo, Arc::new(LocalSubmissionSink::new()));
    first.initialize().await.unwrap();
    first.select_option(0).await.unwrap();
    drop(first);

    let mut second = QuizSession::new(
        quiz(),
        Clock::fixed(fixed_now() - chrono::Duration::seconds(60)),
        Arc::new(repo.clone()),
        Arc::new(LocalSubmissionSink::new()),
        Countdown::manual(),
    );
    second.initialize().await.unwrap();
    assert_eq!(second.selected_option(), Some(0));

    let mut last = AdvanceOutcome::Suppressed;
    for _ in 0..quiz().questions().len() {
        last = second.advance(false).await.unwrap();
    }

    let AdvanceOutcome::Completed(outcome) = last else {
        panic!("expected completion, got {last:?}");
    };
    let TerminalOutcome::Success { summary, .. } = *outcome else {
        panic!("expected a successful submission");
    };
    assert_eq!(summary.total_time_taken_secs(), 0);
    assert_eq!(summary.started_at(), fixed_now());
}
