use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::model::question::Question;
use crate::model::response::{Response, Selection};

/// Seconds allowed per question. Fixed policy, not configurable.
pub const QUESTION_TIME_SECS: u32 = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("cannot start a session without questions")]
    NoQuestions,

    #[error("question index {index} is out of range for {len} questions")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("time left {0}s exceeds the per-question budget")]
    TimeOutOfRange(u32),

    #[error("expected {expected} responses, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("response {position} belongs to {found}, expected {expected}")]
    QuestionMismatch {
        position: usize,
        expected: QuestionId,
        found: QuestionId,
    },

    #[error("option {index} does not exist on a question with {len} options")]
    InvalidOption { index: usize, len: usize },

    #[error("response {position} records text that does not match option {index}")]
    OptionTextMismatch { position: usize, index: usize },
}

/// Progress of one quiz attempt: the unit persisted for resume.
///
/// `responses` is allocated once with one slot per question and never grows or shrinks.
/// Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    current_question_index: usize,
    responses: Vec<Response>,
    time_left_secs: u32,
    question_started_at: i64,
    session_started_at: i64,
}

impl SessionState {
    /// Start a new attempt on the first question with a full countdown.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::NoQuestions` if the list is empty.
    pub fn fresh(questions: &[Question], now: DateTime<Utc>) -> Result<Self, SessionStateError> {
        if questions.is_empty() {
            return Err(SessionStateError::NoQuestions);
        }
        let now = now.timestamp();
        Ok(Self {
            current_question_index: 0,
            responses: questions
                .iter()
                .map(|q| Response::empty(q.id().clone()))
                .collect(),
            time_left_secs: QUESTION_TIME_SECS,
            question_started_at: now,
            session_started_at: now,
        })
    }

    /// Rehydrate a state from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError` if the index or countdown is out of range.
    pub fn from_persisted(
        current_question_index: usize,
        responses: Vec<Response>,
        time_left_secs: u32,
        question_started_at: i64,
        session_started_at: i64,
    ) -> Result<Self, SessionStateError> {
        if responses.is_empty() {
            return Err(SessionStateError::NoQuestions);
        }
        if current_question_index >= responses.len() {
            return Err(SessionStateError::IndexOutOfRange {
                index: current_question_index,
                len: responses.len(),
            });
        }
        if time_left_secs > QUESTION_TIME_SECS {
            return Err(SessionStateError::TimeOutOfRange(time_left_secs));
        }
        Ok(Self {
            current_question_index,
            responses,
            time_left_secs,
            question_started_at,
            session_started_at,
        })
    }

    /// Check that a persisted state still fits the question list it is resumed against.
    ///
    /// # Errors
    ///
    /// Returns the first mismatch found (length, question order, option index or text).
    pub fn validate_against(&self, questions: &[Question]) -> Result<(), SessionStateError> {
        if self.responses.len() != questions.len() {
            return Err(SessionStateError::LengthMismatch {
                expected: questions.len(),
                found: self.responses.len(),
            });
        }
        for (position, (response, question)) in self.responses.iter().zip(questions).enumerate() {
            if response.question_id() != question.id() {
                return Err(SessionStateError::QuestionMismatch {
                    position,
                    expected: question.id().clone(),
                    found: response.question_id().clone(),
                });
            }
            let Some(selection) = response.selection() else {
                continue;
            };
            match question.option(selection.index) {
                None => {
                    return Err(SessionStateError::InvalidOption {
                        index: selection.index,
                        len: question.options().len(),
                    });
                }
                Some(text) if text != selection.text => {
                    return Err(SessionStateError::OptionTextMismatch {
                        position,
                        index: selection.index,
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    #[must_use]
    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    #[must_use]
    pub fn current_response(&self) -> &Response {
        &self.responses[self.current_question_index]
    }

    #[must_use]
    pub fn time_left_secs(&self) -> u32 {
        self.time_left_secs
    }

    #[must_use]
    pub fn question_started_at(&self) -> i64 {
        self.question_started_at
    }

    #[must_use]
    pub fn session_started_at(&self) -> i64 {
        self.session_started_at
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.responses.len()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.responses.iter().filter(|r| r.is_answered()).count()
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current_question_index + 1 >= self.responses.len()
    }

    /// Seconds spent on the current question so far.
    #[must_use]
    pub fn elapsed_secs(&self) -> u32 {
        QUESTION_TIME_SECS - self.time_left_secs
    }

    /// Whole-attempt duration at `now`, never negative.
    #[must_use]
    pub fn total_time_taken_secs(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from(now.timestamp() - self.session_started_at).unwrap_or(0)
    }

    /// Record `question.options[index]` as the answer to the current question.
    ///
    /// Last write wins until the question is advanced.
    ///
    /// # Errors
    ///
    /// Returns `QuestionMismatch` if `question` is not the current one, or
    /// `InvalidOption` if `index` is out of range.
    pub fn record_selection(
        &mut self,
        question: &Question,
        index: usize,
    ) -> Result<&Response, SessionStateError> {
        let position = self.current_question_index;
        let elapsed = self.elapsed_secs();
        let response = &mut self.responses[position];
        if response.question_id != *question.id() {
            return Err(SessionStateError::QuestionMismatch {
                position,
                expected: response.question_id.clone(),
                found: question.id().clone(),
            });
        }
        let text = question
            .option(index)
            .ok_or(SessionStateError::InvalidOption {
                index,
                len: question.options().len(),
            })?;
        response.selection = Some(Selection {
            index,
            text: text.to_owned(),
        });
        response.time_taken_secs = elapsed;
        Ok(&*response)
    }

    /// Count down one second. Returns the remaining time.
    pub fn tick(&mut self) -> u32 {
        self.time_left_secs = self.time_left_secs.saturating_sub(1);
        self.time_left_secs
    }

    /// Close the current question after its countdown ran out.
    ///
    /// An existing selection is kept; otherwise the question is recorded as unanswered
    /// with the full time budget.
    pub fn finalize_timeout(&mut self) {
        let response = &mut self.responses[self.current_question_index];
        if response.selection.is_none() {
            response.time_taken_secs = QUESTION_TIME_SECS;
        }
        self.time_left_secs = 0;
    }

    /// Close the current question on a user-initiated advance.
    pub fn finalize_manual(&mut self) {
        let elapsed = self.elapsed_secs();
        let response = &mut self.responses[self.current_question_index];
        if response.selection.is_none() {
            response.time_taken_secs = elapsed;
        }
    }

    /// Move to the next question with a fresh countdown.
    ///
    /// Returns the new index, or `None` if the current question is the last one.
    pub fn move_to_next(&mut self, now: DateTime<Utc>) -> Option<usize> {
        if self.is_last() {
            return None;
        }
        self.current_question_index += 1;
        self.time_left_secs = QUESTION_TIME_SECS;
        self.question_started_at = now.timestamp();
        Some(self.current_question_index)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn questions(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| {
                Question::new(
                    QuestionId::new(format!("q{i}")).unwrap(),
                    format!("Question {i}"),
                    vec!["a".into(), "b".into(), "c".into()],
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn fresh_state_preallocates_empty_responses() {
        let qs = questions(3);
        let state = SessionState::fresh(&qs, fixed_now()).unwrap();

        assert_eq!(state.current_question_index(), 0);
        assert_eq!(state.total_questions(), 3);
        assert_eq!(state.time_left_secs(), QUESTION_TIME_SECS);
        assert!(state.responses().iter().all(|r| !r.is_answered()));
        assert_eq!(state.responses()[2].question_id().as_str(), "q2");
    }

    #[test]
    fn fresh_state_requires_questions() {
        let err = SessionState::fresh(&[], fixed_now()).unwrap_err();
        assert_eq!(err, SessionStateError::NoQuestions);
    }

    #[test]
    fn selection_records_text_and_elapsed_time() {
        let qs = questions(2);
        let mut state = SessionState::fresh(&qs, fixed_now()).unwrap();
        state.tick();
        state.tick();
        state.tick();

        let response = state.record_selection(&qs[0], 2).unwrap();
        assert_eq!(response.selected_option_index(), Some(2));
        assert_eq!(response.selected_option_text(), Some("c"));
        assert_eq!(response.time_taken_secs(), 3);
    }

    #[test]
    fn later_selection_overwrites_earlier_one() {
        let qs = questions(2);
        let mut state = SessionState::fresh(&qs, fixed_now()).unwrap();
        state.record_selection(&qs[0], 0).unwrap();
        state.tick();
        state.record_selection(&qs[0], 1).unwrap();

        assert_eq!(state.current_response().selected_option_text(), Some("b"));
        assert_eq!(state.current_response().time_taken_secs(), 1);
    }

    #[test]
    fn selection_rejects_wrong_question_and_bad_index() {
        let qs = questions(2);
        let mut state = SessionState::fresh(&qs, fixed_now()).unwrap();

        let err = state.record_selection(&qs[1], 0).unwrap_err();
        assert!(matches!(err, SessionStateError::QuestionMismatch { .. }));

        let err = state.record_selection(&qs[0], 3).unwrap_err();
        assert_eq!(err, SessionStateError::InvalidOption { index: 3, len: 3 });
        assert!(!state.current_response().is_answered());
    }

    #[test]
    fn timeout_records_unanswered_with_full_time() {
        let qs = questions(2);
        let mut state = SessionState::fresh(&qs, fixed_now()).unwrap();
        for _ in 0..QUESTION_TIME_SECS {
            state.tick();
        }
        assert_eq!(state.tick(), 0);

        state.finalize_timeout();
        let response = state.current_response();
        assert_eq!(response.selected_option_index(), None);
        assert_eq!(response.selected_option_text(), None);
        assert_eq!(response.time_taken_secs(), QUESTION_TIME_SECS);
    }

    #[test]
    fn timeout_keeps_an_existing_selection() {
        let qs = questions(2);
        let mut state = SessionState::fresh(&qs, fixed_now()).unwrap();
        state.tick();
        state.record_selection(&qs[0], 1).unwrap();
        state.finalize_timeout();

        assert_eq!(state.current_response().selected_option_index(), Some(1));
        assert_eq!(state.current_response().time_taken_secs(), 1);
    }

    #[test]
    fn move_to_next_resets_countdown_and_stops_at_last() {
        let qs = questions(2);
        let mut state = SessionState::fresh(&qs, fixed_now()).unwrap();
        state.tick();
        let later = fixed_now() + chrono::Duration::seconds(5);

        assert_eq!(state.move_to_next(later), Some(1));
        assert_eq!(state.time_left_secs(), QUESTION_TIME_SECS);
        assert_eq!(state.question_started_at(), later.timestamp());
        assert!(state.is_last());
        assert_eq!(state.move_to_next(later), None);
        assert_eq!(state.total_questions(), 2);
    }

    #[test]
    fn from_persisted_rejects_out_of_range_values() {
        let qs = questions(2);
        let responses: Vec<_> = qs.iter().map(|q| Response::empty(q.id().clone())).collect();

        let err = SessionState::from_persisted(2, responses.clone(), 8, 0, 0).unwrap_err();
        assert!(matches!(err, SessionStateError::IndexOutOfRange { .. }));

        let err = SessionState::from_persisted(0, responses, 9, 0, 0).unwrap_err();
        assert_eq!(err, SessionStateError::TimeOutOfRange(9));
    }

    #[test]
    fn validate_against_detects_changed_questions() {
        let qs = questions(2);
        let state = SessionState::fresh(&qs, fixed_now()).unwrap();
        assert!(state.validate_against(&qs).is_ok());

        let err = state.validate_against(&questions(3)).unwrap_err();
        assert_eq!(
            err,
            SessionStateError::LengthMismatch {
                expected: 3,
                found: 2
            }
        );

        let responses = vec![
            Response::empty(qs[0].id().clone()),
            Response::from_persisted(
                qs[1].id().clone(),
                Some(Selection {
                    index: 0,
                    text: "z".into(),
                }),
                2,
            ),
        ];
        let state = SessionState::from_persisted(1, responses, 4, 0, 0).unwrap();
        let err = state.validate_against(&qs).unwrap_err();
        assert_eq!(
            err,
            SessionStateError::OptionTextMismatch {
                position: 1,
                index: 0
            }
        );
    }

    #[test]
    fn total_time_is_measured_from_session_start() {
        let qs = questions(1);
        let state = SessionState::fresh(&qs, fixed_now()).unwrap();
        let later = fixed_now() + chrono::Duration::seconds(21);
        assert_eq!(state.total_time_taken_secs(later), 21);
        assert_eq!(
            state.total_time_taken_secs(fixed_now() - chrono::Duration::seconds(1)),
            0
        );
    }
}
