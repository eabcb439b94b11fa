use crate::model::ids::QuestionId;

/// The option a user picked, by position and verbatim text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub text: String,
}

/// The user's answer slot for one question.
///
/// A response without a selection is unanswered: either the user advanced without
/// choosing, or the countdown ran out. Index and text are set together or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub(crate) question_id: QuestionId,
    pub(crate) selection: Option<Selection>,
    pub(crate) time_taken_secs: u32,
}

impl Response {
    /// An empty response, as pre-allocated when a session starts.
    #[must_use]
    pub fn empty(question_id: QuestionId) -> Self {
        Self {
            question_id,
            selection: None,
            time_taken_secs: 0,
        }
    }

    /// Rehydrate a response from persisted storage.
    #[must_use]
    pub fn from_persisted(
        question_id: QuestionId,
        selection: Option<Selection>,
        time_taken_secs: u32,
    ) -> Self {
        Self {
            question_id,
            selection,
            time_taken_secs,
        }
    }

    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    #[must_use]
    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    #[must_use]
    pub fn selected_option_index(&self) -> Option<usize> {
        self.selection.as_ref().map(|s| s.index)
    }

    #[must_use]
    pub fn selected_option_text(&self) -> Option<&str> {
        self.selection.as_ref().map(|s| s.text.as_str())
    }

    #[must_use]
    pub fn time_taken_secs(&self) -> u32 {
        self.time_taken_secs
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.selection.is_some()
    }
}
