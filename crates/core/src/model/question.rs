use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::error::Error;
use crate::model::ids::{QuestionId, QuizId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question {id} has an empty prompt")]
    EmptyPrompt { id: QuestionId },

    #[error("question {id} needs at least two options, found {found}")]
    TooFewOptions { id: QuestionId, found: usize },

    #[error("question {id} has a blank option at position {position}")]
    BlankOption { id: QuestionId, position: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz title must not be blank")]
    EmptyTitle,

    #[error("quiz level must be at least 1")]
    InvalidLevel,

    #[error("question id {0} appears more than once")]
    DuplicateQuestion(QuestionId),
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

/// A multiple-choice question.
///
/// Option order is significant: responses record both the index and the verbatim text,
/// and the grading service matches on the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: Vec<String>,
}

impl Question {
    /// Build a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank, fewer than two options are given,
    /// or any option is blank.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        options: Vec<String>,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt { id });
        }
        if options.len() < 2 {
            return Err(QuestionError::TooFewOptions {
                id,
                found: options.len(),
            });
        }
        if let Some(position) = options.iter().position(|o| o.trim().is_empty()) {
            return Err(QuestionError::BlankOption { id, position });
        }
        Ok(Self {
            id,
            prompt,
            options,
        })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option(&self, index: usize) -> Option<&str> {
        self.options.get(index).map(String::as_str)
    }
}

//
// ─── QUIZ ─────────────────────────────────────────────────────────────────────
//

/// Quiz metadata plus its ordered question list.
///
/// An empty question list is allowed: it is the "not yet available" state the session
/// waits in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quiz {
    id: QuizId,
    title: String,
    level: u32,
    questions: Vec<Question>,
}

impl Quiz {
    /// Build a validated quiz.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` for a blank title, level 0, or duplicated question ids.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        level: u32,
        questions: Vec<Question>,
    ) -> Result<Self, QuizError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        if level == 0 {
            return Err(QuizError::InvalidLevel);
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id()) {
                return Err(QuizError::DuplicateQuestion(question.id().clone()));
            }
        }
        Ok(Self {
            id,
            title,
            level,
            questions,
        })
    }

    /// Placeholder for a quiz whose questions have not been delivered yet.
    #[must_use]
    pub fn pending(id: QuizId) -> Self {
        Self {
            title: id.to_string(),
            id,
            level: 1,
            questions: Vec::new(),
        }
    }

    /// Build a quiz from its wire/file representation.
    ///
    /// # Errors
    ///
    /// Returns the first id, question, or quiz validation failure.
    pub fn from_document(doc: QuizDocument) -> Result<Self, Error> {
        let id = QuizId::new(doc.id)?;
        let questions = doc
            .questions
            .into_iter()
            .map(|q| -> Result<Question, Error> {
                let id = QuestionId::new(q.id)?;
                Ok(Question::new(id, q.prompt, q.options)?)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(id, doc.title, doc.level, questions)?)
    }

    #[must_use]
    pub fn id(&self) -> &QuizId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.questions.is_empty()
    }
}

//
// ─── DOCUMENT SHAPE ───────────────────────────────────────────────────────────
//

/// Unvalidated quiz as delivered by the quiz service or read from a file.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizDocument {
    pub id: String,
    pub title: String,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub questions: Vec<QuestionDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionDocument {
    pub id: String,
    #[serde(alias = "question")]
    pub prompt: String,
    pub options: Vec<String>,
}

fn default_level() -> u32 {
    1
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
