use async_trait::async_trait;
use quiz_core::model::{AttemptSummary, QuestionId, QuizId, Response, Selection, SessionState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Well-known key of the single in-progress quiz on this device.
pub const RESUME_KEY: &str = "quiz_session_progress";

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RESUME RECORDS ────────────────────────────────────────────────────────────
//

/// Persisted shape of a single response.
///
/// Text and index are stored as independent nullable fields, so a corrupted record can
/// carry one without the other; `into_response` rejects that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub question_id: String,
    pub selected_option_text: Option<String>,
    pub selected_option_index: Option<usize>,
    pub time_taken_secs: u32,
}

impl ResponseRecord {
    #[must_use]
    pub fn from_response(response: &Response) -> Self {
        Self {
            question_id: response.question_id().to_string(),
            selected_option_text: response.selected_option_text().map(str::to_owned),
            selected_option_index: response.selected_option_index(),
            time_taken_secs: response.time_taken_secs(),
        }
    }

    /// Convert the record back into a domain `Response`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the id is blank or only one of
    /// text/index is present.
    pub fn into_response(self) -> Result<Response, StorageError> {
        let question_id = QuestionId::new(self.question_id)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let selection = match (self.selected_option_text, self.selected_option_index) {
            (Some(text), Some(index)) => Some(Selection { index, text }),
            (None, None) => None,
            _ => {
                return Err(StorageError::Serialization(format!(
                    "response for {question_id} has only one of option text/index"
                )));
            }
        };
        Ok(Response::from_persisted(
            question_id,
            selection,
            self.time_taken_secs,
        ))
    }
}

/// Persisted shape of a `SessionState`, stored as JSON under `RESUME_KEY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStateRecord {
    pub current_question_index: usize,
    pub responses: Vec<ResponseRecord>,
    pub time_left_secs: u32,
    pub question_started_at: i64,
    pub session_started_at: i64,
}

impl SessionStateRecord {
    #[must_use]
    pub fn from_state(state: &SessionState) -> Self {
        Self {
            current_question_index: state.current_question_index(),
            responses: state
                .responses()
                .iter()
                .map(ResponseRecord::from_response)
                .collect(),
            time_left_secs: state.time_left_secs(),
            question_started_at: state.question_started_at(),
            session_started_at: state.session_started_at(),
        }
    }

    /// Convert the record back into a domain `SessionState`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if any response or range check fails.
    pub fn into_state(self) -> Result<SessionState, StorageError> {
        let responses = self
            .responses
            .into_iter()
            .map(ResponseRecord::into_response)
            .collect::<Result<Vec<_>, _>>()?;
        SessionState::from_persisted(
            self.current_question_index,
            responses,
            self.time_left_secs,
            self.question_started_at,
            self.session_started_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// Outcome of reading the resume slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeLoad {
    Found(SessionState),
    Absent,
    /// Something was stored but it is not a usable state.
    Malformed(String),
}

/// Encode a state for the resume slot.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if JSON encoding fails.
pub fn encode_state(state: &SessionState) -> Result<String, StorageError> {
    serde_json::to_string(&SessionStateRecord::from_state(state))
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Decode the raw contents of the resume slot. Never fails: bad data is `Malformed`.
#[must_use]
pub fn decode_state(raw: &str) -> ResumeLoad {
    let record: SessionStateRecord = match serde_json::from_str(raw) {
        Ok(record) => record,
        Err(err) => return ResumeLoad::Malformed(err.to_string()),
    };
    match record.into_state() {
        Ok(state) => ResumeLoad::Found(state),
        Err(err) => ResumeLoad::Malformed(err.to_string()),
    }
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Key-value slot holding the in-progress session, read at start and written on every
/// state change.
#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// Read the saved state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` only if the backend itself fails; unreadable contents are
    /// reported as `ResumeLoad::Malformed`.
    async fn load(&self) -> Result<ResumeLoad, StorageError>;

    /// Replace the saved state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the state cannot be stored.
    async fn save(&self, state: &SessionState) -> Result<(), StorageError>;

    /// Remove the saved state. Clearing an empty slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend fails.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// Attempt summary paired with its storage identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRow {
    pub id: i64,
    pub attempt: AttemptSummary,
}

impl AttemptRow {
    #[must_use]
    pub fn new(id: i64, attempt: AttemptSummary) -> Self {
        Self { id, attempt }
    }
}

/// History of submitted attempts.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Append an attempt and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn append_attempt(&self, attempt: &AttemptSummary) -> Result<i64, StorageError>;

    /// Fetch an attempt by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_attempt(&self, id: i64) -> Result<AttemptSummary, StorageError>;

    /// List attempts newest first, optionally for one quiz only.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_attempts(
        &self,
        quiz_id: Option<&QuizId>,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
///
/// The resume slot keeps raw JSON so decode behaviour matches the durable backends.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    slots: Arc<Mutex<HashMap<String, String>>>,
    attempts: Arc<Mutex<Vec<AttemptRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw contents of the resume slot, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn raw_resume(&self) -> Result<Option<String>, StorageError> {
        let guard = self
            .slots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(RESUME_KEY).cloned())
    }

    /// Overwrite the resume slot with arbitrary contents.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn put_raw_resume(&self, raw: impl Into<String>) -> Result<(), StorageError> {
        let mut guard = self
            .slots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(RESUME_KEY.to_owned(), raw.into());
        Ok(())
    }
}

#[async_trait]
impl ResumeStore for InMemoryRepository {
    async fn load(&self) -> Result<ResumeLoad, StorageError> {
        Ok(match self.raw_resume()? {
            Some(raw) => decode_state(&raw),
            None => ResumeLoad::Absent,
        })
    }

    async fn save(&self, state: &SessionState) -> Result<(), StorageError> {
        self.put_raw_resume(encode_state(state)?)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self
            .slots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(RESUME_KEY);
        Ok(())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn append_attempt(&self, attempt: &AttemptSummary) -> Result<i64, StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = i64::try_from(guard.len() + 1)
            .map_err(|_| StorageError::Serialization("attempt id overflow".into()))?;
        guard.push(AttemptRow::new(id, attempt.clone()));
        Ok(id)
    }

    async fn get_attempt(&self, id: i64) -> Result<AttemptSummary, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.attempt.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn list_attempts(
        &self,
        quiz_id: Option<&QuizId>,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows: Vec<_> = guard
            .iter()
            .filter(|row| quiz_id.is_none_or(|id| row.attempt.quiz_id() == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.attempt
                .completed_at()
                .cmp(&a.attempt.completed_at())
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub resume: Arc<dyn ResumeStore>,
    pub attempts: Arc<dyn AttemptRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let resume: Arc<dyn ResumeStore> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo);
        Self { resume, attempts }
    }
}
