use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quiz_core::model::{Quiz, QuizDocument, QuizId, SubmissionPayload, SubmissionReceipt};

use super::{QuizSource, SubmissionSink};
use crate::error::{SourceError, SubmitError};

/// Reads a quiz document from a JSON file, for offline play.
#[derive(Debug, Clone)]
pub struct FileQuizSource {
    path: PathBuf,
}

impl FileQuizSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl QuizSource for FileQuizSource {
    async fn fetch_quiz(&self, id: &QuizId) -> Result<Quiz, SourceError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NotAvailable);
            }
            Err(err) => return Err(err.into()),
        };
        let doc: QuizDocument = serde_json::from_str(&raw)?;
        let quiz = Quiz::from_document(doc)?;
        if quiz.id() != id {
            log::warn!(
                "quiz file {} holds {}, not {id}",
                self.path.display(),
                quiz.id()
            );
            return Err(SourceError::NotAvailable);
        }
        Ok(quiz)
    }
}

/// Accepts every submission without contacting a server.
///
/// Keeps what it received so offline runs and tests can inspect it.
#[derive(Debug, Clone, Default)]
pub struct LocalSubmissionSink {
    received: Arc<Mutex<Vec<(QuizId, SubmissionPayload)>>>,
}

impl LocalSubmissionSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn received(&self) -> Vec<(QuizId, SubmissionPayload)> {
        self.received
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SubmissionSink for LocalSubmissionSink {
    async fn submit(
        &self,
        quiz_id: &QuizId,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, SubmitError> {
        log::info!(
            "recorded {} of {} answers for {quiz_id} locally",
            payload.answered_count(),
            payload.questions.len()
        );
        if let Ok(mut guard) = self.received.lock() {
            guard.push((quiz_id.clone(), payload.clone()));
        }
        Ok(SubmissionReceipt::accepted("recorded locally"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("quiz-source-{}-{name}.json", std::process::id()))
    }

    #[tokio::test]
    async fn reads_quiz_from_file() {
        let path = temp_path("ok");
        tokio::fs::write(
            &path,
            r#"{"id": "level-1", "title": "Warm up", "questions": [
                {"id": "q1", "prompt": "Pick", "options": ["a", "b"]}
            ]}"#,
        )
        .await
        .unwrap();

        let quiz = FileQuizSource::new(&path)
            .fetch_quiz(&QuizId::new("level-1").unwrap())
            .await
            .unwrap();
        assert_eq!(quiz.title(), "Warm up");

        let err = FileQuizSource::new(&path)
            .fetch_quiz(&QuizId::new("level-2").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotAvailable));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_not_available() {
        let err = FileQuizSource::new(temp_path("missing"))
            .fetch_quiz(&QuizId::new("level-1").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotAvailable));
    }

    #[tokio::test]
    async fn invalid_quiz_is_rejected() {
        let path = temp_path("invalid");
        tokio::fs::write(
            &path,
            r#"{"id": "level-1", "title": "Warm up", "questions": [
                {"id": "q1", "prompt": "Pick", "options": ["only one"]}
            ]}"#,
        )
        .await
        .unwrap();

        let err = FileQuizSource::new(&path)
            .fetch_quiz(&QuizId::new("level-1").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Invalid(_)));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn local_sink_accepts_and_records() {
        let sink = LocalSubmissionSink::new();
        let payload = SubmissionPayload {
            title: "Warm up".into(),
            questions: Vec::new(),
        };
        let receipt = sink
            .submit(&QuizId::new("level-1").unwrap(), &payload)
            .await
            .unwrap();

        assert!(receipt.status);
        assert_eq!(sink.received().len(), 1);
    }
}
