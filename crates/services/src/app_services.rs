use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::sessions::QuizLoopService;
use crate::sources::{QuizSource, SubmissionSink};

/// Assembles app-facing services from a storage backend and the two quiz endpoints.
#[derive(Clone)]
pub struct AppServices {
    quiz_loop: Arc<QuizLoopService>,
}

impl AppServices {
    #[must_use]
    pub fn new(
        storage: &Storage,
        clock: Clock,
        source: Arc<dyn QuizSource>,
        sink: Arc<dyn SubmissionSink>,
    ) -> Self {
        let quiz_loop = Arc::new(QuizLoopService::new(
            clock,
            source,
            sink,
            Arc::clone(&storage.resume),
            Arc::clone(&storage.attempts),
        ));
        Self { quiz_loop }
    }

    #[must_use]
    pub fn quiz_loop(&self) -> Arc<QuizLoopService> {
        Arc::clone(&self.quiz_loop)
    }
}
