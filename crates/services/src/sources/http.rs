use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use url::Url;

use quiz_core::model::{Quiz, QuizDocument, QuizId, SubmissionPayload, SubmissionReceipt};

use super::{QuizSource, SubmissionSink};
use crate::error::{AppServicesError, SourceError, SubmitError};

/// Upper bound for one request, connect and body included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Location and credentials of the quiz API.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    base_url: Url,
    token: Option<String>,
    timeout: Duration,
}

impl ApiConfig {
    /// # Errors
    ///
    /// Returns `AppServicesError::ApiUrl` if the url cannot carry path segments
    /// (e.g. `mailto:`).
    pub fn new(base_url: Url) -> Result<Self, AppServicesError> {
        if base_url.cannot_be_a_base() {
            return Err(AppServicesError::ApiUrl(base_url.to_string()));
        }
        Ok(Self {
            base_url,
            token: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// A stalled request fails with a timeout instead of holding the session.
    fn client(&self) -> Client {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .unwrap_or_else(|_| Client::new())
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Fetches quizzes from `GET {base}/quizzes/{id}`.
#[derive(Clone)]
pub struct HttpQuizSource {
    client: Client,
    config: ApiConfig,
}

impl HttpQuizSource {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: config.client(),
            config,
        }
    }
}

#[async_trait]
impl QuizSource for HttpQuizSource {
    async fn fetch_quiz(&self, id: &QuizId) -> Result<Quiz, SourceError> {
        let url = self.config.endpoint(&["quizzes", id.as_str()]);
        log::debug!("fetching quiz from {url}");
        let response = self
            .config
            .authorize(self.client.get(url))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => return Err(SourceError::NotAvailable),
            status if !status.is_success() => return Err(SourceError::HttpStatus(status)),
            _ => {}
        }

        let doc: QuizDocument = response.json().await?;
        Ok(Quiz::from_document(doc)?)
    }
}

/// Submits attempts to `POST {base}/quizzes/{id}/submit`.
#[derive(Clone)]
pub struct HttpSubmissionSink {
    client: Client,
    config: ApiConfig,
}

impl HttpSubmissionSink {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: config.client(),
            config,
        }
    }
}

#[async_trait]
impl SubmissionSink for HttpSubmissionSink {
    async fn submit(
        &self,
        quiz_id: &QuizId,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, SubmitError> {
        let url = self.config.endpoint(&["quizzes", quiz_id.as_str(), "submit"]);
        log::debug!("submitting {} answers to {url}", payload.questions.len());
        let response = self
            .config
            .authorize(self.client.post(url))
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SubmitError::HttpStatus(response.status()));
        }

        Ok(response.json().await?)
    }
}
