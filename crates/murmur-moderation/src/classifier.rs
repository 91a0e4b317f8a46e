//! Remote text classifier client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors surfaced by a [`Classifier`].
///
/// The pipeline treats every variant the same way (fail open), but the
/// distinction matters for logs: a transport failure and a garbled body
/// point at different problems.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// The request never completed, or the service answered with an
    /// error status.
    #[error("classifier request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered 2xx but the body was not the expected shape.
    #[error("classifier response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
}

/// One label/score pair from the scoring service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierScore {
    /// Category name, e.g. `"Offensive"`.
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub score: f64,
}

/// Scores a line of text against the service's label set.
///
/// The trait seam exists so the pipeline can be exercised without a live
/// service; production uses [`HttpClassifier`].
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Score `text`, returning all labels the service reports.
    async fn classify(&self, text: &str) -> Result<Vec<ClassifierScore>, ClassifierError>;
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

/// HTTP classifier speaking `POST {base}/api/v1/classify`.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    base_url: String,
    client: reqwest::Client,
}

impl HttpClassifier {
    /// Build a classifier for the service rooted at `base_url`
    /// (no trailing slash).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Like [`HttpClassifier::new`], reusing an existing client and its
    /// connection pool.
    #[must_use]
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, text: &str) -> Result<Vec<ClassifierScore>, ClassifierError> {
        let url = format!("{}/api/v1/classify", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ClassifyRequest { text })
            .send()
            .await?
            .error_for_status()?;
        response
            .json::<Vec<ClassifierScore>>()
            .await
            .map_err(ClassifierError::Decode)
    }
}
