//! Question-answering service client
//!
//! The knowledge base owns ranking and training; this module only sends
//! queries and feedback and hands back what the service returned.

mod error;
mod http;
mod types;

pub use error::{QnaError, QnaErrorKind};
pub use http::HttpQnaService;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for the ranking service
#[async_trait]
pub trait QnaService: Send + Sync {
    /// Rank candidate answers for a question, best first
    async fn query(
        &self,
        question: &str,
        context: Option<&QueryContext>,
    ) -> Result<Vec<CandidateAnswer>, QnaError>;

    /// Submit active-learning feedback
    async fn train(&self, records: &[FeedbackRecord]) -> Result<(), QnaError>;
}

#[async_trait]
impl<T: QnaService + ?Sized> QnaService for Arc<T> {
    async fn query(
        &self,
        question: &str,
        context: Option<&QueryContext>,
    ) -> Result<Vec<CandidateAnswer>, QnaError> {
        (**self).query(question, context).await
    }

    async fn train(&self, records: &[FeedbackRecord]) -> Result<(), QnaError> {
        (**self).train(records).await
    }
}

/// Logging wrapper for ranking services
pub struct LoggingQnaService<T> {
    inner: T,
}

impl<T: QnaService> LoggingQnaService<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: QnaService> QnaService for LoggingQnaService<T> {
    async fn query(
        &self,
        question: &str,
        context: Option<&QueryContext>,
    ) -> Result<Vec<CandidateAnswer>, QnaError> {
        let start = std::time::Instant::now();
        let result = self.inner.query(question, context).await;
        let duration = start.elapsed();

        match &result {
            Ok(answers) => {
                tracing::info!(
                    duration_ms = %duration.as_millis(),
                    answers = answers.len(),
                    top_score = answers.first().map_or(0.0, |a| a.score),
                    multi_turn = context.is_some(),
                    "QnA query completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = e.kind.as_str(),
                    "QnA query failed"
                );
            }
        }

        result
    }

    async fn train(&self, records: &[FeedbackRecord]) -> Result<(), QnaError> {
        let start = std::time::Instant::now();
        let result = self.inner.train(records).await;
        let duration = start.elapsed();

        match &result {
            Ok(()) => tracing::info!(
                duration_ms = %duration.as_millis(),
                records = records.len(),
                "QnA feedback submitted"
            ),
            Err(e) => tracing::error!(
                duration_ms = %duration.as_millis(),
                error = %e.message,
                kind = e.kind.as_str(),
                "QnA feedback failed"
            ),
        }

        result
    }
}
