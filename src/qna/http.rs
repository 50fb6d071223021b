//! HTTP implementation of the ranking service client

use super::types::{
    CandidateAnswer, FeedbackRecord, Metadata, QnaEndpoint, QueryContext, QueryOptions,
};
use super::{QnaError, QnaService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Knowledge base client over HTTPS
pub struct HttpQnaService {
    client: Client,
    endpoint: QnaEndpoint,
    options: QueryOptions,
}

impl HttpQnaService {
    pub fn new(endpoint: QnaEndpoint, options: QueryOptions) -> Result<Self, QnaError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| QnaError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            options,
        })
    }

    fn generate_answer_url(&self) -> String {
        format!(
            "{}/knowledgebases/{}/generateanswer",
            self.endpoint.host.trim_end_matches('/'),
            self.endpoint.knowledge_base_id
        )
    }

    fn train_url(&self) -> String {
        format!(
            "{}/knowledgebases/{}/train",
            self.endpoint.host.trim_end_matches('/'),
            self.endpoint.knowledge_base_id
        )
    }

    fn authorization(&self) -> String {
        format!("EndpointKey {}", self.endpoint.endpoint_key)
    }

    fn build_query<'a>(
        &'a self,
        question: &'a str,
        context: Option<&'a QueryContext>,
    ) -> GenerateAnswerRequest<'a> {
        GenerateAnswerRequest {
            question,
            top: self.options.top,
            context,
            strict_filters: &self.options.strict_filters,
            metadata_boost: self.options.metadata_boost,
            score_threshold: self.options.score_threshold,
        }
    }

    async fn post<B: Serialize + Sync>(&self, url: &str, body: &B) -> Result<String, QnaError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", self.authorization())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QnaError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    QnaError::network(format!("Connection failed: {e}"))
                } else {
                    QnaError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QnaError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        Ok(body)
    }
}

#[async_trait]
impl QnaService for HttpQnaService {
    async fn query(
        &self,
        question: &str,
        context: Option<&QueryContext>,
    ) -> Result<Vec<CandidateAnswer>, QnaError> {
        let request = self.build_query(question, context);
        let body = self.post(&self.generate_answer_url(), &request).await?;

        let parsed: GenerateAnswerResponse = serde_json::from_str(&body).map_err(|e| {
            QnaError::decode(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Ok(parsed.answers)
    }

    async fn train(&self, records: &[FeedbackRecord]) -> Result<(), QnaError> {
        let request = TrainRequest {
            feedback_records: records,
        };
        self.post(&self.train_url(), &request).await?;
        Ok(())
    }
}

fn classify_error(status: reqwest::StatusCode, body: &str) -> QnaError {
    match status.as_u16() {
        401 | 403 => QnaError::auth(format!("Authentication failed: {body}")),
        429 => QnaError::rate_limit(format!("Rate limited: {body}")),
        400 | 404 => QnaError::invalid_request(format!("Invalid request: {body}")),
        500..=599 => QnaError::server_error(format!("Server error: {body}")),
        _ => QnaError::unknown(format!("HTTP {status}: {body}")),
    }
}

// Wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAnswerRequest<'a> {
    question: &'a str,
    top: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a QueryContext>,
    strict_filters: &'a [Metadata],
    metadata_boost: bool,
    score_threshold: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateAnswerResponse {
    #[serde(default)]
    answers: Vec<CandidateAnswer>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TrainRequest<'a> {
    feedback_records: &'a [FeedbackRecord],
}
