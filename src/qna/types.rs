//! Ranking service data types

use serde::{Deserialize, Serialize};

/// One ranked result returned by the knowledge base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateAnswer {
    pub id: i64,
    /// Question variants, the first being the canonical phrasing
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub answer: String,
    /// 0-100
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<AnswerContext>,
}

impl CandidateAnswer {
    /// The first question variant, shown on suggestion buttons
    pub fn primary_question(&self) -> Option<&str> {
        self.questions.first().map(String::as_str)
    }

    /// Follow-up prompts attached to this answer, in service order
    pub fn prompts(&self) -> &[Prompt] {
        self.context.as_ref().map_or(&[], |c| c.prompts.as_slice())
    }
}

/// Multi-turn data attached to an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnswerContext {
    #[serde(default)]
    pub is_context_only: bool,
    #[serde(default)]
    pub prompts: Vec<Prompt>,
}

/// A follow-up choice attached to an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub display_order: i32,
    pub qna_id: i64,
    pub display_text: String,
}

impl Prompt {
    pub fn new(display_order: i32, qna_id: i64, display_text: impl Into<String>) -> Self {
        Self {
            display_order,
            qna_id,
            display_text: display_text.into(),
        }
    }
}

/// Name/value pair used for answer metadata and strict filters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub value: String,
}

impl Metadata {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Previous-turn context sent to bias multi-turn continuation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContext {
    #[serde(rename = "previousQnAId")]
    pub previous_qna_id: i64,
    #[serde(rename = "previousUserQuery")]
    pub previous_user_query: String,
}

impl QueryContext {
    pub fn new(previous_qna_id: i64, previous_user_query: impl Into<String>) -> Self {
        Self {
            previous_qna_id,
            previous_user_query: previous_user_query.into(),
        }
    }
}

/// Active-learning signal: this user meant this answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub user_id: String,
    pub user_question: String,
    pub qna_id: i64,
}

/// Where the knowledge base lives
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QnaEndpoint {
    /// Base URL including the `/qnamaker` segment
    pub host: String,
    pub knowledge_base_id: String,
    pub endpoint_key: String,
}

/// Static per-request options
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    /// Requested result count; also caps the suggestion list
    pub top: u32,
    /// 0-1 scale
    pub score_threshold: f64,
    pub strict_filters: Vec<Metadata>,
    pub metadata_boost: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top: crate::config::DEFAULT_TOP_RESULTS,
            score_threshold: crate::config::DEFAULT_SCORE_THRESHOLD,
            strict_filters: Vec::new(),
            metadata_boost: false,
        }
    }
}
