//! Turn state types

use crate::qna::{CandidateAnswer, Prompt, QueryContext};
use serde::{Deserialize, Serialize};

/// What the conversation is waiting for between turns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnState {
    /// No pending interaction
    #[default]
    Empty,

    /// A confident answer offered follow-up prompts
    AwaitingMultiTurnSelection {
        previous_qna_id: i64,
        previous_query: String,
        /// Ascending display order
        #[serde(default)]
        prompts: Vec<Prompt>,
    },

    /// Nothing was confident enough; the user is choosing among suggestions
    AwaitingFeedbackSelection {
        previous_query: String,
        /// Service order, each with at least one question variant
        candidates: Vec<CandidateAnswer>,
    },

    /// Query in flight. Exists only inside a turn and is never stored.
    Querying {
        query: String,
        #[serde(default)]
        context: Option<QueryContext>,
        /// Prompts of the previous answer, for follow-up detection
        #[serde(default)]
        follow_up_prompts: Vec<Prompt>,
    },
}

impl TurnState {
    /// Whether this state may end a turn and be stored
    pub fn is_settled(&self) -> bool {
        !matches!(self, TurnState::Querying { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            TurnState::Empty => "empty",
            TurnState::AwaitingMultiTurnSelection { .. } => "awaiting_multi_turn_selection",
            TurnState::AwaitingFeedbackSelection { .. } => "awaiting_feedback_selection",
            TurnState::Querying { .. } => "querying",
        }
    }
}

/// Per-turn identity, immutable for the duration of a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnContext {
    pub conversation_id: String,
    pub user_id: String,
    pub channel_id: String,
}

impl TurnContext {
    pub fn new(
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            channel_id: channel_id.into(),
        }
    }
}
