//! Effects produced by turn transitions

use crate::activity::OutboundActivity;
use crate::cards::HeroCard;
use crate::format::format_for_channel;
use crate::qna::{FeedbackRecord, QueryContext};

/// Work for the runtime, executed in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Ask the ranking service; the answers come back as `AnswersReceived`
    QueryQna {
        question: String,
        context: Option<QueryContext>,
    },

    /// Send active-learning feedback
    SubmitFeedback { records: Vec<FeedbackRecord> },

    /// Queue an outbound activity for the end of the turn
    Reply { activity: OutboundActivity },
}

impl Effect {
    pub fn query(question: impl Into<String>, context: Option<QueryContext>) -> Self {
        Effect::QueryQna {
            question: question.into(),
            context,
        }
    }

    /// Text reply, formatted for the channel it goes to
    pub fn reply_text(text: &str, channel_id: &str) -> Self {
        Effect::Reply {
            activity: OutboundActivity::text(format_for_channel(text, channel_id)),
        }
    }

    pub fn reply_card(card: HeroCard) -> Self {
        Effect::Reply {
            activity: OutboundActivity::card(card),
        }
    }
}
