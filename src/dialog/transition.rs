//! Pure turn transition function
//!
//! Given the same inputs this always produces the same outputs; all I/O
//! happens in the runtime by executing the returned effects.

use super::{Effect, Event, TurnContext, TurnState};
use crate::cards::{prompt_card, sorted_prompts, suggestion_card};
use crate::config::DialogSettings;
use crate::qna::{CandidateAnswer, FeedbackRecord, Prompt, QueryContext};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A query is already in flight for this conversation")]
    TurnInProgress,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

pub fn transition(
    state: &TurnState,
    settings: &DialogSettings,
    ctx: &TurnContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Fresh query
        (TurnState::Empty, Event::UserText { text }) => Ok(start_query(text, None, Vec::new())),

        // Continue a multi-turn exchange, biased by the previous answer
        (
            TurnState::AwaitingMultiTurnSelection {
                previous_qna_id,
                previous_query,
                prompts,
            },
            Event::UserText { text },
        ) => {
            let context = QueryContext::new(*previous_qna_id, previous_query.clone());
            Ok(start_query(text, Some(context), prompts.clone()))
        }

        (
            TurnState::AwaitingFeedbackSelection {
                previous_query,
                candidates,
            },
            Event::UserText { text },
        ) => Ok(feedback_reply(previous_query, candidates, settings, ctx, text)),

        (TurnState::Querying { .. }, Event::UserText { .. }) => {
            Err(TransitionError::TurnInProgress)
        }

        (
            TurnState::Querying {
                query,
                follow_up_prompts,
                ..
            },
            Event::AnswersReceived { answers },
        ) => Ok(rank_answers(query, follow_up_prompts, &answers, settings, ctx)),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {} with event {event:?}",
            state.name()
        ))),
    }
}

fn start_query(
    text: String,
    context: Option<QueryContext>,
    follow_up_prompts: Vec<Prompt>,
) -> TransitionResult {
    let effect = Effect::query(text.clone(), context.clone());
    TransitionResult::new(TurnState::Querying {
        query: text,
        context,
        follow_up_prompts,
    })
    .with_effect(effect)
}

/// Reply while suggestions are on screen
fn feedback_reply(
    previous_query: &str,
    candidates: &[CandidateAnswer],
    settings: &DialogSettings,
    ctx: &TurnContext,
    text: String,
) -> TransitionResult {
    if let Some(selected) = candidates
        .iter()
        .find(|c| c.primary_question() == Some(text.as_str()))
    {
        let record = FeedbackRecord {
            user_id: ctx.user_id.clone(),
            user_question: previous_query.to_string(),
            qna_id: selected.id,
        };
        let context = QueryContext::new(selected.id, text.clone());

        return TransitionResult::new(TurnState::Querying {
            query: text.clone(),
            context: Some(context.clone()),
            follow_up_prompts: Vec::new(),
        })
        .with_effect(Effect::SubmitFeedback {
            records: vec![record],
        })
        .with_effect(Effect::reply_text(
            &settings.learning_card_no_match_response,
            &ctx.channel_id,
        ))
        .with_effect(Effect::query(text, Some(context)));
    }

    if text == settings.learning_card_no_match_text {
        return TransitionResult::new(TurnState::Empty)
            .with_effect(Effect::reply_text(&settings.no_match_message, &ctx.channel_id));
    }

    // Unrecognized free text: drop the suggestions and treat it as a new question
    start_query(text, None, Vec::new())
}

/// Bucket answers by confidence and pick the reply shape
fn rank_answers(
    query: &str,
    follow_up_prompts: &[Prompt],
    answers: &[CandidateAnswer],
    settings: &DialogSettings,
    ctx: &TurnContext,
) -> TransitionResult {
    let mut high = above_threshold(answers, settings.high_confidence_threshold);
    let low = above_threshold(answers, settings.low_confidence_threshold);

    // A pressed follow-up button was already resolved by the service's
    // multi-turn context, so its top answer wins regardless of score.
    if selected_follow_up(query, follow_up_prompts) {
        if let Some(first) = answers.first() {
            high = vec![first];
        }
    }

    if let Some(top) = high.first() {
        let prompts = top.prompts();
        if prompts.is_empty() {
            return TransitionResult::new(TurnState::Empty)
                .with_effect(Effect::reply_text(&top.answer, &ctx.channel_id));
        }

        let prompts = sorted_prompts(prompts);
        let card = prompt_card(&top.answer, &prompts);
        return TransitionResult::new(TurnState::AwaitingMultiTurnSelection {
            previous_qna_id: top.id,
            previous_query: query.to_string(),
            prompts,
        })
        .with_effect(Effect::reply_card(card));
    }

    // Suggestions are matched by their first question, so answers without
    // one cannot be offered.
    let suggestions: Vec<CandidateAnswer> = low
        .into_iter()
        .filter(|a| a.primary_question().is_some())
        .cloned()
        .collect();

    if suggestions.is_empty() {
        return TransitionResult::new(TurnState::Empty)
            .with_effect(Effect::reply_text(&settings.no_match_message, &ctx.channel_id));
    }

    let questions: Vec<&str> = suggestions
        .iter()
        .filter_map(CandidateAnswer::primary_question)
        .collect();
    let card = suggestion_card(
        &questions,
        &settings.learning_card_title,
        &settings.learning_card_no_match_text,
    );

    TransitionResult::new(TurnState::AwaitingFeedbackSelection {
        previous_query: query.to_string(),
        candidates: suggestions,
    })
    .with_effect(Effect::reply_card(card))
}

/// Answers scoring above `threshold` (0-1) on the service's 0-100 scale
pub(crate) fn above_threshold(answers: &[CandidateAnswer], threshold: f64) -> Vec<&CandidateAnswer> {
    let cutoff = threshold * 100.0;
    answers.iter().filter(|a| a.score > cutoff).collect()
}

fn selected_follow_up(query: &str, prompts: &[Prompt]) -> bool {
    let query = query.to_lowercase();
    prompts
        .iter()
        .any(|p| p.display_text.to_lowercase() == query)
}
