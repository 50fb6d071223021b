//! Choice cards
//!
//! Every button is an im-back action: pressing it makes the channel send the
//! button value back as the next user message, which the dialog then matches
//! by exact text.

use crate::qna::Prompt;
use serde::{Deserialize, Serialize};

/// Card with an optional title/subtitle and a column of buttons
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroCard {
    pub title: String,
    pub subtitle: String,
    pub buttons: Vec<CardAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub title: String,
    pub value: String,
}

impl CardAction {
    pub fn im_back(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            action_type: ActionType::ImBack,
            title: text.clone(),
            value: text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    ImBack,
}

/// Card listing an answer's follow-up prompts, ordered by display order
pub fn prompt_card(answer_text: &str, prompts: &[Prompt]) -> HeroCard {
    HeroCard {
        title: String::new(),
        subtitle: answer_text.to_string(),
        buttons: sorted_prompts(prompts)
            .into_iter()
            .map(|p| CardAction::im_back(p.display_text))
            .collect(),
    }
}

/// Card listing suggested questions plus a trailing escape button
pub fn suggestion_card<S: AsRef<str>>(
    suggestions: &[S],
    title: &str,
    no_match_text: &str,
) -> HeroCard {
    let mut buttons: Vec<CardAction> = suggestions
        .iter()
        .map(|s| CardAction::im_back(s.as_ref()))
        .collect();
    buttons.push(CardAction::im_back(no_match_text));

    HeroCard {
        title: title.to_string(),
        subtitle: String::new(),
        buttons,
    }
}

/// Prompts in ascending display order; ties keep service order
pub fn sorted_prompts(prompts: &[Prompt]) -> Vec<Prompt> {
    let mut sorted = prompts.to_vec();
    sorted.sort_by_key(|p| p.display_order);
    sorted
}
