//! Activity schema at the chat transport boundary

use crate::cards::HeroCard;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name carrying a freshly issued user token
pub const TOKEN_RESPONSE_EVENT: &str = "tokens/response";

/// Inbound activity as delivered by the channel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub from: ChannelAccount,
    #[serde(default)]
    pub recipient: ChannelAccount,
    #[serde(default)]
    pub conversation: ConversationAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<ChannelAccount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationAccount {
    #[serde(default)]
    pub id: String,
}

/// Routing category of an inbound activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Message,
    ConversationUpdate,
    TokenResponse,
    Invoke,
    Other,
}

impl Activity {
    pub fn kind(&self) -> ActivityKind {
        match self.activity_type.as_str() {
            "message" => ActivityKind::Message,
            "conversationUpdate" => ActivityKind::ConversationUpdate,
            "event" if self.name.as_deref() == Some(TOKEN_RESPONSE_EVENT) => {
                ActivityKind::TokenResponse
            }
            "invoke" => ActivityKind::Invoke,
            _ => ActivityKind::Other,
        }
    }

    /// Message text, empty when absent
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    #[cfg(test)]
    pub fn message(
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            activity_type: "message".to_string(),
            id: Some(uuid::Uuid::new_v4().to_string()),
            channel_id: channel_id.into(),
            from: ChannelAccount::new(user_id),
            recipient: ChannelAccount::new("bot"),
            conversation: ConversationAccount {
                id: conversation_id.into(),
            },
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Token payload of a `tokens/response` event
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(default)]
    pub connection_name: String,
    pub token: String,
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
}

/// Outbound activity sent back through the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundActivity {
    /// Plain text, already formatted for the channel
    Message { text: String },
    /// Choice card with im-back buttons
    HeroCard { card: HeroCard },
    /// Sign-in prompt
    OauthCard {
        connection_name: String,
        text: String,
        button_title: String,
        expires_at: DateTime<Utc>,
    },
}

impl OutboundActivity {
    pub fn text(text: impl Into<String>) -> Self {
        OutboundActivity::Message { text: text.into() }
    }

    pub fn card(card: HeroCard) -> Self {
        OutboundActivity::HeroCard { card }
    }
}
