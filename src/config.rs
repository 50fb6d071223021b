//! Environment-driven configuration
//!
//! Every value has a hard-coded default. Numbers that fail to parse fall
//! back to that default without complaint, so a typo in a threshold never
//! keeps the bot from starting.

use crate::qna::{Metadata, QnaEndpoint, QueryOptions};
use std::str::FromStr;

pub const DEFAULT_HIGH_CONFIDENCE_THRESHOLD: f64 = 0.8;
pub const DEFAULT_LOW_CONFIDENCE_THRESHOLD: f64 = 0.4;
pub const DEFAULT_TOP_RESULTS: u32 = 3;
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.7;
pub const DEFAULT_PORT: u16 = 3978;

const DEFAULT_WELCOME_MESSAGE: &str = "Hi! Ask me a question and I will find the best answer I can.";
const DEFAULT_NO_MATCH_MESSAGE: &str = "No match found.";
const DEFAULT_LEARNING_CARD_TITLE: &str = "Did you mean:";
const DEFAULT_LEARNING_CARD_NO_MATCH_TEXT: &str = "None of the above.";
const DEFAULT_LEARNING_CARD_NO_MATCH_RESPONSE: &str = "Thanks for the feedback.";
const DEFAULT_LOGIN_TEXT: &str = "Please sign in to continue.";
const DEFAULT_LOGIN_BUTTON_TEXT: &str = "Sign in";
const DEFAULT_LOGGED_IN_MESSAGE: &str = "You are now signed in.";
const DEFAULT_LOGGED_OUT_MESSAGE: &str = "You have been signed out.";

/// Settings the turn state machine reads on every transition
#[derive(Debug, Clone, PartialEq)]
pub struct DialogSettings {
    /// On a 0-1 scale; candidate scores arrive on a 0-100 scale
    pub high_confidence_threshold: f64,
    pub low_confidence_threshold: f64,
    pub no_match_message: String,
    pub learning_card_title: String,
    /// Text of the trailing "none of these" button
    pub learning_card_no_match_text: String,
    /// Acknowledgement sent after a suggestion is picked
    pub learning_card_no_match_response: String,
}

impl Default for DialogSettings {
    fn default() -> Self {
        Self {
            high_confidence_threshold: DEFAULT_HIGH_CONFIDENCE_THRESHOLD,
            low_confidence_threshold: DEFAULT_LOW_CONFIDENCE_THRESHOLD,
            no_match_message: DEFAULT_NO_MATCH_MESSAGE.to_string(),
            learning_card_title: DEFAULT_LEARNING_CARD_TITLE.to_string(),
            learning_card_no_match_text: DEFAULT_LEARNING_CARD_NO_MATCH_TEXT.to_string(),
            learning_card_no_match_response: DEFAULT_LEARNING_CARD_NO_MATCH_RESPONSE.to_string(),
        }
    }
}

/// Sign-in gate settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub enabled: bool,
    pub connection_name: String,
    pub login_text: String,
    pub button_text: String,
    pub logged_in_message: String,
    pub logged_out_message: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            connection_name: String::new(),
            login_text: DEFAULT_LOGIN_TEXT.to_string(),
            button_text: DEFAULT_LOGIN_BUTTON_TEXT.to_string(),
            logged_in_message: DEFAULT_LOGGED_IN_MESSAGE.to_string(),
            logged_out_message: DEFAULT_LOGGED_OUT_MESSAGE.to_string(),
        }
    }
}

/// Full bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub welcome_message: String,
    pub dialog: DialogSettings,
    pub auth: AuthSettings,
    pub endpoint: QnaEndpoint,
    pub query_options: QueryOptions,
    pub db_path: String,
    pub port: u16,
}

impl BotConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup (tests pass a map)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let dialog = DialogSettings {
            high_confidence_threshold: parse_or(
                lookup("QNA_HIGH_CONFIDENCE_THRESHOLD"),
                DEFAULT_HIGH_CONFIDENCE_THRESHOLD,
            ),
            low_confidence_threshold: parse_or(
                lookup("QNA_LOW_CONFIDENCE_THRESHOLD"),
                DEFAULT_LOW_CONFIDENCE_THRESHOLD,
            ),
            no_match_message: text("QNA_NO_MATCH_FOUND_MESSAGE", DEFAULT_NO_MATCH_MESSAGE),
            learning_card_title: text("QNA_LEARNING_CARD_TITLE", DEFAULT_LEARNING_CARD_TITLE),
            learning_card_no_match_text: text(
                "QNA_LEARNING_CARD_NO_MATCH_TEXT",
                DEFAULT_LEARNING_CARD_NO_MATCH_TEXT,
            ),
            learning_card_no_match_response: text(
                "QNA_LEARNING_CARD_NO_MATCH_RESPONSE",
                DEFAULT_LEARNING_CARD_NO_MATCH_RESPONSE,
            ),
        };

        let auth = AuthSettings {
            enabled: lookup("AUTH_ENABLE").is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
            connection_name: lookup("AUTH_CONNECTION_NAME").unwrap_or_default(),
            login_text: text("AUTH_LOGIN_TEXT", DEFAULT_LOGIN_TEXT),
            button_text: text("AUTH_BUTTON_TEXT", DEFAULT_LOGIN_BUTTON_TEXT),
            logged_in_message: text("AUTH_LOGGED_IN_MESSAGE", DEFAULT_LOGGED_IN_MESSAGE),
            logged_out_message: text("AUTH_LOGGED_OUT_MESSAGE", DEFAULT_LOGGED_OUT_MESSAGE),
        };

        let endpoint = QnaEndpoint {
            host: normalize_host(&lookup("QNA_ENDPOINT_HOST_NAME").unwrap_or_default()),
            knowledge_base_id: lookup("QNA_KNOWLEDGEBASE_ID").unwrap_or_default(),
            endpoint_key: lookup("QNA_AUTH_KEY").unwrap_or_default(),
        };

        let query_options = QueryOptions {
            top: parse_or(lookup("QNA_TOP_RESULTS"), DEFAULT_TOP_RESULTS),
            score_threshold: parse_or(lookup("QNA_SCORE_THRESHOLD"), DEFAULT_SCORE_THRESHOLD),
            strict_filters: lookup("QNA_STRICT_FILTERS")
                .map(|raw| parse_metadata_list(&raw))
                .unwrap_or_default(),
            metadata_boost: lookup("QNA_METADATA_BOOST")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
        };

        let db_path = lookup("QNA_BOT_DB_PATH").unwrap_or_else(|| {
            let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
            format!("{home}/.qna-bot/qna-bot.db")
        });

        Self {
            welcome_message: text("WELCOME_MESSAGE", DEFAULT_WELCOME_MESSAGE),
            dialog,
            auth,
            endpoint,
            query_options,
            db_path,
            port: parse_or(lookup("QNA_BOT_PORT"), DEFAULT_PORT),
        }
    }

    /// True when enough is configured to reach a knowledge base
    pub fn has_knowledge_base(&self) -> bool {
        !self.endpoint.knowledge_base_id.is_empty() && !self.endpoint.endpoint_key.is_empty()
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Ensure the host carries a scheme and the `/qnamaker` path segment
pub fn normalize_host(raw: &str) -> String {
    let mut host = raw.trim().trim_end_matches('/').to_string();
    if !host.starts_with("https://") {
        host = format!("https://{host}");
    }
    if !host.ends_with("/qnamaker") {
        host.push_str("/qnamaker");
    }
    host
}

/// Parse `name:value;name:value` pairs, skipping malformed entries
fn parse_metadata_list(raw: &str) -> Vec<Metadata> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once(':')?;
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() || value.is_empty() {
                return None;
            }
            Some(Metadata::new(name, value))
        })
        .collect()
}
