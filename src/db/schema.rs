//! Database schema and row types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS turn_state (
    conversation_id TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sign_in_prompts (
    conversation_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sign_in_prompts_expires ON sign_in_prompts(expires_at);

CREATE TABLE IF NOT EXISTS user_tokens (
    user_id TEXT NOT NULL,
    connection_name TEXT NOT NULL,
    token TEXT NOT NULL,
    expires_at TEXT,
    updated_at TEXT NOT NULL,

    PRIMARY KEY (user_id, connection_name)
);
";

/// A login prompt that is waiting for a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInPrompt {
    pub conversation_id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl SignInPrompt {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A stored OAuth token for one user and connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserToken {
    pub user_id: String,
    pub connection_name: String,
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl UserToken {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && self.expires_at.map_or(true, |at| at > now)
    }
}
