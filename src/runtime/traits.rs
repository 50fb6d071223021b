//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the turn runner with mock implementations.

use crate::auth::{PromptTracker, TokenProvider};
use crate::db::{Database, SignInPrompt, UserToken};
use crate::dialog::TurnState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Storage for per-conversation turn state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Stored state, `Empty` when nothing is stored
    async fn load_state(&self, conv_id: &str) -> Result<TurnState, String>;

    /// Replace the stored state
    async fn save_state(&self, conv_id: &str, state: &TurnState) -> Result<(), String>;
}

/// Combined storage trait for convenience
pub trait Storage: StateStore + PromptTracker + TokenProvider {}
impl<T: StateStore + PromptTracker + TokenProvider> Storage for T {}

#[async_trait]
impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    async fn load_state(&self, conv_id: &str) -> Result<TurnState, String> {
        (**self).load_state(conv_id).await
    }

    async fn save_state(&self, conv_id: &str, state: &TurnState) -> Result<(), String> {
        (**self).save_state(conv_id, state).await
    }
}

// ============================================================================
// Production Adapter
// ============================================================================

/// Adapter to use Database as Storage
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StateStore for DatabaseStorage {
    async fn load_state(&self, conv_id: &str) -> Result<TurnState, String> {
        self.db.load_turn_state(conv_id).map_err(|e| e.to_string())
    }

    async fn save_state(&self, conv_id: &str, state: &TurnState) -> Result<(), String> {
        self.db
            .save_turn_state(conv_id, state)
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl PromptTracker for DatabaseStorage {
    async fn pending_prompt(&self, conversation_id: &str) -> Result<Option<SignInPrompt>, String> {
        self.db
            .pending_sign_in_prompt(conversation_id)
            .map_err(|e| e.to_string())
    }

    async fn begin_prompt(
        &self,
        conversation_id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), String> {
        self.db
            .begin_sign_in_prompt(conversation_id, user_id, expires_at)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn end_prompt(&self, conversation_id: &str) -> Result<(), String> {
        self.db
            .end_sign_in_prompt(conversation_id)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl TokenProvider for DatabaseStorage {
    async fn get_user_token(
        &self,
        user_id: &str,
        connection_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserToken>, String> {
        self.db
            .get_user_token(user_id, connection_name, now)
            .map_err(|e| e.to_string())
    }

    async fn save_user_token(&self, token: &UserToken) -> Result<(), String> {
        self.db.save_user_token(token).map_err(|e| e.to_string())
    }

    async fn sign_out(&self, user_id: &str, connection_name: &str) -> Result<(), String> {
        self.db
            .delete_user_token(user_id, connection_name)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
