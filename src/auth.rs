//! Sign-in gate
//!
//! When authentication is enabled, a user needs a valid token for the
//! configured connection before any question reaches the dialog. Without
//! one the gate issues a time-boxed login prompt and the turn stops there.
//! Tokens arrive out of band as `tokens/response` events.

use crate::activity::{OutboundActivity, TokenResponse};
use crate::config::AuthSettings;
use crate::db::{SignInPrompt, UserToken};
use crate::dialog::TurnContext;
use crate::format::format_for_channel;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;

/// How long a login prompt stays valid
pub const SIGN_IN_TIMEOUT_MINUTES: i64 = 5;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token store error: {0}")]
    Tokens(String),
    #[error("Sign-in prompt store error: {0}")]
    Prompts(String),
}

/// Source of user tokens for the configured connection
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// A token that is still valid at `now`, if any
    async fn get_user_token(
        &self,
        user_id: &str,
        connection_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserToken>, String>;

    async fn save_user_token(&self, token: &UserToken) -> Result<(), String>;

    /// Forget the user's token
    async fn sign_out(&self, user_id: &str, connection_name: &str) -> Result<(), String>;
}

/// Tracks login prompts that are waiting for a token
#[async_trait]
pub trait PromptTracker: Send + Sync {
    async fn pending_prompt(&self, conversation_id: &str) -> Result<Option<SignInPrompt>, String>;

    async fn begin_prompt(
        &self,
        conversation_id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), String>;

    async fn end_prompt(&self, conversation_id: &str) -> Result<(), String>;
}

#[async_trait]
impl<T: TokenProvider + ?Sized> TokenProvider for Arc<T> {
    async fn get_user_token(
        &self,
        user_id: &str,
        connection_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserToken>, String> {
        (**self).get_user_token(user_id, connection_name, now).await
    }

    async fn save_user_token(&self, token: &UserToken) -> Result<(), String> {
        (**self).save_user_token(token).await
    }

    async fn sign_out(&self, user_id: &str, connection_name: &str) -> Result<(), String> {
        (**self).sign_out(user_id, connection_name).await
    }
}

#[async_trait]
impl<T: PromptTracker + ?Sized> PromptTracker for Arc<T> {
    async fn pending_prompt(&self, conversation_id: &str) -> Result<Option<SignInPrompt>, String> {
        (**self).pending_prompt(conversation_id).await
    }

    async fn begin_prompt(
        &self,
        conversation_id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), String> {
        (**self).begin_prompt(conversation_id, user_id, expires_at).await
    }

    async fn end_prompt(&self, conversation_id: &str) -> Result<(), String> {
        (**self).end_prompt(conversation_id).await
    }
}

/// Outcome of checking a turn against the gate
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Authenticated,
    /// Stop the turn and show this login prompt
    SignInRequired(OutboundActivity),
}

pub struct SignInGate {
    settings: AuthSettings,
}

impl SignInGate {
    pub fn new(settings: AuthSettings) -> Self {
        Self { settings }
    }

    pub fn enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Let the turn through, or issue (or re-show) the login prompt
    pub async fn ensure_authenticated<S>(
        &self,
        store: &S,
        ctx: &TurnContext,
        now: DateTime<Utc>,
    ) -> Result<GateDecision, AuthError>
    where
        S: TokenProvider + PromptTracker + ?Sized,
    {
        if !self.settings.enabled {
            return Ok(GateDecision::Authenticated);
        }

        let token = store
            .get_user_token(&ctx.user_id, &self.settings.connection_name, now)
            .await
            .map_err(AuthError::Tokens)?;
        if token.is_some() {
            return Ok(GateDecision::Authenticated);
        }

        let pending = store
            .pending_prompt(&ctx.conversation_id)
            .await
            .map_err(AuthError::Prompts)?;

        let expires_at = match pending {
            Some(prompt) if !prompt.is_expired(now) => prompt.expires_at,
            _ => {
                let expires_at = now + Duration::minutes(SIGN_IN_TIMEOUT_MINUTES);
                store
                    .begin_prompt(&ctx.conversation_id, &ctx.user_id, expires_at)
                    .await
                    .map_err(AuthError::Prompts)?;
                tracing::info!(conv_id = %ctx.conversation_id, %expires_at, "Issued sign-in prompt");
                expires_at
            }
        };

        Ok(GateDecision::SignInRequired(OutboundActivity::OauthCard {
            connection_name: self.settings.connection_name.clone(),
            text: self.settings.login_text.clone(),
            button_title: self.settings.button_text.clone(),
            expires_at,
        }))
    }

    /// Store a token delivered by the channel's token service
    pub async fn accept_token<S>(
        &self,
        store: &S,
        ctx: &TurnContext,
        response: &TokenResponse,
    ) -> Result<(), AuthError>
    where
        S: TokenProvider + ?Sized,
    {
        let connection_name = if response.connection_name.is_empty() {
            self.settings.connection_name.clone()
        } else {
            response.connection_name.clone()
        };

        store
            .save_user_token(&UserToken {
                user_id: ctx.user_id.clone(),
                connection_name,
                token: response.token.clone(),
                expires_at: response.expiration,
            })
            .await
            .map_err(AuthError::Tokens)
    }

    /// Close the pending prompt; confirms when a valid token is on file
    pub async fn complete_sign_in<S>(
        &self,
        store: &S,
        ctx: &TurnContext,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboundActivity>, AuthError>
    where
        S: TokenProvider + PromptTracker + ?Sized,
    {
        let token = store
            .get_user_token(&ctx.user_id, &self.settings.connection_name, now)
            .await
            .map_err(AuthError::Tokens)?;
        store
            .end_prompt(&ctx.conversation_id)
            .await
            .map_err(AuthError::Prompts)?;

        if token.is_none() {
            tracing::warn!(conv_id = %ctx.conversation_id, "Sign-in completed without a usable token");
            return Ok(vec![]);
        }

        tracing::info!(conv_id = %ctx.conversation_id, "User signed in");
        Ok(vec![OutboundActivity::text(format_for_channel(
            &self.settings.logged_in_message,
            &ctx.channel_id,
        ))])
    }

    /// Drop the user's token and any pending prompt
    pub async fn sign_out<S>(
        &self,
        store: &S,
        ctx: &TurnContext,
    ) -> Result<Vec<OutboundActivity>, AuthError>
    where
        S: TokenProvider + PromptTracker + ?Sized,
    {
        store
            .sign_out(&ctx.user_id, &self.settings.connection_name)
            .await
            .map_err(AuthError::Tokens)?;
        store
            .end_prompt(&ctx.conversation_id)
            .await
            .map_err(AuthError::Prompts)?;

        tracing::info!(conv_id = %ctx.conversation_id, "User signed out");
        Ok(vec![OutboundActivity::text(format_for_channel(
            &self.settings.logged_out_message,
            &ctx.channel_id,
        ))])
    }
}

/// Literal sign-out command, matched case-insensitively
pub fn is_logout_command(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("logout")
}
