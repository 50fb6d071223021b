//! Turn runner

use super::traits::Storage;
use super::TurnError;

use crate::activity::{Activity, ActivityKind, OutboundActivity, TokenResponse};
use crate::auth::{is_logout_command, GateDecision, SignInGate};
use crate::config::{BotConfig, DialogSettings};
use crate::dialog::{transition, Effect, Event, TurnContext, TurnState};
use crate::format::format_for_channel;
use crate::qna::QnaService;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Handles one inbound activity at a time per conversation
pub struct TurnRunner<S, Q>
where
    S: Storage + 'static,
    Q: QnaService + 'static,
{
    storage: S,
    qna: Q,
    dialog: DialogSettings,
    gate: SignInGate,
    welcome_message: String,
    /// One lock per conversation; turns in different conversations run concurrently
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

/// A dialog turn in progress. Nothing here is stored until the turn succeeds.
struct PendingTurn {
    state: TurnState,
    replies: Vec<OutboundActivity>,
}

impl<S, Q> TurnRunner<S, Q>
where
    S: Storage + 'static,
    Q: QnaService + 'static,
{
    pub fn new(config: &BotConfig, storage: S, qna: Q) -> Self {
        Self {
            storage,
            qna,
            dialog: config.dialog.clone(),
            gate: SignInGate::new(config.auth.clone()),
            welcome_message: config.welcome_message.clone(),
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Process one activity and return the replies for it
    pub async fn handle(&self, activity: &Activity) -> Result<Vec<OutboundActivity>, TurnError> {
        let conv_id = activity.conversation.id.as_str();
        if conv_id.is_empty() {
            return Err(TurnError::BadActivity(
                "activity has no conversation id".to_string(),
            ));
        }

        let lock = self.conversation_lock(conv_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.dispatch(activity).await
        };
        drop(lock);
        self.release_lock(conv_id).await;
        result
    }

    async fn dispatch(&self, activity: &Activity) -> Result<Vec<OutboundActivity>, TurnError> {
        let ctx = TurnContext::new(
            &activity.conversation.id,
            &activity.from.id,
            &activity.channel_id,
        );

        match activity.kind() {
            ActivityKind::ConversationUpdate => self.greet(activity, &ctx).await,
            ActivityKind::TokenResponse => self.receive_token(activity, &ctx).await,
            ActivityKind::Invoke => self.continue_sign_in(&ctx).await,
            ActivityKind::Message => self.on_message(activity.text(), &ctx).await,
            ActivityKind::Other => {
                tracing::debug!(conv_id = %ctx.conversation_id, activity_type = %activity.activity_type, "Ignoring activity");
                Ok(vec![])
            }
        }
    }

    async fn conversation_lock(&self, conv_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(conv_id) {
            return lock.clone();
        }
        self.locks
            .write()
            .await
            .entry(conv_id.to_string())
            .or_default()
            .clone()
    }

    /// Forget the lock once no turn holds or awaits it
    async fn release_lock(&self, conv_id: &str) {
        let mut locks = self.locks.write().await;
        if locks
            .get(conv_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(conv_id);
        }
    }

    #[cfg(test)]
    pub(crate) async fn tracked_conversations(&self) -> usize {
        self.locks.read().await.len()
    }

    /// Welcome each newly added member, then check sign-in
    async fn greet(
        &self,
        activity: &Activity,
        ctx: &TurnContext,
    ) -> Result<Vec<OutboundActivity>, TurnError> {
        let newcomers = activity
            .members_added
            .iter()
            .filter(|m| m.id != activity.recipient.id)
            .count();
        if newcomers == 0 {
            return Ok(vec![]);
        }

        let welcome = format_for_channel(&self.welcome_message, &ctx.channel_id);
        let mut replies = vec![OutboundActivity::text(welcome); newcomers];

        if let GateDecision::SignInRequired(card) = self
            .gate
            .ensure_authenticated(&self.storage, ctx, Utc::now())
            .await?
        {
            replies.push(card);
        }
        Ok(replies)
    }

    async fn receive_token(
        &self,
        activity: &Activity,
        ctx: &TurnContext,
    ) -> Result<Vec<OutboundActivity>, TurnError> {
        let value = activity
            .value
            .clone()
            .ok_or_else(|| TurnError::BadActivity("token response without a value".to_string()))?;
        let response: TokenResponse = serde_json::from_value(value)
            .map_err(|e| TurnError::BadActivity(format!("malformed token response: {e}")))?;

        self.gate.accept_token(&self.storage, ctx, &response).await?;
        Ok(self.gate.complete_sign_in(&self.storage, ctx, Utc::now()).await?)
    }

    /// Invoke activities belong to the login flow
    async fn continue_sign_in(&self, ctx: &TurnContext) -> Result<Vec<OutboundActivity>, TurnError> {
        if !self.gate.enabled() {
            return Ok(vec![]);
        }

        let now = Utc::now();
        match self
            .gate
            .ensure_authenticated(&self.storage, ctx, now)
            .await?
        {
            GateDecision::Authenticated => {
                Ok(self.gate.complete_sign_in(&self.storage, ctx, now).await?)
            }
            GateDecision::SignInRequired(card) => Ok(vec![card]),
        }
    }

    async fn on_message(
        &self,
        text: &str,
        ctx: &TurnContext,
    ) -> Result<Vec<OutboundActivity>, TurnError> {
        if self.gate.enabled() && is_logout_command(text) {
            let replies = self.gate.sign_out(&self.storage, ctx).await?;
            self.storage
                .save_state(&ctx.conversation_id, &TurnState::Empty)
                .await
                .map_err(TurnError::Storage)?;
            return Ok(replies);
        }

        match self
            .gate
            .ensure_authenticated(&self.storage, ctx, Utc::now())
            .await?
        {
            GateDecision::SignInRequired(card) => Ok(vec![card]),
            GateDecision::Authenticated if text.trim().is_empty() => Ok(vec![]),
            GateDecision::Authenticated => self.run_dialog(text, ctx).await,
        }
    }

    /// Drive the state machine until it settles, then commit
    async fn run_dialog(
        &self,
        text: &str,
        ctx: &TurnContext,
    ) -> Result<Vec<OutboundActivity>, TurnError> {
        let start = std::time::Instant::now();
        let mut turn = PendingTurn {
            state: self
                .storage
                .load_state(&ctx.conversation_id)
                .await
                .map_err(TurnError::Storage)?,
            replies: Vec::new(),
        };
        let initial = turn.state.name();

        // Process events in a loop - no recursion
        let mut events_to_process = vec![Event::UserText {
            text: text.to_string(),
        }];

        while let Some(event) = events_to_process.pop() {
            let result = transition(&turn.state, &self.dialog, ctx, event)?;
            turn.state = result.new_state;

            for effect in result.effects {
                if let Some(generated) = self.execute_effect(&mut turn, effect).await? {
                    events_to_process.push(generated);
                }
            }
        }

        if !turn.state.is_settled() {
            return Err(TurnError::Unsettled(turn.state.name()));
        }

        self.storage
            .save_state(&ctx.conversation_id, &turn.state)
            .await
            .map_err(TurnError::Storage)?;

        tracing::info!(
            conv_id = %ctx.conversation_id,
            channel = %ctx.channel_id,
            from = initial,
            state = turn.state.name(),
            replies = turn.replies.len(),
            duration_ms = %start.elapsed().as_millis(),
            "Turn completed"
        );

        Ok(turn.replies)
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(
        &self,
        turn: &mut PendingTurn,
        effect: Effect,
    ) -> Result<Option<Event>, TurnError> {
        match effect {
            Effect::QueryQna { question, context } => {
                let answers = self.qna.query(&question, context.as_ref()).await?;
                Ok(Some(Event::AnswersReceived { answers }))
            }

            Effect::SubmitFeedback { records } => {
                self.qna.train(&records).await?;
                Ok(None)
            }

            Effect::Reply { activity } => {
                turn.replies.push(activity);
                Ok(None)
            }
        }
    }
}
