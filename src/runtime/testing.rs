//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::auth::{PromptTracker, TokenProvider};
use crate::db::{SignInPrompt, UserToken};
use crate::dialog::TurnState;
use crate::qna::{CandidateAnswer, FeedbackRecord, QnaError, QnaService, QueryContext};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

// ============================================================================
// Mock Ranking Service
// ============================================================================

/// Mock ranking service that returns queued answer lists
pub struct MockQnaService {
    responses: Mutex<VecDeque<Result<Vec<CandidateAnswer>, QnaError>>>,
    train_failure: Mutex<Option<QnaError>>,
    /// Record of all queries made
    pub queries: Mutex<Vec<(String, Option<QueryContext>)>>,
    /// Record of all feedback submitted
    pub feedback: Mutex<Vec<FeedbackRecord>>,
}

#[allow(dead_code)]
impl MockQnaService {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            train_failure: Mutex::new(None),
            queries: Mutex::new(Vec::new()),
            feedback: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful answer list
    pub fn queue_answers(&self, answers: Vec<CandidateAnswer>) {
        self.responses.lock().unwrap().push_back(Ok(answers));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: QnaError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Make the next training call fail
    pub fn fail_training(&self, error: QnaError) {
        *self.train_failure.lock().unwrap() = Some(error);
    }

    pub fn recorded_queries(&self) -> Vec<(String, Option<QueryContext>)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn recorded_feedback(&self) -> Vec<FeedbackRecord> {
        self.feedback.lock().unwrap().clone()
    }
}

impl Default for MockQnaService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QnaService for MockQnaService {
    async fn query(
        &self,
        question: &str,
        context: Option<&QueryContext>,
    ) -> Result<Vec<CandidateAnswer>, QnaError> {
        self.queries
            .lock()
            .unwrap()
            .push((question.to_string(), context.cloned()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(QnaError::network("No mock response queued")))
    }

    async fn train(&self, records: &[FeedbackRecord]) -> Result<(), QnaError> {
        if let Some(error) = self.train_failure.lock().unwrap().take() {
            return Err(error);
        }
        self.feedback.lock().unwrap().extend_from_slice(records);
        Ok(())
    }
}

// ============================================================================
// In-Memory Storage
// ============================================================================

/// In-memory storage for testing
#[derive(Default)]
pub struct InMemoryStorage {
    states: Mutex<HashMap<String, TurnState>>,
    prompts: Mutex<HashMap<String, SignInPrompt>>,
    tokens: Mutex<HashMap<(String, String), UserToken>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state (for assertions)
    pub fn get_state(&self, conv_id: &str) -> TurnState {
        self.states
            .lock()
            .unwrap()
            .get(conv_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Seed a stored state
    pub fn set_state(&self, conv_id: &str, state: TurnState) {
        self.states
            .lock()
            .unwrap()
            .insert(conv_id.to_string(), state);
    }
}

#[async_trait]
impl StateStore for InMemoryStorage {
    async fn load_state(&self, conv_id: &str) -> Result<TurnState, String> {
        Ok(self.get_state(conv_id))
    }

    async fn save_state(&self, conv_id: &str, state: &TurnState) -> Result<(), String> {
        if !state.is_settled() {
            return Err(format!("refusing to store {} state", state.name()));
        }
        let mut states = self.states.lock().unwrap();
        if *state == TurnState::Empty {
            states.remove(conv_id);
        } else {
            states.insert(conv_id.to_string(), state.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl PromptTracker for InMemoryStorage {
    async fn pending_prompt(&self, conversation_id: &str) -> Result<Option<SignInPrompt>, String> {
        Ok(self.prompts.lock().unwrap().get(conversation_id).cloned())
    }

    async fn begin_prompt(
        &self,
        conversation_id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), String> {
        self.prompts.lock().unwrap().insert(
            conversation_id.to_string(),
            SignInPrompt {
                conversation_id: conversation_id.to_string(),
                user_id: user_id.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn end_prompt(&self, conversation_id: &str) -> Result<(), String> {
        self.prompts.lock().unwrap().remove(conversation_id);
        Ok(())
    }
}

#[async_trait]
impl TokenProvider for InMemoryStorage {
    async fn get_user_token(
        &self,
        user_id: &str,
        connection_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserToken>, String> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), connection_name.to_string()))
            .filter(|t| t.is_valid(now))
            .cloned())
    }

    async fn save_user_token(&self, token: &UserToken) -> Result<(), String> {
        self.tokens.lock().unwrap().insert(
            (token.user_id.clone(), token.connection_name.clone()),
            token.clone(),
        );
        Ok(())
    }

    async fn sign_out(&self, user_id: &str, connection_name: &str) -> Result<(), String> {
        self.tokens
            .lock()
            .unwrap()
            .remove(&(user_id.to_string(), connection_name.to_string()));
        Ok(())
    }
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{Activity, ChannelAccount, ConversationAccount, OutboundActivity};
    use crate::cards::HeroCard;
    use crate::config::BotConfig;
    use crate::db::Database;
    use crate::dialog::TransitionError;
    use crate::qna::{AnswerContext, Prompt, QnaErrorKind};
    use crate::runtime::{TurnError, TurnRunner};
    use serde_json::json;
    use std::sync::Arc;

    type TestRunner = TurnRunner<Arc<InMemoryStorage>, Arc<MockQnaService>>;

    struct Harness {
        runner: TestRunner,
        storage: Arc<InMemoryStorage>,
        qna: Arc<MockQnaService>,
    }

    fn harness_with(config: &BotConfig) -> Harness {
        let storage = Arc::new(InMemoryStorage::new());
        let qna = Arc::new(MockQnaService::new());
        Harness {
            runner: TurnRunner::new(config, storage.clone(), qna.clone()),
            storage,
            qna,
        }
    }

    fn harness() -> Harness {
        harness_with(&BotConfig::from_lookup(|_| None))
    }

    fn auth_config() -> BotConfig {
        BotConfig::from_lookup(|key| match key {
            "AUTH_ENABLE" => Some("True".to_string()),
            "AUTH_CONNECTION_NAME" => Some("aad".to_string()),
            _ => None,
        })
    }

    fn answer(id: i64, question: &str, text: &str, score: f64) -> CandidateAnswer {
        CandidateAnswer {
            id,
            questions: vec![question.to_string()],
            answer: text.to_string(),
            score,
            source: None,
            metadata: vec![],
            context: None,
        }
    }

    fn with_prompts(mut a: CandidateAnswer, prompts: Vec<Prompt>) -> CandidateAnswer {
        a.context = Some(AnswerContext {
            is_context_only: false,
            prompts,
        });
        a
    }

    fn say(text: &str) -> Activity {
        Activity::message("conv-1", "user-1", "webchat", text)
    }

    fn card(reply: &OutboundActivity) -> &HeroCard {
        match reply {
            OutboundActivity::HeroCard { card } => card,
            other => panic!("expected a hero card, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn confident_answer_is_sent_and_state_cleared() {
        let h = harness();
        h.qna
            .queue_answers(vec![answer(1, "What is VPN?", "A private network.", 92.0)]);

        let replies = h.runner.handle(&say("what is vpn")).await.unwrap();

        assert_eq!(replies, vec![OutboundActivity::text("A private network.")]);
        assert_eq!(h.storage.get_state("conv-1"), TurnState::Empty);
        assert_eq!(h.qna.recorded_queries(), vec![("what is vpn".to_string(), None)]);
    }

    #[tokio::test]
    async fn follow_up_prompts_carry_context_into_next_turn() {
        let h = harness();
        h.qna.queue_answers(vec![with_prompts(
            answer(10, "Printer setup", "Which printer?", 85.0),
            vec![Prompt::new(1, 12, "Mono"), Prompt::new(0, 11, "Color")],
        )]);

        let replies = h.runner.handle(&say("printer")).await.unwrap();
        let buttons: Vec<&str> = card(&replies[0])
            .buttons
            .iter()
            .map(|b| b.value.as_str())
            .collect();
        assert_eq!(buttons, vec!["Color", "Mono"]);
        assert!(matches!(
            h.storage.get_state("conv-1"),
            TurnState::AwaitingMultiTurnSelection { previous_qna_id: 10, .. }
        ));

        // Pressing a prompt forces the top answer through even at a low score
        h.qna
            .queue_answers(vec![answer(11, "Color printer", "Use the color driver.", 12.0)]);
        let replies = h.runner.handle(&say("color")).await.unwrap();

        assert_eq!(replies, vec![OutboundActivity::text("Use the color driver.")]);
        let queries = h.qna.recorded_queries();
        assert_eq!(
            queries[1],
            ("color".to_string(), Some(QueryContext::new(10, "printer")))
        );
        assert_eq!(h.storage.get_state("conv-1"), TurnState::Empty);
    }

    #[tokio::test]
    async fn picking_a_suggestion_trains_and_answers_in_one_turn() {
        let h = harness();
        h.qna.queue_answers(vec![
            answer(3, "Reset password", "Go to the portal.", 60.0),
            answer(4, "Unlock account", "Call the helpdesk.", 45.0),
        ]);

        let replies = h.runner.handle(&say("locked out")).await.unwrap();
        let suggestions = card(&replies[0]);
        assert_eq!(suggestions.title, "Did you mean:");
        assert_eq!(suggestions.buttons.len(), 3);
        assert_eq!(suggestions.buttons[2].value, "None of the above.");

        h.qna
            .queue_answers(vec![answer(4, "Unlock account", "Call the helpdesk.", 95.0)]);
        let replies = h.runner.handle(&say("Unlock account")).await.unwrap();

        assert_eq!(
            replies,
            vec![
                OutboundActivity::text("Thanks for the feedback."),
                OutboundActivity::text("Call the helpdesk."),
            ]
        );
        assert_eq!(
            h.qna.recorded_feedback(),
            vec![FeedbackRecord {
                user_id: "user-1".to_string(),
                user_question: "locked out".to_string(),
                qna_id: 4,
            }]
        );
        assert_eq!(
            h.qna.recorded_queries()[1],
            (
                "Unlock account".to_string(),
                Some(QueryContext::new(4, "Unlock account"))
            )
        );
        assert_eq!(h.storage.get_state("conv-1"), TurnState::Empty);
    }

    #[tokio::test]
    async fn escape_button_ends_without_training() {
        let h = harness();
        h.qna
            .queue_answers(vec![answer(3, "Reset password", "Go to the portal.", 60.0)]);
        h.runner.handle(&say("password")).await.unwrap();

        let replies = h.runner.handle(&say("None of the above.")).await.unwrap();

        assert_eq!(replies, vec![OutboundActivity::text("No match found.")]);
        assert!(h.qna.recorded_feedback().is_empty());
        assert_eq!(h.qna.recorded_queries().len(), 1);
        assert_eq!(h.storage.get_state("conv-1"), TurnState::Empty);
    }

    #[tokio::test]
    async fn failed_query_keeps_previous_state_and_sends_nothing() {
        let h = harness();
        let stored = TurnState::AwaitingMultiTurnSelection {
            previous_qna_id: 7,
            previous_query: "laptop".to_string(),
            prompts: vec![Prompt::new(0, 8, "Battery")],
        };
        h.storage.set_state("conv-1", stored.clone());
        h.qna.queue_error(QnaError::server_error("HTTP 503"));

        let err = h.runner.handle(&say("Battery")).await.unwrap_err();

        assert!(matches!(err, TurnError::Qna(ref e) if e.kind == QnaErrorKind::ServerError));
        assert_eq!(h.storage.get_state("conv-1"), stored);
    }

    #[tokio::test]
    async fn failed_training_fails_the_turn() {
        let h = harness();
        h.qna
            .queue_answers(vec![answer(3, "Reset password", "Go to the portal.", 60.0)]);
        h.runner.handle(&say("password")).await.unwrap();
        let suggesting = h.storage.get_state("conv-1");

        h.qna.fail_training(QnaError::auth("HTTP 401"));
        let err = h.runner.handle(&say("Reset password")).await.unwrap_err();

        assert!(matches!(err, TurnError::Qna(_)));
        assert_eq!(h.storage.get_state("conv-1"), suggesting);
        assert_eq!(h.qna.recorded_queries().len(), 1);
    }

    #[tokio::test]
    async fn blank_messages_are_ignored() {
        let h = harness();
        assert!(h.runner.handle(&say("   ")).await.unwrap().is_empty());
        assert!(h.qna.recorded_queries().is_empty());
    }

    #[tokio::test]
    async fn conversations_do_not_share_state() {
        let h = harness();
        h.qna
            .queue_answers(vec![answer(3, "Reset password", "Go to the portal.", 60.0)]);
        h.runner.handle(&say("password")).await.unwrap();

        h.qna
            .queue_answers(vec![answer(5, "Wifi", "Join the guest network.", 90.0)]);
        let other = Activity::message("conv-2", "user-2", "webchat", "Reset password");
        let replies = h.runner.handle(&other).await.unwrap();

        // conv-2 has no suggestions on screen, so the text is a fresh question
        assert_eq!(replies, vec![OutboundActivity::text("Join the guest network.")]);
        assert!(h.qna.recorded_feedback().is_empty());
        assert!(matches!(
            h.storage.get_state("conv-1"),
            TurnState::AwaitingFeedbackSelection { .. }
        ));
    }

    #[tokio::test]
    async fn turns_in_one_conversation_run_one_at_a_time() {
        let h = harness();
        for i in 0..8 {
            h.qna
                .queue_answers(vec![answer(i, "Q", &format!("answer {i}"), 90.0)]);
        }
        let runner = Arc::new(h.runner);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let runner = runner.clone();
                tokio::spawn(async move { runner.handle(&say(&format!("question {i}"))).await })
            })
            .collect();

        for handle in handles {
            let replies = handle.await.unwrap().unwrap();
            assert_eq!(replies.len(), 1);
        }
        assert_eq!(h.qna.recorded_queries().len(), 8);
        assert_eq!(h.storage.get_state("conv-1"), TurnState::Empty);
        assert_eq!(runner.tracked_conversations().await, 0);
    }

    #[tokio::test]
    async fn conversation_locks_are_released_after_each_turn() {
        let h = harness();
        for conv in ["conv-1", "conv-2", "conv-3"] {
            h.qna.queue_answers(vec![]);
            let activity = Activity::message(conv, "user-1", "webchat", "hello");
            h.runner.handle(&activity).await.unwrap();
        }
        assert_eq!(h.runner.tracked_conversations().await, 0);

        // Failed turns release their lock too
        h.qna.queue_error(QnaError::server_error("HTTP 500"));
        assert!(h.runner.handle(&say("hello")).await.is_err());
        assert_eq!(h.runner.tracked_conversations().await, 0);
    }

    #[tokio::test]
    async fn missing_conversation_id_is_rejected() {
        let h = harness();
        let mut activity = say("hello");
        activity.conversation = ConversationAccount::default();
        assert!(matches!(
            h.runner.handle(&activity).await,
            Err(TurnError::BadActivity(_))
        ));
    }

    #[tokio::test]
    async fn stored_in_flight_state_is_reported() {
        let h = harness();
        h.storage.set_state(
            "conv-1",
            TurnState::Querying {
                query: "q".to_string(),
                context: None,
                follow_up_prompts: vec![],
            },
        );
        assert!(matches!(
            h.runner.handle(&say("hello")).await,
            Err(TurnError::Transition(TransitionError::TurnInProgress))
        ));
    }

    #[tokio::test]
    async fn welcomes_new_members_but_not_the_bot() {
        let h = harness();
        let activity = Activity {
            activity_type: "conversationUpdate".to_string(),
            channel_id: "webchat".to_string(),
            recipient: ChannelAccount::new("bot"),
            conversation: ConversationAccount {
                id: "conv-1".to_string(),
            },
            members_added: vec![ChannelAccount::new("user-1"), ChannelAccount::new("bot")],
            ..Activity::default()
        };

        let replies = h.runner.handle(&activity).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert!(matches!(replies[0], OutboundActivity::Message { .. }));
    }

    #[tokio::test]
    async fn sign_in_gates_questions_until_token_arrives() {
        let h = harness_with(&auth_config());

        let replies = h.runner.handle(&say("what is vpn")).await.unwrap();
        assert!(matches!(
            replies.as_slice(),
            [OutboundActivity::OauthCard { connection_name, .. }] if connection_name == "aad"
        ));
        assert!(h.qna.recorded_queries().is_empty());

        let token_event = Activity {
            activity_type: "event".to_string(),
            name: Some("tokens/response".to_string()),
            value: Some(json!({"connectionName": "aad", "token": "abc"})),
            ..say("")
        };
        let replies = h.runner.handle(&token_event).await.unwrap();
        assert_eq!(replies, vec![OutboundActivity::text("You are now signed in.")]);
        assert!(h.storage.pending_prompt("conv-1").await.unwrap().is_none());

        h.qna
            .queue_answers(vec![answer(1, "What is VPN?", "A private network.", 92.0)]);
        let replies = h.runner.handle(&say("what is vpn")).await.unwrap();
        assert_eq!(replies, vec![OutboundActivity::text("A private network.")]);
    }

    #[tokio::test]
    async fn blank_message_from_signed_out_user_gets_sign_in_card() {
        let h = harness_with(&auth_config());

        let replies = h.runner.handle(&say("  ")).await.unwrap();

        assert!(matches!(
            replies.as_slice(),
            [OutboundActivity::OauthCard { connection_name, .. }] if connection_name == "aad"
        ));
        assert!(h.storage.pending_prompt("conv-1").await.unwrap().is_some());
        assert!(h.qna.recorded_queries().is_empty());
    }

    #[tokio::test]
    async fn blank_message_from_signed_in_user_is_ignored() {
        let h = harness_with(&auth_config());
        h.storage
            .save_user_token(&UserToken {
                user_id: "user-1".to_string(),
                connection_name: "aad".to_string(),
                token: "abc".to_string(),
                expires_at: None,
            })
            .await
            .unwrap();

        assert!(h.runner.handle(&say("")).await.unwrap().is_empty());
        assert!(h.qna.recorded_queries().is_empty());
    }

    fn invoke() -> Activity {
        Activity {
            activity_type: "invoke".to_string(),
            ..say("")
        }
    }

    #[tokio::test]
    async fn invoke_without_token_reshows_sign_in_card() {
        let h = harness_with(&auth_config());

        let replies = h.runner.handle(&invoke()).await.unwrap();

        assert!(matches!(
            replies.as_slice(),
            [OutboundActivity::OauthCard { connection_name, .. }] if connection_name == "aad"
        ));
        let prompt = h.storage.pending_prompt("conv-1").await.unwrap().unwrap();
        assert_eq!(prompt.user_id, "user-1");
        assert!(!prompt.is_expired(Utc::now()));
    }

    #[tokio::test]
    async fn invoke_with_token_confirms_and_ends_prompt() {
        let h = harness_with(&auth_config());
        h.storage
            .begin_prompt("conv-1", "user-1", Utc::now() + chrono::Duration::minutes(5))
            .await
            .unwrap();
        h.storage
            .save_user_token(&UserToken {
                user_id: "user-1".to_string(),
                connection_name: "aad".to_string(),
                token: "abc".to_string(),
                expires_at: None,
            })
            .await
            .unwrap();

        let replies = h.runner.handle(&invoke()).await.unwrap();

        assert_eq!(replies, vec![OutboundActivity::text("You are now signed in.")]);
        assert!(h.storage.pending_prompt("conv-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invoke_is_ignored_when_auth_is_off() {
        let h = harness();
        assert!(h.runner.handle(&invoke()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn logout_signs_out_and_clears_dialog_state() {
        let h = harness_with(&auth_config());
        h.storage
            .save_user_token(&UserToken {
                user_id: "user-1".to_string(),
                connection_name: "aad".to_string(),
                token: "abc".to_string(),
                expires_at: None,
            })
            .await
            .unwrap();
        h.qna
            .queue_answers(vec![answer(3, "Reset password", "Go to the portal.", 60.0)]);
        h.runner.handle(&say("password")).await.unwrap();

        let replies = h.runner.handle(&say("LOGOUT")).await.unwrap();

        assert_eq!(replies, vec![OutboundActivity::text("You have been signed out.")]);
        assert_eq!(h.storage.get_state("conv-1"), TurnState::Empty);
        assert!(h
            .storage
            .get_user_token("user-1", "aad", Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn logout_is_a_question_when_auth_is_off() {
        let h = harness();
        h.qna.queue_answers(vec![]);
        let replies = h.runner.handle(&say("logout")).await.unwrap();
        assert_eq!(replies, vec![OutboundActivity::text("No match found.")]);
    }

    #[tokio::test]
    async fn runs_against_sqlite_storage() {
        let db = Database::open_in_memory().unwrap();
        let storage = DatabaseStorage::new(db.clone());
        let qna = Arc::new(MockQnaService::new());
        let runner = TurnRunner::new(&BotConfig::from_lookup(|_| None), storage, qna.clone());

        qna.queue_answers(vec![with_prompts(
            answer(10, "Printer setup", "Which printer?", 85.0),
            vec![Prompt::new(0, 11, "Color")],
        )]);
        runner.handle(&say("printer")).await.unwrap();

        assert!(matches!(
            db.load_turn_state("conv-1").unwrap(),
            TurnState::AwaitingMultiTurnSelection { previous_qna_id: 10, .. }
        ));
    }
}
