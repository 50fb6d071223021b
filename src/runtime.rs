//! Turn runtime
//!
//! Serializes turns per conversation, runs the sign-in gate, and drives the
//! dialog state machine by executing its effects. State is committed only
//! when every effect of the turn succeeded.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::TurnRunner;
pub use traits::*;

use crate::activity::{Activity, OutboundActivity};
use crate::auth::AuthError;
use crate::dialog::TransitionError;
use crate::qna::{HttpQnaService, LoggingQnaService, QnaError};
use async_trait::async_trait;
use thiserror::Error;

/// Type alias for the production runner with concrete implementations
pub type ProductionRunner = TurnRunner<DatabaseStorage, LoggingQnaService<HttpQnaService>>;

/// Why a turn failed. Nothing from a failed turn is stored or sent.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Ranking service error: {0}")]
    Qna(#[from] QnaError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Turn ended in unsettled state {0}")]
    Unsettled(&'static str),
    #[error("Malformed activity: {0}")]
    BadActivity(String),
}

/// Object-safe entry point the HTTP layer holds
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    async fn handle(&self, activity: &Activity) -> Result<Vec<OutboundActivity>, TurnError>;
}

#[async_trait]
impl<S, Q> ActivityHandler for TurnRunner<S, Q>
where
    S: Storage + 'static,
    Q: crate::qna::QnaService + 'static,
{
    async fn handle(&self, activity: &Activity) -> Result<Vec<OutboundActivity>, TurnError> {
        TurnRunner::handle(self, activity).await
    }
}
