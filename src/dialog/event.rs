//! Events that drive the turn state machine

use crate::qna::CandidateAnswer;

#[derive(Debug, Clone)]
pub enum Event {
    /// Text typed by the user, or the value of a pressed im-back button
    UserText { text: String },

    /// Ranked answers for the query issued by the previous transition
    AnswersReceived { answers: Vec<CandidateAnswer> },
}
