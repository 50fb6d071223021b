//! API request and response types

use crate::activity::OutboundActivity;
use serde::{Deserialize, Serialize};

/// Replies produced by one inbound activity, in send order
#[derive(Debug, Serialize, Deserialize)]
pub struct ActivitiesResponse {
    pub activities: Vec<OutboundActivity>,
}

/// Response for health checks
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
