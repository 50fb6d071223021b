//! HTTP API
//!
//! The channel posts one activity per request and receives the replies in
//! the response body.

mod handlers;
mod types;

pub use handlers::create_router;

use crate::runtime::ActivityHandler;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<dyn ActivityHandler>,
}

impl AppState {
    pub fn new(runner: Arc<dyn ActivityHandler>) -> Self {
        Self { runner }
    }
}
