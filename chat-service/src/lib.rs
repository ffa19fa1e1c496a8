pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

use services::SessionManager;
use std::sync::Arc;

/// Shared application state: the one model session of this process.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionManager>,
}

impl AppState {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }
}
