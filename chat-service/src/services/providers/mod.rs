//! Upstream model abstractions and implementations.
//!
//! A [`ModelConnector`] opens a [`ModelConnection`] for a credential and model
//! id; the connection performs one exchange at a time given the prior
//! transcript. This keeps the session manager independent of the backend
//! (Gemini, mock).

pub mod gemini;
pub mod mock;

use crate::models::Turn;
use async_trait::async_trait;
use secrecy::Secret;
use std::sync::Arc;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Model returned no text")]
    EmptyResponse,
}

/// An open conversation endpoint on the upstream model.
#[async_trait]
pub trait ModelConnection: Send + Sync {
    /// Send `message` after `history` and return the model's reply text.
    async fn send(&self, history: &[Turn], message: &str) -> Result<String, ProviderError>;
}

/// Opens connections to the upstream model.
#[async_trait]
pub trait ModelConnector: Send + Sync {
    /// Validate the credential and model id and return a usable connection.
    async fn connect(
        &self,
        api_key: &Secret<String>,
        model_id: &str,
    ) -> Result<Arc<dyn ModelConnection>, ProviderError>;
}
