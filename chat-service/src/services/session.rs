//! The single conversation held by the process.
//!
//! [`SessionManager`] owns the upstream connection and the transcript. It is
//! either [`SessionState::Unavailable`] or [`SessionState::Ready`]; the only
//! transitions happen in [`SessionManager::initialize`]. Exchanges and
//! initialisation are serialised so the transcript always reads as
//! user/model pairs in the order they completed.

use crate::models::Turn;
use crate::services::providers::{ModelConnection, ModelConnector, ProviderError};
use secrecy::{ExposeSecret, Secret};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Why [`SessionManager::initialize`] left the session unavailable.
#[derive(Debug, Error)]
pub enum SessionInitError {
    #[error("API key is not set")]
    MissingCredential,

    #[error("Failed to initialize model '{model}': {source}")]
    Connect {
        model: String,
        #[source]
        source: ProviderError,
    },
}

/// Failure of a single exchange.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Chat session is not initialized")]
    Unavailable,

    #[error(transparent)]
    Upstream(#[from] ProviderError),
}

/// Availability of the session.
pub enum SessionState {
    Unavailable {
        reason: String,
    },
    Ready {
        connection: Arc<dyn ModelConnection>,
        transcript: Vec<Turn>,
    },
}

pub struct SessionManager {
    model_id: String,
    connector: Arc<dyn ModelConnector>,
    state: RwLock<SessionState>,
    // Held for the whole of an exchange or an initialisation.
    exchange: Mutex<()>,
}

impl SessionManager {
    /// Create an uninitialised manager for `model_id`.
    pub fn new(model_id: impl Into<String>, connector: Arc<dyn ModelConnector>) -> Self {
        Self {
            model_id: model_id.into(),
            connector,
            state: RwLock::new(SessionState::Unavailable {
                reason: "not initialized".to_string(),
            }),
            exchange: Mutex::new(()),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Connect to the model and start an empty transcript.
    ///
    /// Any previous transcript is discarded. On failure the session becomes
    /// unavailable and the reason is both logged and returned.
    pub async fn initialize(&self, api_key: Option<&Secret<String>>) -> Result<(), SessionInitError> {
        let _exchange = self.exchange.lock().await;

        let result = match api_key.filter(|key| !key.expose_secret().trim().is_empty()) {
            None => Err(SessionInitError::MissingCredential),
            Some(key) => self
                .connector
                .connect(key, &self.model_id)
                .await
                .map_err(|source| SessionInitError::Connect {
                    model: self.model_id.clone(),
                    source,
                }),
        };

        let mut state = self.state.write().await;
        match result {
            Ok(connection) => {
                *state = SessionState::Ready {
                    connection,
                    transcript: Vec::new(),
                };
                tracing::info!(model = %self.model_id, "Initialized model");
                Ok(())
            }
            Err(e) => {
                *state = SessionState::Unavailable {
                    reason: e.to_string(),
                };
                tracing::error!(model = %self.model_id, error = %e, "Model initialization failed");
                Err(e)
            }
        }
    }

    /// Whether chat traffic can be served.
    pub async fn is_ready(&self) -> bool {
        matches!(*self.state.read().await, SessionState::Ready { .. })
    }

    /// The reason the session is unavailable, if it is.
    pub async fn unavailable_reason(&self) -> Option<String> {
        match &*self.state.read().await {
            SessionState::Unavailable { reason } => Some(reason.clone()),
            SessionState::Ready { .. } => None,
        }
    }

    /// Snapshot of the transcript; empty while unavailable.
    pub async fn transcript(&self) -> Vec<Turn> {
        match &*self.state.read().await {
            SessionState::Ready { transcript, .. } => transcript.clone(),
            SessionState::Unavailable { .. } => Vec::new(),
        }
    }

    /// Send `text` to the model and record the exchange.
    ///
    /// Callers are expected to check [`is_ready`](Self::is_ready) first. A
    /// failed send leaves both the state and the transcript untouched.
    pub async fn send_message(&self, text: &str) -> Result<String, SessionError> {
        let _exchange = self.exchange.lock().await;

        let reply = {
            // Only initialize() writes, and it waits on `exchange`, so this
            // read guard never stalls other readers.
            let state = self.state.read().await;
            let SessionState::Ready {
                connection,
                transcript,
            } = &*state
            else {
                return Err(SessionError::Unavailable);
            };

            connection.send(transcript, text).await.map_err(|e| {
                tracing::warn!(model = %self.model_id, error = %e, "Upstream call failed");
                e
            })?
        };

        if let SessionState::Ready { transcript, .. } = &mut *self.state.write().await {
            transcript.push(Turn::user(text));
            transcript.push(Turn::model(reply.clone()));
        }

        Ok(reply)
    }
}
