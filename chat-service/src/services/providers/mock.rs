//! Mock provider for testing.

use super::{ModelConnection, ModelConnector, ProviderError};
use crate::models::Turn;
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A recorded call to [`MockConnection::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub history: Vec<Turn>,
    pub message: String,
}

/// Mock connection that echoes messages back.
///
/// Replies are `"Mock response for: <message>"` unless a failure is queued.
#[derive(Default)]
pub struct MockConnection {
    failures: Mutex<Vec<ProviderError>>,
    calls: Mutex<Vec<MockCall>>,
    delay: Option<Duration>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before answering each message.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Make the next `send` fail with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, error: ProviderError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(error);
        }
    }

    /// Every call seen so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ModelConnection for MockConnection {
    async fn send(&self, history: &[Turn], message: &str) -> Result<String, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.calls
            .lock()
            .map_err(|e| ProviderError::ApiError(format!("Mock calls mutex poisoned: {}", e)))?
            .push(MockCall {
                history: history.to_vec(),
                message: message.to_string(),
            });

        let failure = {
            let mut failures = self.failures.lock().map_err(|e| {
                ProviderError::ApiError(format!("Mock failures mutex poisoned: {}", e))
            })?;
            (!failures.is_empty()).then(|| failures.remove(0))
        };

        match failure {
            Some(error) => Err(error),
            None => Ok(format!("Mock response for: {}", message)),
        }
    }
}

/// Mock connector handing out a shared [`MockConnection`].
pub struct MockConnector {
    connection: Arc<MockConnection>,
    rejection: Mutex<Option<ProviderError>>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(connection: Arc<MockConnection>) -> Self {
        Self {
            connection,
            rejection: Mutex::new(None),
            connects: AtomicUsize::new(0),
        }
    }

    /// A connector whose every `connect` fails with `error`.
    pub fn rejecting(error: ProviderError) -> Self {
        let connector = Self::new(Arc::new(MockConnection::new()));
        connector.set_rejection(Some(error));
        connector
    }

    /// Fail (`Some`) or accept (`None`) subsequent `connect` calls.
    pub fn set_rejection(&self, error: Option<ProviderError>) {
        if let Ok(mut rejection) = self.rejection.lock() {
            *rejection = error;
        }
    }

    /// Number of successful connects.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelConnector for MockConnector {
    async fn connect(
        &self,
        api_key: &Secret<String>,
        _model_id: &str,
    ) -> Result<Arc<dyn ModelConnection>, ProviderError> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "Mock API key not configured".to_string(),
            ));
        }

        let rejection = self
            .rejection
            .lock()
            .map_err(|e| ProviderError::ApiError(format!("Mock rejection mutex poisoned: {}", e)))?
            .clone();
        if let Some(error) = rejection {
            return Err(error);
        }

        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.connection.clone())
    }
}
