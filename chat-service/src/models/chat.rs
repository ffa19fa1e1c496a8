//! Wire types for the HTTP surface.

use serde::{Deserialize, Serialize};

/// Body of `POST /chat`.
///
/// `message` stays loosely typed so a missing, null or non-string value can be
/// reported as "no message" instead of a deserialization failure.
#[derive(Debug, Default)]
pub struct ChatRequest {
    pub message: Option<serde_json::Value>,
}

impl ChatRequest {
    /// Parses a raw body. Anything that isn't a JSON object yields an empty request.
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(serde_json::Value::Object(mut fields)) => Self {
                message: fields.remove("message"),
            },
            _ => Self::default(),
        }
    }

    /// The trimmed message, if it is a string with visible content.
    pub fn trimmed_message(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Body of every `/chat` response, whatever the status code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

impl ChatResponse {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Ok,
    Unavailable,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub model: String,
    pub timestamp: String,
}
