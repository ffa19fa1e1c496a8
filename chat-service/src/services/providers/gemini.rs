//! Gemini provider implementation.
//!
//! Talks to Google's generative-language REST API. The API is stateless, so
//! every exchange replays the transcript as `contents`.

use super::{ModelConnection, ModelConnector, ProviderError};
use crate::models::Turn;
use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Gemini API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Header carrying the API key; the key never goes in a URL.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_base: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: GEMINI_API_BASE.to_string(),
        }
    }
}

/// Opens Gemini connections after checking that the key can see the model.
pub struct GeminiConnector {
    config: GeminiConfig,
    client: Client,
}

impl GeminiConnector {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl ModelConnector for GeminiConnector {
    async fn connect(
        &self,
        api_key: &Secret<String>,
        model_id: &str,
    ) -> Result<Arc<dyn ModelConnection>, ProviderError> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        let model = model_id.trim_start_matches("models/");
        if model.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "model id is empty".to_string(),
            ));
        }

        let url = format!(
            "{}/models/{}",
            self.config.api_base.trim_end_matches('/'),
            model
        );

        tracing::debug!(model = %model, "Verifying Gemini model access");

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, api_key.expose_secret())
            .send()
            .await
            .map_err(network_error)?;

        check_status(response).await?;

        Ok(Arc::new(GeminiConnection {
            client: self.client.clone(),
            api_key: api_key.clone(),
            endpoint: format!("{}:generateContent", url),
            model: model.to_string(),
        }))
    }
}

/// A verified Gemini model endpoint.
pub struct GeminiConnection {
    client: Client,
    api_key: Secret<String>,
    endpoint: String,
    model: String,
}

impl GeminiConnection {
    fn build_request(history: &[Turn], message: &str) -> GenerateContentRequest {
        let contents = history
            .iter()
            .map(|turn| Content {
                role: Some(turn.author.as_role().to_string()),
                parts: vec![ContentPart {
                    text: Some(turn.text.clone()),
                }],
            })
            .chain(std::iter::once(Content {
                role: Some("user".to_string()),
                parts: vec![ContentPart {
                    text: Some(message.to_string()),
                }],
            }))
            .collect();

        GenerateContentRequest { contents }
    }
}

#[async_trait]
impl ModelConnection for GeminiConnection {
    async fn send(&self, history: &[Turn], message: &str) -> Result<String, ProviderError> {
        let request = Self::build_request(history, message);

        tracing::debug!(
            model = %self.model,
            history_len = history.len(),
            message_len = message.len(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(network_error)?;

        let response = check_status(response).await?;

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| {
                ProviderError::ApiError(format!("Failed to parse response: {}", e.without_url()))
            })?;

        api_response.into_text()
    }
}

/// Transport failures surface in `/chat` replies, so the URL is dropped.
fn network_error(err: reqwest::Error) -> ProviderError {
    ProviderError::NetworkError(err.without_url().to_string())
}

/// Maps non-success statuses onto provider errors.
async fn check_status(response: Response) -> Result<Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();

    if status.as_u16() == 429 {
        return Err(ProviderError::RateLimited);
    }

    Err(ProviderError::ApiError(format!(
        "Gemini API error {}: {}",
        status, error_text
    )))
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Joins the text parts of the first candidate.
    fn into_text(self) -> Result<String, ProviderError> {
        let blocked = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_ref())
            .is_some();

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(if blocked {
                ProviderError::ContentFiltered
            } else {
                ProviderError::EmptyResponse
            });
        };

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(ProviderError::ContentFiltered);
        }

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(text)
    }
}
