use crate::models::{ChatRequest, ChatResponse};
use crate::services::session::SessionError;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Outcomes of `POST /chat` other than a reply.
///
/// Every variant renders as `{"response": ...}` so clients always read one field.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Error: Chatbot model is not available.")]
    ModelUnavailable,

    #[error("Error: No message provided.")]
    NoMessage,

    #[error("An error occurred: {0}")]
    Upstream(String),
}

impl From<SessionError> for ChatError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Unavailable => ChatError::ModelUnavailable,
            SessionError::Upstream(e) => ChatError::Upstream(e.to_string()),
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = match self {
            ChatError::NoMessage => StatusCode::BAD_REQUEST,
            ChatError::ModelUnavailable | ChatError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ChatResponse::new(self.to_string()))).into_response()
    }
}

/// Relays one message to the model session.
///
/// Availability is checked before the body is looked at, so an unavailable
/// session answers 500 whatever was sent.
pub async fn chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ChatResponse>, ChatError> {
    if !state.session.is_ready().await {
        return Err(ChatError::ModelUnavailable);
    }

    let request = ChatRequest::from_body(&body);
    let Some(message) = request.trimmed_message() else {
        tracing::debug!("Rejected chat request without a message");
        return Err(ChatError::NoMessage);
    };

    let reply = state.session.send_message(message).await?;

    Ok(Json(ChatResponse::new(reply)))
}
