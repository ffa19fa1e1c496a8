use crate::models::{HealthResponse, HealthStatus};
use crate::AppState;
use axum::{extract::State, Json};
use chrono::{SecondsFormat, Utc};

/// Reports whether the model session can serve chat traffic.
///
/// Always 200; only local state is consulted.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.session.is_ready().await {
        HealthStatus::Ok
    } else {
        HealthStatus::Unavailable
    };

    Json(HealthResponse {
        status,
        model: state.session.model_id().to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
    })
}
