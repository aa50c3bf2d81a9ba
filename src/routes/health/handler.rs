use axum::{extract::State, response::IntoResponse};
use serde::Serialize;

use crate::{AppState, utils::success_to_api_response};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: bool,
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("health check: database unreachable: {}", e);
            false
        }
    };
    success_to_api_response(HealthStatus {
        status: "ok",
        database,
    })
}
