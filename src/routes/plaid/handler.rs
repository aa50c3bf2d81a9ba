use axum::{Extension, Json, extract::State, response::IntoResponse};
use axum_extra::extract::WithRejection;

use crate::{
    AppState,
    error::AppError,
    routes::{
        business::BusinessProfile,
        common::JsonBody,
        onboarding::{OnboardingStep, mark_step_complete},
    },
    utils::{Claims, success_to_api_response},
};

use super::model::{BankConnection, ExchangeTokenRequest, LinkTokenRequest, LinkedBank};

pub async fn create_link_token(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<LinkTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(req.business_id)?;
    let business = BusinessProfile::find_by_id(&state.pool, req.business_id)
        .await?
        .ok_or_else(|| AppError::not_found("business"))?;

    let token = state
        .plaid
        .create_link_token(&business.id.to_string(), &business.business_name)
        .await?;
    Ok(success_to_api_response(token))
}

pub async fn exchange_public_token(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<ExchangeTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(req.business_id)?;
    let business_id = req.business_id;
    let exchange = req.validate()?;
    if !BusinessProfile::exists(&state.pool, business_id).await? {
        return Err(AppError::not_found("business"));
    }

    let tokens = state.plaid.exchange_public_token(&exchange.public_token).await?;
    let connection = BankConnection::upsert(
        &state.pool,
        business_id,
        &tokens.item_id,
        &tokens.access_token,
        &exchange,
    )
    .await?;
    mark_step_complete(&state.pool, business_id, OnboardingStep::BankLink).await;
    tracing::info!(
        "bank linked for business {} (item {})",
        business_id,
        connection.plaid_item_id
    );

    Ok(success_to_api_response(LinkedBank {
        item_id: connection.plaid_item_id,
        institution_name: connection.institution_name,
    }))
}
