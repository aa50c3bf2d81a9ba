use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    AppState,
    error::AppError,
    infrastructure::NewConnectAccount,
    routes::{
        business::BusinessProfile,
        common::{JsonBody, PathParam},
        onboarding::{OnboardingStep, mark_step_complete},
    },
    utils::{Claims, success_to_api_response},
};

use super::model::{
    AccountStatus, ConnectAccountRequest, OnboardingLink, linked_account, onboarding_urls,
};

pub async fn create_connect_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<ConnectAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(req.business_id)?;
    let params = req.validate()?;
    let business = BusinessProfile::find_by_id(&state.pool, req.business_id)
        .await?
        .ok_or_else(|| AppError::not_found("business"))?;

    let account_id = match business.stripe_account_id.as_deref() {
        Some(existing) if !existing.is_empty() => {
            tracing::info!(
                "reusing stripe account {} for business {}",
                existing,
                business.id
            );
            existing.to_string()
        }
        _ => {
            let email = params.email.as_deref().or(business.contact_email.as_deref());
            let account = state
                .stripe
                .create_express_account(&NewConnectAccount {
                    business_id: business.id,
                    business_name: &business.business_name,
                    email,
                    country: &params.country,
                    business_type: params.business_type.as_deref(),
                })
                .await?;
            if BusinessProfile::set_stripe_account(&state.pool, business.id, &account.id).await? {
                account.id
            } else {
                let stored = BusinessProfile::stripe_account_id(&state.pool, business.id).await?;
                let linked = linked_account(stored, account.id);
                tracing::warn!(
                    "business {} already linked to stripe account {}",
                    business.id,
                    linked
                );
                linked
            }
        }
    };

    let (refresh_url, return_url) = onboarding_urls(&state.config.portal_base_url);
    let link = state
        .stripe
        .create_account_link(&account_id, &refresh_url, &return_url)
        .await?;

    Ok(success_to_api_response(OnboardingLink {
        account_id,
        onboarding_url: link.url,
        expires_at: link.expires_at,
    }))
}

pub async fn get_account_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    let business = BusinessProfile::find_by_id(&state.pool, business_id)
        .await?
        .ok_or_else(|| AppError::not_found("business"))?;
    let account_id = business
        .stripe_account_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::not_found("stripe account"))?;

    let account = state.stripe.retrieve_account(&account_id).await?;
    if account.details_submitted {
        mark_step_complete(&state.pool, business_id, OnboardingStep::StripeConnect).await;
    }
    Ok(success_to_api_response(AccountStatus::from(account)))
}
