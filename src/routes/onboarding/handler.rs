use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    AppState,
    business_hours::BusinessHours,
    error::AppError,
    routes::{
        business::{BusinessProfile, UpdateBusinessProfileRequest},
        common::{JsonBody, PathParam},
    },
    utils::{Claims, success_to_api_response},
};

use super::model::{
    OnboardingStep, ProgressSummary, SetupProgress, TaxInfo, TaxInfoRequest, UpdateProgressRequest,
    mark_step_complete,
};

#[derive(Debug, Serialize)]
pub struct OnboardingProfile {
    pub profile: BusinessProfile,
    pub business_hours_summary: Vec<String>,
    pub progress: ProgressSummary,
}

fn hours_summary(profile: &BusinessProfile) -> Vec<String> {
    match profile.business_hours.as_ref().map(BusinessHours::parse) {
        Some(Ok(hours)) => hours.summary(),
        Some(Err(e)) => {
            tracing::warn!("business {} has malformed hours: {}", profile.id, e);
            Vec::new()
        }
        None => Vec::new(),
    }
}

pub async fn get_business_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    let profile = BusinessProfile::find_by_id(&state.pool, business_id)
        .await?
        .ok_or_else(|| AppError::not_found("business profile"))?;
    let progress = SetupProgress::load(&state.pool, business_id).await?;

    Ok(success_to_api_response(OnboardingProfile {
        business_hours_summary: hours_summary(&profile),
        profile,
        progress,
    }))
}

pub async fn update_business_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
    WithRejection(Json(req), _): JsonBody<UpdateBusinessProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    let changes = req.validate()?;

    let profile = BusinessProfile::update(&state.pool, business_id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("business profile"))?;

    mark_step_complete(&state.pool, business_id, OnboardingStep::BusinessInfo).await;
    if changes.touches_hours() {
        mark_step_complete(&state.pool, business_id, OnboardingStep::BusinessHours).await;
    }
    let progress = SetupProgress::load(&state.pool, business_id).await?;

    tracing::info!("onboarding profile updated for business {}", business_id);
    Ok(success_to_api_response(OnboardingProfile {
        business_hours_summary: hours_summary(&profile),
        profile,
        progress,
    }))
}

pub async fn get_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    let progress = SetupProgress::load(&state.pool, business_id).await?;
    Ok(success_to_api_response(progress))
}

pub async fn update_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
    WithRejection(Json(req), _): JsonBody<UpdateProgressRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    if !BusinessProfile::exists(&state.pool, business_id).await? {
        return Err(AppError::not_found("business profile"));
    }
    let progress =
        SetupProgress::set_step(&state.pool, business_id, req.step, req.completed).await?;
    tracing::info!(
        "business {} step {} completed={}",
        business_id,
        req.step.as_str(),
        req.completed
    );
    Ok(success_to_api_response(progress))
}

pub async fn get_tax_info(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    let info = TaxInfo::find(&state.pool, business_id)
        .await?
        .ok_or_else(|| AppError::not_found("tax info"))?;
    Ok(success_to_api_response(info.masked()))
}

pub async fn put_tax_info(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
    WithRejection(Json(req), _): JsonBody<TaxInfoRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    let info = req.validate(business_id)?;
    if !BusinessProfile::exists(&state.pool, business_id).await? {
        return Err(AppError::not_found("business profile"));
    }

    let saved = info.upsert(&state.pool).await?;
    mark_step_complete(&state.pool, business_id, OnboardingStep::TaxInfo).await;
    tracing::info!("tax info saved for business {}", business_id);
    Ok(success_to_api_response(saved.masked()))
}
