use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    AppState,
    error::AppError,
    routes::common::{JsonBody, Paged, PathParam, QueryParams},
    utils::{Claims, success_to_api_response},
};

use super::model::{BusinessFilter, BusinessProfile, UpdateBusinessProfileRequest, VerificationRequest};

pub async fn list_businesses(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Query(filter), _): QueryParams<BusinessFilter>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_admin()?;
    let (items, total) = BusinessProfile::list(&state.pool, &filter).await?;
    Ok(success_to_api_response(Paged::new(items, total, filter.page())))
}

pub async fn get_business(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    let detail = BusinessProfile::detail(&state.pool, business_id)
        .await?
        .ok_or_else(|| AppError::not_found("business"))?;
    Ok(success_to_api_response(detail))
}

pub async fn update_business(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
    WithRejection(Json(req), _): JsonBody<UpdateBusinessProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_admin()?;
    let changes = req.validate()?;
    let profile = BusinessProfile::update(&state.pool, business_id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("business"))?;
    tracing::info!("business {} updated by {}", business_id, claims.sub);
    Ok(success_to_api_response(profile))
}

pub async fn set_verification(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
    WithRejection(Json(req), _): JsonBody<VerificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_admin()?;
    let (status, reason) = req.validate()?;
    let profile =
        BusinessProfile::set_verification(&state.pool, business_id, status, reason.as_deref())
            .await?
            .ok_or_else(|| AppError::not_found("business"))?;
    tracing::info!(
        "business {} marked {} by {}",
        business_id,
        status.as_str(),
        claims.sub
    );
    Ok(success_to_api_response(profile))
}

pub async fn delete_business(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_admin()?;
    if !BusinessProfile::delete(&state.pool, business_id).await? {
        return Err(AppError::not_found("business"));
    }
    tracing::info!("business {} deleted by {}", business_id, claims.sub);
    Ok(success_to_api_response(serde_json::json!({ "deleted": true })))
}
