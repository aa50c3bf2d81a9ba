use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    AppState,
    error::AppError,
    routes::{
        business::BusinessProfile,
        common::{JsonBody, PathParam},
    },
    utils::{Claims, success_to_api_response},
};

use super::model::{BusinessLocation, LocationRequest};

pub async fn list_locations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    let locations = BusinessLocation::list(&state.pool, business_id).await?;
    Ok(success_to_api_response(locations))
}

pub async fn create_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
    WithRejection(Json(req), _): JsonBody<LocationRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    let new = req.into_new()?;
    if !BusinessProfile::exists(&state.pool, business_id).await? {
        return Err(AppError::not_found("business"));
    }
    let location = BusinessLocation::create(&state.pool, business_id, &new).await?;
    tracing::info!("location {} created for business {}", location.id, business_id);
    Ok((StatusCode::CREATED, success_to_api_response(location)))
}

pub async fn update_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path((business_id, location_id)), _): PathParam<(Uuid, Uuid)>,
    WithRejection(Json(req), _): JsonBody<LocationRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    let changes = req.into_changes()?;
    let location = BusinessLocation::update(&state.pool, business_id, location_id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("location"))?;
    Ok(success_to_api_response(location))
}

pub async fn delete_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path((business_id, location_id)), _): PathParam<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    if !BusinessLocation::delete(&state.pool, business_id, location_id).await? {
        return Err(AppError::not_found("location"));
    }
    tracing::info!("location {} deleted from business {}", location_id, business_id);
    Ok(success_to_api_response(serde_json::json!({ "deleted": true })))
}
