use axum::{
    Extension, Json,
    extract::{Path, Query, State},
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
        common::{JsonBody, Paged, PathParam, QueryParams},
    },
    utils::{Claims, success_to_api_response},
};

use super::model::{CreateProviderRequest, Provider, ProviderFilter, UpdateProviderRequest};

async fn load_provider(state: &AppState, claims: &Claims, id: Uuid) -> Result<Provider, AppError> {
    let provider = Provider::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("provider"))?;
    claims.require_business(provider.business_id)?;
    Ok(provider)
}

/// 服务人员只能挂在本商家的门店下
async fn check_location(
    state: &AppState,
    business_id: Uuid,
    location_id: Option<Uuid>,
) -> Result<(), AppError> {
    let Some(location_id) = location_id else {
        return Ok(());
    };
    if !Provider::location_belongs(&state.pool, location_id, business_id).await? {
        return Err(AppError::Validation(
            "location does not belong to this business".into(),
        ));
    }
    Ok(())
}

pub async fn list_providers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Query(filter), _): QueryParams<ProviderFilter>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_admin()?;
    let (items, total) = Provider::list(&state.pool, &filter).await?;
    Ok(success_to_api_response(Paged::new(items, total, filter.page())))
}

pub async fn list_business_providers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
    WithRejection(Query(mut filter), _): QueryParams<ProviderFilter>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    filter.business_id = Some(business_id);
    let (items, total) = Provider::list(&state.pool, &filter).await?;
    Ok(success_to_api_response(Paged::new(items, total, filter.page())))
}

pub async fn get_provider(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(provider_id), _): PathParam<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let provider = load_provider(&state, &claims, provider_id).await?;
    Ok(success_to_api_response(provider))
}

pub async fn create_provider(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
    WithRejection(Json(req), _): JsonBody<CreateProviderRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    let new = req.validate()?;
    if !BusinessProfile::exists(&state.pool, business_id).await? {
        return Err(AppError::not_found("business"));
    }
    check_location(&state, business_id, new.location_id).await?;
    let provider = Provider::create(&state.pool, business_id, &new).await?;
    tracing::info!("provider {} added to business {}", provider.id, business_id);
    Ok((StatusCode::CREATED, success_to_api_response(provider)))
}

pub async fn update_provider(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(provider_id), _): PathParam<Uuid>,
    WithRejection(Json(req), _): JsonBody<UpdateProviderRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_admin()?;
    let changes = req.validate()?;
    if changes.location_id.is_some() {
        let current = Provider::find_by_id(&state.pool, provider_id)
            .await?
            .ok_or_else(|| AppError::not_found("provider"))?;
        check_location(&state, current.business_id, changes.location_id).await?;
    }
    let provider = Provider::update(&state.pool, provider_id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("provider"))?;
    tracing::info!("provider {} updated by {}", provider_id, claims.sub);
    Ok(success_to_api_response(provider))
}

pub async fn delete_provider(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(provider_id), _): PathParam<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    load_provider(&state, &claims, provider_id).await?;
    Provider::delete(&state.pool, provider_id).await?;
    tracing::info!("provider {} deleted by {}", provider_id, claims.sub);
    Ok(success_to_api_response(serde_json::json!({ "deleted": true })))
}
