use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    AppState,
    cache::{JsonCache, SERVICE_CATALOG_KEY, business_categories_key},
    error::AppError,
    routes::{
        business::BusinessProfile,
        common::{JsonBody, PathParam},
        onboarding::{OnboardingStep, mark_step_complete},
    },
    utils::{Claims, success_to_api_response},
};

use super::{
    category::{
        CategoryTree, SetCategoriesRequest, load_business_categories, load_catalog,
        missing_categories, plan_assignment, replace_business_categories, subcategory_parents,
    },
    service::{
        BusinessAddon, BusinessService, UpsertAddonRequest, UpsertServiceRequest,
        check_business_price,
    },
};

pub async fn list_service_categories(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let cache = JsonCache::new(state.redis.clone());
    if let Some(catalog) = cache.get::<Vec<CategoryTree>>(SERVICE_CATALOG_KEY).await {
        return Ok(success_to_api_response(catalog));
    }

    let catalog = load_catalog(&state.pool).await?;
    cache
        .set(SERVICE_CATALOG_KEY, &catalog, state.config.category_cache_ttl())
        .await;
    Ok(success_to_api_response(catalog))
}

pub async fn get_business_categories(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    let cache = JsonCache::new(state.redis.clone());
    let key = business_categories_key(&business_id);
    if let Some(tree) = cache.get::<Vec<CategoryTree>>(&key).await {
        return Ok(success_to_api_response(tree));
    }

    let tree = load_business_categories(&state.pool, business_id).await?;
    cache.set(&key, &tree, state.config.category_cache_ttl()).await;
    Ok(success_to_api_response(tree))
}

pub async fn set_business_categories(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
    WithRejection(Json(req), _): JsonBody<SetCategoriesRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    if !BusinessProfile::exists(&state.pool, business_id).await? {
        return Err(AppError::not_found("business"));
    }

    let parents = subcategory_parents(&state.pool, &req.subcategory_ids).await?;
    let assignment = plan_assignment(&req, &parents)?;
    let missing = missing_categories(&state.pool, &assignment.category_ids).await?;
    if let Some(id) = missing.first() {
        return Err(AppError::Validation(format!("unknown category {}", id)));
    }

    replace_business_categories(&state.pool, business_id, &assignment).await?;
    JsonCache::new(state.redis.clone())
        .invalidate(&business_categories_key(&business_id))
        .await;

    tracing::info!(
        "business {} now has {} categories and {} subcategories",
        business_id,
        assignment.category_ids.len(),
        assignment.subcategory_pairs.len()
    );
    let tree = load_business_categories(&state.pool, business_id).await?;
    Ok(success_to_api_response(tree))
}

pub async fn list_business_services(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    let services = BusinessService::list(&state.pool, business_id).await?;
    Ok(success_to_api_response(services))
}

pub async fn upsert_business_service(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path((business_id, service_id)), _): PathParam<(Uuid, Uuid)>,
    WithRejection(Json(req), _): JsonBody<UpsertServiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    let price = req.price()?;

    let min_price = BusinessService::catalog_min_price(&state.pool, service_id)
        .await?
        .ok_or_else(|| AppError::not_found("service"))?;
    check_business_price(price, min_price)?;

    let service =
        BusinessService::upsert(&state.pool, business_id, service_id, price, &req).await?;
    mark_step_complete(&state.pool, business_id, OnboardingStep::ServicesPricing).await;
    tracing::info!(
        "business {} priced service {} at {:.2}",
        business_id,
        service_id,
        price
    );
    Ok(success_to_api_response(service))
}

pub async fn delete_business_service(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path((business_id, service_id)), _): PathParam<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    if !BusinessService::delete(&state.pool, business_id, service_id).await? {
        return Err(AppError::not_found("business service"));
    }
    Ok(success_to_api_response(serde_json::json!({ "deleted": true })))
}

pub async fn list_business_addons(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    let addons = BusinessAddon::list(&state.pool, business_id).await?;
    Ok(success_to_api_response(addons))
}

pub async fn upsert_business_addon(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path((business_id, addon_id)), _): PathParam<(Uuid, Uuid)>,
    WithRejection(Json(req), _): JsonBody<UpsertAddonRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    req.validate()?;
    if !BusinessAddon::addon_exists(&state.pool, addon_id).await? {
        return Err(AppError::not_found("addon"));
    }
    let addon = BusinessAddon::upsert(&state.pool, business_id, addon_id, &req).await?;
    Ok(success_to_api_response(addon))
}

pub async fn delete_business_addon(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path((business_id, addon_id)), _): PathParam<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    if !BusinessAddon::delete(&state.pool, business_id, addon_id).await? {
        return Err(AppError::not_found("business addon"));
    }
    Ok(success_to_api_response(serde_json::json!({ "deleted": true })))
}
