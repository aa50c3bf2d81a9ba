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

use super::model::{CustomerFilter, CustomerProfile, CustomerStatusRequest};

pub async fn list_customers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Query(filter), _): QueryParams<CustomerFilter>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_admin()?;
    let (items, total) = CustomerProfile::list(&state.pool, &filter).await?;
    Ok(success_to_api_response(Paged::new(items, total, filter.page())))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(customer_id), _): PathParam<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_admin()?;
    let detail = CustomerProfile::detail(&state.pool, customer_id)
        .await?
        .ok_or_else(|| AppError::not_found("customer"))?;
    Ok(success_to_api_response(detail))
}

pub async fn set_customer_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(customer_id), _): PathParam<Uuid>,
    WithRejection(Json(req), _): JsonBody<CustomerStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_admin()?;
    let customer = CustomerProfile::set_active(&state.pool, customer_id, req.is_active)
        .await?
        .ok_or_else(|| AppError::not_found("customer"))?;
    tracing::info!(
        "customer {} is_active={} set by {}",
        customer_id,
        req.is_active,
        claims.sub
    );
    Ok(success_to_api_response(customer))
}
