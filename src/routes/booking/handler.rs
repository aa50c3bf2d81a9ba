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

use super::model::{Booking, BookingFilter, BookingStatusRequest, check_transition};

pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Query(filter), _): QueryParams<BookingFilter>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_admin()?;
    filter.validate()?;
    let (items, total) = Booking::list(&state.pool, &filter).await?;
    Ok(success_to_api_response(Paged::new(items, total, filter.page())))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(booking_id), _): PathParam<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_admin()?;
    let booking = Booking::find_by_id(&state.pool, booking_id)
        .await?
        .ok_or_else(|| AppError::not_found("booking"))?;
    Ok(success_to_api_response(booking))
}

pub async fn update_booking_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(booking_id), _): PathParam<Uuid>,
    WithRejection(Json(req), _): JsonBody<BookingStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_admin()?;
    let booking = Booking::find_by_id(&state.pool, booking_id)
        .await?
        .ok_or_else(|| AppError::not_found("booking"))?;
    check_transition(&booking.booking_status, req.status)?;

    if !Booking::set_status(&state.pool, booking_id, &booking.booking_status, req.status).await? {
        return Err(AppError::Conflict(
            "booking status was changed by another request".into(),
        ));
    }
    tracing::info!(
        "booking {} {} -> {} by {}",
        booking_id,
        booking.booking_status,
        req.status.as_str(),
        claims.sub
    );

    let booking = Booking::find_by_id(&state.pool, booking_id)
        .await?
        .ok_or_else(|| AppError::not_found("booking"))?;
    Ok(success_to_api_response(booking))
}
