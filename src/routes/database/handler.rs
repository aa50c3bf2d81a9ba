use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use crate::{
    AppState,
    error::AppError,
    routes::common::{JsonBody, PathParam},
    utils::{Claims, success_to_api_response},
};

use super::model::{
    AddEnumValueRequest, AddEnumValueResponse, EnumValues, add_enum_value as add_value,
    enum_exists, enum_labels, validate_enum_name,
};

pub async fn add_enum_value(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<AddEnumValueRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_admin()?;
    let value = req.validate()?;

    if !enum_exists(&state.pool, &value.enum_name).await? {
        return Err(AppError::NotFound(format!(
            "enum type {} not found",
            value.enum_name
        )));
    }

    let already_present = enum_labels(&state.pool, &value.enum_name)
        .await?
        .contains(&value.value);
    add_value(&state.pool, &value).await?;
    let values = enum_labels(&state.pool, &value.enum_name).await?;

    tracing::info!(
        "enum {} value {:?} added by {} (existed: {})",
        value.enum_name,
        value.value,
        claims.sub,
        already_present
    );
    let status = if already_present {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        success_to_api_response(AddEnumValueResponse {
            enum_name: value.enum_name,
            value: value.value,
            values,
        }),
    ))
}

pub async fn list_enum_values(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(enum_name), _): PathParam<String>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_admin()?;
    validate_enum_name(&enum_name)?;
    if !enum_exists(&state.pool, &enum_name).await? {
        return Err(AppError::NotFound(format!("enum type {} not found", enum_name)));
    }
    let values = enum_labels(&state.pool, &enum_name).await?;
    Ok(success_to_api_response(EnumValues { enum_name, values }))
}
