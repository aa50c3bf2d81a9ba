use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use crate::{
    AppState,
    error::AppError,
    routes::{business::BusinessProfile, common::JsonBody},
    utils::{Claims, required_field, success_to_api_response},
};

use super::model::{UploadImageRequest, UploadImageResponse, decode_image, object_path};

pub async fn upload_image(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<UploadImageRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(req.business_id)?;
    let data = required_field(req.data.as_deref(), "data")?;
    let image = decode_image(data, state.config.max_upload_bytes)?;

    if !BusinessProfile::exists(&state.pool, req.business_id).await? {
        return Err(AppError::not_found("business"));
    }

    let path = object_path(req.business_id, req.image_type, image.mime);
    let size_bytes = image.bytes.len();
    let url = state
        .storage
        .upload(&path, image.bytes, image.mime.content_type())
        .await?;

    if let Some(column) = req.image_type.profile_column() {
        BusinessProfile::set_image_url(&state.pool, req.business_id, column, &url).await?;
    }

    tracing::info!(
        "uploaded {} image for business {} ({} bytes, original name {:?})",
        req.image_type.as_str(),
        req.business_id,
        size_bytes,
        req.file_name
    );
    Ok((
        StatusCode::CREATED,
        success_to_api_response(UploadImageResponse {
            url,
            path,
            image_type: req.image_type,
            content_type: image.mime.content_type(),
            size_bytes,
        }),
    ))
}
