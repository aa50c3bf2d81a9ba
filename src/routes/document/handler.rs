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
    routes::common::{JsonBody, PathParam},
    utils::{Claims, success_to_api_response},
};

use super::model::{BusinessDocument, ReviewDocumentRequest};

pub async fn list_documents(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(business_id), _): PathParam<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_business(business_id)?;
    let documents = BusinessDocument::list(&state.pool, business_id).await?;
    Ok(success_to_api_response(documents))
}

pub async fn review_document(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path((business_id, document_id)), _): PathParam<(Uuid, Uuid)>,
    WithRejection(Json(req), _): JsonBody<ReviewDocumentRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_admin()?;
    let review = req.into_review(&claims.sub)?;
    let document = BusinessDocument::review(&state.pool, business_id, document_id, &review)
        .await?
        .ok_or_else(|| AppError::not_found("document"))?;
    tracing::info!(
        "document {} of business {} marked {} by {}",
        document_id,
        business_id,
        review.status.as_str(),
        claims.sub
    );
    Ok(success_to_api_response(document))
}
