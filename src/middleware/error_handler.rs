use axum::{
    body::{Body, to_bytes},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::error;

use crate::error::AppError;

const MAX_LOGGED_BODY: usize = 4096;

pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;

    if response.status().is_server_error() {
        let (mut parts, body) = response.into_parts();
        let bytes = match to_bytes(body, MAX_LOGGED_BODY).await {
            Ok(b) => b,
            Err(e) => {
                error!("Failed to read error response body: {}", e);
                parts.headers.remove(axum::http::header::CONTENT_LENGTH);
                return Response::from_parts(parts, Body::empty());
            }
        };
        let body_str = String::from_utf8_lossy(&bytes);

        error!(
            "Server error occurred - {} {} - Status: {}, Body: {}",
            method, uri, parts.status, body_str
        );

        // body 已被读取，需要重新构建响应
        parts.headers.remove(axum::http::header::CONTENT_LENGTH);
        Response::from_parts(parts, Body::from(bytes))
    } else {
        response
    }
}

pub async fn not_found() -> AppError {
    AppError::NotFound("route not found".into())
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        http::{StatusCode, header::CONTENT_LENGTH},
        middleware::from_fn,
        routing::get,
    };
    use tower::ServiceExt;

    fn app(body_len: usize) -> Router {
        Router::new()
            .route(
                "/boom",
                get(move || async move {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        [(CONTENT_LENGTH, body_len.to_string())],
                        "x".repeat(body_len),
                    )
                }),
            )
            .layer(from_fn(log_errors))
    }

    async fn call(body_len: usize) -> (Response, usize) {
        let response = app(body_len)
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let (parts, body) = response.into_parts();
        let bytes = to_bytes(body, usize::MAX).await.unwrap();
        (Response::from_parts(parts, Body::empty()), bytes.len())
    }

    #[tokio::test]
    async fn small_error_body_is_passed_through() {
        let (response, len) = call(32).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(len, 32);
        assert!(response.headers().get(CONTENT_LENGTH).is_none());
    }

    #[tokio::test]
    async fn oversized_error_body_drops_stale_length() {
        let (response, len) = call(MAX_LOGGED_BODY + 1000).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(len, 0);
        assert!(response.headers().get(CONTENT_LENGTH).is_none());
    }
}
