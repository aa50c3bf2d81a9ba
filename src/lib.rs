use std::sync::Arc;

use axum::Router;
use config::Config;
use infrastructure::{PlaidClient, StorageClient, StripeClient, build_http_client};
use redis::Client as RedisClient;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

pub mod business_hours;
pub mod cache;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod middleware;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis: Arc<RedisClient>,
    pub stripe: StripeClient,
    pub plaid: PlaidClient,
    pub storage: StorageClient,
}

impl AppState {
    pub fn new(pool: PgPool, redis: Arc<RedisClient>, config: Config) -> Self {
        let http = build_http_client();
        Self {
            stripe: StripeClient::new(http.clone(), &config.stripe_api_base, &config.stripe_secret_key),
            plaid: PlaidClient::new(
                http.clone(),
                &config.plaid_env_url,
                &config.plaid_client_id,
                &config.plaid_secret,
            ),
            storage: StorageClient::new(
                http,
                &config.storage_url,
                &config.storage_service_key,
                &config.storage_bucket,
            ),
            pool,
            redis,
            config,
        }
    }
}

/// 组装全部路由：公开路由 + 需认证路由，挂在 api_base_uri 下
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::public_routes())
        .merge(
            routes::protected_routes(state.config.max_upload_bytes).layer(
                axum::middleware::from_fn_with_state(state.clone(), middleware::auth_middleware),
            ),
        )
        .method_not_allowed_fallback(middleware::method_not_allowed);

    let base = state.config.api_base_uri.clone();
    let router = if base == "/" {
        api
    } else {
        Router::new().nest(&base, api)
    };

    router
        .fallback(middleware::not_found)
        .method_not_allowed_fallback(middleware::method_not_allowed)
        .layer(axum::middleware::from_fn(middleware::log_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
