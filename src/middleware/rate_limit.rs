use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::AsyncCommands;

use crate::{config::Config, error::AppError};

#[derive(Clone)]
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    config: Arc<Config>,
}

/// 优先使用代理头中的客户端 IP，否则退回到连接地址
pub fn client_ip(req: &Request<Body>) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    req.headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

impl RateLimiter {
    pub fn new(redis: Arc<redis::Client>, config: Config) -> Self {
        Self {
            redis,
            config: Arc::new(config),
        }
    }

    pub async fn check_rate_limit(&self, req: Request<Body>, next: Next) -> Response {
        let key = format!("rate_limit:{}", client_ip(&req));

        match self.hit(&key).await {
            Ok(count) if count > self.config.rate_limit_requests as i64 => {
                tracing::warn!("rate limit exceeded for {}", key);
                AppError::RateLimited(self.config.rate_limit_window_secs).into_response()
            }
            Ok(_) => next.run(req).await,
            Err(e) => {
                // redis 不可用时不阻断请求
                tracing::error!("rate limiter unavailable: {}", e);
                next.run(req).await
            }
        }
    }

    async fn hit(&self, key: &str) -> Result<i64, redis::RedisError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let count: i64 = conn.incr(key, 1).await?;
        if count == 1 {
            let _: () = conn
                .expire(key, self.config.rate_limit_window().as_secs() as i64)
                .await?;
        }
        Ok(count)
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}
