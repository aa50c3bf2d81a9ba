use std::env;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    pub plaid_client_id: String,
    pub plaid_secret: String,
    pub plaid_env_url: String,
    pub storage_url: String,
    pub storage_service_key: String,
    pub storage_bucket: String,
    pub portal_base_url: String,
    pub max_upload_bytes: usize,
    pub category_cache_secs: u64,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            redis_url: required("REDIS_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            server_host: optional("SERVER_HOST", "::"),
            server_port: parsed("SERVER_PORT", 3000),
            api_base_uri: normalize_base_uri(&optional("API_BASE_URI", "/api")),
            rate_limit_window_secs: parsed("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: parsed("RATE_LIMIT_REQUESTS", 100),
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_api_base: optional("STRIPE_API_BASE", "https://api.stripe.com"),
            plaid_client_id: optional("PLAID_CLIENT_ID", ""),
            plaid_secret: optional("PLAID_SECRET", ""),
            plaid_env_url: optional("PLAID_ENV_URL", "https://sandbox.plaid.com"),
            storage_url: required("STORAGE_URL")?,
            storage_service_key: required("STORAGE_SERVICE_KEY")?,
            storage_bucket: optional("STORAGE_BUCKET", "business-images"),
            portal_base_url: optional("PORTAL_BASE_URL", "http://localhost:5173"),
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", 5 * 1024 * 1024),
            category_cache_secs: parsed("CATEGORY_CACHE_SECS", 600),
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn category_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.category_cache_secs)
    }
}

/// 统一成 "/api" 形式：有前导斜杠，无尾部斜杠
fn normalize_base_uri(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_uri_is_normalized() {
        assert_eq!(normalize_base_uri("/api/"), "/api");
        assert_eq!(normalize_base_uri("api"), "/api");
        assert_eq!(normalize_base_uri("  /v1/admin  "), "/v1/admin");
        assert_eq!(normalize_base_uri(""), "/");
    }
}
