//! Redis 缓存：服务分类目录变化很少，整体缓存为一条 JSON

use std::sync::Arc;
use std::time::Duration;

use redis::{AsyncCommands, Client as RedisClient};
use serde::{Serialize, de::DeserializeOwned};

pub const SERVICE_CATALOG_KEY: &str = "catalog:service_categories";

pub fn business_categories_key(business_id: &uuid::Uuid) -> String {
    format!("catalog:business:{}:categories", business_id)
}

pub struct JsonCache {
    redis: Arc<RedisClient>,
}

impl JsonCache {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }

    /// 读取失败（连接、反序列化）都按未命中处理
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.redis.get_multiplexed_async_connection().await.ok()?;
        let cached: Option<String> = conn.get(key).await.ok()?;
        let value = serde_json::from_str(&cached?).ok()?;
        tracing::debug!("cache hit: {}", key);
        Some(value)
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let Ok(json) = serde_json::to_string(value) else {
            return;
        };
        match self.redis.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                let result: Result<(), redis::RedisError> =
                    conn.set_ex(key, json, ttl.as_secs().max(1)).await;
                if let Err(e) = result {
                    tracing::warn!("failed to cache {}: {}", key, e);
                }
            }
            Err(e) => tracing::warn!("redis unavailable, skip caching {}: {}", key, e),
        }
    }

    pub async fn invalidate(&self, key: &str) {
        if let Ok(mut conn) = self.redis.get_multiplexed_async_connection().await {
            let result: Result<(), redis::RedisError> = conn.del(key).await;
            if let Err(e) = result {
                tracing::warn!("failed to invalidate {}: {}", key, e);
            }
        }
    }
}
