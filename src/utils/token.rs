use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    BusinessOwner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户ID
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<Uuid>,
    pub exp: i64, // 过期时间
    pub iat: i64, // 签发时间
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("admin access required".into()))
        }
    }

    /// 管理员可访问任意商家；商家账号只能访问自己的商家
    pub fn require_business(&self, business_id: Uuid) -> Result<(), AppError> {
        if self.is_admin() || self.business_id == Some(business_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "no access to the requested business".into(),
            ))
        }
    }
}

/// 令牌由认证服务签发，这里仅用于测试与运维脚本生成令牌
pub fn generate_token(
    user_id: &str,
    role: Role,
    business_id: Option<Uuid>,
    secret: &str,
    ttl: Duration,
) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = (now + ttl).timestamp();

    let claims = Claims {
        sub: user_id.to_string(),
        role,
        business_id,
        exp: expiration,
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, expiration))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}
