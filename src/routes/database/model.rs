use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::{
    error::AppError,
    utils::{is_plain_identifier, quote_literal, required_field},
};

/// Postgres 枚举标签最长 63 字节
const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Deserialize)]
pub struct AddEnumValueRequest {
    pub enum_name: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub enum_name: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct EnumValues {
    pub enum_name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AddEnumValueResponse {
    pub enum_name: String,
    pub value: String,
    pub values: Vec<String>,
}

impl AddEnumValueRequest {
    pub fn validate(self) -> Result<EnumValue, AppError> {
        let enum_name = required_field(self.enum_name.as_deref(), "enum_name")?;
        let value = required_field(self.value.as_deref(), "value")?;
        validate_enum_name(enum_name)?;
        if value.len() > MAX_LABEL_LEN {
            return Err(AppError::Validation(format!(
                "value must be at most {} bytes",
                MAX_LABEL_LEN
            )));
        }
        if value.chars().any(char::is_control) {
            return Err(AppError::Validation(
                "value must not contain control characters".into(),
            ));
        }
        Ok(EnumValue {
            enum_name: enum_name.to_string(),
            value: value.to_string(),
        })
    }
}

pub fn validate_enum_name(enum_name: &str) -> Result<(), AppError> {
    if is_plain_identifier(enum_name) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "invalid enum type name: {}",
            enum_name
        )))
    }
}

/// DDL 不支持绑定参数，类型名已校验为标识符，取值做字面量转义
pub fn add_value_sql(value: &EnumValue) -> String {
    format!(
        r#"ALTER TYPE "{}" ADD VALUE IF NOT EXISTS {}"#,
        value.enum_name,
        quote_literal(&value.value)
    )
}

pub async fn enum_exists(pool: &PgPool, enum_name: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM pg_type WHERE typname = $1 AND typtype = 'e')",
    )
    .bind(enum_name)
    .fetch_one(pool)
    .await
}

pub async fn enum_labels(pool: &PgPool, enum_name: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT e.enumlabel::text
        FROM pg_enum e
        JOIN pg_type t ON t.oid = e.enumtypid
        WHERE t.typname = $1
        ORDER BY e.enumsortorder
        "#,
    )
    .bind(enum_name)
    .fetch_all(pool)
    .await
}

pub async fn add_enum_value(pool: &PgPool, value: &EnumValue) -> Result<(), sqlx::Error> {
    let sql = add_value_sql(value);
    sqlx::raw_sql(&sql).execute(pool).await?;
    Ok(())
}
