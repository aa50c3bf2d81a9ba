use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    error::AppError,
    utils::{optional_field, required_field},
};

#[derive(Debug, Deserialize)]
pub struct LinkTokenRequest {
    pub business_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeTokenRequest {
    pub business_id: Uuid,
    pub public_token: Option<String>,
    pub institution_name: Option<String>,
    pub account_mask: Option<String>,
}

#[derive(Debug, PartialEq)]
pub struct TokenExchange {
    pub public_token: String,
    pub institution_name: Option<String>,
    pub account_mask: Option<String>,
}

impl ExchangeTokenRequest {
    pub fn validate(self) -> Result<TokenExchange, AppError> {
        let public_token = required_field(self.public_token.as_deref(), "public_token")?.to_string();
        let account_mask = optional_field(self.account_mask);
        if let Some(mask) = &account_mask {
            if mask.len() > 4 || !mask.bytes().all(|b| b.is_ascii_digit()) {
                return Err(AppError::Validation(
                    "account_mask must be up to four digits".into(),
                ));
            }
        }
        Ok(TokenExchange {
            public_token,
            institution_name: optional_field(self.institution_name),
            account_mask,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct LinkedBank {
    pub item_id: String,
    pub institution_name: Option<String>,
}

/// access_token 只入库，不读回
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BankConnection {
    pub business_id: Uuid,
    pub plaid_item_id: String,
    pub institution_name: Option<String>,
    pub account_mask: Option<String>,
    pub connected_at: DateTime<Utc>,
}

impl BankConnection {
    pub async fn upsert(
        pool: &PgPool,
        business_id: Uuid,
        item_id: &str,
        access_token: &str,
        exchange: &TokenExchange,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, BankConnection>(
            r#"
            INSERT INTO business_bank_connections (
                business_id, plaid_item_id, plaid_access_token, institution_name,
                account_mask, connected_at
            )
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (business_id) DO UPDATE SET
                plaid_item_id = EXCLUDED.plaid_item_id,
                plaid_access_token = EXCLUDED.plaid_access_token,
                institution_name = EXCLUDED.institution_name,
                account_mask = EXCLUDED.account_mask,
                connected_at = NOW()
            RETURNING business_id, plaid_item_id, institution_name, account_mask, connected_at
            "#,
        )
        .bind(business_id)
        .bind(item_id)
        .bind(access_token)
        .bind(&exchange.institution_name)
        .bind(&exchange.account_mask)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(token: Option<&str>, mask: Option<&str>) -> ExchangeTokenRequest {
        ExchangeTokenRequest {
            business_id: Uuid::nil(),
            public_token: token.map(String::from),
            institution_name: Some("  First Bank ".into()),
            account_mask: mask.map(String::from),
        }
    }

    #[test]
    fn public_token_is_required() {
        assert_eq!(
            request(Some(" "), None).validate().unwrap_err().to_string(),
            "public_token is required"
        );
    }

    #[test]
    fn mask_must_be_digits() {
        assert!(request(Some("public-sandbox-1"), Some("12ab")).validate().is_err());
        assert!(request(Some("public-sandbox-1"), Some("12345")).validate().is_err());

        let exchange = request(Some("public-sandbox-1"), Some("0042")).validate().unwrap();
        assert_eq!(exchange.account_mask.as_deref(), Some("0042"));
        assert_eq!(exchange.institution_name.as_deref(), Some("First Bank"));
    }

    #[test]
    fn connection_json_has_no_token_field() {
        let conn = BankConnection {
            business_id: Uuid::nil(),
            plaid_item_id: "item-1".into(),
            institution_name: None,
            account_mask: Some("0042".into()),
            connected_at: Utc::now(),
        };
        let json = serde_json::to_value(&conn).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert!(!keys.iter().any(|k| k.contains("token")));
        assert_eq!(json["account_mask"], "0042");
    }
}
