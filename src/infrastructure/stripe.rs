use std::collections::HashSet;

use serde::{Deserialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::error::AppError;

const SERVICE: &str = "stripe";

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Requirements {
    #[serde(default)]
    pub currently_due: Vec<String>,
    #[serde(default)]
    pub past_due: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectAccount {
    pub id: String,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub payouts_enabled: bool,
    #[serde(default)]
    pub details_submitted: bool,
    #[serde(default)]
    pub requirements: Option<Requirements>,
}

impl ConnectAccount {
    pub fn requirements_due(&self) -> Vec<String> {
        self.requirements
            .as_ref()
            .map(|r| {
                // past_due 里的字段通常也会出现在 currently_due
                let mut seen = HashSet::new();
                r.past_due
                    .iter()
                    .chain(r.currently_due.iter())
                    .filter(|field| seen.insert(field.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountLink {
    pub url: String,
    pub expires_at: i64,
}

#[derive(Debug)]
pub struct NewConnectAccount<'a> {
    pub business_id: Uuid,
    pub business_name: &'a str,
    pub email: Option<&'a str>,
    pub country: &'a str,
    pub business_type: Option<&'a str>,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Stripe 使用 form 编码，嵌套字段写成 a[b][c]
fn account_form(new: &NewConnectAccount<'_>) -> Vec<(String, String)> {
    let mut form = vec![
        ("type".to_string(), "express".to_string()),
        ("country".to_string(), new.country.to_string()),
        (
            "capabilities[card_payments][requested]".to_string(),
            "true".to_string(),
        ),
        (
            "capabilities[transfers][requested]".to_string(),
            "true".to_string(),
        ),
        (
            "business_profile[name]".to_string(),
            new.business_name.to_string(),
        ),
        (
            "metadata[business_id]".to_string(),
            new.business_id.to_string(),
        ),
    ];
    if let Some(email) = new.email {
        form.push(("email".to_string(), email.to_string()));
    }
    if let Some(kind) = new.business_type {
        form.push(("business_type".to_string(), kind.to_string()));
    }
    form
}

/// 同一商家重复创建账户时 Stripe 返回同一个账户
fn account_idempotency_key(business_id: Uuid) -> String {
    format!("connect-account-{}", business_id)
}

async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, AppError> {
    let status = resp.status();
    if status.is_success() {
        return resp
            .json::<T>()
            .await
            .map_err(|e| AppError::upstream(SERVICE, e.to_string()));
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<StripeErrorBody>(&text)
        .ok()
        .and_then(|b| b.error.message.or(b.error.kind))
        .unwrap_or_else(|| format!("request failed with status {}", status));
    Err(AppError::upstream(SERVICE, message))
}

impl StripeClient {
    pub fn new(http: reqwest::Client, api_base: &str, secret_key: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, AppError> {
        let mut req = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(form);
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| AppError::upstream(SERVICE, e.to_string()))?;
        parse_response(resp).await
    }

    pub async fn create_express_account(
        &self,
        new: &NewConnectAccount<'_>,
    ) -> Result<ConnectAccount, AppError> {
        let key = account_idempotency_key(new.business_id);
        let account: ConnectAccount = self
            .post_form("/v1/accounts", &account_form(new), Some(&key))
            .await?;
        tracing::info!(
            "created stripe connect account {} for business {}",
            account.id,
            new.business_id
        );
        Ok(account)
    }

    pub async fn retrieve_account(&self, account_id: &str) -> Result<ConnectAccount, AppError> {
        let resp = self
            .http
            .get(format!("{}/v1/accounts/{}", self.api_base, account_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::upstream(SERVICE, e.to_string()))?;
        parse_response(resp).await
    }

    pub async fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<AccountLink, AppError> {
        let form = [
            ("account".to_string(), account_id.to_string()),
            ("refresh_url".to_string(), refresh_url.to_string()),
            ("return_url".to_string(), return_url.to_string()),
            ("type".to_string(), "account_onboarding".to_string()),
        ];
        self.post_form("/v1/account_links", &form, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{build_http_client, mock};
    use axum::{
        Form, Json, Router,
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn new_account(business_id: Uuid) -> NewConnectAccount<'static> {
        NewConnectAccount {
            business_id,
            business_name: "Glow Spa",
            email: Some("owner@glow.test"),
            country: "US",
            business_type: None,
        }
    }

    #[test]
    fn account_form_requests_capabilities() {
        let id = Uuid::new_v4();
        let form: HashMap<_, _> = account_form(&new_account(id)).into_iter().collect();
        assert_eq!(form["type"], "express");
        assert_eq!(form["capabilities[transfers][requested]"], "true");
        assert_eq!(form["capabilities[card_payments][requested]"], "true");
        assert_eq!(form["metadata[business_id]"], id.to_string());
        assert_eq!(form["email"], "owner@glow.test");
        assert!(!form.contains_key("business_type"));
    }

    #[test]
    fn requirements_merge_past_and_current() {
        let account = ConnectAccount {
            id: "acct_1".into(),
            charges_enabled: false,
            payouts_enabled: false,
            details_submitted: false,
            requirements: Some(Requirements {
                currently_due: vec!["external_account".into()],
                past_due: vec!["individual.dob.day".into()],
            }),
        };
        assert_eq!(
            account.requirements_due(),
            vec!["individual.dob.day".to_string(), "external_account".to_string()]
        );
    }

    #[test]
    fn requirements_listed_in_both_appear_once() {
        let account = ConnectAccount {
            id: "acct_1".into(),
            charges_enabled: false,
            payouts_enabled: false,
            details_submitted: false,
            requirements: Some(Requirements {
                currently_due: vec!["individual.dob.day".into(), "external_account".into()],
                past_due: vec!["external_account".into()],
            }),
        };
        assert_eq!(
            account.requirements_due(),
            vec!["external_account".to_string(), "individual.dob.day".to_string()]
        );
    }

    #[tokio::test]
    async fn creates_account_and_link_against_mock() {
        let business_id = Uuid::new_v4();
        let expected_key = format!("connect-account-{}", business_id);
        let router = Router::new()
            .route(
                "/v1/accounts",
                post(
                    move |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| async move {
                        assert_eq!(headers["authorization"], "Bearer sk_test_123");
                        assert_eq!(headers["idempotency-key"], expected_key.as_str());
                        assert_eq!(form["country"], "US");
                        Json(json!({"id": "acct_42", "details_submitted": false}))
                    },
                ),
            )
            .route(
                "/v1/account_links",
                post(|headers: HeaderMap, Form(form): Form<HashMap<String, String>>| async move {
                    assert!(!headers.contains_key("idempotency-key"));
                    assert_eq!(form["type"], "account_onboarding");
                    Json(json!({
                        "url": format!("https://connect.stripe.test/{}", form["account"]),
                        "expires_at": 1700000000
                    }))
                }),
            );
        let base = mock::spawn(router).await;
        let client = StripeClient::new(build_http_client(), &base, "sk_test_123");

        let account = client
            .create_express_account(&new_account(business_id))
            .await
            .unwrap();
        assert_eq!(account.id, "acct_42");
        assert!(!account.details_submitted);

        let link = client
            .create_account_link(&account.id, "http://r", "http://t")
            .await
            .unwrap();
        assert_eq!(link.url, "https://connect.stripe.test/acct_42");
        assert_eq!(link.expires_at, 1700000000);
    }

    #[tokio::test]
    async fn stripe_error_message_is_surfaced() {
        let router = Router::new().route(
            "/v1/accounts/{id}",
            get(|Path(id): Path<String>| async move {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({"error": {
                        "message": format!("No such account: '{}'", id),
                        "type": "invalid_request_error"
                    }})),
                )
            }),
        );
        let base = mock::spawn(router).await;
        let client = StripeClient::new(build_http_client(), &base, "sk_test_123");

        let err = client.retrieve_account("acct_missing").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "stripe error: No such account: 'acct_missing'"
        );
    }
}
