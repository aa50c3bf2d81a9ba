use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;

use crate::error::AppError;

const SERVICE: &str = "plaid";

#[derive(Clone)]
pub struct PlaidClient {
    http: reqwest::Client,
    env_url: String,
    client_id: String,
    secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkToken {
    pub link_token: String,
    pub expiration: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicTokenExchange {
    pub access_token: String,
    pub item_id: String,
}

#[derive(Deserialize)]
struct PlaidErrorBody {
    error_message: Option<String>,
    error_code: Option<String>,
}

impl PlaidClient {
    pub fn new(http: reqwest::Client, env_url: &str, client_id: &str, secret: &str) -> Self {
        Self {
            http,
            env_url: env_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            secret: secret.to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.secret.is_empty()
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        mut body: serde_json::Value,
    ) -> Result<T, AppError> {
        if !self.is_configured() {
            return Err(AppError::Internal("plaid credentials are not configured".into()));
        }
        body["client_id"] = json!(self.client_id);
        body["secret"] = json!(self.secret);

        let resp = self
            .http
            .post(format!("{}{}", self.env_url, path))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::upstream(SERVICE, e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<T>()
                .await
                .map_err(|e| AppError::upstream(SERVICE, e.to_string()));
        }
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<PlaidErrorBody>(&text)
            .ok()
            .and_then(|b| b.error_message.or(b.error_code))
            .unwrap_or_else(|| format!("request failed with status {}", status));
        Err(AppError::upstream(SERVICE, message))
    }

    /// 为商家生成 Plaid Link 所需的 link_token
    pub async fn create_link_token(
        &self,
        client_user_id: &str,
        client_name: &str,
    ) -> Result<LinkToken, AppError> {
        self.post(
            "/link/token/create",
            json!({
                "client_name": client_name,
                "user": { "client_user_id": client_user_id },
                "products": ["auth"],
                "country_codes": ["US"],
                "language": "en",
            }),
        )
        .await
    }

    pub async fn exchange_public_token(
        &self,
        public_token: &str,
    ) -> Result<PublicTokenExchange, AppError> {
        self.post(
            "/item/public_token/exchange",
            json!({ "public_token": public_token }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{build_http_client, mock};
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::Value;

    #[tokio::test]
    async fn link_token_request_carries_credentials() {
        let router = Router::new().route(
            "/link/token/create",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["client_id"], "cid");
                assert_eq!(body["secret"], "sec");
                assert_eq!(body["user"]["client_user_id"], "biz-1");
                Json(json!({
                    "link_token": "link-sandbox-abc",
                    "expiration": "2026-10-18T12:00:00Z",
                    "request_id": "r1"
                }))
            }),
        );
        let base = mock::spawn(router).await;
        let client = PlaidClient::new(build_http_client(), &base, "cid", "sec");

        let token = client.create_link_token("biz-1", "Glow Spa").await.unwrap();
        assert_eq!(token.link_token, "link-sandbox-abc");
    }

    #[tokio::test]
    async fn exchange_error_is_surfaced() {
        let router = Router::new().route(
            "/item/public_token/exchange",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error_code": "INVALID_PUBLIC_TOKEN",
                        "error_message": "provided public token is expired"
                    })),
                )
            }),
        );
        let base = mock::spawn(router).await;
        let client = PlaidClient::new(build_http_client(), &base, "cid", "sec");

        let err = client.exchange_public_token("public-x").await.unwrap_err();
        assert_eq!(err.to_string(), "plaid error: provided public token is expired");
    }

    #[tokio::test]
    async fn missing_credentials_fail_fast() {
        let client = PlaidClient::new(build_http_client(), "http://127.0.0.1:9", "", "");
        assert!(matches!(
            client.exchange_public_token("public-x").await,
            Err(AppError::Internal(_))
        ));
    }
}
