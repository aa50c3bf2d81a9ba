use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    infrastructure::ConnectAccount,
    utils::{optional_field, validate_email},
};

const DEFAULT_COUNTRY: &str = "US";

#[derive(Debug, Default, Deserialize)]
pub struct ConnectAccountRequest {
    pub business_id: Uuid,
    pub email: Option<String>,
    pub country: Option<String>,
    pub business_type: Option<String>,
}

#[derive(Debug, PartialEq)]
pub struct ConnectAccountParams {
    pub email: Option<String>,
    pub country: String,
    pub business_type: Option<String>,
}

impl ConnectAccountRequest {
    pub fn validate(&self) -> Result<ConnectAccountParams, AppError> {
        let country = optional_field(self.country.clone())
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or_else(|| DEFAULT_COUNTRY.to_string());
        if country.len() != 2 || !country.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(AppError::Validation(
                "country must be a two-letter ISO code".into(),
            ));
        }

        let business_type = optional_field(self.business_type.clone())
            .map(|t| t.to_ascii_lowercase());
        if let Some(kind) = &business_type {
            if kind != "individual" && kind != "company" {
                return Err(AppError::Validation(
                    "business_type must be individual or company".into(),
                ));
            }
        }

        let email = optional_field(self.email.clone());
        if let Some(email) = &email {
            validate_email(email)?;
        }

        Ok(ConnectAccountParams {
            email,
            country,
            business_type,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct OnboardingLink {
    pub account_id: String,
    pub onboarding_url: String,
    pub expires_at: i64,
}

#[derive(Debug, Serialize)]
pub struct AccountStatus {
    pub account_id: String,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub details_submitted: bool,
    pub requirements_due: Vec<String>,
}

impl From<ConnectAccount> for AccountStatus {
    fn from(account: ConnectAccount) -> Self {
        let requirements_due = account.requirements_due();
        Self {
            account_id: account.id,
            charges_enabled: account.charges_enabled,
            payouts_enabled: account.payouts_enabled,
            details_submitted: account.details_submitted,
            requirements_due,
        }
    }
}

/// Stripe 账户链接的回跳地址 (refresh, return)
pub fn onboarding_urls(portal_base_url: &str) -> (String, String) {
    let base = portal_base_url.trim_end_matches('/');
    (
        format!("{}/onboarding/stripe/refresh", base),
        format!("{}/onboarding/stripe/return", base),
    )
}

/// 并发创建时以库里已保存的账户为准
pub fn linked_account(stored: Option<String>, created: String) -> String {
    match stored {
        Some(id) if !id.is_empty() => id,
        _ => created,
    }
}
