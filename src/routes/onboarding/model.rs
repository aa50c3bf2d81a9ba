use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    error::AppError,
    utils::{optional_field, required_field, validate_email},
};

/// 入驻向导的步骤，声明顺序即展示顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    BusinessInfo,
    TaxInfo,
    StripeConnect,
    BankLink,
    ServicesPricing,
    BusinessHours,
    Review,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[serde(rename = "phase_1")]
    Phase1,
    #[serde(rename = "phase_2")]
    Phase2,
    Complete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Phase1 => "phase_1",
            Phase::Phase2 => "phase_2",
            Phase::Complete => "complete",
        }
    }
}

impl OnboardingStep {
    pub const ALL: [OnboardingStep; 7] = [
        OnboardingStep::BusinessInfo,
        OnboardingStep::TaxInfo,
        OnboardingStep::StripeConnect,
        OnboardingStep::BankLink,
        OnboardingStep::ServicesPricing,
        OnboardingStep::BusinessHours,
        OnboardingStep::Review,
    ];

    /// 快速设置向导只包含这三步
    pub const QUICK_SETUP: [OnboardingStep; 3] = [
        OnboardingStep::BusinessHours,
        OnboardingStep::ServicesPricing,
        OnboardingStep::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingStep::BusinessInfo => "business_info",
            OnboardingStep::TaxInfo => "tax_info",
            OnboardingStep::StripeConnect => "stripe_connect",
            OnboardingStep::BankLink => "bank_link",
            OnboardingStep::ServicesPricing => "services_pricing",
            OnboardingStep::BusinessHours => "business_hours",
            OnboardingStep::Review => "review",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }

    pub fn phase(&self) -> Phase {
        match self {
            OnboardingStep::BusinessInfo | OnboardingStep::TaxInfo => Phase::Phase1,
            _ => Phase::Phase2,
        }
    }
}

pub fn percent_complete(completed: &BTreeSet<OnboardingStep>, steps: &[OnboardingStep]) -> u8 {
    if steps.is_empty() {
        return 100;
    }
    let done = steps.iter().filter(|s| completed.contains(s)).count();
    ((done as f64 * 100.0) / steps.len() as f64).round() as u8
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub current_step: Option<OnboardingStep>,
    pub completed_steps: Vec<OnboardingStep>,
    pub phase: Phase,
    pub percent_complete: u8,
    pub quick_setup_percent: u8,
    pub next_step: Option<OnboardingStep>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressSummary {
    pub fn build(
        current_step: Option<OnboardingStep>,
        completed: &BTreeSet<OnboardingStep>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        // 步骤顺序不强制，下一步取第一个未完成的步骤
        let next_step = OnboardingStep::ALL
            .into_iter()
            .find(|s| !completed.contains(s));
        Self {
            current_step,
            completed_steps: completed.iter().copied().collect(),
            phase: next_step.map(|s| s.phase()).unwrap_or(Phase::Complete),
            percent_complete: percent_complete(completed, &OnboardingStep::ALL),
            quick_setup_percent: percent_complete(completed, &OnboardingStep::QUICK_SETUP),
            next_step,
            updated_at,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.next_step.is_none()
    }
}

#[derive(Debug, FromRow)]
struct ProgressRow {
    current_step: Option<String>,
    completed_steps: Vec<String>,
    updated_at: DateTime<Utc>,
}

impl ProgressRow {
    fn completed(&self) -> BTreeSet<OnboardingStep> {
        self.completed_steps
            .iter()
            .filter_map(|s| OnboardingStep::parse(s))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProgressRequest {
    pub step: OnboardingStep,
    #[serde(default = "default_completed")]
    pub completed: bool,
}

fn default_completed() -> bool {
    true
}

pub struct SetupProgress;

impl SetupProgress {
    pub async fn load(pool: &PgPool, business_id: Uuid) -> Result<ProgressSummary, sqlx::Error> {
        let row = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT current_step, completed_steps, updated_at
            FROM business_setup_progress
            WHERE business_id = $1
            "#,
        )
        .bind(business_id)
        .fetch_optional(pool)
        .await?;

        Ok(match row {
            Some(row) => ProgressSummary::build(
                row.current_step.as_deref().and_then(OnboardingStep::parse),
                &row.completed(),
                Some(row.updated_at),
            ),
            None => ProgressSummary::build(None, &BTreeSet::new(), None),
        })
    }

    /// 记录某一步的完成状态；全部完成时同步标记商家 setup_completed
    pub async fn set_step(
        pool: &PgPool,
        business_id: Uuid,
        step: OnboardingStep,
        completed: bool,
    ) -> Result<ProgressSummary, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT current_step, completed_steps, updated_at
            FROM business_setup_progress
            WHERE business_id = $1
            FOR UPDATE
            "#,
        )
        .bind(business_id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut done = existing.map(|r| r.completed()).unwrap_or_default();
        if completed {
            done.insert(step);
        } else {
            done.remove(&step);
        }
        let summary = ProgressSummary::build(Some(step), &done, Some(Utc::now()));
        let steps: Vec<String> = done.iter().map(|s| s.as_str().to_string()).collect();

        sqlx::query(
            r#"
            INSERT INTO business_setup_progress (business_id, current_step, completed_steps, phase, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (business_id) DO UPDATE SET
                current_step = EXCLUDED.current_step,
                completed_steps = EXCLUDED.completed_steps,
                phase = EXCLUDED.phase,
                updated_at = NOW()
            "#,
        )
        .bind(business_id)
        .bind(step.as_str())
        .bind(&steps)
        .bind(summary.phase.as_str())
        .execute(&mut *tx)
        .await?;

        if summary.is_complete() {
            sqlx::query("UPDATE business_profiles SET setup_completed = TRUE WHERE id = $1")
                .bind(business_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(summary)
    }
}

/// 其它流程（税务、Stripe、银行）完成后顺带记录进度，失败只记日志
pub async fn mark_step_complete(pool: &PgPool, business_id: Uuid, step: OnboardingStep) {
    if let Err(e) = SetupProgress::set_step(pool, business_id, step, true).await {
        tracing::warn!(
            "failed to record onboarding step {} for {}: {}",
            step.as_str(),
            business_id,
            e
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxIdType {
    Ein,
    Ssn,
}

impl TaxIdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxIdType::Ein => "ein",
            TaxIdType::Ssn => "ssn",
        }
    }
}

/// 统一成 EIN `NN-NNNNNNN` / SSN `NNN-NN-NNNN` 格式
pub fn normalize_tax_id(kind: TaxIdType, raw: &str) -> Result<String, AppError> {
    let digits: String = raw.chars().filter(|c| !matches!(c, '-' | ' ')).collect();
    if digits.len() != 9 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(format!(
            "tax_id must contain 9 digits for {}",
            kind.as_str().to_uppercase()
        )));
    }
    Ok(match kind {
        TaxIdType::Ein => format!("{}-{}", &digits[..2], &digits[2..]),
        TaxIdType::Ssn => format!("{}-{}-{}", &digits[..3], &digits[3..5], &digits[5..]),
    })
}

/// 只保留最后四位数字
pub fn mask_tax_id(tax_id: &str) -> String {
    let total = tax_id.chars().filter(char::is_ascii_digit).count();
    let mut seen = 0;
    tax_id
        .chars()
        .map(|c| {
            if c.is_ascii_digit() {
                seen += 1;
                if seen + 4 <= total { '*' } else { c }
            } else {
                c
            }
        })
        .collect()
}

fn is_valid_postal_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    match bytes.len() {
        5 => bytes.iter().all(u8::is_ascii_digit),
        10 => {
            bytes[5] == b'-'
                && bytes[..5].iter().all(u8::is_ascii_digit)
                && bytes[6..].iter().all(u8::is_ascii_digit)
        }
        _ => false,
    }
}

#[derive(Debug, Deserialize)]
pub struct TaxInfoRequest {
    pub legal_name: Option<String>,
    pub tax_id: Option<String>,
    pub tax_id_type: TaxIdType,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct TaxInfo {
    pub business_id: Uuid,
    pub legal_name: String,
    pub tax_id: String,
    pub tax_id_type: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub contact_name: String,
    pub contact_email: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TaxInfoRequest {
    pub fn validate(self, business_id: Uuid) -> Result<TaxInfo, AppError> {
        let state = required_field(self.state.as_deref(), "state")?.to_ascii_uppercase();
        if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AppError::Validation("state must be a two-letter code".into()));
        }
        let postal_code = required_field(self.postal_code.as_deref(), "postal_code")?;
        if !is_valid_postal_code(postal_code) {
            return Err(AppError::Validation(format!("invalid postal code: {}", postal_code)));
        }
        let contact_email = required_field(self.contact_email.as_deref(), "contact_email")?;
        validate_email(contact_email)?;

        Ok(TaxInfo {
            business_id,
            legal_name: required_field(self.legal_name.as_deref(), "legal_name")?.to_string(),
            tax_id: normalize_tax_id(
                self.tax_id_type,
                required_field(self.tax_id.as_deref(), "tax_id")?,
            )?,
            tax_id_type: self.tax_id_type.as_str().to_string(),
            address_line1: required_field(self.address_line1.as_deref(), "address_line1")?
                .to_string(),
            address_line2: optional_field(self.address_line2),
            city: required_field(self.city.as_deref(), "city")?.to_string(),
            state,
            postal_code: postal_code.to_string(),
            contact_name: required_field(self.contact_name.as_deref(), "contact_name")?
                .to_string(),
            contact_email: contact_email.to_string(),
            updated_at: None,
        })
    }
}

impl TaxInfo {
    pub fn masked(mut self) -> Self {
        self.tax_id = mask_tax_id(&self.tax_id);
        self
    }

    pub async fn find(pool: &PgPool, business_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaxInfo>(
            r#"
            SELECT business_id, legal_name, tax_id, tax_id_type, address_line1, address_line2,
                   city, state, postal_code, contact_name, contact_email, updated_at
            FROM business_tax_info
            WHERE business_id = $1
            "#,
        )
        .bind(business_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn upsert(&self, pool: &PgPool) -> Result<TaxInfo, sqlx::Error> {
        sqlx::query_as::<_, TaxInfo>(
            r#"
            INSERT INTO business_tax_info (
                business_id, legal_name, tax_id, tax_id_type, address_line1, address_line2,
                city, state, postal_code, contact_name, contact_email, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
            ON CONFLICT (business_id) DO UPDATE SET
                legal_name = EXCLUDED.legal_name,
                tax_id = EXCLUDED.tax_id,
                tax_id_type = EXCLUDED.tax_id_type,
                address_line1 = EXCLUDED.address_line1,
                address_line2 = EXCLUDED.address_line2,
                city = EXCLUDED.city,
                state = EXCLUDED.state,
                postal_code = EXCLUDED.postal_code,
                contact_name = EXCLUDED.contact_name,
                contact_email = EXCLUDED.contact_email,
                updated_at = NOW()
            RETURNING business_id, legal_name, tax_id, tax_id_type, address_line1, address_line2,
                      city, state, postal_code, contact_name, contact_email, updated_at
            "#,
        )
        .bind(self.business_id)
        .bind(&self.legal_name)
        .bind(&self.tax_id)
        .bind(&self.tax_id_type)
        .bind(&self.address_line1)
        .bind(&self.address_line2)
        .bind(&self.city)
        .bind(&self.state)
        .bind(&self.postal_code)
        .bind(&self.contact_name)
        .bind(&self.contact_email)
        .fetch_one(pool)
        .await
    }
}
