use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    business_hours::BusinessHours,
    error::AppError,
    routes::common::{Page, like_pattern},
    utils::{optional_field, validate_email},
};

pub(crate) const PROFILE_COLUMNS: &str = "id, business_name, business_type::text AS business_type, contact_email, phone, \
     website_url, business_description, logo_url, cover_image_url, \
     verification_status::text AS verification_status, \
     verification_notes, is_active, business_hours, stripe_account_id, setup_completed, created_at";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BusinessProfile {
    pub id: Uuid,
    pub business_name: String,
    pub business_type: Option<String>,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub website_url: Option<String>,
    pub business_description: Option<String>,
    pub logo_url: Option<String>,
    pub cover_image_url: Option<String>,
    pub verification_status: String,
    pub verification_notes: Option<String>,
    pub is_active: bool,
    pub business_hours: Option<Value>,
    #[serde(skip_serializing)]
    pub stripe_account_id: Option<String>,
    pub setup_completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct BusinessDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub profile: BusinessProfile,
    pub has_stripe_account: bool,
    pub location_count: i64,
    pub service_count: i64,
    pub provider_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
            VerificationStatus::Suspended => "suspended",
        }
    }

    /// 审核结果对 is_active 的影响，None 表示保持不变
    pub fn active_flag(&self) -> Option<bool> {
        match self {
            VerificationStatus::Approved => Some(true),
            VerificationStatus::Suspended => Some(false),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VerificationRequest {
    pub status: VerificationStatus,
    pub reason: Option<String>,
}

impl VerificationRequest {
    pub fn validate(self) -> Result<(VerificationStatus, Option<String>), AppError> {
        let reason = optional_field(self.reason);
        if self.status == VerificationStatus::Rejected && reason.is_none() {
            return Err(AppError::Validation(
                "a reason is required when rejecting a business".into(),
            ));
        }
        Ok((self.status, reason))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBusinessProfileRequest {
    pub business_name: Option<String>,
    pub business_type: Option<String>,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub website_url: Option<String>,
    pub business_description: Option<String>,
    pub business_hours: Option<Value>,
}

/// 校验后的部分更新，None 字段保持原值
#[derive(Debug, Default, PartialEq)]
pub struct ProfileChanges {
    pub business_name: Option<String>,
    pub business_type: Option<String>,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub website_url: Option<String>,
    pub business_description: Option<String>,
    pub business_hours: Option<Value>,
}

impl ProfileChanges {
    pub fn touches_hours(&self) -> bool {
        self.business_hours.is_some()
    }
}

impl UpdateBusinessProfileRequest {
    pub fn validate(self) -> Result<ProfileChanges, AppError> {
        let changes = ProfileChanges {
            business_name: optional_field(self.business_name),
            business_type: optional_field(self.business_type),
            contact_email: optional_field(self.contact_email),
            phone: optional_field(self.phone),
            website_url: optional_field(self.website_url),
            business_description: optional_field(self.business_description),
            business_hours: self
                .business_hours
                .filter(|v| !v.is_null())
                .map(|v| BusinessHours::parse(&v).map(|h| h.to_json()))
                .transpose()?,
        };

        if changes == ProfileChanges::default() {
            return Err(AppError::Validation("no fields to update".into()));
        }
        if let Some(email) = &changes.contact_email {
            validate_email(email)?;
        }
        if let Some(url) = &changes.website_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AppError::Validation(
                    "website_url must start with http:// or https://".into(),
                ));
            }
        }
        Ok(changes)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BusinessFilter {
    pub status: Option<String>,
    pub business_type: Option<String>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl BusinessFilter {
    pub fn page(&self) -> Page {
        Page::new(self.limit, self.offset)
    }

    pub fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");
        if let Some(status) = optional_field(self.status.clone()) {
            qb.push(" AND verification_status::text = ").push_bind(status);
        }
        if let Some(kind) = optional_field(self.business_type.clone()) {
            qb.push(" AND business_type::text = ").push_bind(kind);
        }
        if let Some(active) = self.is_active {
            qb.push(" AND is_active = ").push_bind(active);
        }
        if let Some(search) = optional_field(self.search.clone()) {
            let pattern = like_pattern(&search);
            qb.push(" AND (business_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR contact_email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

impl BusinessProfile {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM business_profiles WHERE id = $1",
            PROFILE_COLUMNS
        );
        sqlx::query_as::<_, BusinessProfile>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM business_profiles WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn detail(pool: &PgPool, id: Uuid) -> Result<Option<BusinessDetail>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {},
                stripe_account_id IS NOT NULL AS has_stripe_account,
                (SELECT COUNT(*) FROM business_locations l WHERE l.business_id = b.id) AS location_count,
                (SELECT COUNT(*) FROM business_services s WHERE s.business_id = b.id) AS service_count,
                (SELECT COUNT(*) FROM providers p WHERE p.business_id = b.id) AS provider_count
            FROM business_profiles b
            WHERE b.id = $1
            "#,
            PROFILE_COLUMNS
        );
        sqlx::query_as::<_, BusinessDetail>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool, filter: &BusinessFilter) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let page = filter.page();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM business_profiles");
        filter.push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM business_profiles",
            PROFILE_COLUMNS
        ));
        filter.push_conditions(&mut qb);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let items = qb.build_query_as::<BusinessProfile>().fetch_all(pool).await?;

        Ok((items, total))
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE business_profiles SET
                business_name = COALESCE($2, business_name),
                business_type = COALESCE($3, business_type),
                contact_email = COALESCE($4, contact_email),
                phone = COALESCE($5, phone),
                website_url = COALESCE($6, website_url),
                business_description = COALESCE($7, business_description),
                business_hours = COALESCE($8, business_hours)
            WHERE id = $1
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );
        sqlx::query_as::<_, BusinessProfile>(&sql)
            .bind(id)
            .bind(&changes.business_name)
            .bind(&changes.business_type)
            .bind(&changes.contact_email)
            .bind(&changes.phone)
            .bind(&changes.website_url)
            .bind(&changes.business_description)
            .bind(&changes.business_hours)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_verification(
        pool: &PgPool,
        id: Uuid,
        status: VerificationStatus,
        reason: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE business_profiles SET
                verification_status = $2,
                verification_notes = $3,
                is_active = COALESCE($4, is_active)
            WHERE id = $1
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );
        sqlx::query_as::<_, BusinessProfile>(&sql)
            .bind(id)
            .bind(status.as_str())
            .bind(reason)
            .bind(status.active_flag())
            .fetch_optional(pool)
            .await
    }

    pub async fn set_image_url(
        pool: &PgPool,
        id: Uuid,
        column: ImageColumn,
        url: &str,
    ) -> Result<bool, sqlx::Error> {
        let sql = match column {
            ImageColumn::Logo => "UPDATE business_profiles SET logo_url = $2 WHERE id = $1",
            ImageColumn::Cover => "UPDATE business_profiles SET cover_image_url = $2 WHERE id = $1",
        };
        let result = sqlx::query(sql).bind(id).bind(url).execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// 只在尚未关联账户时写入；返回 false 表示已被其他请求抢先写入
    pub async fn set_stripe_account(
        pool: &PgPool,
        id: Uuid,
        account_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let linked = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE business_profiles SET stripe_account_id = $2
            WHERE id = $1 AND (stripe_account_id IS NULL OR stripe_account_id = '')
            RETURNING stripe_account_id
            "#,
        )
        .bind(id)
        .bind(account_id)
        .fetch_optional(pool)
        .await?;
        Ok(linked.is_some())
    }

    pub async fn stripe_account_id(pool: &PgPool, id: Uuid) -> Result<Option<String>, sqlx::Error> {
        let stored = sqlx::query_scalar::<_, Option<String>>(
            "SELECT stripe_account_id FROM business_profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(stored.flatten())
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM business_profiles WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageColumn {
    Logo,
    Cover,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_update_is_rejected() {
        let req = UpdateBusinessProfileRequest {
            business_name: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn update_normalizes_hours_and_trims() {
        let req = UpdateBusinessProfileRequest {
            business_name: Some(" Glow Spa ".into()),
            business_hours: Some(json!({"mon": {"open": "9:00", "close": "17:00"}})),
            ..Default::default()
        };
        let changes = req.validate().unwrap();
        assert_eq!(changes.business_name.as_deref(), Some("Glow Spa"));
        let hours = changes.business_hours.unwrap();
        assert_eq!(hours["monday"], json!({"open": "09:00", "close": "17:00"}));
        assert_eq!(hours["sunday"], json!({"closed": true}));
    }

    #[test]
    fn update_rejects_bad_email_and_url() {
        let req = UpdateBusinessProfileRequest {
            contact_email: Some("not-an-email".into()),
            ..Default::default()
        };
        assert!(req.validate().is_err());

        let req = UpdateBusinessProfileRequest {
            website_url: Some("glow.example".into()),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn rejection_requires_reason() {
        let req = VerificationRequest {
            status: VerificationStatus::Rejected,
            reason: Some("  ".into()),
        };
        assert!(req.validate().is_err());

        let (status, reason) = VerificationRequest {
            status: VerificationStatus::Approved,
            reason: None,
        }
        .validate()
        .unwrap();
        assert_eq!(status.active_flag(), Some(true));
        assert!(reason.is_none());
    }

    #[test]
    fn filter_builds_parameterized_sql() {
        let filter = BusinessFilter {
            status: Some("approved".into()),
            search: Some("spa".into()),
            is_active: Some(true),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM business_profiles");
        filter.push_conditions(&mut qb);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM business_profiles WHERE TRUE \
             AND verification_status::text = $1 AND is_active = $2 \
             AND (business_name ILIKE $3 OR contact_email ILIKE $4)"
        );
    }
}
