use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::AppError,
    routes::common::{Page, like_pattern},
    utils::{optional_field, required_field, validate_email},
};

const PROVIDER_COLUMNS: &str = "id, user_id, business_id, location_id, first_name, last_name, \
     email, phone, provider_role::text AS provider_role, \
     verification_status::text AS verification_status, \
     background_check_status::text AS background_check_status, is_active, \
     bio, image_url, created_at";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Provider {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub business_id: Uuid,
    pub location_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub provider_role: String,
    pub verification_status: String,
    pub background_check_status: String,
    pub is_active: bool,
    pub bio: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderRole {
    Owner,
    Dispatcher,
    Provider,
}

impl ProviderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderRole::Owner => "owner",
            ProviderRole::Dispatcher => "dispatcher",
            ProviderRole::Provider => "provider",
        }
    }
}

/// 资质审核与背景调查共用的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::UnderReview => "under_review",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateProviderRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub provider_role: Option<ProviderRole>,
    pub location_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProvider {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub provider_role: ProviderRole,
    pub location_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub bio: Option<String>,
}

impl CreateProviderRequest {
    pub fn validate(self) -> Result<NewProvider, AppError> {
        let email = required_field(self.email.as_deref(), "email")?.to_ascii_lowercase();
        validate_email(&email)?;
        Ok(NewProvider {
            first_name: required_field(self.first_name.as_deref(), "first_name")?.to_string(),
            last_name: required_field(self.last_name.as_deref(), "last_name")?.to_string(),
            email,
            phone: optional_field(self.phone),
            provider_role: self.provider_role.unwrap_or(ProviderRole::Provider),
            location_id: self.location_id,
            user_id: self.user_id,
            bio: optional_field(self.bio),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProviderRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub provider_role: Option<ProviderRole>,
    pub location_id: Option<Uuid>,
    pub verification_status: Option<ReviewStatus>,
    pub background_check_status: Option<ReviewStatus>,
    pub is_active: Option<bool>,
    pub bio: Option<String>,
}

#[derive(Debug, Default, PartialEq)]
pub struct ProviderChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub provider_role: Option<&'static str>,
    pub location_id: Option<Uuid>,
    pub verification_status: Option<&'static str>,
    pub background_check_status: Option<&'static str>,
    pub is_active: Option<bool>,
    pub bio: Option<String>,
}

impl UpdateProviderRequest {
    pub fn validate(self) -> Result<ProviderChanges, AppError> {
        let changes = ProviderChanges {
            first_name: optional_field(self.first_name),
            last_name: optional_field(self.last_name),
            email: optional_field(self.email).map(|e| e.to_ascii_lowercase()),
            phone: optional_field(self.phone),
            provider_role: self.provider_role.map(|r| r.as_str()),
            location_id: self.location_id,
            verification_status: self.verification_status.map(|s| s.as_str()),
            background_check_status: self.background_check_status.map(|s| s.as_str()),
            is_active: self.is_active,
            bio: optional_field(self.bio),
        };
        if changes == ProviderChanges::default() {
            return Err(AppError::Validation("no fields to update".into()));
        }
        if let Some(email) = &changes.email {
            validate_email(email)?;
        }
        Ok(changes)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProviderFilter {
    pub business_id: Option<Uuid>,
    pub role: Option<ProviderRole>,
    pub verification_status: Option<ReviewStatus>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ProviderFilter {
    pub fn page(&self) -> Page {
        Page::new(self.limit, self.offset)
    }

    pub fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");
        if let Some(business_id) = self.business_id {
            qb.push(" AND business_id = ").push_bind(business_id);
        }
        if let Some(role) = self.role {
            qb.push(" AND provider_role::text = ").push_bind(role.as_str());
        }
        if let Some(status) = self.verification_status {
            qb.push(" AND verification_status::text = ").push_bind(status.as_str());
        }
        if let Some(active) = self.is_active {
            qb.push(" AND is_active = ").push_bind(active);
        }
        if let Some(search) = optional_field(self.search.clone()) {
            let pattern = like_pattern(&search);
            qb.push(" AND (first_name || ' ' || last_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

impl Provider {
    pub async fn list(pool: &PgPool, filter: &ProviderFilter) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let page = filter.page();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM providers");
        filter.push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM providers", PROVIDER_COLUMNS));
        filter.push_conditions(&mut qb);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let items = qb.build_query_as::<Provider>().fetch_all(pool).await?;

        Ok((items, total))
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {} FROM providers WHERE id = $1", PROVIDER_COLUMNS);
        sqlx::query_as::<_, Provider>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(
        pool: &PgPool,
        business_id: Uuid,
        new: &NewProvider,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO providers (
                id, user_id, business_id, location_id, first_name, last_name, email, phone,
                provider_role, verification_status, background_check_status, is_active, bio,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', 'pending', TRUE, $10, NOW())
            RETURNING {}
            "#,
            PROVIDER_COLUMNS
        );
        sqlx::query_as::<_, Provider>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.user_id)
            .bind(business_id)
            .bind(new.location_id)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.email)
            .bind(&new.phone)
            .bind(new.provider_role.as_str())
            .bind(&new.bio)
            .fetch_one(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        changes: &ProviderChanges,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE providers SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                provider_role = COALESCE($6, provider_role),
                location_id = COALESCE($7, location_id),
                verification_status = COALESCE($8, verification_status),
                background_check_status = COALESCE($9, background_check_status),
                is_active = COALESCE($10, is_active),
                bio = COALESCE($11, bio)
            WHERE id = $1
            RETURNING {}
            "#,
            PROVIDER_COLUMNS
        );
        sqlx::query_as::<_, Provider>(&sql)
            .bind(id)
            .bind(&changes.first_name)
            .bind(&changes.last_name)
            .bind(&changes.email)
            .bind(&changes.phone)
            .bind(changes.provider_role)
            .bind(changes.location_id)
            .bind(changes.verification_status)
            .bind(changes.background_check_status)
            .bind(changes.is_active)
            .bind(&changes.bio)
            .fetch_optional(pool)
            .await
    }

    pub async fn location_belongs(
        pool: &PgPool,
        location_id: Uuid,
        business_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM business_locations WHERE id = $1 AND business_id = $2)",
        )
        .bind(location_id)
        .bind(business_id)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM providers WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
