use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    error::AppError,
    utils::{optional_field, required_field},
};

const LOCATION_COLUMNS: &str = "id, business_id, location_name, address_line1, address_line2, \
     city, state, postal_code, country, is_primary, is_active, created_at";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BusinessLocation {
    pub id: Uuid,
    pub business_id: Uuid,
    pub location_name: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_primary: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocationRequest {
    pub location_name: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub is_primary: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLocation {
    pub location_name: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_primary: bool,
}

#[derive(Debug, Default, PartialEq)]
pub struct LocationChanges {
    pub location_name: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub is_primary: Option<bool>,
    pub is_active: Option<bool>,
}

impl LocationRequest {
    pub fn into_new(self) -> Result<NewLocation, AppError> {
        Ok(NewLocation {
            location_name: required_field(self.location_name.as_deref(), "location_name")?
                .to_string(),
            address_line1: required_field(self.address_line1.as_deref(), "address_line1")?
                .to_string(),
            city: required_field(self.city.as_deref(), "city")?.to_string(),
            state: required_field(self.state.as_deref(), "state")?.to_string(),
            postal_code: required_field(self.postal_code.as_deref(), "postal_code")?.to_string(),
            address_line2: optional_field(self.address_line2),
            country: optional_field(self.country).unwrap_or_else(|| "US".to_string()),
            is_primary: self.is_primary.unwrap_or(false),
        })
    }

    pub fn into_changes(self) -> Result<LocationChanges, AppError> {
        let changes = LocationChanges {
            location_name: optional_field(self.location_name),
            address_line1: optional_field(self.address_line1),
            address_line2: optional_field(self.address_line2),
            city: optional_field(self.city),
            state: optional_field(self.state),
            postal_code: optional_field(self.postal_code),
            country: optional_field(self.country),
            is_primary: self.is_primary,
            is_active: self.is_active,
        };
        if changes == LocationChanges::default() {
            return Err(AppError::Validation("no fields to update".into()));
        }
        Ok(changes)
    }
}

impl BusinessLocation {
    pub async fn list(pool: &PgPool, business_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM business_locations WHERE business_id = $1 \
             ORDER BY is_primary DESC, created_at",
            LOCATION_COLUMNS
        );
        sqlx::query_as::<_, BusinessLocation>(&sql)
            .bind(business_id)
            .fetch_all(pool)
            .await
    }

    /// 新建门店；设为主门店时在同一事务内清除其它门店的主标记
    pub async fn create(
        pool: &PgPool,
        business_id: Uuid,
        new: &NewLocation,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if new.is_primary {
            sqlx::query("UPDATE business_locations SET is_primary = FALSE WHERE business_id = $1")
                .bind(business_id)
                .execute(&mut *tx)
                .await?;
        }

        let sql = format!(
            r#"
            INSERT INTO business_locations (
                id, business_id, location_name, address_line1, address_line2,
                city, state, postal_code, country, is_primary, is_active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, TRUE, NOW())
            RETURNING {}
            "#,
            LOCATION_COLUMNS
        );
        let location = sqlx::query_as::<_, BusinessLocation>(&sql)
            .bind(Uuid::new_v4())
            .bind(business_id)
            .bind(&new.location_name)
            .bind(&new.address_line1)
            .bind(&new.address_line2)
            .bind(&new.city)
            .bind(&new.state)
            .bind(&new.postal_code)
            .bind(&new.country)
            .bind(new.is_primary)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(location)
    }

    pub async fn update(
        pool: &PgPool,
        business_id: Uuid,
        location_id: Uuid,
        changes: &LocationChanges,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if changes.is_primary == Some(true) {
            sqlx::query(
                "UPDATE business_locations SET is_primary = FALSE WHERE business_id = $1 AND id <> $2",
            )
            .bind(business_id)
            .bind(location_id)
            .execute(&mut *tx)
            .await?;
        }

        let sql = format!(
            r#"
            UPDATE business_locations SET
                location_name = COALESCE($3, location_name),
                address_line1 = COALESCE($4, address_line1),
                address_line2 = COALESCE($5, address_line2),
                city = COALESCE($6, city),
                state = COALESCE($7, state),
                postal_code = COALESCE($8, postal_code),
                country = COALESCE($9, country),
                is_primary = COALESCE($10, is_primary),
                is_active = COALESCE($11, is_active)
            WHERE business_id = $1 AND id = $2
            RETURNING {}
            "#,
            LOCATION_COLUMNS
        );
        let location = sqlx::query_as::<_, BusinessLocation>(&sql)
            .bind(business_id)
            .bind(location_id)
            .bind(&changes.location_name)
            .bind(&changes.address_line1)
            .bind(&changes.address_line2)
            .bind(&changes.city)
            .bind(&changes.state)
            .bind(&changes.postal_code)
            .bind(&changes.country)
            .bind(changes.is_primary)
            .bind(changes.is_active)
            .fetch_optional(&mut *tx)
            .await?;

        // 目标门店不存在时回滚，避免误清主标记
        if location.is_some() {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }
        Ok(location)
    }

    pub async fn delete(
        pool: &PgPool,
        business_id: Uuid,
        location_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM business_locations WHERE business_id = $1 AND id = $2")
            .bind(business_id)
            .bind(location_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
