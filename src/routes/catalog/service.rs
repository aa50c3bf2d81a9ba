use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    BusinessLocation,
    CustomerLocation,
    Virtual,
    BothLocations,
}

impl DeliveryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryType::BusinessLocation => "business_location",
            DeliveryType::CustomerLocation => "customer_location",
            DeliveryType::Virtual => "virtual",
            DeliveryType::BothLocations => "both_locations",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BusinessService {
    pub id: Uuid,
    pub business_id: Uuid,
    pub service_id: Uuid,
    pub service_name: String,
    pub description: Option<String>,
    pub min_price: f64,
    pub duration_minutes: Option<i32>,
    pub business_price: f64,
    pub delivery_type: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertServiceRequest {
    pub business_price: Option<f64>,
    pub delivery_type: Option<DeliveryType>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BusinessAddon {
    pub id: Uuid,
    pub business_id: Uuid,
    pub addon_id: Uuid,
    pub addon_name: String,
    pub description: Option<String>,
    pub custom_price: Option<f64>,
    pub is_available: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpsertAddonRequest {
    pub custom_price: Option<f64>,
    pub is_available: Option<bool>,
}

fn check_non_negative(price: f64, field: &str) -> Result<(), AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::Validation(format!(
            "{} must be a non-negative amount",
            field
        )));
    }
    Ok(())
}

/// 商家价格不能低于平台目录中的最低价
pub fn check_business_price(price: f64, min_price: f64) -> Result<(), AppError> {
    check_non_negative(price, "business_price")?;
    if price < min_price {
        return Err(AppError::Validation(format!(
            "business_price {:.2} is below the minimum price {:.2}",
            price, min_price
        )));
    }
    Ok(())
}

impl UpsertServiceRequest {
    pub fn price(&self) -> Result<f64, AppError> {
        let price = self
            .business_price
            .ok_or_else(|| AppError::Validation("business_price is required".into()))?;
        check_non_negative(price, "business_price")?;
        Ok(price)
    }
}

impl UpsertAddonRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(price) = self.custom_price {
            check_non_negative(price, "custom_price")?;
        }
        if self.custom_price.is_none() && self.is_available.is_none() {
            return Err(AppError::Validation("no fields to update".into()));
        }
        Ok(())
    }
}

const SERVICE_SELECT: &str = r#"
    SELECT bs.id, bs.business_id, bs.service_id, s.name AS service_name, s.description,
           COALESCE(s.min_price, 0)::float8 AS min_price, s.duration_minutes,
           bs.business_price::float8 AS business_price,
           bs.delivery_type::text AS delivery_type, bs.is_active,
           bs.created_at
    FROM business_services bs
    JOIN services s ON s.id = bs.service_id
"#;

const ADDON_SELECT: &str = r#"
    SELECT ba.id, ba.business_id, ba.addon_id, a.name AS addon_name, a.description,
           ba.custom_price::float8 AS custom_price, ba.is_available
    FROM business_addons ba
    JOIN service_addons a ON a.id = ba.addon_id
"#;

impl BusinessService {
    pub async fn list(pool: &PgPool, business_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, BusinessService>(&format!(
            "{} WHERE bs.business_id = $1 ORDER BY s.name",
            SERVICE_SELECT
        ))
        .bind(business_id)
        .fetch_all(pool)
        .await
    }

    /// 目录中服务的最低价，服务不存在或已下架时返回 None
    pub async fn catalog_min_price(
        pool: &PgPool,
        service_id: Uuid,
    ) -> Result<Option<f64>, sqlx::Error> {
        sqlx::query_scalar::<_, f64>(
            "SELECT COALESCE(min_price, 0)::float8 FROM services WHERE id = $1 AND is_active",
        )
        .bind(service_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn upsert(
        pool: &PgPool,
        business_id: Uuid,
        service_id: Uuid,
        price: f64,
        req: &UpsertServiceRequest,
    ) -> Result<Self, sqlx::Error> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO business_services (id, business_id, service_id, business_price, delivery_type, is_active, created_at)
            VALUES (gen_random_uuid(), $1, $2, $3, $4, COALESCE($5, TRUE), NOW())
            ON CONFLICT (business_id, service_id) DO UPDATE SET
                business_price = EXCLUDED.business_price,
                delivery_type = COALESCE($4, business_services.delivery_type),
                is_active = COALESCE($5, business_services.is_active)
            RETURNING id
            "#,
        )
        .bind(business_id)
        .bind(service_id)
        .bind(price)
        .bind(req.delivery_type.map(|d| d.as_str()))
        .bind(req.is_active)
        .fetch_one(pool)
        .await?;

        sqlx::query_as::<_, BusinessService>(&format!("{} WHERE bs.id = $1", SERVICE_SELECT))
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn delete(
        pool: &PgPool,
        business_id: Uuid,
        service_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM business_services WHERE business_id = $1 AND service_id = $2")
                .bind(business_id)
                .bind(service_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl BusinessAddon {
    pub async fn list(pool: &PgPool, business_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, BusinessAddon>(&format!(
            "{} WHERE ba.business_id = $1 ORDER BY a.name",
            ADDON_SELECT
        ))
        .bind(business_id)
        .fetch_all(pool)
        .await
    }

    pub async fn addon_exists(pool: &PgPool, addon_id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM service_addons WHERE id = $1 AND is_active)",
        )
        .bind(addon_id)
        .fetch_one(pool)
        .await
    }

    pub async fn upsert(
        pool: &PgPool,
        business_id: Uuid,
        addon_id: Uuid,
        req: &UpsertAddonRequest,
    ) -> Result<Self, sqlx::Error> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO business_addons (id, business_id, addon_id, custom_price, is_available)
            VALUES (gen_random_uuid(), $1, $2, $3, COALESCE($4, TRUE))
            ON CONFLICT (business_id, addon_id) DO UPDATE SET
                custom_price = COALESCE($3, business_addons.custom_price),
                is_available = COALESCE($4, business_addons.is_available)
            RETURNING id
            "#,
        )
        .bind(business_id)
        .bind(addon_id)
        .bind(req.custom_price)
        .bind(req.is_available)
        .fetch_one(pool)
        .await?;

        sqlx::query_as::<_, BusinessAddon>(&format!("{} WHERE ba.id = $1", ADDON_SELECT))
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn delete(
        pool: &PgPool,
        business_id: Uuid,
        addon_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM business_addons WHERE business_id = $1 AND addon_id = $2")
                .bind(business_id)
                .bind(addon_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_price_must_meet_minimum() {
        assert!(check_business_price(50.0, 40.0).is_ok());
        assert!(check_business_price(40.0, 40.0).is_ok());
        let err = check_business_price(39.99, 40.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "business_price 39.99 is below the minimum price 40.00"
        );
        assert!(check_business_price(-1.0, 0.0).is_err());
        assert!(check_business_price(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn service_price_is_required() {
        let req = UpsertServiceRequest {
            business_price: None,
            delivery_type: Some(DeliveryType::Virtual),
            is_active: None,
        };
        assert!(req.price().is_err());
    }

    #[test]
    fn addon_update_needs_a_field() {
        let req = UpsertAddonRequest {
            custom_price: None,
            is_available: None,
        };
        assert!(req.validate().is_err());
        let req = UpsertAddonRequest {
            custom_price: Some(-5.0),
            is_available: None,
        };
        assert!(req.validate().is_err());
        let req = UpsertAddonRequest {
            custom_price: None,
            is_available: Some(false),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn delivery_type_names() {
        let parsed: DeliveryType = serde_json::from_str("\"both_locations\"").unwrap();
        assert_eq!(parsed, DeliveryType::BothLocations);
        assert_eq!(parsed.as_str(), "both_locations");
    }
}
