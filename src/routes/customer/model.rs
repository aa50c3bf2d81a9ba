use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::routes::common::{Page, like_pattern};
use crate::utils::optional_field;

const CUSTOMER_COLUMNS: &str =
    "id, user_id, first_name, last_name, email, phone, is_active, created_at";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CustomerProfile {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub profile: CustomerProfile,
    pub booking_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct CustomerStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerFilter {
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl CustomerFilter {
    pub fn page(&self) -> Page {
        Page::new(self.limit, self.offset)
    }

    pub fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");
        if let Some(active) = self.is_active {
            qb.push(" AND is_active = ").push_bind(active);
        }
        if let Some(search) = optional_field(self.search.clone()) {
            let pattern = like_pattern(&search);
            qb.push(" AND (COALESCE(first_name, '') || ' ' || COALESCE(last_name, '') ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR phone ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

impl CustomerProfile {
    pub async fn list(
        pool: &PgPool,
        filter: &CustomerFilter,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let page = filter.page();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM customer_profiles");
        filter.push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM customer_profiles",
            CUSTOMER_COLUMNS
        ));
        filter.push_conditions(&mut qb);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let items = qb.build_query_as::<CustomerProfile>().fetch_all(pool).await?;

        Ok((items, total))
    }

    pub async fn detail(pool: &PgPool, id: Uuid) -> Result<Option<CustomerDetail>, sqlx::Error> {
        let sql = format!("SELECT {} FROM customer_profiles WHERE id = $1", CUSTOMER_COLUMNS);
        let Some(profile) = sqlx::query_as::<_, CustomerProfile>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?
        else {
            return Ok(None);
        };

        let booking_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE customer_id = $1")
                .bind(id)
                .fetch_one(pool)
                .await?;

        Ok(Some(CustomerDetail {
            profile,
            booking_count,
        }))
    }

    pub async fn set_active(
        pool: &PgPool,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE customer_profiles SET is_active = $2 WHERE id = $1 RETURNING {}",
            CUSTOMER_COLUMNS
        );
        sqlx::query_as::<_, CustomerProfile>(&sql)
            .bind(id)
            .bind(is_active)
            .fetch_optional(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_has_no_conditions() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM customer_profiles");
        CustomerFilter::default().push_conditions(&mut qb);
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM customer_profiles WHERE TRUE");
    }

    #[test]
    fn search_covers_name_email_and_phone() {
        let filter = CustomerFilter {
            search: Some("lee".into()),
            is_active: Some(true),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM customer_profiles");
        filter.push_conditions(&mut qb);
        let sql = qb.sql();
        assert!(sql.contains("is_active = $1"));
        assert!(sql.contains("email ILIKE $3"));
        assert!(sql.contains("phone ILIKE $4"));
    }

    #[test]
    fn blank_search_is_ignored() {
        let filter = CustomerFilter {
            search: Some("   ".into()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM customer_profiles");
        filter.push_conditions(&mut qb);
        assert!(!qb.sql().contains("ILIKE"));
    }
}
