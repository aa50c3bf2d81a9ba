use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{error::AppError, routes::common::Page};

const BOOKING_SELECT: &str = r#"
    SELECT b.id, b.customer_id, b.provider_id, b.service_id, b.business_id,
           b.booking_date, b.start_time, b.total_amount::float8 AS total_amount,
           b.booking_status::text AS booking_status,
           b.payment_status::text AS payment_status, b.created_at,
           NULLIF(TRIM(CONCAT_WS(' ', c.first_name, c.last_name)), '') AS customer_name,
           NULLIF(TRIM(CONCAT_WS(' ', p.first_name, p.last_name)), '') AS provider_name,
           s.name AS service_name,
           bp.business_name
    FROM bookings b
    LEFT JOIN customer_profiles c ON c.id = b.customer_id
    LEFT JOIN providers p ON p.id = b.provider_id
    LEFT JOIN services s ON s.id = b.service_id
    LEFT JOIN business_profiles bp ON bp.id = b.business_id
"#;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub business_id: Option<Uuid>,
    pub booking_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub total_amount: Option<f64>,
    pub booking_status: String,
    pub payment_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub customer_name: Option<String>,
    pub provider_name: Option<String>,
    pub service_name: Option<String>,
    pub business_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Declined,
    Cancelled,
    InProgress,
    Completed,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Declined => "declined",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::NoShow => "no_show",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(raw.to_string())).ok()
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed | Declined | Cancelled)
                | (Confirmed, InProgress | Cancelled | NoShow)
                | (InProgress, Completed)
        )
    }
}

pub fn check_transition(current: &str, next: BookingStatus) -> Result<(), AppError> {
    let allowed = BookingStatus::parse(current).is_some_and(|c| c.can_transition_to(next));
    if allowed {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "cannot change booking status from {} to {}",
            current,
            next.as_str()
        )))
    }
}

#[derive(Debug, Deserialize)]
pub struct BookingStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub business_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl BookingFilter {
    pub fn page(&self) -> Page {
        Page::new(self.limit, self.offset)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(AppError::Validation("from must not be after to".into()));
            }
        }
        Ok(())
    }

    pub fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");
        if let Some(status) = self.status {
            qb.push(" AND b.booking_status::text = ").push_bind(status.as_str());
        }
        if let Some(id) = self.business_id {
            qb.push(" AND b.business_id = ").push_bind(id);
        }
        if let Some(id) = self.customer_id {
            qb.push(" AND b.customer_id = ").push_bind(id);
        }
        if let Some(id) = self.provider_id {
            qb.push(" AND b.provider_id = ").push_bind(id);
        }
        if let Some(from) = self.from {
            qb.push(" AND b.booking_date >= ").push_bind(from);
        }
        if let Some(to) = self.to {
            qb.push(" AND b.booking_date <= ").push_bind(to);
        }
    }
}

impl Booking {
    pub async fn list(pool: &PgPool, filter: &BookingFilter) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let page = filter.page();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM bookings b");
        filter.push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(BOOKING_SELECT);
        filter.push_conditions(&mut qb);
        qb.push(" ORDER BY b.booking_date DESC, b.start_time DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let items = qb.build_query_as::<Booking>().fetch_all(pool).await?;

        Ok((items, total))
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("{} WHERE b.id = $1", BOOKING_SELECT);
        sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// 仅当状态仍为 `current` 时更新，返回是否命中
    pub async fn set_status(
        pool: &PgPool,
        id: Uuid,
        current: &str,
        next: BookingStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE bookings SET booking_status = $3
            WHERE id = $1 AND booking_status::text = $2
            "#,
        )
        .bind(id)
        .bind(current)
        .bind(next.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Declined));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(InProgress));
        assert!(Confirmed.can_transition_to(NoShow));
        assert!(InProgress.can_transition_to(Completed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!InProgress.can_transition_to(Cancelled));
    }

    #[test]
    fn unknown_current_status_is_rejected() {
        assert!(check_transition("pending", BookingStatus::Confirmed).is_ok());
        assert!(check_transition("archived", BookingStatus::Confirmed).is_err());
        assert_eq!(
            check_transition("completed", BookingStatus::Cancelled)
                .unwrap_err()
                .to_string(),
            "cannot change booking status from completed to cancelled"
        );
    }

    #[test]
    fn date_range_must_be_ordered() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
        let filter = BookingFilter {
            from: Some(d(10)),
            to: Some(d(1)),
            ..Default::default()
        };
        assert!(filter.validate().is_err());

        let filter = BookingFilter {
            from: Some(d(1)),
            to: Some(d(1)),
            ..Default::default()
        };
        assert!(filter.validate().is_ok());
    }

    #[test]
    fn filter_sql() {
        let filter = BookingFilter {
            status: Some(BookingStatus::NoShow),
            provider_id: Some(Uuid::nil()),
            to: NaiveDate::from_ymd_opt(2024, 6, 30),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM bookings b");
        filter.push_conditions(&mut qb);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM bookings b WHERE TRUE AND b.booking_status::text = $1 \
             AND b.provider_id = $2 AND b.booking_date <= $3"
        );
    }
}
