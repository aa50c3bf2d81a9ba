use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{error::AppError, utils::optional_field};

const DOCUMENT_COLUMNS: &str = "id, business_id, document_type::text AS document_type, \
     document_name, file_url, file_size_bytes, verification_status::text AS verification_status, \
     verified_by, verified_at, rejection_reason, created_at";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BusinessDocument {
    pub id: Uuid,
    pub business_id: Uuid,
    pub document_type: String,
    pub document_name: String,
    pub file_url: String,
    pub file_size_bytes: Option<i64>,
    pub verification_status: String,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewDocumentRequest {
    pub status: DocumentStatus,
    pub reason: Option<String>,
}

/// 审核结果：重置为 pending 时清除审核人与时间
#[derive(Debug, PartialEq)]
pub struct Review {
    pub status: DocumentStatus,
    pub reason: Option<String>,
    pub reviewer: Option<String>,
}

impl ReviewDocumentRequest {
    pub fn into_review(self, reviewer: &str) -> Result<Review, AppError> {
        let reason = optional_field(self.reason);
        match self.status {
            DocumentStatus::Rejected if reason.is_none() => Err(AppError::Validation(
                "a reason is required when rejecting a document".into(),
            )),
            DocumentStatus::Pending => Ok(Review {
                status: self.status,
                reason: None,
                reviewer: None,
            }),
            DocumentStatus::Approved => Ok(Review {
                status: self.status,
                reason: None,
                reviewer: Some(reviewer.to_string()),
            }),
            DocumentStatus::Rejected => Ok(Review {
                status: self.status,
                reason,
                reviewer: Some(reviewer.to_string()),
            }),
        }
    }
}

impl BusinessDocument {
    pub async fn list(pool: &PgPool, business_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM business_documents WHERE business_id = $1 ORDER BY created_at DESC",
            DOCUMENT_COLUMNS
        );
        sqlx::query_as::<_, BusinessDocument>(&sql)
            .bind(business_id)
            .fetch_all(pool)
            .await
    }

    pub async fn review(
        pool: &PgPool,
        business_id: Uuid,
        document_id: Uuid,
        review: &Review,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE business_documents SET
                verification_status = $3,
                rejection_reason = $4,
                verified_by = $5,
                verified_at = CASE WHEN $5::text IS NULL THEN NULL ELSE NOW() END
            WHERE business_id = $1 AND id = $2
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        );
        sqlx::query_as::<_, BusinessDocument>(&sql)
            .bind(business_id)
            .bind(document_id)
            .bind(review.status.as_str())
            .bind(&review.reason)
            .bind(&review.reviewer)
            .fetch_optional(pool)
            .await
    }
}
