//! 需要真实的 Postgres：未设置 DATABASE_URL 时跳过。
//! 每个测试建一个独立 schema，表结构与线上一致，结束时删除。

use std::{str::FromStr, sync::Arc};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use marketplace_admin::{
    AppState, app,
    config::Config,
    routes::booking::{Booking, BookingStatus},
    utils::{Role, generate_token},
};
use serde_json::{Value, json};
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "db-test-secret";

const SCHEMA_SQL: &str = r#"
CREATE TABLE business_profiles (
    id uuid PRIMARY KEY,
    business_name text NOT NULL,
    business_type text,
    contact_email text,
    phone text,
    website_url text,
    business_description text,
    logo_url text,
    cover_image_url text,
    verification_status text NOT NULL DEFAULT 'pending'
        CHECK (verification_status IN ('pending', 'approved', 'rejected', 'suspended')),
    verification_notes text,
    is_active boolean NOT NULL DEFAULT FALSE,
    business_hours jsonb,
    stripe_account_id text,
    setup_completed boolean NOT NULL DEFAULT FALSE,
    created_at timestamptz NOT NULL DEFAULT NOW()
);
CREATE TABLE business_locations (
    id uuid PRIMARY KEY,
    business_id uuid NOT NULL REFERENCES business_profiles (id) ON DELETE CASCADE,
    location_name text NOT NULL,
    address_line1 text NOT NULL,
    address_line2 text,
    city text NOT NULL,
    state text NOT NULL,
    postal_code text NOT NULL,
    country text NOT NULL,
    is_primary boolean NOT NULL DEFAULT FALSE,
    is_active boolean NOT NULL DEFAULT TRUE,
    created_at timestamptz NOT NULL DEFAULT NOW()
);
CREATE TABLE service_categories (
    id uuid PRIMARY KEY,
    service_category_type text NOT NULL,
    description text,
    is_active boolean NOT NULL DEFAULT TRUE,
    sort_order integer
);
CREATE TABLE service_subcategories (
    id uuid PRIMARY KEY,
    category_id uuid NOT NULL REFERENCES service_categories (id),
    service_subcategory_type text NOT NULL,
    description text,
    is_active boolean NOT NULL DEFAULT TRUE
);
CREATE TABLE business_service_categories (
    id uuid PRIMARY KEY,
    business_id uuid NOT NULL REFERENCES business_profiles (id) ON DELETE CASCADE,
    category_id uuid NOT NULL REFERENCES service_categories (id),
    is_active boolean NOT NULL DEFAULT TRUE,
    UNIQUE (business_id, category_id)
);
CREATE TABLE business_service_subcategories (
    id uuid PRIMARY KEY,
    business_id uuid NOT NULL REFERENCES business_profiles (id) ON DELETE CASCADE,
    category_id uuid NOT NULL REFERENCES service_categories (id),
    subcategory_id uuid NOT NULL REFERENCES service_subcategories (id),
    is_active boolean NOT NULL DEFAULT TRUE,
    UNIQUE (business_id, subcategory_id)
);
CREATE TABLE business_setup_progress (
    business_id uuid PRIMARY KEY REFERENCES business_profiles (id) ON DELETE CASCADE,
    current_step text,
    completed_steps text[] NOT NULL DEFAULT '{}',
    phase text,
    updated_at timestamptz NOT NULL DEFAULT NOW()
);
CREATE TABLE customer_profiles (
    id uuid PRIMARY KEY,
    user_id uuid,
    first_name text,
    last_name text,
    email text,
    phone text,
    is_active boolean NOT NULL DEFAULT TRUE,
    created_at timestamptz NOT NULL DEFAULT NOW()
);
CREATE TABLE providers (
    id uuid PRIMARY KEY,
    user_id uuid,
    business_id uuid NOT NULL REFERENCES business_profiles (id) ON DELETE CASCADE,
    location_id uuid REFERENCES business_locations (id),
    first_name text NOT NULL,
    last_name text NOT NULL,
    email text NOT NULL,
    phone text,
    provider_role text NOT NULL CHECK (provider_role IN ('owner', 'dispatcher', 'provider')),
    verification_status text NOT NULL,
    background_check_status text NOT NULL,
    is_active boolean NOT NULL DEFAULT TRUE,
    bio text,
    image_url text,
    created_at timestamptz NOT NULL DEFAULT NOW()
);
CREATE TABLE services (
    id uuid PRIMARY KEY,
    subcategory_id uuid REFERENCES service_subcategories (id),
    name text NOT NULL,
    description text,
    min_price numeric(10, 2),
    duration_minutes integer,
    is_active boolean NOT NULL DEFAULT TRUE
);
CREATE TABLE bookings (
    id uuid PRIMARY KEY,
    customer_id uuid REFERENCES customer_profiles (id),
    provider_id uuid REFERENCES providers (id),
    service_id uuid REFERENCES services (id),
    business_id uuid REFERENCES business_profiles (id),
    booking_date date NOT NULL,
    start_time time,
    total_amount numeric(10, 2),
    booking_status text NOT NULL CHECK (booking_status IN (
        'pending', 'confirmed', 'declined', 'cancelled', 'in_progress', 'completed', 'no_show'
    )),
    payment_status text,
    created_at timestamptz NOT NULL DEFAULT NOW()
);
"#;

struct TestDb {
    pool: PgPool,
    schema: String,
}

impl TestDb {
    /// DATABASE_URL 缺失或设置了 SKIP_DB_TESTS 时返回 None
    async fn create() -> Option<Self> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return None;
        }
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL missing; skip database tests");
            return None;
        };

        let schema = format!("t_{}", Uuid::new_v4().simple());
        let options = PgConnectOptions::from_str(&url)
            .expect("DATABASE_URL")
            .options([("search_path", schema.as_str())]);
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .expect("connect to DATABASE_URL");

        sqlx::raw_sql(&format!(r#"CREATE SCHEMA "{}";"#, schema))
            .execute(&pool)
            .await
            .expect("create schema");
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&pool)
            .await
            .expect("create tables");
        Some(Self { pool, schema })
    }

    fn app(&self) -> Router {
        let config = Config {
            database_url: String::new(),
            redis_url: "redis://127.0.0.1:1/".into(),
            jwt_secret: SECRET.into(),
            server_host: "127.0.0.1".into(),
            server_port: 0,
            api_base_uri: "/api".into(),
            rate_limit_window_secs: 60,
            rate_limit_requests: 100,
            stripe_secret_key: "sk_test_123".into(),
            stripe_api_base: "http://127.0.0.1:1".into(),
            plaid_client_id: String::new(),
            plaid_secret: String::new(),
            plaid_env_url: "http://127.0.0.1:1".into(),
            storage_url: "http://127.0.0.1:1".into(),
            storage_service_key: "service-key".into(),
            storage_bucket: "business-images".into(),
            portal_base_url: "http://localhost:5173".into(),
            max_upload_bytes: 1024,
            category_cache_secs: 600,
        };
        let redis = Arc::new(redis::Client::open(config.redis_url.clone()).expect("redis client"));
        app(AppState::new(self.pool.clone(), redis, config))
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        bearer: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer));
        let req = match body {
            Some(b) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };
        let resp = self.app().oneshot(req).await.expect("response");
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn insert_business(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO business_profiles (id, business_name) VALUES ($1, $2)")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await
            .expect("insert business");
        id
    }

    async fn cleanup(self) {
        sqlx::raw_sql(&format!(r#"DROP SCHEMA "{}" CASCADE;"#, self.schema))
            .execute(&self.pool)
            .await
            .expect("drop schema");
        self.pool.close().await;
    }
}

fn admin() -> String {
    generate_token("admin-1", Role::Admin, None, SECRET, chrono::Duration::hours(1))
        .expect("token")
        .0
}

fn owner(business_id: Uuid) -> String {
    generate_token(
        "owner-1",
        Role::BusinessOwner,
        Some(business_id),
        SECRET,
        chrono::Duration::hours(1),
    )
    .expect("token")
    .0
}

fn location(name: &str, is_primary: bool) -> Value {
    json!({
        "location_name": name,
        "address_line1": "1 Main St",
        "city": "Austin",
        "state": "TX",
        "postal_code": "78701",
        "is_primary": is_primary,
    })
}

fn primary_ids(list: &Value) -> Vec<String> {
    list["data"]
        .as_array()
        .expect("location list")
        .iter()
        .filter(|l| l["is_primary"] == true)
        .map(|l| l["id"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn only_one_primary_location_per_business() {
    let Some(db) = TestDb::create().await else {
        return;
    };
    let business = db.insert_business("Glow Spa").await;
    let token = owner(business);
    let uri = format!("/api/businesses/{}/locations", business);

    let (status, first) = db.send("POST", &uri, &token, Some(location("Downtown", true))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, second) = db.send("POST", &uri, &token, Some(location("North", true))).await;
    assert_eq!(status, StatusCode::CREATED);
    let first_id = first["data"]["id"].as_str().unwrap().to_string();
    let second_id = second["data"]["id"].as_str().unwrap().to_string();

    let (_, list) = db.send("GET", &uri, &token, None).await;
    assert_eq!(primary_ids(&list), vec![second_id.clone()]);

    // 把第一家改回主门店
    let (status, _) = db
        .send(
            "PUT",
            &format!("{}/{}", uri, first_id),
            &token,
            Some(json!({"is_primary": true})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, list) = db.send("GET", &uri, &token, None).await;
    assert_eq!(primary_ids(&list), vec![first_id.clone()]);

    // 目标门店不存在时不能清掉现有的主标记
    let (status, _) = db
        .send(
            "PUT",
            &format!("{}/{}", uri, Uuid::new_v4()),
            &token,
            Some(json!({"is_primary": true})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, list) = db.send("GET", &uri, &token, None).await;
    assert_eq!(primary_ids(&list), vec![first_id]);

    db.cleanup().await;
}

#[tokio::test]
async fn category_assignment_is_replaced_as_a_whole() {
    let Some(db) = TestDb::create().await else {
        return;
    };
    let business = db.insert_business("Glow Spa").await;
    let token = owner(business);

    let (hair, nails) = (Uuid::new_v4(), Uuid::new_v4());
    let (cut, manicure) = (Uuid::new_v4(), Uuid::new_v4());
    for (id, name, order) in [(hair, "hair", 1), (nails, "nails", 2)] {
        sqlx::query(
            "INSERT INTO service_categories (id, service_category_type, sort_order) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(name)
        .bind(order)
        .execute(&db.pool)
        .await
        .unwrap();
    }
    for (id, parent, name) in [(cut, hair, "haircut"), (manicure, nails, "manicure")] {
        sqlx::query(
            "INSERT INTO service_subcategories (id, category_id, service_subcategory_type) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(parent)
        .bind(name)
        .execute(&db.pool)
        .await
        .unwrap();
    }

    let uri = format!("/api/businesses/{}/categories", business);
    let (status, body) = db
        .send(
            "PUT",
            &uri,
            &token,
            Some(json!({"category_ids": [hair, nails], "subcategory_ids": [cut, manicure]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = db
        .send(
            "PUT",
            &uri,
            &token,
            Some(json!({"category_ids": [nails], "subcategory_ids": [manicure]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let tree = body["data"].as_array().unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0]["id"], nails.to_string());
    assert_eq!(tree[0]["subcategories"][0]["id"], manicure.to_string());

    // 子分类的父分类未选中：拒绝，原有关联保持不变
    let (status, _) = db
        .send(
            "PUT",
            &uri,
            &token,
            Some(json!({"category_ids": [nails], "subcategory_ids": [cut]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let categories: Vec<Uuid> = sqlx::query_scalar(
        "SELECT category_id FROM business_service_categories WHERE business_id = $1",
    )
    .bind(business)
    .fetch_all(&db.pool)
    .await
    .unwrap();
    let subcategories: Vec<Uuid> = sqlx::query_scalar(
        "SELECT subcategory_id FROM business_service_subcategories WHERE business_id = $1",
    )
    .bind(business)
    .fetch_all(&db.pool)
    .await
    .unwrap();
    assert_eq!(categories, vec![nails]);
    assert_eq!(subcategories, vec![manicure]);

    db.cleanup().await;
}

#[tokio::test]
async fn completing_every_step_marks_setup_completed() {
    let Some(db) = TestDb::create().await else {
        return;
    };
    let business = db.insert_business("Glow Spa").await;
    let token = owner(business);
    let uri = format!("/api/onboarding/progress/{}", business);
    let setup_completed = || async {
        sqlx::query_scalar::<_, bool>("SELECT setup_completed FROM business_profiles WHERE id = $1")
            .bind(business)
            .fetch_one(&db.pool)
            .await
            .unwrap()
    };

    let steps = [
        "business_info",
        "tax_info",
        "stripe_connect",
        "bank_link",
        "services_pricing",
        "business_hours",
    ];
    for step in steps {
        let (status, _) = db
            .send("POST", &uri, &token, Some(json!({"step": step, "completed": true})))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", step);
    }
    assert!(!setup_completed().await);

    let (status, body) = db
        .send("POST", &uri, &token, Some(json!({"step": "review"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["percent_complete"], 100);
    assert_eq!(body["data"]["completed_steps"].as_array().unwrap().len(), 7);
    assert!(setup_completed().await);

    let (_, body) = db.send("GET", &uri, &token, None).await;
    assert_eq!(body["data"]["percent_complete"], 100);
    assert_eq!(body["data"]["current_step"], "review");

    db.cleanup().await;
}

#[tokio::test]
async fn stale_booking_status_update_is_rejected() {
    let Some(db) = TestDb::create().await else {
        return;
    };
    let business = db.insert_business("Glow Spa").await;
    let booking = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO bookings (id, business_id, booking_date, start_time, total_amount, booking_status)
        VALUES ($1, $2, DATE '2026-03-14', TIME '10:30', 85.50, 'pending')
        "#,
    )
    .bind(booking)
    .bind(business)
    .execute(&db.pool)
    .await
    .unwrap();

    let uri = format!("/api/bookings/{}/status", booking);
    let (status, body) = db
        .send("PUT", &uri, &admin(), Some(json!({"status": "confirmed"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["booking_status"], "confirmed");
    assert_eq!(body["data"]["business_name"], "Glow Spa");
    assert_eq!(body["data"]["total_amount"], 85.5);

    // 另一请求仍以 pending 为前提写入：条件更新不命中
    let updated = Booking::set_status(&db.pool, booking, "pending", BookingStatus::Cancelled)
        .await
        .unwrap();
    assert!(!updated);
    let current: String =
        sqlx::query_scalar("SELECT booking_status FROM bookings WHERE id = $1")
            .bind(booking)
            .fetch_one(&db.pool)
            .await
            .unwrap();
    assert_eq!(current, "confirmed");

    let (status, _) = db
        .send("PUT", &uri, &admin(), Some(json!({"status": "completed"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    db.cleanup().await;
}

#[tokio::test]
async fn provider_location_must_belong_to_the_business() {
    let Some(db) = TestDb::create().await else {
        return;
    };
    let mine = db.insert_business("Glow Spa").await;
    let other = db.insert_business("Other Spa").await;

    let (_, own_location) = db
        .send(
            "POST",
            &format!("/api/businesses/{}/locations", mine),
            &owner(mine),
            Some(location("Downtown", true)),
        )
        .await;
    let (_, foreign_location) = db
        .send(
            "POST",
            &format!("/api/businesses/{}/locations", other),
            &owner(other),
            Some(location("Elsewhere", true)),
        )
        .await;
    let own_location = own_location["data"]["id"].clone();
    let foreign_location = foreign_location["data"]["id"].clone();

    let uri = format!("/api/businesses/{}/providers", mine);
    let provider = |location_id: &Value| {
        json!({
            "first_name": "Ana",
            "last_name": "Diaz",
            "email": "ana@glow.test",
            "location_id": location_id,
        })
    };

    let (status, body) = db
        .send("POST", &uri, &owner(mine), Some(provider(&foreign_location)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "location does not belong to this business");

    let (status, body) = db
        .send("POST", &uri, &owner(mine), Some(provider(&own_location)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let provider_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = db
        .send(
            "PUT",
            &format!("/api/providers/{}", provider_id),
            &admin(),
            Some(json!({"location_id": foreign_location})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stored: Option<Uuid> = sqlx::query_scalar("SELECT location_id FROM providers WHERE id = $1")
        .bind(Uuid::parse_str(&provider_id).unwrap())
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(stored.map(|id| id.to_string()), own_location.as_str().map(String::from));

    db.cleanup().await;
}

#[tokio::test]
async fn adding_enum_value_reports_created_then_ok() {
    let Some(db) = TestDb::create().await else {
        return;
    };
    let enum_name = format!("tier_{}", &Uuid::new_v4().simple().to_string()[..8]);
    sqlx::raw_sql(&format!(r#"CREATE TYPE "{}" AS ENUM ('basic');"#, enum_name))
        .execute(&db.pool)
        .await
        .unwrap();

    let body = json!({"enum_name": enum_name, "value": "premium"});
    let (status, first) = db
        .send("POST", "/api/database/add-enum-value", &admin(), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["data"]["values"], json!(["basic", "premium"]));

    let (status, again) = db
        .send("POST", "/api/database/add-enum-value", &admin(), Some(body))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["data"]["values"], json!(["basic", "premium"]));

    db.cleanup().await;
}
