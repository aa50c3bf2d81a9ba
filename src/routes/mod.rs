use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};

use crate::AppState;

pub mod booking;
pub mod business;
pub mod catalog;
pub(crate) mod common;
pub mod customer;
pub mod database;
pub mod document;
pub mod health;
pub mod image;
pub mod location;
pub mod onboarding;
pub mod plaid;
pub mod provider;
pub mod stripe;

/// base64 膨胀约 4/3，再留出 JSON 其余字段的余量
fn image_body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes / 3 * 4 + 64 * 1024
}

// 无需认证的路由
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/service-categories", get(catalog::list_service_categories))
}

// 需要认证的路由，调用方负责挂上认证中间件
pub fn protected_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // 数据库枚举
        .route("/database/add-enum-value", post(database::add_enum_value))
        .route(
            "/database/enum-values/{enum_name}",
            get(database::list_enum_values),
        )
        // 入驻向导
        .route(
            "/onboarding/business-profile/{business_id}",
            get(onboarding::get_business_profile).put(onboarding::update_business_profile),
        )
        .route(
            "/onboarding/progress/{business_id}",
            get(onboarding::get_progress).post(onboarding::update_progress),
        )
        .route(
            "/onboarding/tax-info/{business_id}",
            get(onboarding::get_tax_info).put(onboarding::put_tax_info),
        )
        // 商家管理
        .route("/businesses", get(business::list_businesses))
        .route(
            "/businesses/{business_id}",
            get(business::get_business)
                .put(business::update_business)
                .delete(business::delete_business),
        )
        .route(
            "/businesses/{business_id}/verification",
            post(business::set_verification),
        )
        .route(
            "/businesses/{business_id}/locations",
            get(location::list_locations).post(location::create_location),
        )
        .route(
            "/businesses/{business_id}/locations/{location_id}",
            put(location::update_location).delete(location::delete_location),
        )
        .route(
            "/businesses/{business_id}/categories",
            get(catalog::get_business_categories).put(catalog::set_business_categories),
        )
        .route(
            "/businesses/{business_id}/services",
            get(catalog::list_business_services),
        )
        .route(
            "/businesses/{business_id}/services/{service_id}",
            put(catalog::upsert_business_service).delete(catalog::delete_business_service),
        )
        .route(
            "/businesses/{business_id}/addons",
            get(catalog::list_business_addons),
        )
        .route(
            "/businesses/{business_id}/addons/{addon_id}",
            put(catalog::upsert_business_addon).delete(catalog::delete_business_addon),
        )
        .route(
            "/businesses/{business_id}/documents",
            get(document::list_documents),
        )
        .route(
            "/businesses/{business_id}/documents/{document_id}/review",
            post(document::review_document),
        )
        .route(
            "/businesses/{business_id}/providers",
            get(provider::list_business_providers).post(provider::create_provider),
        )
        .route(
            "/business/images/upload",
            post(image::upload_image).layer(DefaultBodyLimit::max(image_body_limit(
                max_upload_bytes,
            ))),
        )
        // 服务人员
        .route("/providers", get(provider::list_providers))
        .route(
            "/providers/{provider_id}",
            get(provider::get_provider)
                .put(provider::update_provider)
                .delete(provider::delete_provider),
        )
        // 客户
        .route("/customers", get(customer::list_customers))
        .route("/customers/{customer_id}", get(customer::get_customer))
        .route(
            "/customers/{customer_id}/status",
            put(customer::set_customer_status),
        )
        // 预约
        .route("/bookings", get(booking::list_bookings))
        .route("/bookings/{booking_id}", get(booking::get_booking))
        .route(
            "/bookings/{booking_id}/status",
            put(booking::update_booking_status),
        )
        // 支付与银行账户
        .route(
            "/stripe/create-connect-account",
            post(stripe::create_connect_account),
        )
        .route(
            "/stripe/account-status/{business_id}",
            get(stripe::get_account_status),
        )
        .route("/plaid/create-link-token", post(plaid::create_link_token))
        .route(
            "/plaid/exchange-public-token",
            post(plaid::exchange_public_token),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_limit_covers_base64_overhead() {
        let max = 5 * 1024 * 1024;
        assert!(image_body_limit(max) > max * 4 / 3);
    }
}
