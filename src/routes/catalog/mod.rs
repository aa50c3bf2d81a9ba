mod category;
mod handler;
mod service;

pub use handler::{
    delete_business_addon, delete_business_service, get_business_categories,
    list_business_addons, list_business_services, list_service_categories,
    set_business_categories, upsert_business_addon, upsert_business_service,
};
