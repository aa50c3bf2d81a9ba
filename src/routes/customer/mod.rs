mod handler;
mod model;

pub use handler::{get_customer, list_customers, set_customer_status};
