mod handler;
mod model;

pub use handler::{create_connect_account, get_account_status};
