mod handler;
mod model;

pub use handler::{create_link_token, exchange_public_token};
