mod auth;
mod error_handler;
mod rate_limit;

pub use auth::auth_middleware;
pub use error_handler::{log_errors, method_not_allowed, not_found};
pub use rate_limit::{RateLimiter, client_ip, rate_limit};
