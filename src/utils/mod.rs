mod response;
mod token;
mod validate;

pub use response::{ApiResponse, error_codes, error_to_api_response, success_to_api_response};
pub use token::{Claims, Role, generate_token, verify_token};
pub use validate::{
    clamp_limit, is_plain_identifier, is_valid_email, optional_field, quote_literal,
    required_field, validate_email,
};
