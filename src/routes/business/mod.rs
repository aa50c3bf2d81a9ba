mod handler;
pub(crate) mod model;

pub use handler::{delete_business, get_business, list_businesses, set_verification, update_business};
pub use model::{BusinessProfile, ImageColumn, ProfileChanges, UpdateBusinessProfileRequest, VerificationStatus};
