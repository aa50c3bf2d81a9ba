mod handler;
mod model;

pub use handler::{
    create_provider, delete_provider, get_provider, list_business_providers, list_providers,
    update_provider,
};
pub use model::{Provider, ProviderRole, ReviewStatus};
