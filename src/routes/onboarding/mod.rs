mod handler;
mod model;

pub use handler::{
    get_business_profile, get_progress, get_tax_info, put_tax_info, update_business_profile,
    update_progress,
};
pub use model::{OnboardingStep, Phase, ProgressSummary, SetupProgress, mark_step_complete};
