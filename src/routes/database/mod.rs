mod handler;
mod model;

pub use handler::{add_enum_value, list_enum_values};
