mod handler;
mod model;

pub use handler::upload_image;
