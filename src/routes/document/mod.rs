mod handler;
mod model;

pub use handler::{list_documents, review_document};
