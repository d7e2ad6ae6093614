pub mod error;
pub mod handlers;
pub mod metadata;
pub mod routes;
pub mod tasks;

pub use error::ApiError;
pub use routes::create_router;
