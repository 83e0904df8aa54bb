pub mod artifact_handlers;
pub mod element_handlers;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod session;
pub mod user_extractor;

pub use errors::ErrorResponse;
pub use handlers::{AdapterState, AppState};
pub use routes::*;
