//! Domus HTTP server: axum routes over the risk-scan runtime.

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::build_router;
pub use state::AppState;
