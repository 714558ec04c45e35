//! HTTP surface of the report desk.
//!
//! Everything that depends on axum sits behind the `web-axum` feature;
//! [`metrics`] is transport-independent.

pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod router;
#[cfg(feature = "web-axum")]
pub mod state;

pub use metrics::{count_permission_denials, Metrics};

#[cfg(feature = "web-axum")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "web-axum")]
pub use router::{build_router, HttpConfig};
#[cfg(feature = "web-axum")]
pub use state::AppState;
