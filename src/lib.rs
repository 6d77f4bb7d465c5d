//! Request-admission gateway: per-client rate limiting, bearer-token checks
//! and reverse proxying to statically configured backends.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod proxy;
pub mod rate_limit;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{AuthError, GatewayError};
pub use state::AppState;
