//! # parlor-server
//!
//! HTTP surface of the Parlor chat server: the `/room` WebSocket endpoint,
//! signed session cookies, configuration and metrics.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod secrets;
pub mod session;

pub use config::Config;
pub use error::AppError;
pub use handlers::{router, run_server, AppState};
pub use secrets::{Secret, Secrets};
