//! HTTP surface for the lexical graph service.
//!
//! This crate provides:
//! - The graph read endpoint with parameter validation
//! - The explicit augmentation endpoint
//! - Health reporting over store and cache counters

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;

pub use config::{ServerConfig, StoreMode};
pub use error::ApiError;
pub use handlers::{AppState, SharedState};
pub use routes::{create_router, create_router_with_middleware};
