//! Sentra API - REST API server
//!
//! This crate provides the HTTP surface for Sentra: authenticated account,
//! segment, campaign and content assist endpoints, plus the public
//! tracking, unsubscribe and provider webhook endpoints.

pub mod auth;
pub mod handlers;
pub mod routes;

pub use auth::AppState;
pub use routes::create_router;
