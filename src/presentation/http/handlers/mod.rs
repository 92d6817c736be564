//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints.

pub mod auth;
pub mod friendship;
pub mod health;
pub mod notification;
pub mod user;
