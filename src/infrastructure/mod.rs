//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL)
//! - Presence cache (Redis, or in-process)
//! - Prometheus metrics

pub mod cache;
pub mod database;
pub mod metrics;
pub mod repositories;
