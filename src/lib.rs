//! # Community Hub Library
//!
//! Backend for a community platform:
//! - Friendships as a state machine (request, accept, reject, cancel, remove, block)
//! - A notification inbox, persisted and pushed live
//! - A WebSocket hub with user and room groups, presence and heartbeats
//! - PostgreSQL for storage, Redis for cross-instance presence
//!
//! ## Architecture
//!
//! - **Domain Layer**: Entities, repository traits, the friendship rules
//! - **Application Layer**: Services and DTOs
//! - **Infrastructure Layer**: PostgreSQL repositories, presence cache, metrics
//! - **Presentation Layer**: HTTP handlers and the WebSocket hub
//!
//! ```text
//! community_hub/
//! +-- config/         Configuration management
//! +-- domain/         Entities, events, friendship policy
//! +-- application/    Services and DTOs
//! +-- infrastructure/ Database, presence cache, metrics
//! +-- presentation/   HTTP routes and the WebSocket hub
//! +-- shared/         Errors, pagination, snowflake IDs
//! ```

pub mod config;

pub mod domain;

pub mod application;

pub mod infrastructure;

pub mod presentation;

pub mod shared;

pub mod startup;

pub mod telemetry;
