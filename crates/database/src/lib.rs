//! # Podium Database Crate
//!
//! This crate is the data-access gateway of the results application. It owns
//! the PostgreSQL connection and every SQL statement the application runs.
//!
//! ## Architectural Principles
//!
//! - **Single Owned Connection:** `DbGateway` holds at most one connection.
//!   Callers needing parallel access create several gateways.
//! - **Bound Values Only:** user data is always bound as a parameter; the only
//!   interpolated SQL fragments are allow-listed column names.
//! - **Authorized Writes:** every write runs validate → authorize → execute →
//!   commit inside one transaction.
//!
//! ## Public API
//!
//! - `DbGateway`: connection lifecycle plus all query and write operations.
//! - `connect_options` / `open_connection`: driver setup from a `ConnectionConfig`.
//! - `verify_password` / `hash_password`: bcrypt helpers for the `Users` table.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod auth;
pub mod connection;
pub mod error;
pub mod gateway;
pub mod query;

// Re-export the key components to create a clean, public-facing API.
pub use auth::{hash_password, verify_password};
pub use connection::{connect_options, open_connection};
pub use error::DbError;
pub use gateway::DbGateway;
