//! # Index Database Crate
//!
//! This crate is the application-specific interface to the SQLite file that
//! holds the index's history. It is the system's "permanent archive."
//!
//! ## Architectural Principles
//!
//! - **Adapter:** All SQL lives here. The rest of the workspace only sees
//!   domain types from `core-types`.
//! - **Append-only:** The three tables are logs. Nothing in this crate updates
//!   or deletes a stored row.
//! - **One durability point per append:** Each append commits on its own; two
//!   appends made during one run are not atomic with each other.
//!
//! ## Public API
//!
//! - `connect`: Opens (creating if needed) the database file.
//! - `init_schema`: Idempotently creates the `stocks`, `historical_prices` and
//!   `index_performance` tables.
//! - `DbRepository`: The append and read operations over those tables.
//! - `DbError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod repository;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, connect_in_memory, init_schema};
pub use error::DbError;
pub use repository::{DbRepository, Table};
