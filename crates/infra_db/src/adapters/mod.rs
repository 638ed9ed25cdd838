//! Port adapters backed by PostgreSQL
//!
//! Adapters implement `core_kernel` port traits on top of the pool so the
//! API layer can treat the database like any other dependency.

pub mod health;

pub use health::PostgresHealthAdapter;
