//! SQLite event store.
//!
//! This module provides:
//! - Database initialization and schema
//! - SQLite pragma configuration
//! - Repository for the event log and delegator snapshots

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
