//! # casitas-database
//!
//! PostgreSQL connection management and the record store implementations
//! that finalize writes evidence URLs into.

pub mod connection;
pub mod migration;
pub mod records;

pub use connection::DatabasePool;
pub use records::{MemoryRecordStore, PgRecordStore, build_record_store};
