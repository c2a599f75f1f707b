//! # casitas-cache
//!
//! Session store implementations for the chunk assembly service. The
//! in-memory store is a [DashMap](https://crates.io/crates/dashmap) keyed by
//! upload id; other backends can implement the same
//! [`SessionStore`](casitas_core::traits::SessionStore) trait.

pub mod memory;

pub use memory::MemorySessionStore;
