//! # casitas-core
//!
//! Core crate for the Casitas inspection upload pipeline. Contains the
//! collaborator traits, configuration schemas, typed identifiers, and the
//! unified error system.
//!
//! This crate has **no** internal dependencies on other Casitas crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
