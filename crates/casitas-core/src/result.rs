//! Convenience result type alias for Casitas.

use crate::error::AppError;

/// A specialized `Result` type for Casitas operations.
pub type AppResult<T> = Result<T, AppError>;
