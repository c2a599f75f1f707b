//! Upload identifiers.
//!
//! Upload ids are opaque to the service but name scratch directories, so
//! they are restricted to a path-safe alphabet.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Maximum length of an upload id.
pub const MAX_UPLOAD_ID_LEN: usize = 128;

/// A validated, path-safe upload identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UploadId(String);

impl UploadId {
    /// Validate and wrap an upload id.
    pub fn parse(value: impl Into<String>) -> Result<Self, AppError> {
        let value = value.into();
        if value.is_empty() || value.len() > MAX_UPLOAD_ID_LEN {
            return Err(AppError::validation(format!(
                "uploadId must be between 1 and {MAX_UPLOAD_ID_LEN} characters"
            )));
        }
        if value == "." || value == ".." {
            return Err(AppError::validation("uploadId must not be '.' or '..'"));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(AppError::validation(
                "uploadId may only contain letters, digits, '.', '_' and '-'",
            ));
        }
        Ok(Self(value))
    }

    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UploadId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UploadId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<UploadId> for String {
    fn from(id: UploadId) -> Self {
        id.0
    }
}

impl AsRef<str> for UploadId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
