//! BlobName: a validated, single-segment blob identifier.
//!
//! Names are used verbatim as file names inside the content and staging
//! areas, so anything that could resolve outside those directories is
//! rejected up front.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A blob name. Case-sensitive and byte-exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobName(String);

/// Reasons a string is not a usable blob name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("filename must not be empty")]
    Empty,

    #[error("filename must not contain slashes")]
    Separator,

    #[error("filename must not contain NUL bytes")]
    Nul,

    #[error("filename must not be a directory reference")]
    DotSegment,
}

impl BlobName {
    /// Validate `s` as a blob name.
    pub fn parse(s: &str) -> Result<Self, NameError> {
        if s.is_empty() {
            return Err(NameError::Empty);
        }
        if s.contains(['/', '\\']) {
            return Err(NameError::Separator);
        }
        if s.contains('\0') {
            return Err(NameError::Nul);
        }
        if s == "." || s == ".." {
            return Err(NameError::DotSegment);
        }
        Ok(Self(s.to_string()))
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BlobName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BlobName {
    type Error = NameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<BlobName> for String {
    fn from(name: BlobName) -> Self {
        name.0
    }
}

impl AsRef<str> for BlobName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
