//! Error taxonomy for the store.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::name::NameError;
use crate::registry::AcquireError;

/// Errors produced by [`FileStore`](crate::FileStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("content-length is required")]
    LengthRequired,

    #[error("content-length must be less than {limit}")]
    TooLarge { limit: u64 },

    #[error(transparent)]
    InvalidName(#[from] NameError),

    #[error(transparent)]
    Busy(#[from] AcquireError),

    #[error("file already exists")]
    AlreadyExists,

    #[error("failed to create {area} directory")]
    CreateDir {
        area: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("could not open temp file")]
    OpenStaging(#[source] io::Error),

    #[error("upload transfer failed: {0}")]
    Transfer(#[source] io::Error),

    #[error("upload stalled for longer than {0:?}")]
    Timeout(Duration),

    #[error("failed to commit upload: {0}")]
    Commit(#[source] io::Error),

    #[error("failed to sweep staging area: {0}")]
    Sweep(#[source] io::Error),

    #[error("not found")]
    NotFound,

    #[error("failed to read blob: {0}")]
    Read(#[source] io::Error),
}

/// Coarse classification of a [`StoreError`], used to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself is unusable. No state was touched.
    Malformed,
    /// The name is busy or already stored. No state was touched.
    Conflict,
    /// The blob does not exist.
    NotFound,
    /// Filesystem setup failed on our side.
    Internal,
    /// The body could not be fully received or committed.
    Transfer,
}

impl StoreError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StoreError::LengthRequired | StoreError::TooLarge { .. } | StoreError::InvalidName(_) => {
                ErrorClass::Malformed
            }
            StoreError::Busy(_) | StoreError::AlreadyExists => ErrorClass::Conflict,
            StoreError::NotFound => ErrorClass::NotFound,
            StoreError::CreateDir { .. }
            | StoreError::OpenStaging(_)
            | StoreError::Sweep(_)
            | StoreError::Read(_) => ErrorClass::Internal,
            StoreError::Transfer(_) | StoreError::Timeout(_) | StoreError::Commit(_) => {
                ErrorClass::Transfer
            }
        }
    }
}
