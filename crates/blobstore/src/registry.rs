//! In-flight upload registry.
//!
//! Tracks which blob names currently have an upload running. Acquiring a
//! name hands back an [`UploadPermit`]; dropping the permit releases the
//! name, so every exit from the write path gives the slot back.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::name::BlobName;

/// Why a name could not be registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("upload already in progress for file")]
    Busy,

    #[error("upload already in progress for file ({capacity} uploads in flight)")]
    AtCapacity { capacity: usize },
}

/// Bounded set of names with an upload in progress.
#[derive(Debug)]
pub struct UploadRegistry {
    busy: Mutex<HashSet<BlobName>>,
    capacity: usize,
}

impl UploadRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            busy: Mutex::new(HashSet::new()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register `name` as being uploaded.
    ///
    /// Fails when the name is already registered or the registry holds
    /// `capacity` names, whichever name those are.
    pub fn try_acquire(self: &Arc<Self>, name: &BlobName) -> Result<UploadPermit, AcquireError> {
        let mut busy = self.lock();
        if busy.contains(name) {
            return Err(AcquireError::Busy);
        }
        if busy.len() >= self.capacity {
            return Err(AcquireError::AtCapacity {
                capacity: self.capacity,
            });
        }
        busy.insert(name.clone());

        Ok(UploadPermit {
            registry: Arc::clone(self),
            name: name.clone(),
        })
    }

    /// Number of uploads currently registered.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    pub fn is_busy(&self, name: &BlobName) -> bool {
        self.lock().contains(name)
    }

    fn release(&self, name: &BlobName) {
        self.lock().remove(name);
    }

    // The set is consistent after every operation, so a poisoned lock is
    // still safe to use.
    fn lock(&self) -> MutexGuard<'_, HashSet<BlobName>> {
        self.busy.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive claim on a blob name for the duration of one upload.
#[derive(Debug)]
pub struct UploadPermit {
    registry: Arc<UploadRegistry>,
    name: BlobName,
}

impl UploadPermit {
    pub fn name(&self) -> &BlobName {
        &self.name
    }
}

impl Drop for UploadPermit {
    fn drop(&mut self) {
        self.registry.release(&self.name);
    }
}
