//! Write-once blob storage for filebin.
//!
//! Blobs are addressed by a single-segment name and live in a flat
//! directory. Uploads are written to a staging area first and only become
//! visible once they are renamed into the content area, so readers never
//! observe a partially written blob.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use blobstore::{FileStore, StoreConfig};
//!
//! # async fn demo() -> Result<(), blobstore::StoreError> {
//! let store = FileStore::new(StoreConfig::with_root("/srv/filebin"));
//!
//! let data = b"Hello, World!";
//! let receipt = store.upload("hello.txt", Some(data.len() as u64), &data[..]).await?;
//! println!("stored {} ({} bytes)", receipt.name, receipt.size_bytes);
//!
//! let blob = store.open("hello.txt").await?;
//! println!("{} bytes on disk", blob.size);
//! # Ok(())
//! # }
//! ```
//!
//! # Layout
//!
//! ```text
//! {root}/
//! ├── file/
//! │   └── hello.txt      # Committed blobs, never rewritten
//! └── temp/
//!     └── report.pdf     # In-progress upload, same name as its target
//! ```
//!
//! # Concurrency
//!
//! At most one upload per name runs at a time. This is enforced by the
//! [`UploadRegistry`] owned by the store rather than by filesystem locks,
//! so uploads of different names never wait on each other.

pub mod config;
pub mod error;
pub mod name;
pub mod registry;
pub mod staging;
pub mod store;

pub use config::StoreConfig;
pub use error::{ErrorClass, StoreError};
pub use name::{BlobName, NameError};
pub use registry::{AcquireError, UploadPermit, UploadRegistry};
pub use staging::StagingFile;
pub use store::{FileStore, StoredBlob, UploadReceipt};
