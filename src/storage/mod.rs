//! File storage backends.
//!
//! This module provides one interface for reading and writing files whether
//! they live in a local directory or an S3-compatible bucket. Both backends
//! are built on Apache OpenDAL.
//!
//! Supported drivers:
//!
//! - **local** - a directory on the local filesystem
//! - **amazons3** - Amazon S3 and S3-compatible services (MinIO, R2, ...)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    StorageSettings                          │
//! │  - Driver name and driver parameters                        │
//! │  - Validation / normalization of the S3 fields              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    StorageFactory                           │
//! │  - Resolves the driver, creates and connects the backend    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                      ┌───────┴────────┐
//!                      ▼                ▼
//!            ┌──────────────────┐ ┌──────────────────┐
//!            │  LocalFsStorage  │ │    S3Storage     │
//!            │    (OpenDAL)     │ │    (OpenDAL)     │
//!            └──────────────────┘ └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use filestore::storage::{StorageFactory, StorageSettings};
//!
//! let mut settings = StorageSettings::amazon_s3("my-bucket");
//! settings.s3_region = "eu-west-1".to_string();
//!
//! let backend = StorageFactory::create(settings, false).await?;
//!
//! for name in backend.list_directory("reports/").await? {
//!     println!("{}", name);
//! }
//!
//! let data = backend.read_all("reports/2024.csv").await?;
//! ```

mod error;
mod factory;
mod local_fs;
mod ops;
mod path;
mod s3;
mod traits;
mod types;

// Re-export main types
pub use error::{BoxError, Result, StorageError};
pub use factory::StorageFactory;
pub use path::normalize_path;
pub use traits::{BoxedFileReader, BoxedStorageBackend, FileReader, StorageBackend};
pub use types::{
    StorageDriver, StorageSettings, DEFAULT_S3_ENDPOINT, DEFAULT_S3_REGION, DRIVER_LOCAL,
    DRIVER_S3,
};

// Re-export storage implementations
pub use local_fs::{LocalFsStorage, STAGING_DIR};
pub use s3::S3Storage;
