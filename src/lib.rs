//! Medium-independent file storage.
//!
//! Applications build a [`StorageSettings`] from their configuration, hand it
//! to [`StorageFactory::create`] once at startup and keep the returned
//! backend for the life of the process. Every backend honors the same
//! [`StorageBackend`] contract.

pub mod storage;

pub use storage::{
    BoxedStorageBackend, StorageBackend, StorageDriver, StorageError, StorageFactory,
    StorageSettings,
};
