//! Storage backend factory.
//!
//! The factory resolves the configured driver name and creates the matching
//! backend. It is the only place driver names are interpreted.

use tracing::info;

use super::error::Result;
use super::local_fs::LocalFsStorage;
use super::s3::S3Storage;
use super::traits::BoxedStorageBackend;
use super::types::{StorageDriver, StorageSettings};

/// Factory for creating storage backends from settings.
///
/// # Example
///
/// ```ignore
/// use filestore::storage::{StorageFactory, StorageSettings};
///
/// let mut settings = StorageSettings::amazon_s3("my-bucket");
/// settings.s3_region = "us-east-1".to_string();
///
/// let backend = StorageFactory::create(settings, false).await?;
/// ```
pub struct StorageFactory;

impl StorageFactory {
    /// Create a storage backend for the configured driver.
    ///
    /// # Arguments
    ///
    /// * `settings` - The storage settings naming the driver and its parameters
    /// * `compliance_mode` - Verify and audit deletes on the object store
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The driver name is not supported (`UnknownDriver`)
    /// - The S3 bucket is missing (`MissingConfiguration`)
    /// - The S3 bucket cannot be reached (`ConnectionFailure`)
    ///
    /// The local driver never fails here; problems with its directory show
    /// up on the first operation. Exactly one connection attempt is made for
    /// S3, without retries.
    pub async fn create(
        settings: StorageSettings,
        compliance_mode: bool,
    ) -> Result<BoxedStorageBackend> {
        match settings.driver()? {
            StorageDriver::Local => {
                info!(directory = %settings.directory.display(), "using local file storage");
                Ok(LocalFsStorage::boxed(settings.directory))
            }
            StorageDriver::AmazonS3 => {
                settings.validate_for_object_store()?;
                let settings = settings.normalize_for_object_store();
                let storage = S3Storage::connect(settings, compliance_mode).await?;
                Ok(Box::new(storage))
            }
        }
    }

    /// Drivers this factory can create.
    pub fn supported_drivers() -> Vec<StorageDriver> {
        StorageDriver::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::error::StorageError;

    #[tokio::test]
    async fn test_factory_creates_local_for_any_directory() {
        for dir in ["", "/definitely/not/here", "relative/dir"] {
            let backend = StorageFactory::create(StorageSettings::local(dir), false)
                .await
                .unwrap();
            assert_eq!(backend.driver(), StorageDriver::Local);
        }
    }

    #[tokio::test]
    async fn test_factory_local_ignores_s3_fields() {
        let mut settings = StorageSettings::local("/tmp/files");
        settings.s3_bucket = String::new();
        settings.s3_endpoint = "not a url".to_string();

        assert!(StorageFactory::create(settings, true).await.is_ok());
    }

    #[tokio::test]
    async fn test_factory_requires_bucket() {
        // unreachable endpoint: a network attempt would surface as ConnectionFailure
        let mut settings = StorageSettings::amazon_s3("");
        settings.s3_endpoint = "127.0.0.1:1".to_string();

        let err = StorageFactory::create(settings, false).await.err().unwrap();
        assert!(matches!(err, StorageError::MissingConfiguration("s3_bucket")));
    }

    #[tokio::test]
    async fn test_factory_rejects_unknown_driver() {
        let mut settings = StorageSettings::local("/tmp");
        settings.driver_name = "gcs".to_string();

        let err = StorageFactory::create(settings, false).await.err().unwrap();
        assert!(matches!(err, StorageError::UnknownDriver(name) if name == "gcs"));

        let err = StorageFactory::create(StorageSettings::default(), false)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::UnknownDriver(_)));
    }

    #[tokio::test]
    async fn test_factory_wraps_s3_connection_failure() {
        let mut settings = StorageSettings::amazon_s3("uploads");
        settings.s3_ssl = false;
        settings.s3_endpoint = "127.0.0.1:1".to_string();
        settings.s3_access_key_id = "key".to_string();
        settings.s3_secret_access_key = "secret".to_string();

        let err = StorageFactory::create(settings, false).await.err().unwrap();
        assert!(matches!(err, StorageError::ConnectionFailure { .. }));
        assert!(err.to_string().starts_with("unable to connect to the s3 backend"));
    }

    #[test]
    fn test_supported_drivers() {
        let drivers = StorageFactory::supported_drivers();
        assert_eq!(drivers.len(), 2);
        assert!(drivers.contains(&StorageDriver::Local));
        assert!(drivers.contains(&StorageDriver::AmazonS3));
    }
}
