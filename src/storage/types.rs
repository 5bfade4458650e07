//! Storage types and configuration.
//!
//! This module defines the supported drivers and the settings record the
//! factory consumes, including validation and normalization of the
//! object-store fields.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::error::{Result, StorageError};

/// Driver name for the local filesystem backend.
pub const DRIVER_LOCAL: &str = "local";

/// Driver name for the S3-compatible backend.
pub const DRIVER_S3: &str = "amazons3";

/// Endpoint used when an S3 endpoint is not configured.
pub const DEFAULT_S3_ENDPOINT: &str = "s3.amazonaws.com";

/// Region used when an S3 region is not configured.
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Supported storage drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    /// Local filesystem directory.
    Local,
    /// Amazon S3 and S3-compatible services (MinIO, R2, ...)
    #[serde(rename = "amazons3")]
    AmazonS3,
}

impl StorageDriver {
    /// The configuration name of this driver.
    pub fn name(&self) -> &'static str {
        match self {
            StorageDriver::Local => DRIVER_LOCAL,
            StorageDriver::AmazonS3 => DRIVER_S3,
        }
    }

    /// Get the display name for this driver.
    pub fn display_name(&self) -> &'static str {
        match self {
            StorageDriver::Local => "Local Filesystem",
            StorageDriver::AmazonS3 => "Amazon S3",
        }
    }

    /// Get all supported drivers.
    pub fn all() -> Vec<StorageDriver> {
        vec![StorageDriver::Local, StorageDriver::AmazonS3]
    }
}

impl FromStr for StorageDriver {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            DRIVER_LOCAL => Ok(StorageDriver::Local),
            DRIVER_S3 => Ok(StorageDriver::AmazonS3),
            other => Err(StorageError::UnknownDriver(other.to_string())),
        }
    }
}

impl std::fmt::Display for StorageDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Settings for constructing a storage backend.
///
/// Only the fields relevant to `driver_name` are looked at; the rest are
/// ignored. All fields default so partial JSON documents deserialize.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Driver name, `local` or `amazons3`.
    pub driver_name: String,
    /// Root directory for the local driver.
    pub directory: PathBuf,
    pub s3_access_key_id: String,
    pub s3_secret_access_key: String,
    pub s3_bucket: String,
    /// Key prefix every object is stored under.
    pub s3_path_prefix: String,
    pub s3_region: String,
    /// Host (optionally with port) of the S3 service, without scheme.
    pub s3_endpoint: String,
    /// Use https to talk to the endpoint.
    pub s3_ssl: bool,
    /// Request legacy V2 request signing.
    pub s3_signature_v2: bool,
    /// Enable server-side encryption with S3-managed keys.
    pub s3_sse: bool,
    /// Trace every request made to the service.
    pub s3_trace: bool,
}

impl StorageSettings {
    /// Settings for the local driver rooted at `directory`.
    pub fn local(directory: impl Into<PathBuf>) -> Self {
        Self {
            driver_name: DRIVER_LOCAL.to_string(),
            directory: directory.into(),
            ..Default::default()
        }
    }

    /// Settings for the S3 driver using `bucket`, with TLS on.
    pub fn amazon_s3(bucket: impl Into<String>) -> Self {
        Self {
            driver_name: DRIVER_S3.to_string(),
            s3_bucket: bucket.into(),
            s3_ssl: true,
            ..Default::default()
        }
    }

    /// Parse settings from a JSON document.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Load settings from a JSON file.
    pub fn from_json_file(path: &Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw).map_err(std::io::Error::from)
    }

    /// Resolve the configured driver name.
    pub fn driver(&self) -> Result<StorageDriver> {
        self.driver_name.parse()
    }

    /// Check the fields the S3 driver cannot work without.
    pub fn validate_for_object_store(&self) -> Result<()> {
        if self.s3_bucket.is_empty() {
            return Err(StorageError::MissingConfiguration("s3_bucket"));
        }
        Ok(())
    }

    /// Fill in defaults for unset S3 fields.
    ///
    /// Idempotent: normalizing twice yields the same settings.
    pub fn normalize_for_object_store(mut self) -> Self {
        if self.s3_endpoint.is_empty() {
            self.s3_endpoint = DEFAULT_S3_ENDPOINT.to_string();
        }
        self
    }

    /// Validate the S3 fields and default the endpoint in place.
    pub fn check_mandatory_s3_fields(&mut self) -> Result<()> {
        self.validate_for_object_store()?;
        *self = std::mem::take(self).normalize_for_object_store();
        Ok(())
    }

    /// Full endpoint URL including the scheme chosen by `s3_ssl`.
    pub fn s3_endpoint_url(&self) -> String {
        let endpoint = if self.s3_endpoint.is_empty() {
            DEFAULT_S3_ENDPOINT
        } else {
            self.s3_endpoint.as_str()
        };
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        let scheme = if self.s3_ssl { "https" } else { "http" };
        format!("{}://{}", scheme, endpoint)
    }

    /// Configured region, or the default one.
    pub fn s3_region_or_default(&self) -> &str {
        if self.s3_region.is_empty() {
            DEFAULT_S3_REGION
        } else {
            &self.s3_region
        }
    }
}

impl std::fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secret = if self.s3_secret_access_key.is_empty() {
            ""
        } else {
            "<redacted>"
        };
        f.debug_struct("StorageSettings")
            .field("driver_name", &self.driver_name)
            .field("directory", &self.directory)
            .field("s3_access_key_id", &self.s3_access_key_id)
            .field("s3_secret_access_key", &secret)
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_path_prefix", &self.s3_path_prefix)
            .field("s3_region", &self.s3_region)
            .field("s3_endpoint", &self.s3_endpoint)
            .field("s3_ssl", &self.s3_ssl)
            .field("s3_signature_v2", &self.s3_signature_v2)
            .field("s3_sse", &self.s3_sse)
            .field("s3_trace", &self.s3_trace)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_from_str() {
        assert_eq!("local".parse::<StorageDriver>().unwrap(), StorageDriver::Local);
        assert_eq!(
            "amazons3".parse::<StorageDriver>().unwrap(),
            StorageDriver::AmazonS3
        );

        let err = "ftp".parse::<StorageDriver>().unwrap_err();
        assert!(matches!(err, StorageError::UnknownDriver(name) if name == "ftp"));
    }

    #[test]
    fn test_driver_name_round_trips() {
        for driver in StorageDriver::all() {
            assert_eq!(driver.name().parse::<StorageDriver>().unwrap(), driver);
        }
    }

    #[test]
    fn test_validate_requires_bucket() {
        let settings = StorageSettings::amazon_s3("");
        assert!(matches!(
            settings.validate_for_object_store(),
            Err(StorageError::MissingConfiguration("s3_bucket"))
        ));

        let settings = StorageSettings::amazon_s3("uploads");
        assert!(settings.validate_for_object_store().is_ok());
    }

    #[test]
    fn test_validate_does_not_touch_endpoint() {
        let settings = StorageSettings::amazon_s3("uploads");
        settings.validate_for_object_store().unwrap();
        assert!(settings.s3_endpoint.is_empty());
    }

    #[test]
    fn test_normalize_defaults_endpoint_idempotently() {
        let once = StorageSettings::amazon_s3("uploads").normalize_for_object_store();
        assert_eq!(once.s3_endpoint, DEFAULT_S3_ENDPOINT);

        let twice = once.clone().normalize_for_object_store();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_keeps_custom_endpoint() {
        let mut settings = StorageSettings::amazon_s3("uploads");
        settings.s3_endpoint = "minio.local:9000".to_string();
        let settings = settings.normalize_for_object_store();
        assert_eq!(settings.s3_endpoint, "minio.local:9000");
    }

    #[test]
    fn test_check_mandatory_s3_fields_in_place() {
        let mut settings = StorageSettings::amazon_s3("uploads");
        settings.check_mandatory_s3_fields().unwrap();
        assert_eq!(settings.s3_endpoint, DEFAULT_S3_ENDPOINT);
        settings.check_mandatory_s3_fields().unwrap();
        assert_eq!(settings.s3_endpoint, DEFAULT_S3_ENDPOINT);

        let mut missing = StorageSettings::amazon_s3("");
        assert!(missing.check_mandatory_s3_fields().is_err());
        assert!(missing.s3_endpoint.is_empty());
    }

    #[test]
    fn test_endpoint_url_scheme() {
        let mut settings = StorageSettings::amazon_s3("uploads");
        assert_eq!(settings.s3_endpoint_url(), "https://s3.amazonaws.com");

        settings.s3_ssl = false;
        settings.s3_endpoint = "localhost:9000".to_string();
        assert_eq!(settings.s3_endpoint_url(), "http://localhost:9000");

        settings.s3_endpoint = "https://r2.example.com".to_string();
        assert_eq!(settings.s3_endpoint_url(), "https://r2.example.com");
    }

    #[test]
    fn test_region_default() {
        let mut settings = StorageSettings::amazon_s3("uploads");
        assert_eq!(settings.s3_region_or_default(), DEFAULT_S3_REGION);
        settings.s3_region = "eu-west-1".to_string();
        assert_eq!(settings.s3_region_or_default(), "eu-west-1");
    }

    #[test]
    fn test_settings_from_partial_json() {
        let settings = StorageSettings::from_json_str(
            r#"{"driver_name": "amazons3", "s3_bucket": "media", "s3_sse": true}"#,
        )
        .unwrap();
        assert_eq!(settings.driver().unwrap(), StorageDriver::AmazonS3);
        assert_eq!(settings.s3_bucket, "media");
        assert!(settings.s3_sse);
        assert!(!settings.s3_ssl);
        assert!(settings.s3_endpoint.is_empty());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let mut settings = StorageSettings::amazon_s3("uploads");
        settings.s3_secret_access_key = "hunter2".to_string();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
