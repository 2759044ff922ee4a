//! Storage service implementation using Apache OpenDAL.

use std::future::IntoFuture;

use bytes::Bytes;
use opendal::{Operator, services};
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::{StorageConfig, StorageProvider};
use super::error::StorageError;
use super::store::AssetStore;
use crate::attachment::AttachmentDescriptor;

/// Storage service for uploaded images.
#[derive(Debug, Clone)]
pub struct StorageService {
    operator: Operator,
    config: StorageConfig,
    supports_content_type: bool,
}

impl StorageService {
    /// Create a new storage service from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage provider cannot be initialized.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let operator = Self::create_operator(&config.provider)?;
        let supports_content_type = operator.info().full_capability().write_with_content_type;
        Ok(Self {
            operator,
            config,
            supports_content_type,
        })
    }

    /// Create OpenDAL operator from provider config.
    fn create_operator(provider: &StorageProvider) -> Result<Operator, StorageError> {
        match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => build(
                services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region),
            ),
            StorageProvider::AzureBlob {
                account,
                access_key,
                container,
            } => build(
                services::Azblob::default()
                    .account_name(account)
                    .account_key(access_key)
                    .container(container),
            ),
            StorageProvider::LocalFs { root } => {
                let root = root
                    .to_str()
                    .ok_or_else(|| StorageError::configuration("invalid path"))?;
                build(services::Fs::default().root(root))
            }
            StorageProvider::Memory => build(services::Memory::default()),
        }
    }

    /// Generate a fresh object key for an upload.
    ///
    /// Format: `{key_prefix}/{uuid_v7}.{ext}`
    #[must_use]
    pub fn generate_key(&self, mime_hint: &str) -> String {
        format!(
            "{}/{}.{}",
            self.config.key_prefix,
            Uuid::now_v7(),
            extension_for(mime_hint)
        )
    }

    /// Get the storage provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.config.provider.name()
    }

    /// Get the bucket/container name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        self.config.provider.bucket()
    }

    /// Run one remote call under the configured timeout.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        key: &str,
        call: impl IntoFuture<Output = opendal::Result<T>>,
    ) -> Result<T, StorageError> {
        match tokio::time::timeout(self.config.operation_timeout, call).await {
            Ok(result) => result.map_err(|e| StorageError::from_opendal(key, &e)),
            Err(_) => Err(StorageError::Timeout {
                operation,
                secs: self.config.operation_timeout.as_secs(),
            }),
        }
    }
}

impl StorageService {
    /// Pass an upload result through, removing the object on timeout.
    ///
    /// A timed-out write may still land remotely, and no descriptor is ever
    /// returned for it, so nothing upstream could reap it.
    async fn settle_upload<T>(
        &self,
        key: &str,
        result: Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if matches!(err, StorageError::Timeout { .. })
            && let Err(cleanup) = self.bounded("delete", key, self.operator.delete(key)).await
        {
            warn!(remote_id = key, error = %cleanup, "Failed to remove object after upload timeout");
        }
        Err(err)
    }
}

impl AssetStore for StorageService {
    async fn upload(
        &self,
        bytes: Bytes,
        mime_hint: &str,
    ) -> Result<AttachmentDescriptor, StorageError> {
        let key = self.generate_key(mime_hint);
        let size = bytes.len();

        let write = self.operator.write_with(&key, bytes);
        let write = if self.supports_content_type {
            write.content_type(mime_hint)
        } else {
            write
        };
        let written = self.bounded("upload", &key, write).await;
        self.settle_upload(&key, written).await?;

        debug!(remote_id = %key, size, provider = self.provider_name(), "Object uploaded");
        let url = self.config.public_url(&key);
        Ok(AttachmentDescriptor::new(key, url))
    }

    async fn delete(&self, remote_id: &str) -> Result<(), StorageError> {
        // OpenDAL deletes are idempotent; stat first so a missing object is reported.
        self.bounded("stat", remote_id, self.operator.stat(remote_id))
            .await?;
        self.bounded("delete", remote_id, self.operator.delete(remote_id))
            .await?;

        debug!(remote_id, provider = self.provider_name(), "Object deleted");
        Ok(())
    }

    async fn exists(&self, remote_id: &str) -> Result<bool, StorageError> {
        match self
            .bounded("stat", remote_id, self.operator.stat(remote_id))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn build<B: opendal::Builder>(builder: B) -> Result<Operator, StorageError> {
    Operator::new(builder)
        .map(|operator| operator.finish())
        .map_err(|e| StorageError::configuration(e.to_string()))
}

/// File extension for an object key, derived from its media type.
fn extension_for(mime_hint: &str) -> &'static str {
    let Ok(mime) = mime_hint.parse::<mime::Mime>() else {
        return "bin";
    };

    if mime.subtype() == mime::JPEG {
        return "jpg";
    }

    mime_guess::get_mime_extensions(&mime)
        .and_then(|extensions| extensions.first().copied())
        .unwrap_or("bin")
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    // Every generated key is `{prefix}/{uuid}.{ext}` with a safe extension.
    proptest! {
        #[test]
        fn prop_key_format(subtype in "[a-z]{1,12}", prefix in "[a-z][a-z0-9-]{0,15}") {
            let config = StorageConfig::new(StorageProvider::Memory, "https://cdn.example.com")
                .with_key_prefix(prefix.clone());
            let service = StorageService::from_config(config).expect("memory store should build");

            let key = service.generate_key(&format!("image/{subtype}"));
            let parts: Vec<&str> = key.split('/').collect();
            prop_assert_eq!(parts.len(), 2);
            prop_assert_eq!(parts[0], prefix.as_str());

            let (stem, ext) = parts[1].rsplit_once('.').expect("extension present");
            prop_assert!(Uuid::parse_str(stem).is_ok());
            prop_assert!(ext.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }
}
