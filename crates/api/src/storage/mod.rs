//! Blob storage for profile pictures.
//!
//! [`BlobStore`] is the port the picture service writes through.
//! [`ObjectStoreBlobs`] implements it over the `object_store` crate, either
//! against S3 (or an S3-compatible endpoint such as `MinIO`) or in memory.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{
    Attribute, Attributes, ObjectStore, PutOptions, PutPayload, path::Path as ObjectPath,
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};

/// Errors from the blob store.
#[derive(Debug, Error)]
pub enum BlobError {
    /// The backing store rejected or failed the request.
    #[error("object store error: {0}")]
    Store(#[from] object_store::Error),

    /// No blob exists at the key.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The key is not a valid object path.
    #[error("invalid object key: {0}")]
    InvalidKey(#[from] object_store::path::Error),
}

/// Storage port for binary blobs addressed by key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` at `key`, recording `content_type` on the object.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), BlobError>;

    /// Whether a blob exists at `key`.
    async fn exists(&self, key: &str) -> Result<bool, BlobError>;

    /// Read the blob at `key`.
    async fn get(&self, key: &str) -> Result<Bytes, BlobError>;

    /// Remove the blob at `key`. Removing a missing blob succeeds.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Public URL clients can fetch the blob from.
    fn public_url(&self, key: &str) -> String;
}

/// [`BlobStore`] backed by any `object_store` implementation.
#[derive(Clone)]
pub struct ObjectStoreBlobs {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
}

impl std::fmt::Debug for ObjectStoreBlobs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreBlobs")
            .field("store", &self.store.to_string())
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl ObjectStoreBlobs {
    /// Wrap an existing store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, public_base_url: impl Into<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            store,
            public_base_url,
        }
    }

    /// A process-local store, for development and tests.
    #[must_use]
    pub fn in_memory(public_base_url: impl Into<String>) -> Self {
        Self::new(
            Arc::new(object_store::memory::InMemory::new()),
            public_base_url,
        )
    }

    /// Build the store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `BlobError::Store` if the S3 client cannot be configured.
    pub fn from_config(config: &StorageConfig) -> Result<Self, BlobError> {
        match config.backend {
            StorageBackend::Memory => Ok(Self::in_memory(config.public_base_url.clone())),
            StorageBackend::S3 => {
                let mut builder = object_store::aws::AmazonS3Builder::new()
                    .with_bucket_name(&config.bucket)
                    .with_region(&config.region);

                if let Some(key_id) = &config.access_key_id {
                    builder = builder.with_access_key_id(key_id);
                }
                if let Some(secret) = &config.secret_access_key {
                    builder = builder.with_secret_access_key(secret.expose_secret());
                }
                if let Some(endpoint) = &config.endpoint {
                    builder = builder
                        .with_endpoint(endpoint)
                        .with_allow_http(endpoint.starts_with("http://"))
                        .with_virtual_hosted_style_request(false);
                }

                let store = builder.build()?;
                Ok(Self::new(Arc::new(store), config.public_base_url.clone()))
            }
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlobs {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), BlobError> {
        let path = ObjectPath::parse(key)?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&path, PutPayload::from(bytes), opts)
            .await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobError> {
        let path = ObjectPath::parse(key)?;
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, key: &str) -> Result<Bytes, BlobError> {
        let path = ObjectPath::parse(key)?;
        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(BlobError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(result.bytes().await?)
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = ObjectPath::parse(key)?;
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base_url)
    }
}
