//! Asset store: resolves `category/key.extension` references to image bytes.
//!
//! Two backends: the local filesystem (development, tests) and an S3 / MinIO
//! bucket. Both reject references that could escape their root.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("invalid asset reference: {0}")]
    InvalidReference(String),

    #[error("asset storage error: {0}")]
    Storage(String),

    #[error("asset could not be decoded: {0}")]
    Decode(String),
}

/// Path-like reference to a stored asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    pub category: String,
    pub key: String,
    pub extension: String,
}

impl AssetRef {
    pub fn new(
        category: impl Into<String>,
        key: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            key: key.into(),
            extension: extension.into(),
        }
    }

    /// Relative storage path `category/key.extension`.
    ///
    /// Every component must be non-empty and free of separators and `..`.
    pub fn path(&self) -> Result<String, AssetError> {
        for (name, part) in [
            ("category", &self.category),
            ("key", &self.key),
            ("extension", &self.extension),
        ] {
            let invalid = part.trim().is_empty()
                || part.contains(['/', '\\', '\0'])
                || part.contains("..");
            if invalid {
                return Err(AssetError::InvalidReference(format!(
                    "{name} component {part:?} is not allowed"
                )));
            }
        }
        Ok(format!(
            "{}/{}.{}",
            self.category,
            self.key,
            self.extension.to_ascii_lowercase()
        ))
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.category, self.key, self.extension)
    }
}

/// Storage backend for image assets.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn fetch(&self, asset: &AssetRef) -> Result<Bytes, AssetError>;
}

/// Assets under a local directory.
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn fetch(&self, asset: &AssetRef) -> Result<Bytes, AssetError> {
        let path = self.root.join(asset.path()?);
        debug!(path = %path.display(), "reading asset from disk");
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AssetError::NotFound(asset.to_string()))
            }
            Err(e) => Err(AssetError::Storage(format!("{}: {e}", path.display()))),
        }
    }
}

/// Assets in an S3-compatible bucket, keyed `[prefix/]category/key.extension`.
#[derive(Debug, Clone)]
pub struct S3AssetStore {
    client: S3Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3AssetStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_matches('/');
        self.prefix = (!prefix.is_empty()).then(|| prefix.to_string());
        self
    }

    fn object_key(&self, asset: &AssetRef) -> Result<String, AssetError> {
        let path = asset.path()?;
        Ok(match &self.prefix {
            Some(prefix) => format!("{prefix}/{path}"),
            None => path,
        })
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn fetch(&self, asset: &AssetRef) -> Result<Bytes, AssetError> {
        let key = self.object_key(asset)?;
        debug!(bucket = %self.bucket, key = %key, "fetching asset from S3");

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    AssetError::NotFound(asset.to_string())
                } else {
                    AssetError::Storage(format!("S3 get_object failed for {key}: {e}"))
                }
            })?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| AssetError::Storage(format!("S3 body read failed for {key}: {e}")))?;
        Ok(body.into_bytes())
    }
}
