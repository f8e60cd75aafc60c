//! Atlas upload to durable storage
//!
//! The atlas always lands at [`ATLAS_OBJECT_PATH`], overwriting the previous
//! cycle's image, so its public address never changes.

use async_trait::async_trait;
use cloud_storage::object_access_control::{Entity, NewObjectAccessControl, Role};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::StorageBackend;
use crate::constants::ATLAS_OBJECT_PATH;
use crate::error::PublishError;

#[async_trait]
pub trait AtlasPublisher: Send + Sync {
    /// Store the encoded atlas and return its public address
    async fn publish(&self, jpeg: Vec<u8>) -> Result<String, PublishError>;
}

/// Pick the publisher matching the configured backend
pub fn from_backend(backend: &StorageBackend) -> Arc<dyn AtlasPublisher> {
    match backend {
        StorageBackend::Local {
            root,
            public_base_url,
        } => Arc::new(LocalAtlasPublisher::new(root.clone(), public_base_url.clone())),
        StorageBackend::Gcs { bucket } => Arc::new(GcsAtlasPublisher::new(bucket.clone())),
    }
}

pub struct GcsAtlasPublisher {
    bucket: String,
}

impl GcsAtlasPublisher {
    pub fn new(bucket: String) -> Self {
        Self { bucket }
    }

    pub fn public_url(&self) -> String {
        format!(
            "https://storage.googleapis.com/{}/{}",
            self.bucket, ATLAS_OBJECT_PATH
        )
    }
}

#[async_trait]
impl AtlasPublisher for GcsAtlasPublisher {
    async fn publish(&self, jpeg: Vec<u8>) -> Result<String, PublishError> {
        let client = cloud_storage::Client::default();

        client
            .object()
            .create(&self.bucket, jpeg, ATLAS_OBJECT_PATH, "image/jpeg")
            .await?;

        client
            .object_access_control()
            .create(
                &self.bucket,
                ATLAS_OBJECT_PATH,
                &NewObjectAccessControl {
                    entity: Entity::AllUsers,
                    role: Role::Reader,
                },
            )
            .await?;

        Ok(self.public_url())
    }
}

/// Writes the atlas under a local directory that the HTTP server exposes at `/media`
pub struct LocalAtlasPublisher {
    root: PathBuf,
    public_base_url: String,
}

impl LocalAtlasPublisher {
    pub fn new(root: PathBuf, public_base_url: String) -> Self {
        Self {
            root,
            public_base_url,
        }
    }
}

#[async_trait]
impl AtlasPublisher for LocalAtlasPublisher {
    async fn publish(&self, jpeg: Vec<u8>) -> Result<String, PublishError> {
        let full_path = self.root.join(ATLAS_OBJECT_PATH);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // rename is atomic, so readers see either the old file or the new one
        let staging = full_path.with_extension("jpg.partial");
        tokio::fs::write(&staging, &jpeg).await?;
        tokio::fs::rename(&staging, &full_path).await?;

        Ok(format!("{}/{}", self.public_base_url, ATLAS_OBJECT_PATH))
    }
}
