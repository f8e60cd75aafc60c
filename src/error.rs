//! Error types for each layer, plus the route-level logging helper

use axum::http::StatusCode;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error(
        "no storage backend configured (set LOCAL_STORAGE_PATH or GOOGLE_APPLICATION_CREDENTIALS)"
    )]
    NoStorageBackend,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to write atlas to disk: {0}")]
    Io(#[from] std::io::Error),

    #[error("cloud storage error: {0}")]
    Gcs(#[from] cloud_storage::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum YoutubeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("YouTube API error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// Failure refreshing one streamer's catalog; never fatal to the cycle
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error(transparent)]
    Youtube(#[from] YoutubeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum AtlasError {
    #[error("candidate query failed: {0}")]
    Store(#[from] StoreError),

    #[error("atlas upload failed: {0}")]
    Publish(#[from] PublishError),

    #[error("atlas encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("{cells} cells exceed atlas capacity of {capacity}")]
    OverCapacity { cells: usize, capacity: usize },

    #[error("compositing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Atlas(#[from] AtlasError),

    #[error("sync cycle exceeded its {0:?} budget")]
    Timeout(Duration),
}

/// Extension trait for logging errors and converting to StatusCode
pub trait LogErr<T> {
    /// Log error with context and return INTERNAL_SERVER_ERROR
    fn log_500(self, context: &str) -> Result<T, StatusCode>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_500(self, context: &str) -> Result<T, StatusCode> {
        self.map_err(|e| {
            tracing::error!(error = %e, "{}", context);
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }
}
