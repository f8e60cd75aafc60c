//! Document store abstraction for streamers, video catalogs and sync metadata.
//!
//! The atlas pipeline only needs a handful of primitives: per-streamer
//! scans, a wholesale catalog replace, an atomic batched slot rewrite and a
//! singleton metadata document. Backends implement [`CatalogStore`].

pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{AtlasCandidate, CatalogMetadata, Streamer, VideoKey, VideoRecord};

/// One record's switch from pending url to atlas slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAssignment {
    pub key: VideoKey,
    pub slot_index: u32,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_streamers(&self) -> Result<Vec<Streamer>, StoreError>;

    async fn update_subscriber_count(
        &self,
        streamer_id: &str,
        subscriber_count: i64,
    ) -> Result<(), StoreError>;

    /// Delete every video of the streamer and write `videos` in their place
    async fn replace_videos(
        &self,
        streamer_id: &str,
        videos: &[VideoRecord],
    ) -> Result<(), StoreError>;

    /// Videos of one streamer, newest first
    async fn list_videos(&self, streamer_id: &str) -> Result<Vec<VideoRecord>, StoreError>;

    /// Long-form videos of one streamer that still carry a pending thumbnail url
    async fn pending_candidates(
        &self,
        streamer_id: &str,
    ) -> Result<Vec<AtlasCandidate>, StoreError>;

    /// Commit one batch atomically: for each record, drop the pending url and set the slot.
    /// Callers keep batches at or under [`crate::constants::INDEX_BATCH_SIZE`].
    async fn assign_slots(&self, batch: &[SlotAssignment]) -> Result<(), StoreError>;

    /// Clear every slot index held by the streamer's records. Returns how many were cleared.
    async fn clear_slots(&self, streamer_id: &str) -> Result<u64, StoreError>;

    async fn read_metadata(&self) -> Result<CatalogMetadata, StoreError>;

    /// Stamp `updated_at` with the store's clock. `atlas_url` is only overwritten when `Some`.
    async fn write_metadata(&self, atlas_url: Option<&str>) -> Result<(), StoreError>;
}
