//! In-memory store used by tests, with failure injection for the write paths.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use super::{CatalogStore, SlotAssignment};
use crate::error::StoreError;
use crate::models::{
    AtlasCandidate, CatalogMetadata, Streamer, ThumbnailState, VideoKey, VideoRecord,
};

#[derive(Default)]
struct MemoryState {
    streamers: Vec<Streamer>,
    videos: BTreeMap<String, Vec<VideoRecord>>,
    metadata: CatalogMetadata,
    slot_batches_before_failure: Option<usize>,
    failing_queries: HashSet<String>,
    failing_replaces: HashSet<String>,
    committed_batch_sizes: Vec<usize>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_streamer(&self, id: &str, channel_id: Option<&str>) {
        self.state.lock().unwrap().streamers.push(Streamer {
            id: id.to_string(),
            name: format!("{id} name"),
            soop_id: Some(format!("{id}_soop")),
            channel_id: channel_id.map(str::to_string),
            subscriber_count: None,
        });
    }

    pub fn put_videos(&self, streamer_id: &str, videos: Vec<VideoRecord>) {
        self.state
            .lock()
            .unwrap()
            .videos
            .insert(streamer_id.to_string(), videos);
    }

    pub fn set_metadata(&self, metadata: CatalogMetadata) {
        self.state.lock().unwrap().metadata = metadata;
    }

    pub fn video(&self, key: &VideoKey) -> Option<VideoRecord> {
        self.state
            .lock()
            .unwrap()
            .videos
            .get(&key.streamer_id)
            .and_then(|videos| videos.iter().find(|v| v.video_id == key.video_id).cloned())
    }

    pub fn metadata(&self) -> CatalogMetadata {
        self.state.lock().unwrap().metadata.clone()
    }

    pub fn streamer(&self, id: &str) -> Option<Streamer> {
        self.state
            .lock()
            .unwrap()
            .streamers
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    pub fn committed_batch_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().committed_batch_sizes.clone()
    }

    /// Let `n` slot batches commit, then fail every later one
    pub fn fail_slot_batches_after(&self, n: usize) {
        self.state.lock().unwrap().slot_batches_before_failure = Some(n);
    }

    pub fn fail_queries_for(&self, streamer_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_queries
            .insert(streamer_id.to_string());
    }

    pub fn fail_replace_for(&self, streamer_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_replaces
            .insert(streamer_id.to_string());
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_streamers(&self) -> Result<Vec<Streamer>, StoreError> {
        Ok(self.state.lock().unwrap().streamers.clone())
    }

    async fn update_subscriber_count(
        &self,
        streamer_id: &str,
        subscriber_count: i64,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(streamer) = state.streamers.iter_mut().find(|s| s.id == streamer_id) {
            streamer.subscriber_count = Some(subscriber_count);
        }
        Ok(())
    }

    async fn replace_videos(
        &self,
        streamer_id: &str,
        videos: &[VideoRecord],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_replaces.contains(streamer_id) {
            return Err(StoreError::Database(sqlx::Error::Protocol(format!("replace {streamer_id} rejected"))));
        }
        state
            .videos
            .insert(streamer_id.to_string(), videos.to_vec());
        Ok(())
    }

    async fn list_videos(&self, streamer_id: &str) -> Result<Vec<VideoRecord>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut videos = state.videos.get(streamer_id).cloned().unwrap_or_default();
        videos.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(videos)
    }

    async fn pending_candidates(
        &self,
        streamer_id: &str,
    ) -> Result<Vec<AtlasCandidate>, StoreError> {
        let state = self.state.lock().unwrap();
        if state.failing_queries.contains(streamer_id) {
            return Err(StoreError::Database(sqlx::Error::Protocol(format!("query {streamer_id} rejected"))));
        }
        Ok(state
            .videos
            .get(streamer_id)
            .into_iter()
            .flatten()
            .filter(|v| !v.category.is_short())
            .filter_map(|v| {
                v.thumbnail.pending_url().map(|url| AtlasCandidate {
                    key: VideoKey::new(streamer_id, &v.video_id),
                    thumbnail_url: url.to_string(),
                    published_at: v.published_at,
                })
            })
            .collect())
    }

    async fn assign_slots(&self, batch: &[SlotAssignment]) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.slot_batches_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(StoreError::Database(sqlx::Error::Protocol("slot batch rejected".to_string())));
            }
            *remaining -= 1;
        }

        for assignment in batch {
            let video = state
                .videos
                .get_mut(&assignment.key.streamer_id)
                .and_then(|videos| {
                    videos
                        .iter_mut()
                        .find(|v| v.video_id == assignment.key.video_id)
                });
            if let Some(video) = video {
                video.thumbnail = ThumbnailState::Atlased(assignment.slot_index);
            }
        }
        state.committed_batch_sizes.push(batch.len());
        Ok(())
    }

    async fn clear_slots(&self, streamer_id: &str) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap();
        let mut cleared = 0;
        for video in state.videos.get_mut(streamer_id).into_iter().flatten() {
            if video.thumbnail.slot_index().is_some() {
                video.thumbnail = ThumbnailState::NotEligible;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn read_metadata(&self) -> Result<CatalogMetadata, StoreError> {
        Ok(self.state.lock().unwrap().metadata.clone())
    }

    async fn write_metadata(&self, atlas_url: Option<&str>) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.metadata.updated_at = Some(Utc::now());
        if let Some(url) = atlas_url {
            state.metadata.atlas_url = Some(url.to_string());
        }
        Ok(())
    }
}
