//! Shared data models used across modules

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::SHORTS_MAX_SECONDS;

/// A tracked content creator
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Streamer {
    pub id: String,
    pub name: String,
    pub soop_id: Option<String>,
    pub channel_id: Option<String>,
    pub subscriber_count: Option<i64>,
}

/// Storage location of a video record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VideoKey {
    pub streamer_id: String,
    pub video_id: String,
}

impl VideoKey {
    pub fn new(streamer_id: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self {
            streamer_id: streamer_id.into(),
            video_id: video_id.into(),
        }
    }
}

impl std::fmt::Display for VideoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.streamer_id, self.video_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCategory {
    Short,
    Long,
}

impl VideoCategory {
    /// Zero-length (unknown) durations count as long-form
    pub fn from_duration_secs(seconds: u64) -> Self {
        if seconds > 0 && seconds <= SHORTS_MAX_SECONDS {
            VideoCategory::Short
        } else {
            VideoCategory::Long
        }
    }

    pub fn is_short(self) -> bool {
        self == VideoCategory::Short
    }
}

/// Where a video's thumbnail lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailState {
    /// Remote address waiting to be packed into the next atlas
    Pending(String),
    /// Packed into the current atlas at this slot
    Atlased(u32),
    NotEligible,
}

impl ThumbnailState {
    /// Build from the two nullable store fields. A slot index wins over a stale url.
    pub fn from_fields(thumbnail_url: Option<String>, thumbnail_index: Option<i32>) -> Self {
        match (thumbnail_index, thumbnail_url) {
            (Some(slot), _) if slot >= 0 => ThumbnailState::Atlased(slot as u32),
            (_, Some(url)) if !url.is_empty() => ThumbnailState::Pending(url),
            _ => ThumbnailState::NotEligible,
        }
    }

    pub fn pending_url(&self) -> Option<&str> {
        match self {
            ThumbnailState::Pending(url) => Some(url),
            _ => None,
        }
    }

    pub fn slot_index(&self) -> Option<u32> {
        match self {
            ThumbnailState::Atlased(slot) => Some(*slot),
            _ => None,
        }
    }
}

/// A single video in a streamer's catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    pub views: u64,
    pub published_at: DateTime<Utc>,
    pub category: VideoCategory,
    pub thumbnail: ThumbnailState,
}

impl VideoRecord {
    /// New record as written by a catalog refresh. Shorts never queue for the atlas.
    pub fn new(
        video_id: impl Into<String>,
        title: impl Into<String>,
        views: u64,
        published_at: DateTime<Utc>,
        category: VideoCategory,
        thumbnail_url: Option<String>,
    ) -> Self {
        let thumbnail = match thumbnail_url {
            Some(url) if !category.is_short() && !url.is_empty() => ThumbnailState::Pending(url),
            _ => ThumbnailState::NotEligible,
        };
        Self {
            video_id: video_id.into(),
            title: title.into(),
            views,
            published_at,
            category,
            thumbnail,
        }
    }
}

/// A video eligible for the atlas, alive for one cycle only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasCandidate {
    pub key: VideoKey,
    pub thumbnail_url: String,
    pub published_at: DateTime<Utc>,
}

/// System-wide sync metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogMetadata {
    pub updated_at: Option<DateTime<Utc>>,
    pub atlas_url: Option<String>,
}
