//! Aggregated catalog view (GET /videos)

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;
use crate::error::{LogErr, StoreError};
use crate::models::{Streamer, VideoRecord};
use crate::store::CatalogStore;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogView {
    pub updated_at: Option<DateTime<Utc>>,
    pub atlas_url: Option<String>,
    pub list: Vec<StreamerView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamerView {
    pub name: String,
    pub soop_id: Option<String>,
    pub subscriber_count: i64,
    pub shorts: Vec<ShortView>,
    pub longs: Vec<LongView>,
}

#[derive(Debug, Serialize)]
pub struct ShortView {
    pub title: String,
    pub views: u64,
}

/// `thumbnailIndex` is the atlas slot, or null until the video is packed
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LongView {
    pub title: String,
    pub views: u64,
    pub thumbnail_index: Option<u32>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/videos", get(list_videos))
}

/// GET /videos - Every streamer with their shorts and long-form videos, newest first
async fn list_videos(State(state): State<Arc<AppState>>) -> Result<Json<CatalogView>, StatusCode> {
    aggregate(state.store.as_ref())
        .await
        .log_500("Aggregate catalog error")
        .map(Json)
}

pub async fn aggregate(store: &dyn CatalogStore) -> Result<CatalogView, StoreError> {
    let (metadata, streamers) = futures::try_join!(store.read_metadata(), store.list_streamers())?;

    let list = try_join_all(streamers.into_iter().map(|streamer| async move {
        let videos = store.list_videos(&streamer.id).await?;
        Ok::<_, StoreError>(streamer_view(streamer, videos))
    }))
    .await?;

    Ok(CatalogView {
        updated_at: metadata.updated_at,
        atlas_url: metadata.atlas_url,
        list,
    })
}

fn streamer_view(streamer: Streamer, videos: Vec<VideoRecord>) -> StreamerView {
    let (shorts, longs): (Vec<_>, Vec<_>) = videos.into_iter().partition(|v| v.category.is_short());

    StreamerView {
        name: streamer.name,
        soop_id: streamer.soop_id,
        subscriber_count: streamer.subscriber_count.unwrap_or(0),
        shorts: shorts
            .into_iter()
            .map(|v| ShortView {
                title: v.title,
                views: v.views,
            })
            .collect(),
        longs: longs
            .into_iter()
            .map(|v| LongView {
                thumbnail_index: v.thumbnail.slot_index(),
                title: v.title,
                views: v.views,
            })
            .collect(),
    }
}
