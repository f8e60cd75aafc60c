//! YouTube Data API v3 client for per-channel catalog refresh
//!
//! Only the three read endpoints the sync needs are wrapped: the uploads
//! playlist (for recent video ids), `videos.list` (for details) and
//! `channels.list` (for the subscriber count). All calls are keyed by API key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::constants::YOUTUBE_PAGE_SIZE;
use crate::error::YoutubeError;
use crate::models::{VideoCategory, VideoRecord};
use crate::sync::CatalogProvider;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Clone)]
pub struct YoutubeClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl YoutubeClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: API_BASE.to_string(),
            http: Client::new(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, YoutubeError> {
        let resp = self
            .http
            .get(format!("{}/{}", self.base_url, endpoint))
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await?;
            return Err(YoutubeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }

    /// Ids from the channel's uploads playlist published at or after `since`.
    ///
    /// The playlist is newest first, so paging stops at the first older item.
    pub async fn recent_video_ids(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, YoutubeError> {
        let playlist_id = uploads_playlist_id(channel_id);
        let page_size = YOUTUBE_PAGE_SIZE.to_string();
        let mut video_ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: PlaylistItemsResponse = {
                let mut params = vec![
                    ("part", "snippet"),
                    ("playlistId", playlist_id.as_str()),
                    ("maxResults", page_size.as_str()),
                ];
                if let Some(token) = page_token.as_deref() {
                    params.push(("pageToken", token));
                }
                self.get("playlistItems", &params).await?
            };

            let mut reached_older = false;
            for item in page.items {
                if item.snippet.published_at < since {
                    reached_older = true;
                    break;
                }
                video_ids.push(item.snippet.resource_id.video_id);
            }

            match page.next_page_token {
                Some(token) if !reached_older => page_token = Some(token),
                _ => break,
            }
        }

        Ok(video_ids)
    }

    /// Details for `video_ids`, fetched in concurrent chunks of 50
    pub async fn video_details(&self, video_ids: &[String]) -> Result<Vec<VideoRecord>, YoutubeError> {
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }

        let pages = try_join_all(video_ids.chunks(YOUTUBE_PAGE_SIZE).map(|chunk| {
            let ids = chunk.join(",");
            async move {
                let page: VideosResponse = self
                    .get(
                        "videos",
                        &[("part", "snippet,contentDetails,statistics"), ("id", ids.as_str())],
                    )
                    .await?;
                Ok::<_, YoutubeError>(page.items)
            }
        }))
        .await?;

        Ok(pages
            .into_iter()
            .flatten()
            .map(VideoItem::into_record)
            .collect())
    }

    /// Subscriber count of the channel; hidden counts read as 0, unknown channels as `None`
    pub async fn channel_subscriber_count(
        &self,
        channel_id: &str,
    ) -> Result<Option<i64>, YoutubeError> {
        let resp: ChannelsResponse = self
            .get("channels", &[("part", "statistics"), ("id", channel_id)])
            .await?;

        Ok(resp.items.into_iter().next().map(|channel| {
            if channel.statistics.hidden_subscriber_count {
                0
            } else {
                parse_count(channel.statistics.subscriber_count.as_deref()) as i64
            }
        }))
    }
}

#[async_trait]
impl CatalogProvider for YoutubeClient {
    async fn recent_videos(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<VideoRecord>, YoutubeError> {
        let ids = self.recent_video_ids(channel_id, since).await?;
        self.video_details(&ids).await
    }

    async fn subscriber_count(&self, channel_id: &str) -> Result<Option<i64>, YoutubeError> {
        self.channel_subscriber_count(channel_id).await
    }
}

/// `UCxxxx` channel ids map to the `UUxxxx` uploads playlist
fn uploads_playlist_id(channel_id: &str) -> String {
    match channel_id.strip_prefix("UC") {
        Some(rest) => format!("UU{}", rest),
        None => channel_id.to_string(),
    }
}

/// Seconds in an ISO-8601 duration such as `PT1H2M3S` or `P1DT5M`. Malformed input is 0.
pub fn parse_iso_duration(duration: &str) -> u64 {
    let Some(body) = duration.strip_prefix('P') else {
        return 0;
    };

    let mut total = 0u64;
    let mut number = String::new();
    let mut in_time = false;

    for c in body.chars() {
        match c {
            '0'..='9' => number.push(c),
            'T' if number.is_empty() => in_time = true,
            unit => {
                let Ok(value) = number.parse::<u64>() else {
                    return 0;
                };
                number.clear();
                let scale = match (in_time, unit) {
                    (false, 'D') => 86_400,
                    (true, 'H') => 3_600,
                    (true, 'M') => 60,
                    (true, 'S') => 1,
                    _ => return 0,
                };
                let Some(next) = value
                    .checked_mul(scale)
                    .and_then(|seconds| total.checked_add(seconds))
                else {
                    return 0;
                };
                total = next;
            }
        }
    }

    if number.is_empty() { total } else { 0 }
}

fn parse_count(value: Option<&str>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsResponse {
    next_page_token: Option<String>,
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: PlaylistSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistSnippet {
    published_at: DateTime<Utc>,
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    content_details: ContentDetails,
    #[serde(default)]
    statistics: VideoStatistics,
}

impl VideoItem {
    fn into_record(self) -> VideoRecord {
        let seconds = parse_iso_duration(&self.content_details.duration);
        let thumbnail_url = self
            .snippet
            .thumbnails
            .medium
            .or(self.snippet.thumbnails.default)
            .map(|t| t.url);

        VideoRecord::new(
            self.id,
            self.snippet.title,
            parse_count(self.statistics.view_count.as_deref()),
            self.snippet.published_at,
            VideoCategory::from_duration_secs(seconds),
            thumbnail_url,
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    published_at: DateTime<Utc>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
    medium: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelsResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    statistics: ChannelStatistics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    subscriber_count: Option<String>,
    #[serde(default)]
    hidden_subscriber_count: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ThumbnailState;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use chrono::TimeZone;
    use serde_json::{Value, json};
    use std::collections::HashMap;

    #[test]
    fn test_parse_iso_duration() {
        assert_eq!(parse_iso_duration("PT1M30S"), 90);
        assert_eq!(parse_iso_duration("PT2H"), 7200);
        assert_eq!(parse_iso_duration("PT1H2M3S"), 3723);
        assert_eq!(parse_iso_duration("P1DT1S"), 86_401);
        assert_eq!(parse_iso_duration("P0D"), 0);
        assert_eq!(parse_iso_duration("garbage"), 0);
        assert_eq!(parse_iso_duration("PT5"), 0);
        assert_eq!(parse_iso_duration(""), 0);
        assert_eq!(parse_iso_duration("P99999999999999999D"), 0);
        assert_eq!(parse_iso_duration("PT18446744073709551615S"), u64::MAX);
        assert_eq!(parse_iso_duration("PT18446744073709551615S1M"), 0);
    }

    #[test]
    fn test_uploads_playlist_id() {
        assert_eq!(uploads_playlist_id("UCabc123"), "UUabc123");
        assert_eq!(uploads_playlist_id("HCabc"), "HCabc");
    }

    fn playlist_item(id: &str, published: &str) -> Value {
        json!({ "snippet": { "publishedAt": published, "resourceId": { "videoId": id } } })
    }

    async fn playlist_items(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
        assert_eq!(q.get("playlistId").map(String::as_str), Some("UUchan"));
        assert_eq!(q.get("key").map(String::as_str), Some("test-key"));
        match q.get("pageToken").map(String::as_str) {
            None => Json(json!({
                "nextPageToken": "p2",
                "items": [
                    playlist_item("v1", "2025-05-30T00:00:00Z"),
                    playlist_item("v2", "2025-05-20T00:00:00Z"),
                ]
            })),
            Some("p2") => Json(json!({
                "nextPageToken": "p3",
                "items": [
                    playlist_item("v3", "2025-05-10T00:00:00Z"),
                    playlist_item("old", "2025-04-01T00:00:00Z"),
                ]
            })),
            Some(other) => panic!("paged past the cutoff: {other}"),
        }
    }

    async fn videos(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
        let items: Vec<Value> = q["id"]
            .split(',')
            .map(|id| {
                let (duration, thumbs) = match id {
                    "v1" => ("PT1H5M", json!({ "medium": { "url": "https://img/v1/m.jpg" }, "default": { "url": "https://img/v1/d.jpg" } })),
                    "v2" => ("PT45S", json!({ "medium": { "url": "https://img/v2/m.jpg" } })),
                    _ => ("PT20M", json!({ "default": { "url": format!("https://img/{id}/d.jpg") } })),
                };
                json!({
                    "id": id,
                    "snippet": { "title": format!("title {id}"), "publishedAt": "2025-05-30T00:00:00Z", "thumbnails": thumbs },
                    "contentDetails": { "duration": duration },
                    "statistics": { "viewCount": "1234" }
                })
            })
            .collect();
        Json(json!({ "items": items }))
    }

    async fn channels(Query(q): Query<HashMap<String, String>>) -> Result<Json<Value>, StatusCode> {
        match q["id"].as_str() {
            "UCchan" => Ok(Json(json!({ "items": [{ "statistics": { "subscriberCount": "5120", "hiddenSubscriberCount": false } }] }))),
            "UChidden" => Ok(Json(json!({ "items": [{ "statistics": { "hiddenSubscriberCount": true } }] }))),
            "UCquota" => Err(StatusCode::FORBIDDEN),
            _ => Ok(Json(json!({ "items": [] }))),
        }
    }

    async fn mock_api() -> YoutubeClient {
        let app = Router::new()
            .route("/playlistItems", get(playlist_items))
            .route("/videos", get(videos))
            .route("/channels", get(channels));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        YoutubeClient::new("test-key").with_base_url(&format!("http://{}", addr))
    }

    #[tokio::test]
    async fn test_recent_videos_stop_at_cutoff_and_classify() {
        let client = mock_api().await;
        let since = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();

        let records = client.recent_videos("UCchan", since).await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "v2", "v3"]);

        let v1 = &records[0];
        assert_eq!(v1.title, "title v1");
        assert_eq!(v1.views, 1234);
        assert_eq!(v1.category, VideoCategory::Long);
        assert_eq!(v1.thumbnail, ThumbnailState::Pending("https://img/v1/m.jpg".into()));

        // shorts carry no pending thumbnail even when the API sends one
        assert_eq!(records[1].category, VideoCategory::Short);
        assert_eq!(records[1].thumbnail, ThumbnailState::NotEligible);

        assert_eq!(
            records[2].thumbnail,
            ThumbnailState::Pending("https://img/v3/d.jpg".into())
        );
    }

    #[tokio::test]
    async fn test_video_details_chunks_by_fifty() {
        let client = mock_api().await;
        let ids: Vec<String> = (0..120).map(|i| format!("x{i}")).collect();

        let records = client.video_details(&ids).await.unwrap();
        assert_eq!(records.len(), 120);
        assert_eq!(records[0].video_id, "x0");
        assert_eq!(records[119].video_id, "x119");
    }

    #[tokio::test]
    async fn test_subscriber_counts() {
        let client = mock_api().await;
        assert_eq!(client.subscriber_count("UCchan").await.unwrap(), Some(5120));
        assert_eq!(client.subscriber_count("UChidden").await.unwrap(), Some(0));
        assert_eq!(client.subscriber_count("UCmissing").await.unwrap(), None);

        let err = client.subscriber_count("UCquota").await.unwrap_err();
        assert!(matches!(err, YoutubeError::Api { status: 403, .. }));
    }
}
