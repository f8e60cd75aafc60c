//! Postgres-backed catalog store
//!
//! Each streamer's catalog lives in `videos`, keyed by (streamer_id, video_id).
//! The pending url and the slot index are two nullable columns; every write
//! path changes them together inside one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{CatalogStore, SlotAssignment};
use crate::error::StoreError;
use crate::models::{
    AtlasCandidate, CatalogMetadata, Streamer, ThumbnailState, VideoCategory, VideoKey,
    VideoRecord,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS streamers (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        soop_id TEXT,
        channel_id TEXT,
        subscriber_count BIGINT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS videos (
        streamer_id TEXT NOT NULL REFERENCES streamers(id) ON DELETE CASCADE,
        video_id TEXT NOT NULL,
        title TEXT NOT NULL,
        views BIGINT NOT NULL DEFAULT 0,
        is_shorts BOOLEAN NOT NULL,
        published_at TIMESTAMPTZ NOT NULL,
        thumbnail_url TEXT,
        thumbnail_index INTEGER,
        PRIMARY KEY (streamer_id, video_id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS videos_pending_atlas
        ON videos (streamer_id)
        WHERE is_shorts = FALSE AND thumbnail_url IS NOT NULL
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS catalog_metadata (
        id SMALLINT PRIMARY KEY CHECK (id = 1),
        updated_at TIMESTAMPTZ NOT NULL,
        atlas_url TEXT
    )
    "#,
];

#[derive(Debug, sqlx::FromRow)]
struct VideoRow {
    video_id: String,
    title: String,
    views: i64,
    is_shorts: bool,
    published_at: DateTime<Utc>,
    thumbnail_url: Option<String>,
    thumbnail_index: Option<i32>,
}

impl From<VideoRow> for VideoRecord {
    fn from(row: VideoRow) -> Self {
        let category = if row.is_shorts {
            VideoCategory::Short
        } else {
            VideoCategory::Long
        };
        VideoRecord {
            video_id: row.video_id,
            title: row.title,
            views: row.views.max(0) as u64,
            published_at: row.published_at,
            category,
            thumbnail: ThumbnailState::from_fields(row.thumbnail_url, row.thumbnail_index),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CandidateRow {
    video_id: String,
    thumbnail_url: String,
    published_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct MetadataRow {
    updated_at: DateTime<Utc>,
    atlas_url: Option<String>,
}

#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn list_streamers(&self) -> Result<Vec<Streamer>, StoreError> {
        let streamers = sqlx::query_as(
            r#"
            SELECT id, name, soop_id, channel_id, subscriber_count
            FROM streamers
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(streamers)
    }

    async fn update_subscriber_count(
        &self,
        streamer_id: &str,
        subscriber_count: i64,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE streamers SET subscriber_count = $1 WHERE id = $2")
            .bind(subscriber_count)
            .bind(streamer_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_videos(
        &self,
        streamer_id: &str,
        videos: &[VideoRecord],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM videos WHERE streamer_id = $1")
            .bind(streamer_id)
            .execute(&mut *tx)
            .await?;

        for video in videos {
            let slot = video.thumbnail.slot_index().map(|s| s as i32);
            sqlx::query(
                r#"
                INSERT INTO videos
                    (streamer_id, video_id, title, views, is_shorts, published_at,
                     thumbnail_url, thumbnail_index)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (streamer_id, video_id) DO UPDATE
                SET title = EXCLUDED.title,
                    views = EXCLUDED.views,
                    is_shorts = EXCLUDED.is_shorts,
                    published_at = EXCLUDED.published_at,
                    thumbnail_url = EXCLUDED.thumbnail_url,
                    thumbnail_index = EXCLUDED.thumbnail_index
                "#,
            )
            .bind(streamer_id)
            .bind(&video.video_id)
            .bind(&video.title)
            .bind(i64::try_from(video.views).unwrap_or(i64::MAX))
            .bind(video.category.is_short())
            .bind(video.published_at)
            .bind(video.thumbnail.pending_url())
            .bind(slot)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_videos(&self, streamer_id: &str) -> Result<Vec<VideoRecord>, StoreError> {
        let rows: Vec<VideoRow> = sqlx::query_as(
            r#"
            SELECT video_id, title, views, is_shorts, published_at, thumbnail_url, thumbnail_index
            FROM videos
            WHERE streamer_id = $1
            ORDER BY published_at DESC
            "#,
        )
        .bind(streamer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(VideoRecord::from).collect())
    }

    async fn pending_candidates(
        &self,
        streamer_id: &str,
    ) -> Result<Vec<AtlasCandidate>, StoreError> {
        let rows: Vec<CandidateRow> = sqlx::query_as(
            r#"
            SELECT video_id, thumbnail_url, published_at
            FROM videos
            WHERE streamer_id = $1
              AND is_shorts = FALSE
              AND thumbnail_url IS NOT NULL
            ORDER BY published_at DESC, video_id
            "#,
        )
        .bind(streamer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| AtlasCandidate {
                key: VideoKey::new(streamer_id, row.video_id),
                thumbnail_url: row.thumbnail_url,
                published_at: row.published_at,
            })
            .collect())
    }

    async fn assign_slots(&self, batch: &[SlotAssignment]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for assignment in batch {
            let result = sqlx::query(
                r#"
                UPDATE videos
                SET thumbnail_index = $1,
                    thumbnail_url = NULL
                WHERE streamer_id = $2 AND video_id = $3
                "#,
            )
            .bind(assignment.slot_index as i32)
            .bind(&assignment.key.streamer_id)
            .bind(&assignment.key.video_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tracing::warn!(video = %assignment.key, "slot assigned to a video that no longer exists");
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn clear_slots(&self, streamer_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET thumbnail_index = NULL
            WHERE streamer_id = $1 AND thumbnail_index IS NOT NULL
            "#,
        )
        .bind(streamer_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn read_metadata(&self) -> Result<CatalogMetadata, StoreError> {
        let row: Option<MetadataRow> =
            sqlx::query_as("SELECT updated_at, atlas_url FROM catalog_metadata WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(row
            .map(|row| CatalogMetadata {
                updated_at: Some(row.updated_at),
                atlas_url: row.atlas_url,
            })
            .unwrap_or_default())
    }

    async fn write_metadata(&self, atlas_url: Option<&str>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO catalog_metadata (id, updated_at, atlas_url)
            VALUES (1, NOW(), $1)
            ON CONFLICT (id) DO UPDATE
            SET updated_at = EXCLUDED.updated_at,
                atlas_url = COALESCE(EXCLUDED.atlas_url, catalog_metadata.atlas_url)
            "#,
        )
        .bind(atlas_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
