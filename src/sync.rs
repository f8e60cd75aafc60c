//! Periodic catalog sync
//!
//! A cycle refreshes every streamer's catalog from YouTube, rebuilds the
//! thumbnail atlas and finally stamps the metadata document. The metadata is
//! written only when the atlas cycle succeeded, so a reader never sees an
//! atlas url whose slot indices were not committed.

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::atlas::{AtlasCycleOutcome, CatalogIndexer};
use crate::constants::CATALOG_LOOKBACK_MONTHS;
use crate::error::{RefreshError, SyncError, YoutubeError};
use crate::models::{Streamer, VideoRecord};
use crate::store::CatalogStore;

/// Source of per-channel catalog data
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Channel uploads published at or after `since`
    async fn recent_videos(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<VideoRecord>, YoutubeError>;

    async fn subscriber_count(&self, channel_id: &str) -> Result<Option<i64>, YoutubeError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub streamers: usize,
    pub refreshed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub atlas: AtlasCycleOutcome,
}

enum Refresh {
    Updated { videos: usize },
    NoChannel,
}

pub struct SyncOrchestrator {
    store: Arc<dyn CatalogStore>,
    provider: Arc<dyn CatalogProvider>,
    indexer: CatalogIndexer,
    timeout: Duration,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        provider: Arc<dyn CatalogProvider>,
        indexer: CatalogIndexer,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            indexer,
            timeout,
        }
    }

    pub async fn run_cycle(&self) -> Result<SyncReport, SyncError> {
        let streamers = self.store.list_streamers().await?;
        let since = lookback_start(Utc::now());

        info!(streamers = streamers.len(), since = %since, "sync cycle started");

        let refreshes = join_all(
            streamers
                .iter()
                .map(|streamer| self.refresh_streamer(streamer, since)),
        )
        .await;

        let mut report = SyncReport {
            streamers: streamers.len(),
            ..SyncReport::default()
        };
        for (streamer, refresh) in streamers.iter().zip(refreshes) {
            match refresh {
                Ok(Refresh::Updated { videos }) => {
                    report.refreshed += 1;
                    info!(streamer = %streamer.id, videos, "catalog refreshed");
                }
                Ok(Refresh::NoChannel) => {
                    report.skipped += 1;
                    warn!(streamer = %streamer.id, "no YouTube channel linked, skipping refresh");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(streamer = %streamer.id, error = %e, "catalog refresh failed, keeping previous catalog");
                }
            }
        }

        report.atlas = self.indexer.run_atlas_cycle(&streamers).await?;
        self.store
            .write_metadata(report.atlas.atlas_url.as_deref())
            .await?;

        info!(
            streamers = report.streamers,
            refreshed = report.refreshed,
            skipped = report.skipped,
            failed = report.failed,
            indexed = report.atlas.indexed_count,
            skipped_thumbnails = report.atlas.skipped_count,
            "sync cycle finished"
        );

        Ok(report)
    }

    /// Run one cycle under the configured time budget
    pub async fn run_with_budget(&self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.run_cycle())
            .await
            .map_err(|_| SyncError::Timeout(self.timeout))
            .and_then(|r| r);

        let elapsed = started.elapsed();
        match &result {
            Ok(_) => info!(
                elapsed_secs = elapsed.as_secs(),
                elapsed_ms = elapsed.as_millis() as u64,
                "sync cycle completed"
            ),
            Err(e) => error!(
                elapsed_secs = elapsed.as_secs(),
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "sync cycle aborted"
            ),
        }
        result
    }

    /// Run a cycle now and then once per `interval`, forever
    pub async fn run_scheduler(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            // outcome is logged by run_with_budget; the next tick retries
            let _ = self.run_with_budget().await;
        }
    }

    async fn refresh_streamer(
        &self,
        streamer: &Streamer,
        since: DateTime<Utc>,
    ) -> Result<Refresh, RefreshError> {
        let Some(channel_id) = streamer.channel_id.as_deref() else {
            return Ok(Refresh::NoChannel);
        };

        let (subscribers, videos) = futures::join!(
            self.provider.subscriber_count(channel_id),
            self.provider.recent_videos(channel_id, since),
        );
        let videos = videos?;

        // an unreadable count leaves the stored one in place
        match subscribers {
            Ok(Some(count)) => {
                self.store
                    .update_subscriber_count(&streamer.id, count)
                    .await?;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(streamer = %streamer.id, error = %e, "subscriber count unavailable");
            }
        }
        self.store.replace_videos(&streamer.id, &videos).await?;

        Ok(Refresh::Updated {
            videos: videos.len(),
        })
    }
}

fn lookback_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(CATALOG_LOOKBACK_MONTHS))
        .unwrap_or(now)
}
