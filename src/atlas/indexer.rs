//! Atlas cycle orchestration
//!
//! One cycle: gather every pending long-form thumbnail across streamers,
//! keep the newest `capacity` of them, download and normalize them
//! concurrently, pack the survivors into the atlas, publish it, and only then
//! switch the survivors from pending url to slot index.
//!
//! Slot `i` is the `i`-th survivor after failed candidates are dropped, which
//! is exactly the cell `i` the compositor painted. Publishing overwrites the
//! previous atlas, so every slot index left over from it is cleared before the
//! new ones are written. Metadata is left to the caller, who must only record
//! the returned url once this returns `Ok`.

use futures::future::try_join_all;
use futures::stream::{self, StreamExt};
use image::{Rgb, RgbImage};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use super::compose::{compose, encode_jpeg};
use super::fetch::ImageFetcher;
use super::layout::AtlasLayout;
use super::publish::AtlasPublisher;
use super::resize::resize_to_cell;
use crate::constants::{ATLAS_BACKGROUND, ATLAS_JPEG_QUALITY, INDEX_BATCH_SIZE};
use crate::error::AtlasError;
use crate::models::{AtlasCandidate, Streamer};
use crate::store::{CatalogStore, SlotAssignment};

/// Why a candidate was left out of this cycle's atlas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Download failed for any reason
    Unavailable,
    /// Downloaded bytes were not a decodable image
    Unprocessable,
}

#[derive(Debug)]
pub enum CellOutcome {
    Ready(RgbImage),
    Skipped(SkipReason),
}

/// Result of one atlas cycle. `atlas_url` is `None` when nothing was packed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtlasCycleOutcome {
    pub atlas_url: Option<String>,
    pub indexed_count: usize,
    pub skipped_count: usize,
}

pub struct CatalogIndexer {
    store: Arc<dyn CatalogStore>,
    fetcher: Arc<dyn ImageFetcher>,
    publisher: Arc<dyn AtlasPublisher>,
    layout: AtlasLayout,
    fetch_concurrency: usize,
}

impl CatalogIndexer {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        fetcher: Arc<dyn ImageFetcher>,
        publisher: Arc<dyn AtlasPublisher>,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            store,
            fetcher,
            publisher,
            layout: AtlasLayout::default(),
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    pub fn with_layout(mut self, layout: AtlasLayout) -> Self {
        self.layout = layout;
        self
    }

    pub async fn run_atlas_cycle(
        &self,
        streamers: &[Streamer],
    ) -> Result<AtlasCycleOutcome, AtlasError> {
        let mut candidates = self.collect_candidates(streamers).await?;
        let capacity = self.layout.capacity();

        info!(
            candidates = candidates.len(),
            capacity, "collected atlas candidates"
        );

        if candidates.is_empty() {
            return Ok(AtlasCycleOutcome::default());
        }

        // Truncation happens before any download; a failed candidate inside
        // the cap is not replaced by the next one outside it.
        candidates.truncate(capacity);

        let outcomes = self.render_cells(&candidates).await;
        let (survivors, cells, skipped) = compact(candidates, outcomes);
        let skipped_count = skipped.len();
        if skipped_count > 0 {
            let unprocessable = skipped
                .iter()
                .filter(|reason| **reason == SkipReason::Unprocessable)
                .count();
            warn!(
                unavailable = skipped_count - unprocessable,
                unprocessable, "candidates left out of this atlas"
            );
        }

        if survivors.is_empty() {
            warn!(skipped = skipped_count, "no thumbnail could be rendered, atlas not rebuilt");
            return Ok(AtlasCycleOutcome {
                atlas_url: None,
                indexed_count: 0,
                skipped_count,
            });
        }

        info!(
            cells = cells.len(),
            skipped = skipped_count,
            size = self.layout.canvas_size,
            "compositing atlas"
        );

        let layout = self.layout;
        let jpeg = tokio::task::spawn_blocking(move || {
            let canvas = compose(&cells, &layout, Rgb(ATLAS_BACKGROUND))?;
            encode_jpeg(&canvas, ATLAS_JPEG_QUALITY)
        })
        .await??;

        let atlas_url = self.publisher.publish(jpeg).await?;
        info!(url = %atlas_url, "atlas uploaded");

        let released = self.release_stale_slots(streamers).await?;
        if released > 0 {
            info!(released, "cleared slot indices into the replaced atlas");
        }

        let assignments: Vec<SlotAssignment> = survivors
            .into_iter()
            .enumerate()
            .map(|(slot, candidate)| SlotAssignment {
                key: candidate.key,
                slot_index: slot as u32,
            })
            .collect();

        self.assign_slots(&assignments).await?;
        info!(indexed = assignments.len(), "slot indices written, pending urls cleared");

        Ok(AtlasCycleOutcome {
            atlas_url: Some(atlas_url),
            indexed_count: assignments.len(),
            skipped_count,
        })
    }

    /// Pending candidates of every streamer, newest first across all of them.
    /// Equal timestamps fall back to key order so slots are reproducible.
    async fn collect_candidates(
        &self,
        streamers: &[Streamer],
    ) -> Result<Vec<AtlasCandidate>, AtlasError> {
        let per_streamer = try_join_all(
            streamers
                .iter()
                .map(|streamer| self.store.pending_candidates(&streamer.id)),
        )
        .await?;

        let mut candidates: Vec<AtlasCandidate> = per_streamer.into_iter().flatten().collect();
        candidates.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(candidates)
    }

    async fn render_cells(&self, candidates: &[AtlasCandidate]) -> Vec<CellOutcome> {
        let tasks: Vec<_> = candidates
            .iter()
            .map(|candidate| render_cell(self.fetcher.clone(), self.layout, candidate.clone()))
            .collect();
        indexed_fan_out(tasks, self.fetch_concurrency).await
    }

    /// Drop every slot index still held by the streamers' records. Returns how many were cleared.
    async fn release_stale_slots(&self, streamers: &[Streamer]) -> Result<u64, AtlasError> {
        let cleared = try_join_all(
            streamers
                .iter()
                .map(|streamer| self.store.clear_slots(&streamer.id)),
        )
        .await?;
        Ok(cleared.into_iter().sum())
    }

    async fn assign_slots(&self, assignments: &[SlotAssignment]) -> Result<(), AtlasError> {
        try_join_all(
            assignments
                .chunks(INDEX_BATCH_SIZE)
                .map(|batch| self.store.assign_slots(batch)),
        )
        .await?;
        Ok(())
    }
}

/// Download and cover-fit one candidate. Owns its inputs so the future is `'static`.
async fn render_cell(
    fetcher: Arc<dyn ImageFetcher>,
    layout: AtlasLayout,
    candidate: AtlasCandidate,
) -> CellOutcome {
    let Some(data) = fetcher.fetch(&candidate.thumbnail_url).await else {
        warn!(video = %candidate.key, url = %candidate.thumbnail_url, "skipping thumbnail: unavailable");
        return CellOutcome::Skipped(SkipReason::Unavailable);
    };

    let (width, height) = (layout.cell_width, layout.cell_height);
    let resized = tokio::task::spawn_blocking(move || resize_to_cell(&data, width, height)).await;

    match resized {
        Ok(Ok(cell)) => CellOutcome::Ready(cell),
        Ok(Err(e)) => {
            warn!(video = %candidate.key, url = %candidate.thumbnail_url, error = %e, "skipping thumbnail: unprocessable");
            CellOutcome::Skipped(SkipReason::Unprocessable)
        }
        Err(e) => {
            warn!(video = %candidate.key, error = %e, "skipping thumbnail: resize task failed");
            CellOutcome::Skipped(SkipReason::Unprocessable)
        }
    }
}

/// Run `tasks` with at most `concurrency` in flight and return their outputs
/// in submission order, whatever order they completed in.
async fn indexed_fan_out<Fut: Future>(tasks: Vec<Fut>, concurrency: usize) -> Vec<Fut::Output> {
    let mut slots: Vec<Option<Fut::Output>> = tasks.iter().map(|_| None).collect();

    let positioned: Vec<_> = tasks
        .into_iter()
        .enumerate()
        .map(|(position, task)| async move { (position, task.await) })
        .collect();
    let mut completed = stream::iter(positioned).buffer_unordered(concurrency);

    while let Some((position, result)) = completed.next().await {
        slots[position] = Some(result);
    }

    slots.into_iter().flatten().collect()
}

/// Drop skipped candidates, keeping the survivors' relative order
fn compact(
    candidates: Vec<AtlasCandidate>,
    outcomes: Vec<CellOutcome>,
) -> (Vec<AtlasCandidate>, Vec<RgbImage>, Vec<SkipReason>) {
    let mut survivors = Vec::with_capacity(candidates.len());
    let mut cells = Vec::with_capacity(candidates.len());
    let mut skipped = Vec::new();

    for (candidate, outcome) in candidates.into_iter().zip(outcomes) {
        match outcome {
            CellOutcome::Ready(cell) => {
                survivors.push(candidate);
                cells.push(cell);
            }
            CellOutcome::Skipped(reason) => skipped.push(reason),
        }
    }

    (survivors, cells, skipped)
}
