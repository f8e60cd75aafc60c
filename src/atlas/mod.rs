//! Thumbnail atlas pipeline: fetch, resize, compose, publish, re-index.

pub mod compose;
pub mod fetch;
pub mod indexer;
pub mod layout;
pub mod publish;
pub mod resize;

pub use indexer::{AtlasCycleOutcome, CatalogIndexer};
