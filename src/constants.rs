//! Application constants

/// Side length of the square atlas canvas in pixels
pub const ATLAS_SIZE: u32 = 2048;

/// Width of a single atlas cell
pub const THUMB_WIDTH: u32 = 128;

/// Height of a single atlas cell (16:9 at 128 wide)
pub const THUMB_HEIGHT: u32 = 72;

/// JPEG quality used when encoding the atlas
pub const ATLAS_JPEG_QUALITY: u8 = 80;

/// Fill colour for cells with no thumbnail
pub const ATLAS_BACKGROUND: [u8; 3] = [0, 0, 0];

/// Object path of the atlas. Every cycle overwrites the same object.
pub const ATLAS_OBJECT_PATH: &str = "vuster-atlas/thumbnails.jpg";

/// Per-transaction write ceiling of the document store
pub const MAX_WRITES_PER_BATCH: usize = 500;

/// Records rewritten per index batch, one under the ceiling
pub const INDEX_BATCH_SIZE: usize = MAX_WRITES_PER_BATCH - 1;

/// Videos at or under this many seconds are shorts
pub const SHORTS_MAX_SECONDS: u64 = 180;

/// YouTube Data API page size and `videos.list` id chunk size
pub const YOUTUBE_PAGE_SIZE: usize = 50;

/// How far back a catalog refresh looks in each uploads playlist
pub const CATALOG_LOOKBACK_MONTHS: u32 = 1;
