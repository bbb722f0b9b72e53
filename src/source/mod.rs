//! Tile sources for deep-zoom viewers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Deep-zoom host viewer           │
//! └───────┬─────────────────────▲───────────┘
//!         │ TileSource queries  │ TileSourceEvent
//!         ▼                     │
//! ┌─────────────────────────────┴───────────┐
//! │            IrisTileSource               │
//! │  (address, generation, cached Pyramid)  │
//! └────────────────────┬────────────────────┘
//!                      │ GET /slides/{id}/metadata
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │        Transport (HttpTransport)        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The viewer fetches tiles itself, from the addresses returned by
//! [`TileSource::tile_address`].

mod events;
mod iris;
mod options;

pub use events::{EventHub, SlideInfo, TileSourceEvent, DEFAULT_EVENT_CAPACITY};
pub use iris::IrisTileSource;
pub use options::{SlideId, TileSourceOptions};

use crate::pyramid::{TILE_OVERLAP, TILE_SIZE};

// =============================================================================
// TileSource Trait
// =============================================================================

/// What a generic deep-zoom viewer needs from a tile source.
///
/// All methods are cheap synchronous reads and may be called from render or
/// scroll handlers. Before the source is ready they return empty results
/// (`0.0`, `(0, 0)` or `None`) and never panic.
pub trait TileSource: Send + Sync {
    /// Whether metadata is loaded and queries reflect the current slide.
    fn is_ready(&self) -> bool;

    /// Full-resolution width in pixels (0.0 until ready).
    fn width(&self) -> f64;

    /// Full-resolution height in pixels (0.0 until ready).
    fn height(&self) -> f64;

    /// Width over height, 1.0 until ready.
    fn aspect_ratio(&self) -> f64 {
        let height = self.height();
        if height > 0.0 {
            self.width() / height
        } else {
            1.0
        }
    }

    fn tile_size(&self) -> u32 {
        TILE_SIZE
    }

    fn tile_overlap(&self) -> u32 {
        TILE_OVERLAP
    }

    /// Lowest-resolution level index.
    fn min_level(&self) -> u32;

    /// Full-resolution level index (0 until ready).
    fn max_level(&self) -> u32;

    /// Tile grid `(x_tiles, y_tiles)` of `level`.
    ///
    /// Returns `(0, 0)` for levels outside `[min_level, max_level]` or
    /// before the source is ready.
    fn tile_grid_size(&self, level: u32) -> (u32, u32);

    /// Whether `(x, y)` is inside the tile grid of `level`.
    fn contains_tile(&self, level: u32, x: u32, y: u32) -> bool {
        let (x_tiles, y_tiles) = self.tile_grid_size(level);
        x < x_tiles && y < y_tiles
    }

    /// Fetch address of tile `(x, y)` at `level`.
    ///
    /// The caller keeps `x` and `y` inside the level's tile grid; they are
    /// not bounds-checked. Returns `None` if `level` has no geometry.
    fn tile_address(&self, level: u32, x: u32, y: u32) -> Option<String>;

    /// Width of `level` relative to the full-resolution level.
    fn level_normalized_scale(&self, level: u32) -> Option<f64>;

    /// Level to draw at a given normalized scale, once ready.
    fn level_for_scale(&self, scale: f64) -> Option<u32>;
}
