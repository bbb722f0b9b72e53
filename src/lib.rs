//! # Iris Tile Source
//!
//! A deep-zoom tile source for Whole Slide Images served by an Iris tile
//! server.
//!
//! The crate bridges the Iris REST protocol to the tile-request contract of a
//! generic pyramidal-image viewer: it fetches a slide's pyramid metadata once,
//! derives per-level tile grids and scale factors, and turns viewer tile
//! coordinates into tile addresses.
//!
//! ## Architecture
//!
//! - [`io`] - Injected transport trait and the reqwest-backed HTTP transport
//! - [`pyramid`] - Metadata wire types, validation and derived level geometry
//! - [`source`] - The [`TileSource`] viewer contract and [`IrisTileSource`]
//! - [`config`] - CLI configuration for the `iris-tiles` binary
//!
//! ## Example
//!
//! ```rust,no_run
//! use iris_tile_source::{IrisTileSource, TileSource, TileSourceOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source =
//!         IrisTileSource::with_http(TileSourceOptions::new("http://localhost:3000", "12345"))?;
//!
//!     source.open().await?;
//!
//!     let level = source.max_level();
//!     let (x_tiles, y_tiles) = source.tile_grid_size(level);
//!     println!("{x_tiles}x{y_tiles} tiles at full resolution");
//!     println!("{:?}", source.tile_address(level, 0, 0));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod pyramid;
pub mod source;

// Re-export commonly used types
pub use config::{Cli, Command, FetchTileConfig, InfoConfig, TileConfig};
pub use error::{MetadataError, SourceError, TransportError};
pub use io::{parse_http_url, HttpTransport, Transport};
pub use pyramid::{
    parse_metadata, Extent, LayerDescriptor, LevelGeometry, Pyramid, SlideMetadata, TILE_OVERLAP,
    TILE_SIZE,
};
pub use source::{
    EventHub, IrisTileSource, SlideId, SlideInfo, TileSource, TileSourceEvent, TileSourceOptions,
    DEFAULT_EVENT_CAPACITY,
};
