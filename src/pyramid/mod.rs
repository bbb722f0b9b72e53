//! Slide pyramid metadata and derived level geometry.
//!
//! An Iris server describes a slide as a stack of layers ordered from the
//! lowest resolution (layer 0) to full resolution (last layer). Each layer is
//! a grid of fixed 256x256 tiles:
//!
//! ```text
//!   layer 0          layer 1                 layer 2 (full resolution)
//! ┌──┬──┐        ┌──┬──┬──┬──┐        ┌──┬──┬──┬──┬──┬──┬──┬──┐
//! │  │  │        │  │  │  │  │        │  │  │  │  │  │  │  │  │
//! └──┴──┘        ├──┼──┼──┼──┤        ├──┼──┼──┼──┼──┼──┼──┼──┤
//!  2x1 tiles     │  │  │  │  │        │  │  │  │  │  │  │  │  │
//!                └──┴──┴──┴──┘        ├──┼──┼──┼──┼──┼──┼──┼──┤
//!                 4x2 tiles           │ ...                    │
//!                                     └──┴──┴──┴──┴──┴──┴──┴──┘
//! ```
//!
//! [`parse_metadata`] turns a metadata response body into a validated
//! [`Pyramid`]; nothing partially valid ever comes out of it.

mod geometry;
mod metadata;

pub use geometry::{LevelGeometry, Pyramid, TILE_OVERLAP, TILE_SIZE};
pub use metadata::{parse_metadata, Extent, LayerDescriptor, SlideMetadata};
