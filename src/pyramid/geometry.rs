use serde::Serialize;

use crate::error::MetadataError;

use super::metadata::SlideMetadata;

/// Tile edge length in pixels. The Iris server always tiles at this size.
pub const TILE_SIZE: u32 = 256;

/// Overlap between neighbouring tiles in pixels.
pub const TILE_OVERLAP: u32 = 0;

// =============================================================================
// LevelGeometry
// =============================================================================

/// Derived geometry of a single pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelGeometry {
    /// Width covered by the tile grid in pixels (`x_tiles * TILE_SIZE`)
    pub width: u64,

    /// Height covered by the tile grid in pixels (`y_tiles * TILE_SIZE`)
    pub height: u64,

    /// Number of tiles in X direction
    pub x_tiles: u32,

    /// Number of tiles in Y direction
    pub y_tiles: u32,

    /// This level's width as a fraction of the full-resolution level's width.
    ///
    /// Always exactly 1.0 for the last level.
    pub normalized_scale: f64,
}

impl LevelGeometry {
    /// Row-major linear index of tile `(x, y)` within this level.
    ///
    /// Coordinates are not bounds-checked.
    pub fn tile_position(&self, x: u32, y: u32) -> u64 {
        u64::from(y) * u64::from(self.x_tiles) + u64::from(x)
    }

    /// Whether `(x, y)` lies inside this level's tile grid.
    pub fn contains_tile(&self, x: u32, y: u32) -> bool {
        x < self.x_tiles && y < self.y_tiles
    }
}

// =============================================================================
// Pyramid
// =============================================================================

/// Validated pyramid of a loaded slide.
///
/// Level indices run from 0 (lowest resolution) to [`Pyramid::max_level`]
/// (full resolution). A `Pyramid` always has at least one level.
#[derive(Debug, Clone, PartialEq)]
pub struct Pyramid {
    width: f64,
    height: f64,
    levels: Vec<LevelGeometry>,
    format: Option<String>,
    encoding: Option<String>,
}

impl Pyramid {
    /// Derive level geometry from server metadata.
    ///
    /// # Errors
    ///
    /// Fails if the extent is not positive, there are no layers, any layer has
    /// a zero tile count or a non-positive scale, or a layer is narrower than
    /// the one before it.
    pub fn from_metadata(metadata: &SlideMetadata) -> Result<Self, MetadataError> {
        let extent = &metadata.extent;
        let layers = &extent.layers;

        let Some(last) = layers.last() else {
            return Err(MetadataError::EmptyLayers);
        };

        if !is_positive(extent.width) || !is_positive(extent.height) {
            return Err(MetadataError::InvalidExtent {
                width: extent.width,
                height: extent.height,
            });
        }

        for (index, layer) in layers.iter().enumerate() {
            if layer.x_tiles == 0 || layer.y_tiles == 0 {
                return Err(MetadataError::InvalidTileCount {
                    layer: index,
                    x_tiles: layer.x_tiles,
                    y_tiles: layer.y_tiles,
                });
            }
            if !is_positive(layer.scale) {
                return Err(MetadataError::InvalidScale {
                    layer: index,
                    scale: layer.scale,
                });
            }
            if index > 0 && layer.x_tiles < layers[index - 1].x_tiles {
                return Err(MetadataError::LayerOrder { layer: index });
            }
        }

        let tile_size = u64::from(TILE_SIZE);
        let full_res_width = u64::from(last.x_tiles) * tile_size;

        let levels = layers
            .iter()
            .map(|layer| {
                let width = u64::from(layer.x_tiles) * tile_size;
                LevelGeometry {
                    width,
                    height: u64::from(layer.y_tiles) * tile_size,
                    x_tiles: layer.x_tiles,
                    y_tiles: layer.y_tiles,
                    normalized_scale: width as f64 / full_res_width as f64,
                }
            })
            .collect();

        Ok(Self {
            width: extent.width * last.scale,
            height: extent.height * last.scale,
            levels,
            format: metadata.format.clone(),
            encoding: metadata.encoding.clone(),
        })
    }

    /// Full-resolution image width in pixels.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Full-resolution image height in pixels.
    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    /// Pixel layout tag reported by the server.
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Tile codec reported by the server.
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn min_level(&self) -> u32 {
        0
    }

    /// Index of the full-resolution level.
    pub fn max_level(&self) -> u32 {
        // Never empty, see from_metadata.
        (self.levels.len() - 1) as u32
    }

    pub fn levels(&self) -> &[LevelGeometry] {
        &self.levels
    }

    /// Geometry of `level`, or `None` if it is out of range.
    pub fn level(&self, level: u32) -> Option<&LevelGeometry> {
        self.levels.get(level as usize)
    }

    /// `(x_tiles, y_tiles)` of `level`, or `(0, 0)` if it is out of range.
    pub fn tile_grid_size(&self, level: u32) -> (u32, u32) {
        self.level(level)
            .map(|geometry| (geometry.x_tiles, geometry.y_tiles))
            .unwrap_or((0, 0))
    }

    pub fn normalized_scale(&self, level: u32) -> Option<f64> {
        self.level(level).map(|geometry| geometry.normalized_scale)
    }

    /// Find the level to draw at a given normalized scale.
    ///
    /// Returns the lowest-resolution level whose normalized scale is at least
    /// `scale`, so the viewer never has to upsample. Requests beyond full
    /// resolution get the full-resolution level.
    pub fn level_for_scale(&self, scale: f64) -> u32 {
        self.levels
            .iter()
            .position(|geometry| geometry.normalized_scale >= scale)
            .map(|index| index as u32)
            .unwrap_or_else(|| self.max_level())
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
