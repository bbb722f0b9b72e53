//! Wire format of the Iris metadata endpoint.
//!
//! `GET {server}/slides/{slide_id}/metadata` answers with:
//!
//! ```json
//! {
//!   "format": "FORMAT_B8G8R8A8",
//!   "encoding": "image/jpeg",
//!   "extent": {
//!     "width": 1983, "height": 1381,
//!     "layers": [ { "x_tiles": 8, "y_tiles": 6, "scale": 1.0 } ]
//!   }
//! }
//! ```
//!
//! `format` and `encoding` are optional and only passed through.

use serde::{Deserialize, Serialize};

use crate::error::MetadataError;

use super::geometry::Pyramid;

/// Metadata for one slide, as sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideMetadata {
    /// Pixel layout tag (not interpreted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// MIME-like name of the tile codec (not interpreted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,

    /// Image extent and layer list
    pub extent: Extent,
}

/// Nominal image size plus the pyramid layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    /// Width at the reference scale of the layer multipliers
    pub width: f64,

    /// Height at the reference scale of the layer multipliers
    pub height: f64,

    /// Layers, lowest resolution first
    pub layers: Vec<LayerDescriptor>,
}

/// One pyramid layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Number of tiles in X direction
    pub x_tiles: u32,

    /// Number of tiles in Y direction
    pub y_tiles: u32,

    /// Linear resolution multiplier relative to the extent
    pub scale: f64,
}

/// Parse a metadata response body into a validated [`Pyramid`].
///
/// # Errors
///
/// Returns [`MetadataError::Json`] if the body is not a metadata document,
/// and the other [`MetadataError`] variants if the document is well-formed
/// but describes an unusable pyramid.
pub fn parse_metadata(body: &[u8]) -> Result<Pyramid, MetadataError> {
    let metadata: SlideMetadata =
        serde_json::from_slice(body).map_err(|e| MetadataError::Json(e.to_string()))?;

    Pyramid::from_metadata(&metadata)
}
