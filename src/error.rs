use thiserror::Error;

/// Errors raised while fetching bytes from the tile server
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The URL could not be parsed or uses an unsupported scheme
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The server answered with a non-2xx status
    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// The request did not complete within the transport's timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The response body could not be read
    #[error("Failed to read response body: {0}")]
    Body(String),
}

/// Errors raised when a metadata body does not describe a usable pyramid
#[derive(Debug, Clone, Error)]
pub enum MetadataError {
    /// Body is not JSON, or is missing required fields
    #[error("Malformed metadata: {0}")]
    Json(String),

    /// The extent lists no layers
    #[error("Metadata contains no layers")]
    EmptyLayers,

    /// A layer has a zero tile count in either direction
    #[error("Layer {layer} has an invalid tile grid: {x_tiles}x{y_tiles}")]
    InvalidTileCount {
        layer: usize,
        x_tiles: u32,
        y_tiles: u32,
    },

    /// A layer scale is zero, negative, or not finite
    #[error("Layer {layer} has an invalid scale: {scale}")]
    InvalidScale { layer: usize, scale: f64 },

    /// The base extent is zero, negative, or not finite
    #[error("Invalid extent: {width}x{height}")]
    InvalidExtent { width: f64, height: f64 },

    /// A layer is narrower than the layer before it
    #[error("Layer {layer} has fewer horizontal tiles than layer {}", .layer - 1)]
    LayerOrder { layer: usize },
}

/// Errors reported by a tile source
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// `configure` was called without a server URL or slide ID
    #[error("No options provided to configure")]
    NoOptions,

    /// The source is idle: it has no server URL or no slide ID yet
    #[error("Tile source has no server URL or slide ID")]
    NotConfigured,

    /// The metadata request failed
    #[error("Unable to get metadata from {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    /// The metadata body was fetched but could not be used
    #[error("Error parsing metadata from {url}: {source}")]
    Metadata {
        url: String,
        #[source]
        source: MetadataError,
    },

    /// A newer `open` or `configure` was issued before this load completed
    #[error("Metadata load superseded by a newer request")]
    Superseded,
}

impl SourceError {
    /// URL of the metadata request this error is about, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            SourceError::Transport { url, .. } | SourceError::Metadata { url, .. } => Some(url),
            _ => None,
        }
    }

    /// True for errors caused by the caller's arguments rather than the server.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, SourceError::NoOptions | SourceError::NotConfigured)
    }
}
