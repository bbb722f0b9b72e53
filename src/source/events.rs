//! Readiness notifications for tile sources.
//!
//! A host viewer subscribes before opening a source and waits for either
//! [`TileSourceEvent::Ready`] or [`TileSourceEvent::OpenFailed`]. Events are
//! fanned out over a Tokio broadcast channel, so any number of listeners can
//! observe the same source.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::pyramid::{LevelGeometry, Pyramid, TILE_SIZE};

use super::options::SlideId;

/// Number of events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 16;

/// Snapshot of a loaded slide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideInfo {
    pub server_url: String,
    pub slide_id: SlideId,

    /// Full-resolution width in pixels
    pub width: f64,

    /// Full-resolution height in pixels
    pub height: f64,

    pub tile_size: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,

    /// Levels, lowest resolution first
    pub levels: Vec<LevelGeometry>,
}

impl SlideInfo {
    pub(crate) fn new(server_url: &str, slide_id: &SlideId, pyramid: &Pyramid) -> Self {
        Self {
            server_url: server_url.to_string(),
            slide_id: slide_id.clone(),
            width: pyramid.width(),
            height: pyramid.height(),
            tile_size: TILE_SIZE,
            format: pyramid.format().map(str::to_string),
            encoding: pyramid.encoding().map(str::to_string),
            levels: pyramid.levels().to_vec(),
        }
    }

    pub fn max_level(&self) -> u32 {
        self.levels.len().saturating_sub(1) as u32
    }
}

/// Event raised by a tile source when a metadata load settles.
#[derive(Debug, Clone, PartialEq)]
pub enum TileSourceEvent {
    /// Metadata loaded; queries now answer from the new geometry
    Ready(SlideInfo),

    /// Metadata could not be loaded, or `configure` was called without options
    OpenFailed {
        /// Diagnostic message
        message: String,

        /// Metadata URL that failed, when a request was made
        source: Option<String>,
    },
}

impl TileSourceEvent {
    /// Event name as used by deep-zoom viewers.
    pub fn name(&self) -> &'static str {
        match self {
            TileSourceEvent::Ready(_) => "ready",
            TileSourceEvent::OpenFailed { .. } => "open-failed",
        }
    }
}

/// Fan-out of [`TileSourceEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<TileSourceEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Deliver `event` to current subscribers.
    ///
    /// Returns the number of subscribers reached. An event raised with
    /// nobody listening is dropped.
    pub fn emit(&self, event: TileSourceEvent) -> usize {
        let name = event.name();
        match self.tx.send(event) {
            Ok(count) => {
                debug!(event = name, subscribers = count, "Raised tile source event");
                count
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TileSourceEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
