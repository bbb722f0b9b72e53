//! Tile source for slides served by an Iris tile server.
//!
//! # Lifecycle
//!
//! 1. [`IrisTileSource::new`] is cheap and never performs I/O.
//! 2. [`IrisTileSource::open`] issues exactly one metadata request. The
//!    outcome is returned from the future *and* raised as a
//!    [`TileSourceEvent`].
//! 3. [`IrisTileSource::configure`] points the source at another server or
//!    slide. Readiness is cleared before it returns, then a fresh load runs.
//!
//! Every load takes a new generation number. A load that completes after a
//! newer one was issued is discarded with [`SourceError::Superseded`], so the
//! most recently issued load always wins regardless of completion order.
//! Superseded requests are not cancelled; their responses are just ignored.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{SourceError, TransportError};
use crate::io::{HttpTransport, Transport};
use crate::pyramid::{parse_metadata, Pyramid};

use super::events::{EventHub, SlideInfo, TileSourceEvent};
use super::options::{metadata_url, tile_url, SlideId, TileSourceOptions};
use super::TileSource;

// =============================================================================
// State
// =============================================================================

/// Geometry of the slide that was loaded, with the address it came from.
#[derive(Debug)]
struct LoadedSlide {
    server_url: String,
    slide_id: SlideId,
    pyramid: Arc<Pyramid>,
}

#[derive(Debug, Default)]
struct State {
    server_url: Option<String>,
    slide_id: Option<SlideId>,

    /// Bumped by every load; completions carrying an older value are stale
    generation: u64,

    loaded: Option<Arc<LoadedSlide>>,
}

/// A metadata request that has been issued but not settled.
struct PendingLoad {
    generation: u64,
    server_url: String,
    slide_id: SlideId,
    url: String,
}

impl State {
    fn metadata_url(&self) -> Option<String> {
        match (&self.server_url, &self.slide_id) {
            (Some(server_url), Some(slide_id)) => Some(metadata_url(server_url, slide_id)),
            _ => None,
        }
    }

    /// Clear readiness and claim a new generation for a load.
    fn begin_load(&mut self) -> Result<PendingLoad, SourceError> {
        let (Some(server_url), Some(slide_id)) = (self.server_url.clone(), self.slide_id.clone())
        else {
            return Err(SourceError::NotConfigured);
        };

        self.generation += 1;
        self.loaded = None;

        Ok(PendingLoad {
            generation: self.generation,
            url: metadata_url(&server_url, &slide_id),
            server_url,
            slide_id,
        })
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    state: RwLock<State>,
    events: EventHub,
}

impl Inner {
    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn load(self: Arc<Self>, pending: PendingLoad) -> Result<(), SourceError> {
        debug!(
            url = %pending.url,
            generation = pending.generation,
            "Fetching slide metadata"
        );

        let outcome = match self.transport.get(&pending.url).await {
            Ok(body) => parse_metadata(&body).map_err(|source| SourceError::Metadata {
                url: pending.url.clone(),
                source,
            }),
            Err(source) => Err(SourceError::Transport {
                url: pending.url.clone(),
                source,
            }),
        };

        self.settle(pending, outcome)
    }

    /// Install the outcome of a load unless a newer load has been issued.
    fn settle(
        &self,
        pending: PendingLoad,
        outcome: Result<Pyramid, SourceError>,
    ) -> Result<(), SourceError> {
        let mut state = self.write_state();

        if state.generation != pending.generation {
            debug!(
                url = %pending.url,
                generation = pending.generation,
                current = state.generation,
                "Discarding superseded metadata load"
            );
            return Err(SourceError::Superseded);
        }

        match outcome {
            Ok(pyramid) => {
                info!(
                    url = %pending.url,
                    levels = pyramid.level_count(),
                    width = pyramid.width(),
                    height = pyramid.height(),
                    "Slide metadata loaded"
                );

                let slide = SlideInfo::new(&pending.server_url, &pending.slide_id, &pyramid);
                state.loaded = Some(Arc::new(LoadedSlide {
                    server_url: pending.server_url,
                    slide_id: pending.slide_id,
                    pyramid: Arc::new(pyramid),
                }));

                self.events.emit(TileSourceEvent::Ready(slide));
                Ok(())
            }
            Err(err) => {
                let message = match &err {
                    SourceError::Metadata { source, .. } => {
                        format!("IrisTileSource: Error parsing metadata: {source}")
                    }
                    _ => format!("IrisTileSource: Unable to get metadata from {}", pending.url),
                };
                error!(error = %err, "{}", message);

                self.events.emit(TileSourceEvent::OpenFailed {
                    message,
                    source: Some(pending.url),
                });
                Err(err)
            }
        }
    }
}

// =============================================================================
// IrisTileSource
// =============================================================================

/// Deep-zoom tile source backed by an Iris tile server.
///
/// Cloning is cheap and yields another handle to the same source.
///
/// # Example
///
/// ```no_run
/// use iris_tile_source::{IrisTileSource, TileSource, TileSourceEvent, TileSourceOptions};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let source = IrisTileSource::with_http(TileSourceOptions::new("http://localhost:3000", 12345u64))?;
/// let mut events = source.subscribe();
///
/// source.open().await?;
///
/// if let TileSourceEvent::Ready(slide) = events.recv().await? {
///     println!("{} levels", slide.levels.len());
/// }
/// if let Some(url) = source.tile_address(source.max_level(), 0, 0) {
///     println!("first tile: {url}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct IrisTileSource {
    inner: Arc<Inner>,
}

impl IrisTileSource {
    /// Create a source that fetches metadata through `transport`.
    ///
    /// No request is made here. If `options` lacks a server URL or slide ID
    /// the source stays idle until [`configure`](Self::configure) supplies
    /// them.
    pub fn new(options: TileSourceOptions, transport: Arc<dyn Transport>) -> Self {
        let state = State {
            server_url: options.server_url(),
            slide_id: options.slide_id(),
            ..State::default()
        };

        Self {
            inner: Arc::new(Inner {
                transport,
                state: RwLock::new(state),
                events: EventHub::default(),
            }),
        }
    }

    /// Create a source using a default [`HttpTransport`].
    pub fn with_http(options: TileSourceOptions) -> Result<Self, TransportError> {
        Ok(Self::new(options, Arc::new(HttpTransport::new()?)))
    }

    /// Load metadata for the current slide.
    ///
    /// Readiness is cleared immediately; the returned future performs the
    /// request and resolves once the source is ready or has failed. The same
    /// outcome is raised as an event.
    ///
    /// # Errors
    ///
    /// - [`SourceError::NotConfigured`] if the source is idle (no event)
    /// - [`SourceError::Transport`] / [`SourceError::Metadata`] on failure
    /// - [`SourceError::Superseded`] if a newer load was issued meanwhile
    pub fn open(&self) -> impl Future<Output = Result<(), SourceError>> + Send + 'static {
        let pending = self.inner.write_state().begin_load();
        let inner = Arc::clone(&self.inner);

        async move {
            match pending {
                Ok(pending) => inner.load(pending).await,
                Err(err) => Err(err),
            }
        }
    }

    /// Run [`open`](Self::open) in the background.
    ///
    /// Must be called from within a Tokio runtime. Listen for events or
    /// await the handle to learn the outcome.
    pub fn spawn_open(&self) -> JoinHandle<Result<(), SourceError>> {
        tokio::spawn(self.open())
    }

    /// Point the source at a different server and/or slide.
    ///
    /// Fields left unset keep their current value. On return the source is
    /// not ready; the returned future loads the new slide.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NoOptions`] (and raises `open-failed`) when
    /// neither field is set, and [`SourceError::NotConfigured`] when the
    /// source still lacks a server URL or slide ID afterwards.
    pub fn configure(
        &self,
        options: TileSourceOptions,
    ) -> Result<impl Future<Output = Result<(), SourceError>> + Send + 'static, SourceError> {
        if options.is_empty() {
            let message = "No options provided to configure.".to_string();
            error!("IrisTileSource: {}", message);
            self.inner.events.emit(TileSourceEvent::OpenFailed {
                message,
                source: None,
            });
            return Err(SourceError::NoOptions);
        }

        let pending = {
            let mut state = self.inner.write_state();
            if let Some(server_url) = options.server_url() {
                state.server_url = Some(server_url);
            }
            if let Some(slide_id) = options.slide_id() {
                state.slide_id = Some(slide_id);
            }
            state.begin_load()?
        };

        let inner = Arc::clone(&self.inner);
        Ok(async move { inner.load(pending).await })
    }

    /// Subscribe to `ready` / `open-failed` events.
    pub fn subscribe(&self) -> broadcast::Receiver<TileSourceEvent> {
        self.inner.events.subscribe()
    }

    pub fn server_url(&self) -> Option<String> {
        self.inner.read_state().server_url.clone()
    }

    pub fn slide_id(&self) -> Option<SlideId> {
        self.inner.read_state().slide_id.clone()
    }

    /// Metadata address of the current slide, `None` while idle.
    pub fn metadata_url(&self) -> Option<String> {
        self.inner.read_state().metadata_url()
    }

    /// Geometry of the loaded slide.
    pub fn pyramid(&self) -> Option<Arc<Pyramid>> {
        self.loaded().map(|slide| Arc::clone(&slide.pyramid))
    }

    /// Snapshot of the loaded slide.
    pub fn info(&self) -> Option<SlideInfo> {
        self.loaded()
            .map(|slide| SlideInfo::new(&slide.server_url, &slide.slide_id, &slide.pyramid))
    }

    fn loaded(&self) -> Option<Arc<LoadedSlide>> {
        self.inner.read_state().loaded.clone()
    }
}

impl fmt::Debug for IrisTileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.read_state();
        f.debug_struct("IrisTileSource")
            .field("server_url", &state.server_url)
            .field("slide_id", &state.slide_id)
            .field("generation", &state.generation)
            .field("ready", &state.loaded.is_some())
            .finish()
    }
}

impl TileSource for IrisTileSource {
    fn is_ready(&self) -> bool {
        self.inner.read_state().loaded.is_some()
    }

    fn width(&self) -> f64 {
        self.pyramid().map(|p| p.width()).unwrap_or(0.0)
    }

    fn height(&self) -> f64 {
        self.pyramid().map(|p| p.height()).unwrap_or(0.0)
    }

    fn min_level(&self) -> u32 {
        0
    }

    fn max_level(&self) -> u32 {
        self.pyramid().map(|p| p.max_level()).unwrap_or(0)
    }

    fn tile_grid_size(&self, level: u32) -> (u32, u32) {
        self.pyramid()
            .map(|p| p.tile_grid_size(level))
            .unwrap_or((0, 0))
    }

    fn tile_address(&self, level: u32, x: u32, y: u32) -> Option<String> {
        let slide = self.loaded()?;
        let position = slide.pyramid.level(level)?.tile_position(x, y);
        Some(tile_url(&slide.server_url, &slide.slide_id, level, position))
    }

    fn level_normalized_scale(&self, level: u32) -> Option<f64> {
        self.pyramid()?.normalized_scale(level)
    }

    fn level_for_scale(&self, scale: f64) -> Option<u32> {
        self.pyramid().map(|p| p.level_for_scale(scale))
    }
}
