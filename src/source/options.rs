use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a slide on the tile server.
///
/// Iris slide IDs are either strings or numbers (`"12345"` for `12345.iris`);
/// both are carried as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlideId(String);

impl SlideId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The ID percent-encoded as a single URL path segment.
    pub fn as_path_segment(&self) -> Cow<'_, str> {
        urlencoding::encode(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SlideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SlideId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SlideId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for SlideId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Options for creating or reconfiguring a tile source.
///
/// A source only loads when both fields are known. Empty strings count as
/// absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileSourceOptions {
    /// Base URL of the Iris server (e.g. `http://localhost:3000`)
    pub server_url: Option<String>,

    /// Slide to open
    pub slide_id: Option<SlideId>,
}

impl TileSourceOptions {
    /// Options naming both a server and a slide.
    pub fn new(server_url: impl Into<String>, slide_id: impl Into<SlideId>) -> Self {
        Self {
            server_url: Some(server_url.into()),
            slide_id: Some(slide_id.into()),
        }
    }

    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = Some(server_url.into());
        self
    }

    pub fn with_slide_id(mut self, slide_id: impl Into<SlideId>) -> Self {
        self.slide_id = Some(slide_id.into());
        self
    }

    /// True when these options are enough to open a slide.
    pub fn supports(&self) -> bool {
        self.server_url().is_some() && self.slide_id().is_some()
    }

    /// True when neither field is set.
    pub fn is_empty(&self) -> bool {
        self.server_url().is_none() && self.slide_id().is_none()
    }

    /// Server URL without trailing slashes, if set and non-empty.
    pub(crate) fn server_url(&self) -> Option<String> {
        self.server_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    }

    pub(crate) fn slide_id(&self) -> Option<SlideId> {
        self.slide_id.clone().filter(|id| !id.is_empty())
    }
}

/// `{server_url}/slides/{slide_id}/metadata`
pub(crate) fn metadata_url(server_url: &str, slide_id: &SlideId) -> String {
    format!("{}/slides/{}/metadata", server_url, slide_id.as_path_segment())
}

/// `{server_url}/slides/{slide_id}/layers/{level}/tiles/{position}`
pub(crate) fn tile_url(server_url: &str, slide_id: &SlideId, level: u32, position: u64) -> String {
    format!(
        "{}/slides/{}/layers/{}/tiles/{}",
        server_url,
        slide_id.as_path_segment(),
        level,
        position
    )
}
