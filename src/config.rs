//! Command-line configuration for `iris-tiles`.
//!
//! Global options can also be set through environment variables:
//!
//! - `IRIS_SERVER_URL` - Base URL of the Iris server (default: http://localhost:3000)
//! - `IRIS_TIMEOUT` - Request timeout in seconds (default: 30)
//!
//! # Example
//!
//! ```text
//! iris-tiles --server-url http://localhost:3000 info 12345
//! iris-tiles tile-url 12345 4 2 3
//! iris-tiles fetch-tile 12345 4 2 3 -o tile.jpg
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::io::parse_http_url;
use crate::source::TileSourceOptions;

// =============================================================================
// Default Values
// =============================================================================

/// Default Iris server.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// CLI Arguments
// =============================================================================

/// iris-tiles - inspect slides on an Iris tile server.
///
/// Loads slide pyramid metadata and resolves deep-zoom tile coordinates to
/// tile addresses.
#[derive(Parser, Debug, Clone)]
#[command(name = "iris-tiles")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the Iris server.
    #[arg(long, global = true, default_value = DEFAULT_SERVER_URL, env = "IRIS_SERVER_URL")]
    pub server_url: String,

    /// Request timeout in seconds.
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS, env = "IRIS_TIMEOUT")]
    pub timeout: u64,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load a slide and print its pyramid geometry.
    Info(InfoConfig),

    /// Print the address of a tile.
    TileUrl(TileConfig),

    /// Download a tile.
    FetchTile(FetchTileConfig),
}

#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// Slide identifier.
    pub slide_id: String,

    /// Print JSON instead of a table.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TileConfig {
    /// Slide identifier.
    pub slide_id: String,

    /// Pyramid level (0 = lowest resolution).
    pub level: u32,

    /// Tile column.
    pub x: u32,

    /// Tile row.
    pub y: u32,
}

#[derive(Args, Debug, Clone)]
pub struct FetchTileConfig {
    #[command(flatten)]
    pub tile: TileConfig,

    /// Write the tile here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        parse_http_url(&self.server_url).map_err(|e| {
            format!("{e}. Set --server-url or IRIS_SERVER_URL to an http(s) URL")
        })?;

        if self.timeout == 0 {
            return Err("timeout must be greater than 0".to_string());
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Slide the command operates on.
    pub fn slide_id(&self) -> &str {
        match &self.command {
            Command::Info(config) => &config.slide_id,
            Command::TileUrl(config) => &config.slide_id,
            Command::FetchTile(config) => &config.tile.slide_id,
        }
    }

    /// Tile source options for the command's slide.
    pub fn source_options(&self) -> TileSourceOptions {
        TileSourceOptions::new(self.server_url.as_str(), self.slide_id())
    }
}

// =============================================================================
// Tests
// =============================================================================
