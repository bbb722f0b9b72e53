//! iris-tiles - inspect slides on an Iris tile server.
//!
//! This binary loads slide metadata through the library's tile source and
//! resolves tile coordinates to addresses.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iris_tile_source::{
    config::{Cli, Command, FetchTileConfig, InfoConfig, TileConfig},
    HttpTransport, IrisTileSource, SlideInfo, TileSource, Transport,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if let Err(e) = cli.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let transport = match HttpTransport::with_timeout(Some(cli.timeout())) {
        Ok(transport) => Arc::new(transport),
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let source = IrisTileSource::new(cli.source_options(), transport.clone());
    if let Err(e) = source.open().await {
        error!("Failed to open slide '{}': {}", cli.slide_id(), e);
        return ExitCode::FAILURE;
    }

    match &cli.command {
        Command::Info(config) => run_info(&source, config),
        Command::TileUrl(config) => run_tile_url(&source, config),
        Command::FetchTile(config) => run_fetch_tile(&source, transport.as_ref(), config).await,
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "iris_tile_source=debug,iris_tiles=debug"
    } else {
        "iris_tile_source=info,iris_tiles=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Info Command
// =============================================================================

fn run_info(source: &IrisTileSource, config: &InfoConfig) -> ExitCode {
    let Some(slide) = source.info() else {
        error!("Slide '{}' is not ready", config.slide_id);
        return ExitCode::FAILURE;
    };

    if config.json {
        match serde_json::to_string_pretty(&slide) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize slide info: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_info(&slide);
    }

    ExitCode::SUCCESS
}

fn print_info(slide: &SlideInfo) {
    println!("Slide {} on {}", slide.slide_id, slide.server_url);
    println!("═════════════════════════════════");
    println!("  Size:     {} x {} px", slide.width, slide.height);
    println!("  Tiles:    {} px", slide.tile_size);
    if let Some(ref format) = slide.format {
        println!("  Format:   {}", format);
    }
    if let Some(ref encoding) = slide.encoding {
        println!("  Encoding: {}", encoding);
    }
    println!();
    println!("  Level   Tiles        Pixels             Scale");
    println!("  ─────   ──────────   ────────────────   ────────");
    for (index, level) in slide.levels.iter().enumerate() {
        println!(
            "  {:<5}   {:<10}   {:<16}   {:.6}",
            index,
            format!("{}x{}", level.x_tiles, level.y_tiles),
            format!("{}x{}", level.width, level.height),
            level.normalized_scale
        );
    }
}

// =============================================================================
// Tile Commands
// =============================================================================

/// Resolve a tile address, rejecting coordinates outside the level's grid.
fn resolve_tile(source: &IrisTileSource, tile: &TileConfig) -> Result<String, String> {
    if tile.level > source.max_level() {
        return Err(format!(
            "level {} out of range (max level is {})",
            tile.level,
            source.max_level()
        ));
    }

    if !source.contains_tile(tile.level, tile.x, tile.y) {
        let (x_tiles, y_tiles) = source.tile_grid_size(tile.level);
        return Err(format!(
            "tile ({}, {}) outside the {}x{} grid of level {}",
            tile.x, tile.y, x_tiles, y_tiles, tile.level
        ));
    }

    source
        .tile_address(tile.level, tile.x, tile.y)
        .ok_or_else(|| format!("no geometry for level {}", tile.level))
}

fn run_tile_url(source: &IrisTileSource, config: &TileConfig) -> ExitCode {
    match resolve_tile(source, config) {
        Ok(address) => {
            println!("{}", address);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_fetch_tile(
    source: &IrisTileSource,
    transport: &dyn Transport,
    config: &FetchTileConfig,
) -> ExitCode {
    let address = match resolve_tile(source, &config.tile) {
        Ok(address) => address,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    debug!("Fetching {}", address);
    let data = match transport.get(&address).await {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to fetch tile: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let written = match config.output {
        Some(ref path) => tokio::fs::write(path, &data).await.map(|_| {
            info!("Wrote {} bytes to {}", data.len(), path.display());
        }),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data).and_then(|_| stdout.flush())
        }
    };

    if let Err(e) = written {
        error!("Failed to write tile: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
