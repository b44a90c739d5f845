//! Command-line flags and their translation into a run configuration.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use cf_pipeline::{PrepareMode, RunConfig};
use cf_store::StoreConfig;

/// Capacity-factor store builder
#[derive(Parser, Debug)]
#[command(name = "cf-builder")]
#[command(about = "Compute hourly capacity factors from a weather cutout into a chunked Zarr store")]
pub struct Args {
    /// YAML run configuration; flags override its values
    #[arg(short, long, env = "CF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cutout directory
    #[arg(long, env = "CF_CUTOUT")]
    pub cutout: Option<PathBuf>,

    /// Output store directory
    #[arg(short, long, env = "CF_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Chunk length along time (hours)
    #[arg(long)]
    pub time_chunk: Option<usize>,

    /// Chunk length along latitude; tiles are multiples of it
    #[arg(long)]
    pub target_chunk_y: Option<usize>,

    /// Chunk length along longitude
    #[arg(long)]
    pub target_chunk_x: Option<usize>,

    /// Erase the output store before writing
    #[arg(long)]
    pub overwrite: bool,

    /// Assume the cutout is already prepared
    #[arg(long, conflicts_with = "prepare_per_tile")]
    pub skip_prepare: bool,

    /// Prepare each latitude band right before evaluating it
    #[arg(long)]
    pub prepare_per_tile: bool,

    /// Number of latitude tiles
    #[arg(long)]
    pub lat_tiles: Option<usize>,

    /// Latitude rows per tile; overrides --lat-tiles when > 0
    #[arg(long)]
    pub lat_rows_per_tile: Option<usize>,

    /// Tile height in degrees; overrides --lat-tiles when > 0
    #[arg(long)]
    pub lat_step_deg: Option<f64>,

    /// First tile to process
    #[arg(long)]
    pub tile_start_index: Option<usize>,

    /// Number of tiles to process (0 = all remaining)
    #[arg(long)]
    pub tile_count: Option<usize>,

    /// Evaluation threads
    #[arg(long, env = "CF_THREADS")]
    pub threads: Option<usize>,

    /// Stop at the first failed tile
    #[arg(long)]
    pub fail_fast: bool,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Print the completed tiles of an existing store and exit
    #[arg(long)]
    pub status: bool,
}

/// Merge the YAML file (if any) with flag overrides.
pub fn build_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => RunConfig {
            store: StoreConfig::from_env(),
            ..Default::default()
        },
    };

    if let Some(cutout) = &args.cutout {
        config.cutout = cutout.clone();
    }
    if let Some(output) = &args.output {
        config.output = output.clone();
    }
    if config.cutout.as_os_str().is_empty() {
        bail!("a cutout is required (--cutout or `cutout:` in the config file)");
    }
    if config.output.as_os_str().is_empty() {
        bail!("an output store is required (--output or `output:` in the config file)");
    }

    if let Some(n) = args.time_chunk {
        config.store.time_chunk = n;
    }
    if let Some(n) = args.target_chunk_y {
        config.store.lat_chunk = n;
    }
    if let Some(n) = args.target_chunk_x {
        config.store.lon_chunk = n;
    }

    if args.overwrite {
        config.overwrite = true;
    }
    if args.skip_prepare {
        config.prepare = PrepareMode::Skip;
    } else if args.prepare_per_tile {
        config.prepare = PrepareMode::PerTile;
    }

    if let Some(n) = args.lat_tiles {
        config.tiling.tile_count = Some(n);
    }
    // 0 leaves the setting unset, so --lat-tiles applies.
    match args.lat_rows_per_tile {
        Some(0) => config.tiling.rows_per_tile = None,
        Some(n) => config.tiling.rows_per_tile = Some(n),
        None => {}
    }
    match args.lat_step_deg {
        Some(step) if step == 0.0 => config.tiling.degree_step = None,
        Some(step) => config.tiling.degree_step = Some(step),
        None => {}
    }

    if let Some(start) = args.tile_start_index {
        config.selection.start_index = start;
    }
    match args.tile_count {
        Some(0) => config.selection.limit = None,
        Some(n) => config.selection.limit = Some(n),
        None => {}
    }

    if args.threads.is_some() {
        config.threads = args.threads;
    }
    if args.fail_fast {
        config.fail_fast = true;
    }

    config.validate().context("invalid run configuration")?;
    Ok(config)
}

/// Only the output location matters for `--status`.
pub fn build_status_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(output) = &args.output {
        config.output = output.clone();
    }
    if config.output.as_os_str().is_empty() {
        bail!("--status needs an output store (--output or `output:` in the config file)");
    }
    Ok(config)
}
