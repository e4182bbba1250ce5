//! # lodcrate CLI
//!
//! Runs one LOD batch over a directory of `.glb` files:
//!
//! ```text
//! lodcrate --source assets/props --tiers 3000,1500,500
//! lodcrate --config lod.toml --verbose
//! ```
//!
//! Flags override the values of the configuration file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lodcrate_io::GltfSession;
use lodcrate_pipeline::{run_batch, LodConfig};

/// Batch LOD generator for glTF binary assets
#[derive(Parser, Debug)]
#[command(name = "lodcrate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory scanned for .glb files
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Triangle targets, LOD0 first (e.g. 3000,1500,500)
    #[arg(short, long, value_delimiter = ',')]
    pub tiers: Vec<usize>,

    /// Subfolder of the source directory receiving the LOD files
    #[arg(short, long)]
    pub output_subfolder: Option<String>,

    /// Keep the previous UV of corners farther than this from the source surface
    #[arg(long)]
    pub uv_max_distance: Option<f32>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Build the batch configuration: file values first, then flag overrides.
pub fn resolve_config(cli: &Cli) -> Result<LodConfig> {
    let mut config = match &cli.config {
        Some(path) => LodConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => LodConfig::default(),
    };
    if let Some(source) = &cli.source {
        config.source_dir = source.clone();
    }
    if !cli.tiers.is_empty() {
        config.tiers = cli.tiers.clone();
    }
    if let Some(subfolder) = &cli.output_subfolder {
        config.output_subfolder = subfolder.clone();
    }
    if let Some(distance) = cli.uv_max_distance {
        config.uv_max_distance = Some(distance);
    }
    Ok(config)
}

/// Execute the CLI command
pub fn execute(cli: Cli) -> Result<()> {
    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_secs()
        .init();

    let config = resolve_config(&cli)?;
    log::debug!("configuration: {:?}", config);

    let mut session = GltfSession::new();
    let report = run_batch(&config, &mut session)?;
    if report.lods_failed() > 0 {
        log::warn!("{} LOD file(s) could not be exported", report.lods_failed());
    }
    Ok(())
}
