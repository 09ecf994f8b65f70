//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// strata command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "strata", about = "Builds, lights and persists a world of voxel areas")]
pub struct CliArgs {
    /// Tick length in milliseconds.
    #[arg(long)]
    pub tick_ms: Option<u32>,

    /// Areas generated around the origin in each direction.
    #[arg(long)]
    pub radius: Option<u32>,

    /// Highest solid row of the generated ground.
    #[arg(long)]
    pub ground_height: Option<i32>,

    /// Directory saved areas are written to.
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Disable sky light propagation.
    #[arg(long)]
    pub no_sunlight: bool,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(tick_ms) = args.tick_ms {
            self.world.tick_ms = tick_ms;
        }
        if let Some(radius) = args.radius {
            self.world.radius = radius;
        }
        if let Some(ground) = args.ground_height {
            self.world.ground_height = ground;
        }
        if let Some(ref dir) = args.save_dir {
            self.storage.save_dir = dir.clone();
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if args.no_sunlight {
            self.lighting.sunlight = false;
        }
    }
}
