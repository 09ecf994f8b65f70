//! strata: builds a small world of voxel areas, lights it, saves every area
//! and reads it back, then reports whether the round trip was lossless.
//!
//! Run with: `cargo run -p strata-tool -- --radius 2`

mod persist;
mod world;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use strata_config::{CliArgs, Config, StrataDirs};
use strata_lighting::SunlightEngine;
use strata_voxel::{AreaCoord, AreaMap};
use tracing::{error, info, warn};

use crate::persist::{Mismatches, compare, load_area, save_area};
use crate::world::{area_settings, build_registry, dig_shaft, generate_area, run_ticks, world_coords};

/// Seed for terrain scatter and random ticks.
const WORLD_SEED: u64 = 0x5354_5241_5441;

/// Ticks simulated between building the world and saving it.
const WARMUP_TICKS: u32 = 20;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let dirs = match &args.config {
        Some(dir) => Some(StrataDirs {
            config_dir: dir.clone(),
            log_dir: dir.join("logs"),
        }),
        None => StrataDirs::resolve().ok(),
    };

    let (mut config, config_problem) = match dirs.as_ref() {
        Some(dirs) => match Config::load_or_create(&dirs.config_dir) {
            Ok(config) => (config, None),
            Err(err) => (Config::default(), Some(err.to_string())),
        },
        None => (Config::default(), Some("no configuration directory".to_string())),
    };
    config.apply_cli_overrides(&args);

    strata_log::init_logging(
        dirs.as_ref().map(|dirs| dirs.log_dir.as_path()),
        cfg!(debug_assertions) || config.debug.log_to_file,
        Some(&config),
    );
    if let Some(problem) = config_problem {
        warn!("using default config: {problem}");
    }

    match run(&config) {
        Ok(report) if report.mismatches.total() == 0 => {
            info!(
                areas = report.areas,
                bytes = report.bytes,
                save_dir = %report.save_dir.display(),
                "round trip verified"
            );
            ExitCode::SUCCESS
        }
        Ok(report) => {
            error!(
                blocks = report.mismatches.blocks,
                light = report.mismatches.light,
                heightmap = report.mismatches.heightmap,
                block_data = report.mismatches.block_data,
                "reloaded areas differ from the originals"
            );
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

struct Report {
    areas: usize,
    bytes: u64,
    save_dir: PathBuf,
    mismatches: Mismatches,
}

fn run(config: &Config) -> Result<Report, Box<dyn std::error::Error>> {
    let (registry, palette) = build_registry()?;
    let registry = Arc::new(registry);
    let settings = area_settings(config);
    let map = AreaMap::new(Arc::clone(&registry), settings);

    let engine = Arc::new(SunlightEngine::new());
    if config.lighting.sunlight {
        map.add_sink(engine.clone());
    }

    let ground = config.world.ground_height.max(2);
    let mut rng = ChaCha8Rng::seed_from_u64(WORLD_SEED);
    let coords = world_coords(config.world.radius);
    let mut areas = Vec::with_capacity(coords.len());
    for &coord in &coords {
        areas.push(generate_area(&map, &palette, coord, ground, &mut rng)?);
    }
    info!(areas = areas.len(), ground, "world generated");

    if config.lighting.sunlight {
        let mut changed = 0;
        for area in &areas {
            changed += engine.initial_sunlight(area)?;
        }
        info!(cells = changed, "sky light propagated");
    }

    if let Some(centre) = map.get_area(AreaCoord::new(0, 0)) {
        dig_shaft(&centre, &palette, ground)?;
    }
    if config.world.random_ticks {
        run_ticks(&map, WARMUP_TICKS, &mut rng);
    }

    let save_dir = config.storage.save_dir.clone();
    std::fs::create_dir_all(&save_dir)?;
    let mut bytes = 0;
    for area in &areas {
        bytes += save_area(&save_dir, area)?;
    }

    let mut mismatches = Mismatches::default();
    for area in &areas {
        let reloaded = load_area(&save_dir, area.coord(), Arc::clone(&registry), settings)?;
        let found = compare(area, &reloaded);
        if found.total() > 0 {
            warn!(area = %area.coord(), ?found, "round trip mismatch");
        }
        mismatches.blocks += found.blocks;
        mismatches.light += found.light;
        mismatches.heightmap += found.heightmap;
        mismatches.block_data += found.block_data;
    }

    Ok(Report {
        areas: areas.len(),
        bytes,
        save_dir,
        mismatches,
    })
}
