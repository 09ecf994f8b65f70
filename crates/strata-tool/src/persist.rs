//! Saving areas to disk, reading them back and checking the round trip.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata_voxel::{Area, AreaCoord, AreaSerError, AreaSettings, BlockRegistry, SIZE_BLOCKS};

/// Errors raised while persisting or reloading an area file.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("area {area}: {source}")]
    Serial {
        area: AreaCoord,
        #[source]
        source: AreaSerError,
    },
}

/// File an area is saved to inside `save_dir`.
pub fn area_path(save_dir: &Path, coord: AreaCoord) -> PathBuf {
    save_dir.join(format!("area_{}_{}.bin", coord.x, coord.z))
}

/// Writes the save form of `area` and returns the file size.
pub fn save_area(save_dir: &Path, area: &Arc<Area>) -> Result<u64, PersistError> {
    let path = area_path(save_dir, area.coord());
    let io_err = |source| PersistError::Io { path: path.clone(), source };

    let file = File::create(&path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    area.write_save(&mut writer, &[])
        .map_err(|source| PersistError::Serial { area: area.coord(), source })?;
    writer.flush().map_err(io_err)?;
    area.mark_saved();

    let size = std::fs::metadata(&path).map_err(io_err)?.len();
    tracing::debug!(area = %area.coord(), bytes = size, "saved");
    Ok(size)
}

/// Reads a saved area into a fresh, unattached area.
pub fn load_area(
    save_dir: &Path,
    coord: AreaCoord,
    registry: Arc<BlockRegistry>,
    settings: AreaSettings,
) -> Result<Area, PersistError> {
    let path = area_path(save_dir, coord);
    let file = File::open(&path).map_err(|source| PersistError::Io { path: path.clone(), source })?;
    let area = Area::with_settings(coord, registry, settings);
    area.read(&mut BufReader::new(file))
        .map_err(|source| PersistError::Serial { area: coord, source })?;
    Ok(area)
}

/// Differences found between an area and its reloaded copy.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Mismatches {
    pub blocks: usize,
    pub light: usize,
    pub heightmap: usize,
    pub block_data: usize,
}

impl Mismatches {
    pub fn total(&self) -> usize {
        self.blocks + self.light + self.heightmap + self.block_data
    }
}

/// Compares cells, light, heightmap and extended data.
///
/// Light is only compared up to the reloaded area's top row; rows a save
/// trimmed away read as open sky there.
pub fn compare(original: &Area, reloaded: &Area) -> Mismatches {
    let mut found = Mismatches::default();
    let block_top = original.max_y().max(reloaded.max_y());
    let light_top = reloaded.max_y();

    for z in 0..SIZE_BLOCKS {
        for x in 0..SIZE_BLOCKS {
            if original.heightmap(x, z) != reloaded.heightmap(x, z) {
                found.heightmap += 1;
            }
            for y in 0..=block_top {
                if original.get_cell(x, y, z) != reloaded.get_cell(x, y, z) {
                    found.blocks += 1;
                }
                if y <= light_top && original.get_light_raw(x, y, z) != reloaded.get_light_raw(x, y, z) {
                    found.light += 1;
                }
                let before = original.with_block_data(x, y, z, |data| data.write());
                if before.is_some() && before != reloaded.with_block_data(x, y, z, |data| data.write()) {
                    found.block_data += 1;
                }
            }
        }
    }
    if original.block_data_count() != reloaded.block_data_count() {
        found.block_data += 1;
    }
    found
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use strata_lighting::SunlightEngine;
    use strata_voxel::AreaMap;

    use super::*;
    use crate::world::{build_registry, dig_shaft, generate_area};

    #[test]
    fn test_area_path_is_per_coordinate() {
        let path = area_path(Path::new("saves"), AreaCoord::new(-2, 5));
        assert_eq!(path, PathBuf::from("saves/area_-2_5.bin"));
    }

    #[test]
    fn test_lit_area_survives_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, palette) = build_registry().unwrap();
        let registry = Arc::new(registry);
        let map = AreaMap::new(Arc::clone(&registry), AreaSettings::default());
        let engine = Arc::new(SunlightEngine::new());
        map.add_sink(engine.clone());

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let area = generate_area(&map, &palette, AreaCoord::new(0, 0), 5, &mut rng).unwrap();
        engine.initial_sunlight(&area).unwrap();
        dig_shaft(&area, &palette, 5).unwrap();
        assert!(area.modified_since_save(0));

        let bytes = save_area(dir.path(), &area).unwrap();
        assert!(bytes > 0);
        assert!(!area.modified_since_save(0));

        let reloaded = load_area(dir.path(), area.coord(), registry, AreaSettings::default()).unwrap();
        assert_eq!(compare(&area, &reloaded), Mismatches::default());
        assert_eq!(reloaded.get_sunlight(16, 2, 16), area.get_sunlight(16, 2, 16));
    }

    #[test]
    fn test_compare_counts_differences() {
        let (registry, palette) = build_registry().unwrap();
        let registry = Arc::new(registry);
        let map = AreaMap::new(Arc::clone(&registry), AreaSettings::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let area = generate_area(&map, &palette, AreaCoord::new(0, 0), 3, &mut rng).unwrap();

        let copy = area.snapshot();
        assert_eq!(compare(&area, &copy).total(), 0);

        area.set_block(palette.glass, 0, 10, 0, 0).unwrap();
        let found = compare(&area, &copy);
        assert_eq!(found.blocks, 1);
        assert_eq!(found.heightmap, 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_area(dir.path(), AreaCoord::new(9, 9), Arc::new(BlockRegistry::new()), AreaSettings::default());
        assert!(matches!(result, Err(PersistError::Io { .. })));
    }
}
