//! The demo world: block palette, flat terrain, a shaft, and ticking.

use std::any::Any;
use std::sync::Arc;

use rand::Rng;
use strata_config::Config;
use strata_voxel::{
    Area, AreaCoord, AreaError, AreaMap, AreaSettings, BlockBehaviour, BlockCell, BlockData, BlockDataError, BlockId,
    BlockRegistry, BlockTypeDef, RegistryError, SIZE_BLOCKS, Transparency,
};

/// Mossy blocks age one step per random tick up to this meta.
const MOSS_MAX_AGE: u8 = 15;

/// Local column the shaft is dug through.
pub const SHAFT_X: i32 = 16;
pub const SHAFT_Z: i32 = 16;

/// Ids of the registered block types.
#[derive(Clone, Copy, Debug)]
pub struct Palette {
    pub stone: BlockId,
    pub dirt: BlockId,
    pub moss: BlockId,
    pub glass: BlockId,
    pub chest: BlockId,
}

/// A counter that advances every area tick, persisted as a big-endian u32.
#[derive(Debug, Default)]
pub struct ChestTimer {
    pub ticks: u32,
}

impl BlockData for ChestTimer {
    fn update(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);
    }

    fn write(&self) -> Vec<u8> {
        self.ticks.to_be_bytes().to_vec()
    }

    fn read(&mut self, payload: &[u8]) -> Result<(), BlockDataError> {
        let bytes: [u8; 4] = payload
            .try_into()
            .map_err(|_| BlockDataError::Malformed(format!("expected 4 bytes, got {}", payload.len())))?;
        self.ticks = u32::from_be_bytes(bytes);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct Chest;

impl BlockBehaviour for Chest {
    fn has_block_data(&self) -> bool {
        true
    }

    fn create_block_data(&self, _x: i32, _y: i32, _z: i32, _meta: u8) -> Option<Box<dyn BlockData>> {
        Some(Box::new(ChestTimer::default()))
    }
}

struct Moss;

impl BlockBehaviour for Moss {
    fn random_tick(&self, area: &Arc<Area>, x: i32, y: i32, z: i32, meta: u8) {
        if meta >= MOSS_MAX_AGE {
            return;
        }
        if let Err(err) = area.set_block(area.get_block(x, y, z), x, y, z, meta + 1) {
            tracing::warn!(area = %area.coord(), "moss failed to age: {err}");
        }
    }
}

/// Registers the demo block types.
pub fn build_registry() -> Result<(BlockRegistry, Palette), RegistryError> {
    let mut registry = BlockRegistry::new();
    let palette = Palette {
        stone: registry.register(BlockTypeDef::new("stone", Transparency::Opaque))?,
        dirt: registry.register(BlockTypeDef::new("dirt", Transparency::Opaque))?,
        moss: registry.register(BlockTypeDef::new("moss", Transparency::Opaque).with_behaviour(Arc::new(Moss)))?,
        glass: registry.register(BlockTypeDef::new("glass", Transparency::SemiTransparent))?,
        chest: registry
            .register(BlockTypeDef::new("chest", Transparency::SemiTransparent).with_behaviour(Arc::new(Chest)))?,
    };
    Ok((registry, palette))
}

/// Storage tunables derived from the configuration.
pub fn area_settings(config: &Config) -> AreaSettings {
    AreaSettings {
        shrink_after_save: config.storage.shrink_after_save,
        ..AreaSettings::from_tick_ms(config.world.tick_ms)
    }
}

/// Area coordinates within `radius` of the origin, row by row.
pub fn world_coords(radius: u32) -> Vec<AreaCoord> {
    let r = radius as i32;
    (-r..=r)
        .flat_map(|z| (-r..=r).map(move |x| AreaCoord::new(x, z)))
        .collect()
}

/// Generates a flat area: stone below `ground`, a dirt top layer, and moss
/// scattered over the surface. The area is registered in `map` and its
/// visibility and heightmap are computed; it is not lit.
pub fn generate_area<R: Rng>(
    map: &Arc<AreaMap>,
    palette: &Palette,
    coord: AreaCoord,
    ground: i32,
    rng: &mut R,
) -> Result<Arc<Area>, AreaError> {
    let area = map.get_or_create(coord);
    area.set_features_generated();
    area.setup_arrays(ground)?;
    {
        let mut storage = area.acquire_write_lock();
        for z in 0..SIZE_BLOCKS {
            for x in 0..SIZE_BLOCKS {
                for y in 0..ground {
                    storage.set_block_raw(x, y, z, BlockCell::new(palette.stone, 0));
                }
                let top = if rng.random_range(0..8) == 0 { palette.moss } else { palette.dirt };
                storage.set_block_raw(x, ground, z, BlockCell::new(top, 0));
            }
        }
    }
    area.initial_update();
    tracing::debug!(area = %coord, ground, "generated");
    Ok(area)
}

/// Digs a one-block shaft from the surface down to `y = 1`, puts a chest at
/// the bottom and covers the opening with glass one row above ground.
pub fn dig_shaft(area: &Arc<Area>, palette: &Palette, ground: i32) -> Result<(), AreaError> {
    for y in (2..=ground).rev() {
        area.set_block(BlockId::AIR, SHAFT_X, y, SHAFT_Z, 0)?;
    }
    area.set_block(palette.chest, SHAFT_X, 1, SHAFT_Z, 0)?;
    area.set_block(palette.glass, SHAFT_X, ground + 1, SHAFT_Z, 0)?;
    tracing::info!(area = %area.coord(), depth = ground - 1, "dug shaft");
    Ok(())
}

/// Runs `ticks` simulation ticks over every loaded area.
pub fn run_ticks<R: Rng>(map: &AreaMap, ticks: u32, rng: &mut R) {
    for _ in 0..ticks {
        for area in map.areas() {
            area.tick(rng);
        }
    }
}
