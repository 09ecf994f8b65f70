//! Shared fixtures for unit tests.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::area::Area;
use crate::block_data::{BlockData, BlockDataError};
use crate::coords::{AreaCoord, SIZE_BLOCKS};
use crate::registry::{BlockBehaviour, BlockId, BlockRegistry, BlockTypeDef, Transparency};

/// Opaque byte store standing in for an inventory.
#[derive(Default)]
pub(crate) struct ChestData {
    pub(crate) contents: Vec<u8>,
    pub(crate) updates: usize,
}

impl BlockData for ChestData {
    fn update(&mut self) {
        self.updates += 1;
    }

    fn write(&self) -> Vec<u8> {
        self.contents.clone()
    }

    fn read(&mut self, payload: &[u8]) -> Result<(), BlockDataError> {
        self.contents = payload.to_vec();
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
        Some(Box::new(ChestData::default()))
    }
}

struct Sapling {
    ticks: Arc<AtomicUsize>,
}

impl BlockBehaviour for Sapling {
    fn random_tick(&self, _area: &Arc<Area>, _x: i32, _y: i32, _z: i32, _meta: u8) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }
}

/// A registry with a handful of block types covering every behaviour.
pub(crate) struct TestBlocks {
    pub(crate) registry: Arc<BlockRegistry>,
    pub(crate) stone: BlockId,
    pub(crate) glass: BlockId,
    pub(crate) chest: BlockId,
    pub(crate) sapling: BlockId,
    pub(crate) sapling_ticks: Arc<AtomicUsize>,
}

impl TestBlocks {
    pub(crate) fn new() -> Self {
        let sapling_ticks = Arc::new(AtomicUsize::new(0));
        let mut registry = BlockRegistry::new();
        let stone = registry
            .register(BlockTypeDef::new("stone", Transparency::Opaque))
            .unwrap();
        let glass = registry
            .register(BlockTypeDef::new("glass", Transparency::SemiTransparent))
            .unwrap();
        let chest = registry
            .register(BlockTypeDef::new("chest", Transparency::Opaque).with_behaviour(Arc::new(Chest)))
            .unwrap();
        let sapling = registry
            .register(
                BlockTypeDef::new("sapling", Transparency::FullyTransparent).with_behaviour(Arc::new(Sapling {
                    ticks: Arc::clone(&sapling_ticks),
                })),
            )
            .unwrap();
        Self {
            registry: Arc::new(registry),
            stone,
            glass,
            chest,
            sapling,
            sapling_ticks,
        }
    }
}

/// An unattached area with stone from y = 0 up to and including `ground`.
pub(crate) fn flat_area(blocks: &TestBlocks, coord: AreaCoord, ground: i32) -> Arc<Area> {
    let area = Arc::new(Area::new(coord, Arc::clone(&blocks.registry)));
    area.setup_arrays(ground).unwrap();
    {
        let mut storage = area.acquire_write_lock();
        let cells = storage.blocks.as_mut().unwrap();
        for y in 0..=ground {
            for z in 0..SIZE_BLOCKS {
                for x in 0..SIZE_BLOCKS {
                    cells[crate::area::block_index(x, y, z)] = crate::cell::BlockCell::new(blocks.stone, 0);
                }
            }
        }
    }
    area.initial_update();
    area
}
