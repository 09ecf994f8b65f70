//! Sky light flood fill.
//!
//! Sky light enters each column above its highest block at level 15 and
//! spreads through transparent cells, losing one level per horizontal or
//! upward step and nothing on the way down, so open shafts stay fully lit.
//!
//! Removal runs two queues: cells whose light came only from the removed
//! source are darkened and spread the removal further, while brighter
//! neighbours are collected as seeds for a follow-up add pass that restores
//! everything still lit from elsewhere. Downward removal always cascades,
//! mirroring the lossless downward spread.
//!
//! All functions work in absolute block coordinates through a
//! [`LightWorld`]; cells in areas the world does not hold are skipped.

use std::collections::VecDeque;
use std::sync::Arc;

use strata_voxel::{
    Area, AreaCoord, AreaStorage, BlockChangeSink, BlockChangedEvent, BlockRegistry, LightCell, LockError,
    Pool, Poolable, SIZE_BLOCKS,
};

use crate::world_section::{LightWorld, LightWorldSection};

/// Face neighbours as `(dx, dy, dz)`.
const NEIGHBOURS: [(i32, i32, i32); 6] = [
    (-1, 0, 0),
    (1, 0, 0),
    (0, 0, -1),
    (0, 0, 1),
    (0, -1, 0),
    (0, 1, 0),
];

/// A queued cell and the sky light level it carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightNode {
    /// Absolute x.
    pub x: i32,
    /// Absolute y.
    pub y: i32,
    /// Absolute z.
    pub z: i32,
    /// Sky light level, 0..=15.
    pub level: u8,
}

impl LightNode {
    /// Creates a node.
    pub fn new(x: i32, y: i32, z: i32, level: u8) -> Self {
        Self { x, y, z, level }
    }
}

/// Scratch queues for one propagation run.
#[derive(Debug, Default)]
pub struct LightQueues {
    /// Cells to spread light from.
    pub add: VecDeque<LightNode>,
    /// Cells whose light was just removed.
    pub remove: VecDeque<LightNode>,
}

impl Poolable for LightQueues {
    fn reset(&mut self) {
        self.add.clear();
        self.remove.clear();
    }
}

fn local(x: i32, z: i32) -> (i32, i32) {
    (x.rem_euclid(SIZE_BLOCKS), z.rem_euclid(SIZE_BLOCKS))
}

/// The storage and local `(x, z)` of an absolute cell, if it is loaded,
/// inside the allocated rows and transparent.
fn transparent_cell<'w, W: LightWorld + ?Sized>(
    world: &'w mut W,
    registry: &BlockRegistry,
    x: i32,
    y: i32,
    z: i32,
) -> Option<(&'w mut AreaStorage, i32, i32)> {
    if y < 0 {
        return None;
    }
    let storage = world.storage_mut(AreaCoord::containing(x, z))?;
    let (lx, lz) = local(x, z);
    if !storage.contains_y(y) || !registry.is_transparent(storage.block(lx, y, lz)) {
        return None;
    }
    Some((storage, lx, lz))
}

fn stored_sunlight<W: LightWorld + ?Sized>(world: &mut W, x: i32, y: i32, z: i32) -> Option<u8> {
    let storage = world.storage_mut(AreaCoord::containing(x, z))?;
    let (lx, lz) = local(x, z);
    storage.contains_y(y).then(|| storage.light(lx, y, lz).sunlight())
}

fn write_sunlight(storage: &mut AreaStorage, x: i32, y: i32, z: i32, level: u8) {
    if storage.set_sunlight(x, y, z, level) {
        storage.update_render(y / SIZE_BLOCKS);
        storage.modify();
    }
}

/// Spreads light from every queued node until the queue drains. Returns
/// the number of cells brightened.
pub fn propagate_add<W: LightWorld + ?Sized>(world: &mut W, queue: &mut VecDeque<LightNode>) -> usize {
    let registry = world.registry();
    let mut changed = 0;
    while let Some(node) = queue.pop_front() {
        if node.level <= 1 {
            continue;
        }
        for (dx, dy, dz) in NEIGHBOURS {
            let level = if dy < 0 { node.level } else { node.level - 1 };
            let (x, y, z) = (node.x + dx, node.y + dy, node.z + dz);
            let Some((storage, lx, lz)) = transparent_cell(world, &registry, x, y, z) else {
                continue;
            };
            if storage.light(lx, y, lz).sunlight() >= level {
                continue;
            }
            write_sunlight(storage, lx, y, lz, level);
            queue.push_back(LightNode::new(x, y, z, level));
            changed += 1;
        }
    }
    changed
}

/// Drains `queues.remove`, darkening cells that depended on the removed
/// light and collecting independently lit neighbours in `queues.add`.
/// Returns the number of cells darkened.
pub fn propagate_remove<W: LightWorld + ?Sized>(world: &mut W, queues: &mut LightQueues) -> usize {
    let registry = world.registry();
    let mut changed = 0;
    while let Some(node) = queues.remove.pop_front() {
        if node.level <= 1 {
            continue;
        }
        for (dx, dy, dz) in NEIGHBOURS {
            let (x, y, z) = (node.x + dx, node.y + dy, node.z + dz);
            let Some((storage, lx, lz)) = transparent_cell(world, &registry, x, y, z) else {
                continue;
            };
            let current = storage.light(lx, y, lz).sunlight();
            if current != 0 && (dy < 0 || current < node.level) {
                write_sunlight(storage, lx, y, lz, 0);
                queues.remove.push_back(LightNode::new(x, y, z, current));
                changed += 1;
            } else if current >= node.level {
                queues.add.push_back(LightNode::new(x, y, z, current));
            }
        }
    }
    changed
}

/// Fills every column of `area` with full sky light above its highest
/// block and spreads it. The area must be held by `world`.
pub fn initial_sunlight<W: LightWorld + ?Sized>(world: &mut W, queues: &mut LightQueues, area: AreaCoord) -> usize {
    let Some(storage) = world.storage_mut(area) else {
        return 0;
    };
    if !storage.is_ready() {
        return 0;
    }
    let max_y = storage.max_y();
    for z in 0..SIZE_BLOCKS {
        for x in 0..SIZE_BLOCKS {
            let top = storage.heightmap(x, z) + 1;
            for y in top..=max_y {
                storage.set_sunlight(x, y, z, LightCell::MAX_LEVEL);
            }
            queues.add.push_back(LightNode::new(
                x + area.min_block_x(),
                top,
                z + area.min_block_z(),
                LightCell::MAX_LEVEL,
            ));
        }
    }
    for section in 0..storage.height() {
        storage.update_render(section as i32);
    }
    storage.modify();
    propagate_add(world, &mut queues.add)
}

/// Lets light into an absolute cell that just became transparent by
/// re-spreading from its lit neighbours. A neighbour above the top of its
/// area counts as open sky.
pub fn add_sunlight<W: LightWorld + ?Sized>(world: &mut W, queues: &mut LightQueues, x: i32, y: i32, z: i32) -> usize {
    let registry = world.registry();
    let Some(storage) = world.storage_mut(AreaCoord::containing(x, z)) else {
        return 0;
    };
    if !storage.contains_y(y) {
        return 0;
    }
    if y == storage.max_y() {
        queues.add.push_back(LightNode::new(x, y + 1, z, LightCell::MAX_LEVEL));
    }
    for (dx, dy, dz) in NEIGHBOURS {
        let (nx, ny, nz) = (x + dx, y + dy, z + dz);
        if let Some((storage, lx, lz)) = transparent_cell(world, &registry, nx, ny, nz) {
            let level = storage.light(lx, ny, lz).sunlight();
            queues.add.push_back(LightNode::new(nx, ny, nz, level));
        }
    }
    propagate_add(world, &mut queues.add)
}

/// Darkens an absolute cell that just became opaque and everything that
/// was lit only through it, then restores light reaching those cells by
/// other paths.
pub fn remove_sunlight<W: LightWorld + ?Sized>(world: &mut W, queues: &mut LightQueues, x: i32, y: i32, z: i32) -> usize {
    let Some(storage) = world.storage_mut(AreaCoord::containing(x, z)) else {
        return 0;
    };
    let (lx, lz) = local(x, z);
    if !storage.contains_y(y) {
        return 0;
    }
    let previous = storage.light(lx, y, lz).sunlight();
    write_sunlight(storage, lx, y, lz, 0);
    queues.remove.push_back(LightNode::new(x, y, z, previous));
    let removed = propagate_remove(world, queues);
    // seeds darkened later in the same pass no longer carry light
    queues
        .add
        .retain(|node| stored_sunlight(world, node.x, node.y, node.z) == Some(node.level));
    let added = propagate_add(world, &mut queues.add);
    tracing::trace!(x, y, z, removed, added, "sunlight removal settled");
    removed + added
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Runs sky light updates against the loaded neighbourhood of an area.
///
/// Registered as a [`BlockChangeSink`] it keeps light in step with block
/// edits: a cell turning opaque removes light, a cell turning transparent
/// adds it. Queues are pooled across runs.
pub struct SunlightEngine {
    queues: Pool<LightQueues>,
}

impl SunlightEngine {
    /// Creates an engine with an empty queue pool.
    pub fn new() -> Self {
        Self {
            queues: Pool::new(8),
        }
    }

    fn with_section<R>(
        &self,
        area: &Arc<Area>,
        f: impl FnOnce(&mut LightWorldSection<'_>, &mut LightQueues) -> R,
    ) -> Result<R, LockError> {
        let neighbourhood = area.neighbourhood();
        let mut section = LightWorldSection::lock(&neighbourhood)?;
        let mut queues = self.queues.obtain();
        let result = f(&mut section, &mut queues);
        drop(section);
        self.queues.free(queues);
        Ok(result)
    }

    /// Lights a freshly generated area from above.
    ///
    /// # Errors
    ///
    /// Propagates neighbourhood locking failures.
    pub fn initial_sunlight(&self, area: &Arc<Area>) -> Result<usize, LockError> {
        let coord = area.coord();
        let changed = self.with_section(area, |section, queues| initial_sunlight(section, queues, coord))?;
        tracing::debug!(area = %coord, changed, "initial sunlight");
        Ok(changed)
    }

    /// [`add_sunlight`] at local `(x, y, z)` of `area`.
    ///
    /// # Errors
    ///
    /// Propagates neighbourhood locking failures.
    pub fn add_sunlight(&self, area: &Arc<Area>, x: i32, y: i32, z: i32) -> Result<usize, LockError> {
        let (bx, bz) = (x + area.min_block_x(), z + area.min_block_z());
        self.with_section(area, |section, queues| add_sunlight(section, queues, bx, y, bz))
    }

    /// [`remove_sunlight`] at local `(x, y, z)` of `area`.
    ///
    /// # Errors
    ///
    /// Propagates neighbourhood locking failures.
    pub fn remove_sunlight(&self, area: &Arc<Area>, x: i32, y: i32, z: i32) -> Result<usize, LockError> {
        let (bx, bz) = (x + area.min_block_x(), z + area.min_block_z());
        self.with_section(area, |section, queues| remove_sunlight(section, queues, bx, y, bz))
    }

    /// Number of idle queue sets.
    pub fn pooled_queues(&self) -> usize {
        self.queues.len()
    }
}

impl Default for SunlightEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockChangeSink for SunlightEngine {
    fn block_changed(&self, event: &BlockChangedEvent) {
        let (was_transparent, is_transparent) = event.transparency();
        if was_transparent == is_transparent {
            return;
        }
        let (x, y, z) = event.position.local();
        let result = if is_transparent {
            self.add_sunlight(&event.area, x, y, z)
        } else {
            self.remove_sunlight(&event.area, x, y, z)
        };
        if let Err(err) = result {
            tracing::warn!(position = %event.position, "sunlight update skipped: {err}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use strata_voxel::{BlockId, BlockTypeDef, Transparency};

    use super::*;

    fn setup() -> (Arc<Area>, BlockId) {
        let mut registry = BlockRegistry::new();
        let stone = registry
            .register(BlockTypeDef::new("stone", Transparency::Opaque))
            .unwrap();
        let area = Arc::new(Area::new(AreaCoord::new(0, 0), Arc::new(registry)));
        area.set_block(stone, 0, 0, 0, 0).unwrap();
        (area, stone)
    }

    #[test]
    fn test_propagate_add_decays_sideways_not_down() {
        let (area, _) = setup();
        let neighbourhood = area.neighbourhood();
        let mut section = LightWorldSection::lock(&neighbourhood).unwrap();
        let mut queue = VecDeque::from([LightNode::new(10, 20, 10, 15)]);
        propagate_add(&mut section, &mut queue);
        drop(section);

        assert_eq!(area.get_sunlight(11, 20, 10), 14);
        assert_eq!(area.get_sunlight(10, 21, 10), 14);
        assert_eq!(area.get_sunlight(10, 19, 10), 15);
        assert_eq!(area.get_sunlight(10, 1, 10), 15);
        // two sideways steps from the shaft
        assert_eq!(area.get_sunlight(12, 20, 10), 13);
    }

    #[test]
    fn test_level_one_does_not_spread() {
        let (area, _) = setup();
        let neighbourhood = area.neighbourhood();
        let mut section = LightWorldSection::lock(&neighbourhood).unwrap();
        let mut queue = VecDeque::from([LightNode::new(10, 20, 10, 1)]);
        assert_eq!(propagate_add(&mut section, &mut queue), 0);
    }

    #[test]
    fn test_opaque_cells_stay_dark() {
        let (area, stone) = setup();
        area.set_block(stone, 5, 5, 5, 0).unwrap();
        let neighbourhood = area.neighbourhood();
        let mut section = LightWorldSection::lock(&neighbourhood).unwrap();
        let mut queue = VecDeque::from([LightNode::new(5, 6, 5, 15)]);
        propagate_add(&mut section, &mut queue);
        drop(section);
        assert_eq!(area.get_sunlight(5, 5, 5), 0);
        // reached only around the block
        assert_eq!(area.get_sunlight(5, 4, 5), 13);
    }

    #[test]
    fn test_out_of_view_cells_are_skipped() {
        let (area, _) = setup();
        let neighbourhood = area.neighbourhood();
        let mut section = LightWorldSection::lock(&neighbourhood).unwrap();
        // x = -1 belongs to an area that is not loaded
        let mut queue = VecDeque::from([LightNode::new(0, 10, 3, 15)]);
        assert!(propagate_add(&mut section, &mut queue) > 0);
        assert!(section.storage_mut(AreaCoord::new(-1, 0)).is_none());
    }

    #[test]
    fn test_engine_returns_queues_to_pool() {
        let (area, stone) = setup();
        let engine = SunlightEngine::new();
        engine.initial_sunlight(&area).unwrap();
        area.set_block(stone, 3, 3, 3, 0).unwrap();
        engine.remove_sunlight(&area, 3, 3, 3).unwrap();
        assert_eq!(engine.pooled_queues(), 1);
        assert_eq!(area.get_sunlight(3, 3, 3), 0);
        assert_eq!(area.get_sunlight(3, 2, 3), 14);
    }
}
