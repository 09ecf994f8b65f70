//! The unit of world storage: a 32×32 column of blocks of variable height.
//!
//! An [`Area`] owns flat arrays of packed [`BlockCell`]s and [`LightCell`]s
//! indexed `x + z*32 + y*1024`, a per-column heightmap and the extended
//! block data of its cells. All of that state lives in an [`AreaStorage`]
//! behind one reader/writer lock; every public accessor takes the lock for
//! the duration of the call and never hands out references past it.
//!
//! Height grows in 32-row sections on demand when a block is placed above
//! the current top and can be trimmed back with [`Area::shrink`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use rand::Rng;
use thiserror::Error;

use crate::area_map::AreaMap;
use crate::block_data::{BlockData, BlockDataEntry};
use crate::cell::{BlockCell, LightCell};
use crate::coords::{
    AreaCoord, BlockCoord, SIZE_BLOCKS, SIZE_BLOCKS_CUBED, SIZE_BLOCKS_SQUARED, block_to_area,
};
use crate::events::BlockChangedEvent;
use crate::locks::{LockError, Lockable, ManyLocked, lock_many};
use crate::registry::{BlockBehaviour, BlockId, BlockRegistry};

/// Maximum number of 32-row sections an area may grow to.
pub const MAX_HEIGHT: usize = 65_535;
/// Highest row a block may be placed at.
pub const MAX_Y: i32 = MAX_HEIGHT as i32 * SIZE_BLOCKS - 1;

/// Face neighbours as `(dx, dy, dz)`.
const FACE_OFFSETS: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// Index of local `(x, y, z)` in the cell arrays.
pub fn block_index(x: i32, y: i32, z: i32) -> usize {
    (x + z * SIZE_BLOCKS) as usize + y as usize * SIZE_BLOCKS_SQUARED
}

/// Index of local column `(x, z)` in the heightmap.
pub fn column_index(x: i32, z: i32) -> usize {
    (x + z * SIZE_BLOCKS) as usize
}

/// Inverse of [`block_index`].
pub fn index_to_local(index: usize) -> (i32, i32, i32) {
    let size = SIZE_BLOCKS as usize;
    (
        (index % size) as i32,
        (index / SIZE_BLOCKS_SQUARED) as i32,
        ((index % SIZE_BLOCKS_SQUARED) / size) as i32,
    )
}

/// Number of sections needed to hold row `y`.
fn sections_for(y: i32) -> usize {
    y.max(0) as usize / SIZE_BLOCKS as usize + 1
}

fn in_columns(x: i32, z: i32) -> bool {
    (0..SIZE_BLOCKS).contains(&x) && (0..SIZE_BLOCKS).contains(&z)
}

/// Invalid-state errors raised by area operations.
#[derive(Debug, Error)]
pub enum AreaError {
    /// The area was unloaded and can no longer hold data.
    #[error("area {area} has been unloaded")]
    Unloaded {
        /// The unloaded area.
        area: AreaCoord,
    },
    /// A row above [`MAX_Y`] was requested.
    #[error("y = {y} is above the highest supported row {MAX_Y}")]
    HeightOutOfRange {
        /// The requested row.
        y: i32,
    },
}

/// Tunables injected into every area by its owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AreaSettings {
    /// Random block updates per 32-row section per tick.
    pub random_updates_per_section: u32,
    /// Trim unused top sections in the background after a save.
    pub shrink_after_save: bool,
}

impl AreaSettings {
    /// Budget that visits every cell about once a minute at the given tick length.
    pub fn from_tick_ms(tick_ms: u32) -> Self {
        let ticks_per_second = (1000 / tick_ms.max(1)).max(1);
        Self {
            random_updates_per_section: (SIZE_BLOCKS_CUBED as u32 / ticks_per_second / 60).max(1),
            shrink_after_save: true,
        }
    }
}

impl Default for AreaSettings {
    fn default() -> Self {
        Self::from_tick_ms(20)
    }
}

// ---------------------------------------------------------------------------
// Storage (everything behind the area lock)
// ---------------------------------------------------------------------------

/// The lock-protected contents of an [`Area`].
///
/// Obtained through [`Area::acquire_read_lock`], [`Area::acquire_write_lock`]
/// or [`lock_many`]. Coordinates are local; `y` is checked against the
/// current height and out-of-range rows read as air and darkness.
pub struct AreaStorage {
    pub(crate) blocks: Option<Vec<BlockCell>>,
    pub(crate) light: Vec<LightCell>,
    pub(crate) heightmap: Vec<i32>,
    pub(crate) block_data: Vec<BlockDataEntry>,
    pub(crate) height: usize,
    pub(crate) max_y: i32,
    pub(crate) mod_count: u64,
    pub(crate) save_mod_count: Option<u64>,
    pub(crate) saved_entities: usize,
    pub(crate) render_dirty: Vec<bool>,
    pub(crate) unloaded: bool,
}

impl AreaStorage {
    fn blank() -> Self {
        Self {
            blocks: None,
            light: Vec::new(),
            heightmap: vec![-1; SIZE_BLOCKS_SQUARED],
            block_data: Vec::new(),
            height: 0,
            max_y: -1,
            mod_count: 0,
            save_mod_count: None,
            saved_entities: 0,
            render_dirty: Vec::new(),
            unloaded: false,
        }
    }

    /// `true` if no block arrays are allocated.
    pub fn is_blank(&self) -> bool {
        self.blocks.is_none()
    }

    /// `true` once the area has been unloaded.
    pub fn is_unloaded(&self) -> bool {
        self.unloaded
    }

    /// `true` if the arrays exist and the area is still loaded.
    pub fn is_ready(&self) -> bool {
        !self.unloaded && self.blocks.is_some()
    }

    /// `true` if row `y` is backed by the arrays.
    pub fn contains_y(&self, y: i32) -> bool {
        self.is_ready() && y >= 0 && y <= self.max_y
    }

    /// Highest addressable row, or -1 when blank.
    pub fn max_y(&self) -> i32 {
        self.max_y
    }

    /// Number of allocated 32-row sections.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Modification counter.
    pub fn mod_count(&self) -> u64 {
        self.mod_count
    }

    /// `true` if local `(x, y, z)` is backed by the arrays.
    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        in_columns(x, z) && self.contains_y(y)
    }

    /// The packed cell at local `(x, y, z)`, air outside the arrays.
    pub fn block(&self, x: i32, y: i32, z: i32) -> BlockCell {
        match &self.blocks {
            Some(blocks) if self.contains(x, y, z) => blocks[block_index(x, y, z)],
            _ => BlockCell::AIR,
        }
    }

    /// The light byte at local `(x, y, z)`.
    pub fn light(&self, x: i32, y: i32, z: i32) -> LightCell {
        if self.contains(x, y, z) {
            self.light[block_index(x, y, z)]
        } else {
            LightCell::DARK
        }
    }

    /// Writes the sky light level at local `(x, y, z)`. Returns `false` if
    /// the row is not backed by the arrays.
    pub fn set_sunlight(&mut self, x: i32, y: i32, z: i32, level: u8) -> bool {
        if !self.contains(x, y, z) {
            return false;
        }
        self.light[block_index(x, y, z)].set_sunlight(level);
        true
    }

    /// Writes the block light level at local `(x, y, z)`.
    pub fn set_block_light(&mut self, x: i32, y: i32, z: i32, level: u8) -> bool {
        if !self.contains(x, y, z) {
            return false;
        }
        self.light[block_index(x, y, z)].set_block_light(level);
        true
    }

    /// Writes a cell with no visibility, heightmap or event bookkeeping.
    /// Meant for terrain generation; run [`Area::initial_update`] once the
    /// area is filled. Returns `false` if the row is not allocated.
    pub fn set_block_raw(&mut self, x: i32, y: i32, z: i32, cell: BlockCell) -> bool {
        if !self.contains(x, y, z) {
            return false;
        }
        match self.blocks.as_mut() {
            Some(blocks) => {
                blocks[block_index(x, y, z)] = cell;
                true
            }
            None => false,
        }
    }

    /// Highest non-air row of a column, -1 if empty or outside the area.
    pub fn heightmap(&self, x: i32, z: i32) -> i32 {
        if in_columns(x, z) {
            self.heightmap[column_index(x, z)]
        } else {
            -1
        }
    }

    /// Bumps the modification counter.
    pub fn modify(&mut self) {
        self.mod_count += 1;
    }

    /// Flags a section for re-rendering. Out-of-range sections are ignored.
    pub fn update_render(&mut self, section: i32) {
        if section >= 0
            && let Some(dirty) = self.render_dirty.get_mut(section as usize)
        {
            *dirty = true;
        }
    }

    /// Recomputes the visibility flag of one cell.
    pub(crate) fn update(&mut self, x: i32, y: i32, z: i32, registry: &BlockRegistry) {
        if y < 0 || y > self.max_y {
            return;
        }
        let max_y = self.max_y;
        let Some(blocks) = self.blocks.as_mut() else {
            return;
        };
        let i = block_index(x, y, z);
        let cell = blocks[i];
        if cell.is_air() {
            return;
        }
        let on_boundary = x == 0
            || x == SIZE_BLOCKS - 1
            || z == 0
            || z == SIZE_BLOCKS - 1
            || y == 0
            || y == max_y;
        let visible = on_boundary
            || FACE_OFFSETS.iter().any(|&(dx, dy, dz)| {
                registry.is_transparent(blocks[block_index(x + dx, y + dy, z + dz)])
            });
        blocks[i] = cell.with_visible(visible);
    }

    /// Recomputes visibility of a cell and its six face neighbours.
    pub(crate) fn update_surrounding(&mut self, x: i32, y: i32, z: i32, registry: &BlockRegistry) {
        self.update(x, y, z, registry);
        for (dx, dy, dz) in FACE_OFFSETS {
            let (nx, nz) = (x + dx, z + dz);
            if in_columns(nx, nz) {
                self.update(nx, y + dy, nz, registry);
            }
        }
    }

    /// Recomputes visibility for every cell.
    pub(crate) fn update_all(&mut self, registry: &BlockRegistry) {
        if !self.is_ready() {
            return;
        }
        for y in 0..=self.max_y {
            for z in 0..SIZE_BLOCKS {
                for x in 0..SIZE_BLOCKS {
                    self.update(x, y, z, registry);
                }
            }
        }
    }

    /// Rescans one column for its highest non-air row.
    pub(crate) fn calculate_height(&mut self, x: i32, z: i32) {
        let column = column_index(x, z);
        let top = match &self.blocks {
            Some(blocks) => (0..=self.max_y)
                .rev()
                .find(|&y| !blocks[column + y as usize * SIZE_BLOCKS_SQUARED].is_air())
                .unwrap_or(-1),
            None => -1,
        };
        self.heightmap[column] = top;
    }

    pub(crate) fn rebuild_heightmap(&mut self) {
        for z in 0..SIZE_BLOCKS {
            for x in 0..SIZE_BLOCKS {
                self.calculate_height(x, z);
            }
        }
    }

    /// Allocates or grows the arrays so that row `y` is addressable.
    pub(crate) fn setup_arrays(
        &mut self,
        y: i32,
        features: bool,
        registry: &BlockRegistry,
        area: AreaCoord,
    ) -> Result<(), AreaError> {
        if self.unloaded {
            return Err(AreaError::Unloaded { area });
        }
        if y > MAX_Y {
            return Err(AreaError::HeightOutOfRange { y });
        }
        if self.blocks.is_none() {
            self.allocate(sections_for(y));
        } else if y > self.max_y {
            self.expand(y, features, registry);
        }
        Ok(())
    }

    /// Replaces the arrays with empty ones of `height` sections.
    pub(crate) fn allocate(&mut self, height: usize) {
        let cells = SIZE_BLOCKS_CUBED * height;
        self.blocks = Some(vec![BlockCell::AIR; cells]);
        self.light = vec![LightCell::DARK; cells];
        self.render_dirty = vec![true; height];
        self.height = height;
        self.max_y = height as i32 * SIZE_BLOCKS - 1;
    }

    /// Grows the arrays in place; existing cells keep their indices.
    fn expand(&mut self, y: i32, features: bool, registry: &BlockRegistry) {
        let Some(blocks) = self.blocks.as_mut() else {
            return;
        };
        let old_max_y = self.max_y;
        let new_height = sections_for(y);
        let cells = SIZE_BLOCKS_CUBED * new_height;
        blocks.resize(cells, BlockCell::AIR);
        let fill = if features {
            LightCell::FULL_SUNLIGHT
        } else {
            LightCell::DARK
        };
        self.light.resize(cells, fill);
        self.render_dirty.resize(new_height, true);
        self.height = new_height;
        self.max_y = new_height as i32 * SIZE_BLOCKS - 1;

        // the old top layer is no longer on the boundary
        for z in 0..SIZE_BLOCKS {
            for x in 0..SIZE_BLOCKS {
                self.update_surrounding(x, old_max_y, z, registry);
            }
        }
    }

    /// Sections actually containing non-air cells.
    pub(crate) fn used_height(&self) -> usize {
        self.blocks
            .as_ref()
            .and_then(|blocks| blocks.iter().rposition(|cell| !cell.is_air()))
            .map_or(0, |index| index / SIZE_BLOCKS_CUBED + 1)
    }

    pub(crate) fn shrink(&mut self, registry: &BlockRegistry) {
        if self.blocks.is_none() {
            return;
        }
        let used = self.used_height();
        if used == self.height {
            return;
        }
        if used == 0 {
            self.clear_arrays();
            self.modify();
            return;
        }
        let cells = SIZE_BLOCKS_CUBED * used;
        if let Some(blocks) = self.blocks.as_mut() {
            blocks.truncate(cells);
            blocks.shrink_to_fit();
        }
        self.light.truncate(cells);
        self.light.shrink_to_fit();
        self.render_dirty = vec![true; used];
        self.height = used;
        self.max_y = used as i32 * SIZE_BLOCKS - 1;
        self.block_data.retain(|entry| entry.y <= self.max_y);

        let top = self.max_y;
        for z in 0..SIZE_BLOCKS {
            for x in 0..SIZE_BLOCKS {
                self.update_surrounding(x, top, z, registry);
            }
        }
    }

    /// Drops the arrays, leaving the area blank.
    pub(crate) fn clear_arrays(&mut self) {
        self.blocks = None;
        self.light = Vec::new();
        self.block_data.clear();
        self.render_dirty = Vec::new();
        self.height = 0;
        self.max_y = -1;
        self.heightmap.fill(-1);
    }

    pub(crate) fn has_block_data_at(&self, x: i32, y: i32, z: i32) -> bool {
        self.block_data.iter().any(|entry| entry.is_at(x, y, z))
    }

    pub(crate) fn take_block_data(&mut self, x: i32, y: i32, z: i32) -> Option<Box<dyn BlockData>> {
        let position = self
            .block_data
            .iter()
            .position(|entry| entry.is_at(x, y, z))?;
        Some(self.block_data.swap_remove(position).data)
    }
}

// ---------------------------------------------------------------------------
// Area
// ---------------------------------------------------------------------------

struct NeighbourCache {
    generation: u64,
    slots: [Weak<Area>; 9],
}

/// A 32×32 column of the world with its own lock.
pub struct Area {
    coord: AreaCoord,
    storage: RwLock<AreaStorage>,
    registry: Arc<BlockRegistry>,
    settings: AreaSettings,
    features: AtomicBool,
    map: RwLock<Weak<AreaMap>>,
    neighbours: Mutex<NeighbourCache>,
}

impl Area {
    /// Creates a blank area with default settings.
    pub fn new(coord: AreaCoord, registry: Arc<BlockRegistry>) -> Self {
        Self::with_settings(coord, registry, AreaSettings::default())
    }

    /// Creates a blank area.
    pub fn with_settings(coord: AreaCoord, registry: Arc<BlockRegistry>, settings: AreaSettings) -> Self {
        Self {
            coord,
            storage: RwLock::new(AreaStorage::blank()),
            registry,
            settings,
            features: AtomicBool::new(false),
            map: RwLock::new(Weak::new()),
            neighbours: Mutex::new(NeighbourCache {
                generation: u64::MAX,
                slots: std::array::from_fn(|_| Weak::new()),
            }),
        }
    }

    /// Copies blocks, light, heightmap and the features flag of another area
    /// into a new, unattached area. Extended block data is not copied.
    pub fn snapshot(&self) -> Area {
        let copy = Area::with_settings(self.coord, Arc::clone(&self.registry), self.settings);
        {
            let source = self.storage.read();
            let mut target = copy.storage.write();
            if let Some(blocks) = source.blocks.as_ref().filter(|_| source.is_ready()) {
                target.allocate(source.height);
                target.blocks = Some(blocks.clone());
                target.light.copy_from_slice(&source.light);
                target.heightmap.copy_from_slice(&source.heightmap);
            }
        }
        if self.features_generated() {
            copy.set_features_generated();
        }
        copy
    }

    /// Position in the area grid.
    pub fn coord(&self) -> AreaCoord {
        self.coord
    }

    /// Area-grid X.
    pub fn area_x(&self) -> i32 {
        self.coord.x
    }

    /// Area-grid Z.
    pub fn area_z(&self) -> i32 {
        self.coord.z
    }

    /// Absolute block x of local x = 0.
    pub fn min_block_x(&self) -> i32 {
        self.coord.min_block_x()
    }

    /// Absolute block z of local z = 0.
    pub fn min_block_z(&self) -> i32 {
        self.coord.min_block_z()
    }

    /// The shared block registry.
    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    /// Settings this area was created with.
    pub fn settings(&self) -> AreaSettings {
        self.settings
    }

    /// Shared access to the storage for bulk reads.
    pub fn acquire_read_lock(&self) -> RwLockReadGuard<'_, AreaStorage> {
        self.storage.read()
    }

    /// Exclusive access to the storage for bulk writes.
    pub fn acquire_write_lock(&self) -> RwLockWriteGuard<'_, AreaStorage> {
        self.storage.write()
    }

    /// Whether terrain features have been generated. Set once, never cleared.
    pub fn features_generated(&self) -> bool {
        self.features.load(Ordering::Acquire)
    }

    /// Marks terrain features as generated.
    pub fn set_features_generated(&self) {
        self.features.store(true, Ordering::Release);
    }

    /// `true` if no arrays are allocated.
    pub fn is_blank(&self) -> bool {
        self.storage.read().is_blank()
    }

    /// `true` once unloaded.
    pub fn is_unloaded(&self) -> bool {
        self.storage.read().is_unloaded()
    }

    /// `true` if loaded with arrays allocated.
    pub fn is_ready(&self) -> bool {
        self.storage.read().is_ready()
    }

    /// Allocated 32-row sections.
    pub fn height(&self) -> usize {
        self.storage.read().height
    }

    /// Sections up to and including the highest one holding a non-air cell.
    pub fn used_height(&self) -> usize {
        self.storage.read().used_height()
    }

    /// Highest addressable row, -1 when blank.
    pub fn max_y(&self) -> i32 {
        self.storage.read().max_y
    }

    // --- reads ---------------------------------------------------------

    /// Block type at local `(x, y, z)`; air outside the allocated rows.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockId {
        self.get_cell(x, y, z).block_id()
    }

    /// Metadata at local `(x, y, z)`; 0 outside the allocated rows.
    pub fn get_meta(&self, x: i32, y: i32, z: i32) -> u8 {
        self.get_cell(x, y, z).meta()
    }

    /// The full packed cell including the visibility flag.
    pub fn get_cell(&self, x: i32, y: i32, z: i32) -> BlockCell {
        if !in_columns(x, z) {
            tracing::warn!("Area::get_cell out of bounds: ({}, {}, {})", x, y, z);
            return BlockCell::AIR;
        }
        self.storage.read().block(x, y, z)
    }

    /// Highest non-air row of a column, -1 if empty or not ready.
    pub fn heightmap(&self, x: i32, z: i32) -> i32 {
        let storage = self.storage.read();
        if !storage.is_ready() || !in_columns(x, z) {
            return -1;
        }
        storage.heightmap(x, z)
    }

    /// Sky light; 15 outside the allocated rows.
    pub fn get_sunlight(&self, x: i32, y: i32, z: i32) -> u8 {
        let storage = self.storage.read();
        if !storage.contains_y(y) || !in_columns(x, z) {
            return LightCell::MAX_LEVEL;
        }
        storage.light(x, y, z).sunlight()
    }

    /// Block light; 0 outside the allocated rows.
    pub fn get_light(&self, x: i32, y: i32, z: i32) -> u8 {
        let storage = self.storage.read();
        if !storage.contains_y(y) || !in_columns(x, z) {
            return 0;
        }
        storage.light(x, y, z).block_light()
    }

    /// Larger of sky and block light; 15 outside the allocated rows.
    pub fn get_max_light(&self, x: i32, y: i32, z: i32) -> u8 {
        let storage = self.storage.read();
        if !storage.contains_y(y) || !in_columns(x, z) {
            return LightCell::MAX_LEVEL;
        }
        storage.light(x, y, z).max_light()
    }

    /// Raw light byte. Rows above the top read as full sky light; anything
    /// else unbacked reads as darkness.
    pub fn get_light_raw(&self, x: i32, y: i32, z: i32) -> LightCell {
        let storage = self.storage.read();
        if !storage.unloaded && y > storage.max_y {
            return LightCell::FULL_SUNLIGHT;
        }
        if !storage.contains_y(y) || !in_columns(x, z) {
            return LightCell::DARK;
        }
        storage.light(x, y, z)
    }

    // --- writes --------------------------------------------------------

    /// Sets sky light at local `(x, y, z)`. No-op outside the allocated rows.
    pub fn set_sunlight(&self, x: i32, y: i32, z: i32, level: u8) {
        if !in_columns(x, z) {
            return;
        }
        let mut storage = self.storage.write();
        if storage.set_sunlight(x, y, z, level) {
            storage.modify();
            storage.update_render(y / SIZE_BLOCKS);
        }
    }

    /// Sets block light at local `(x, y, z)`. No-op outside the allocated rows.
    pub fn set_light(&self, x: i32, y: i32, z: i32, level: u8) {
        if !in_columns(x, z) {
            return;
        }
        let mut storage = self.storage.write();
        if storage.set_block_light(x, y, z, level) {
            storage.modify();
            storage.update_render(y / SIZE_BLOCKS);
        }
    }

    /// Places a block at local `(x, y, z)`.
    ///
    /// Grows the area if needed, keeps extended data, visibility and the
    /// heightmap consistent, refreshes border visibility in adjacent areas
    /// when transparency changed, then posts a [`BlockChangedEvent`] with no
    /// lock held. Negative `y` and unloaded areas are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AreaError::HeightOutOfRange`] above [`MAX_Y`].
    pub fn set_block(self: &Arc<Self>, block: BlockId, x: i32, y: i32, z: i32, meta: u8) -> Result<(), AreaError> {
        if y < 0 {
            return Ok(());
        }
        if !in_columns(x, z) {
            tracing::warn!("Area::set_block out of bounds: ({}, {}, {})", x, y, z);
            return Ok(());
        }
        let registry = &self.registry;
        let new_cell = BlockCell::new(block, meta);

        let old_cell = {
            let mut storage = self.storage.write();
            if storage.unloaded {
                tracing::debug!(area = %self.coord, "ignoring set_block on unloaded area");
                return Ok(());
            }
            storage.setup_arrays(y, self.features_generated(), registry, self.coord)?;

            let index = block_index(x, y, z);
            let Some(blocks) = storage.blocks.as_mut() else {
                return Ok(());
            };
            let old_cell = std::mem::replace(&mut blocks[index], new_cell);

            let old_id = old_cell.block_id();
            if old_id != block && registry.has_block_data(old_id) {
                storage.take_block_data(x, y, z);
            }
            if let Some(behaviour) = registry.behaviour(block)
                && behaviour.has_block_data()
                && !storage.has_block_data_at(x, y, z)
                && let Some(data) = behaviour.create_block_data(x, y, z, meta)
            {
                storage.block_data.push(BlockDataEntry { x, y, z, data });
            }

            storage.update_surrounding(x, y, z, registry);
            let section = y / SIZE_BLOCKS;
            storage.update_render(section);
            if y % SIZE_BLOCKS == 0 {
                storage.update_render(section - 1);
            }
            if y % SIZE_BLOCKS == SIZE_BLOCKS - 1 {
                storage.update_render(section + 1);
            }

            let column = column_index(x, z);
            if !new_cell.is_air() && y > storage.heightmap[column] {
                storage.heightmap[column] = y;
            } else if new_cell.is_air() && y == storage.heightmap[column] {
                storage.calculate_height(x, z);
            }

            storage.modify();
            old_cell
        };

        if registry.is_transparent(old_cell) != registry.is_transparent(new_cell) {
            self.update_neighbour_borders(x, y, z);
        }

        if let Some(map) = self.map() {
            map.notify(&BlockChangedEvent {
                position: BlockCoord::new(x + self.min_block_x(), y, z + self.min_block_z()),
                old_block: old_cell.block_id(),
                old_meta: old_cell.meta(),
                new_block: new_cell.block_id(),
                new_meta: new_cell.meta(),
                area: Arc::clone(self),
            });
        }
        Ok(())
    }

    /// Re-evaluates visibility of the facing cell in adjacent areas when
    /// `(x, z)` lies on a border. Locks one neighbour at a time.
    fn update_neighbour_borders(self: &Arc<Self>, x: i32, y: i32, z: i32) {
        let last = SIZE_BLOCKS - 1;
        let borders = [
            (x == 0, -1, 0, last, z),
            (x == last, 1, 0, 0, z),
            (z == 0, 0, -1, x, last),
            (z == last, 0, 1, x, 0),
        ];
        for (on_border, dx, dz, nx, nz) in borders {
            if !on_border {
                continue;
            }
            let Some(area) = self.neighbour(self.coord.x + dx, self.coord.z + dz) else {
                continue;
            };
            let mut storage = area.storage.write();
            if storage.is_ready() {
                storage.update(nx, y, nz, &area.registry);
            }
            storage.update_render(y / SIZE_BLOCKS);
        }
    }

    /// Makes row `y` addressable, allocating or growing the arrays.
    ///
    /// # Errors
    ///
    /// Fails if the area is unloaded or `y` is above [`MAX_Y`].
    pub fn setup_arrays(&self, y: i32) -> Result<(), AreaError> {
        let mut storage = self.storage.write();
        storage.setup_arrays(y, self.features_generated(), &self.registry, self.coord)
    }

    /// Drops empty top sections; an entirely empty area becomes blank.
    ///
    /// # Errors
    ///
    /// Fails if the area is unloaded.
    pub fn shrink(&self) -> Result<(), AreaError> {
        let mut storage = self.storage.write();
        if storage.unloaded {
            return Err(AreaError::Unloaded { area: self.coord });
        }
        storage.shrink(&self.registry);
        Ok(())
    }

    /// Releases all arrays and marks the area unloaded. Idempotent.
    pub fn unload(&self) {
        {
            let mut storage = self.storage.write();
            if storage.unloaded {
                return;
            }
            storage.clear_arrays();
            storage.unloaded = true;
        }
        let mut cache = self.neighbours.lock();
        cache.slots = std::array::from_fn(|_| Weak::new());
        tracing::debug!(area = %self.coord, "area unloaded");
    }

    /// Recomputes the visibility flag of every cell.
    pub fn update_all(&self) {
        self.storage.write().update_all(&self.registry);
    }

    /// Builds visibility and heightmap for freshly generated terrain.
    pub fn initial_update(&self) {
        let mut storage = self.storage.write();
        if !storage.is_ready() {
            return;
        }
        storage.update_all(&self.registry);
        storage.rebuild_heightmap();
        storage.modify();
    }

    /// Rescans every column of the heightmap.
    pub fn rebuild_heightmap(&self) {
        let mut storage = self.storage.write();
        if storage.is_ready() {
            storage.rebuild_heightmap();
        }
    }

    /// Rescans one column of the heightmap.
    pub fn calculate_height(&self, x: i32, z: i32) {
        if in_columns(x, z) {
            self.storage.write().calculate_height(x, z);
        }
    }

    // --- extended block data ------------------------------------------

    /// Attaches extended data to local `(x, y, z)`, replacing any existing entry.
    pub fn add_block_data(&self, x: i32, y: i32, z: i32, data: Box<dyn BlockData>) {
        let mut storage = self.storage.write();
        if storage.unloaded {
            tracing::debug!(area = %self.coord, "ignoring add_block_data on unloaded area");
            return;
        }
        storage.take_block_data(x, y, z);
        storage.block_data.push(BlockDataEntry { x, y, z, data });
    }

    /// Detaches and returns the extended data of local `(x, y, z)`.
    pub fn remove_block_data(&self, x: i32, y: i32, z: i32) -> Option<Box<dyn BlockData>> {
        self.storage.write().take_block_data(x, y, z)
    }

    /// Runs `f` on the extended data of local `(x, y, z)` under a read lock.
    pub fn with_block_data<R>(&self, x: i32, y: i32, z: i32, f: impl FnOnce(&dyn BlockData) -> R) -> Option<R> {
        let storage = self.storage.read();
        storage
            .block_data
            .iter()
            .find(|entry| entry.is_at(x, y, z))
            .map(|entry| f(entry.data.as_ref()))
    }

    /// Runs `f` on the extended data of local `(x, y, z)` under a write
    /// lock and marks the area modified.
    pub fn modify_block_data<R>(
        &self,
        x: i32,
        y: i32,
        z: i32,
        f: impl FnOnce(&mut dyn BlockData) -> R,
    ) -> Option<R> {
        let mut storage = self.storage.write();
        let result = storage
            .block_data
            .iter_mut()
            .find(|entry| entry.is_at(x, y, z))
            .map(|entry| f(entry.data.as_mut()))?;
        storage.modify();
        Some(result)
    }

    /// Number of cells carrying extended data.
    pub fn block_data_count(&self) -> usize {
        self.storage.read().block_data.len()
    }

    // --- neighbours ----------------------------------------------------

    /// The map this area is registered in, if any.
    pub fn map(&self) -> Option<Arc<AreaMap>> {
        self.map.read().upgrade()
    }

    pub(crate) fn attach(&self, map: &Arc<AreaMap>) {
        *self.map.write() = Arc::downgrade(map);
    }

    pub(crate) fn detach(&self) {
        *self.map.write() = Weak::new();
    }

    /// Resolves another area through the map. The 3×3 surroundings are
    /// cached and revalidated against the map's generation counter.
    pub fn neighbour(self: &Arc<Self>, area_x: i32, area_z: i32) -> Option<Arc<Area>> {
        if area_x == self.coord.x && area_z == self.coord.z {
            return Some(Arc::clone(self));
        }
        let map = self.map()?;
        let target = AreaCoord::new(area_x, area_z);
        let (dx, dz) = (area_x - self.coord.x, area_z - self.coord.z);
        if !(-1..=1).contains(&dx) || !(-1..=1).contains(&dz) {
            return map.get_area(target);
        }

        let slot = (3 * (dx + 1) + (dz + 1)) as usize;
        let generation = map.generation();
        {
            let mut cache = self.neighbours.lock();
            if cache.generation != generation {
                cache.slots = std::array::from_fn(|_| Weak::new());
                cache.generation = generation;
            }
            if let Some(area) = cache.slots[slot].upgrade() {
                return Some(area);
            }
        }

        let area = map.get_area(target)?;
        let mut cache = self.neighbours.lock();
        if cache.generation == generation {
            cache.slots[slot] = Arc::downgrade(&area);
        }
        Some(area)
    }

    /// The area owning absolute block column `(block_x, block_z)`.
    pub fn neighbour_block_coordinates(self: &Arc<Self>, block_x: i32, block_z: i32) -> Option<Arc<Area>> {
        self.neighbour(block_to_area(block_x), block_to_area(block_z))
    }

    /// This area and its loaded neighbours in the surrounding 3×3.
    pub fn neighbourhood(self: &Arc<Self>) -> Neighbourhood {
        let mut areas = Vec::with_capacity(9);
        let mut missing = 0;
        for dz in -1..=1 {
            for dx in -1..=1 {
                match self.neighbour(self.coord.x + dx, self.coord.z + dz) {
                    Some(area) => areas.push(area),
                    None => missing += 1,
                }
            }
        }
        Neighbourhood {
            centre: self.coord,
            areas,
            missing,
        }
    }

    // --- simulation ----------------------------------------------------

    /// Runs random block updates and extended data updates.
    ///
    /// Only areas with generated features that belong to a map tick. Cells
    /// are sampled under the write lock; behaviour hooks run after it is
    /// released.
    pub fn tick<R: Rng>(self: &Arc<Self>, rng: &mut R) {
        if !self.features_generated() || self.map().is_none() {
            return;
        }
        let mut scheduled: Vec<(Arc<dyn BlockBehaviour>, i32, i32, i32, u8)> = Vec::new();
        {
            let mut storage = self.storage.write();
            if !storage.is_ready() {
                return;
            }
            let updates = self.settings.random_updates_per_section as usize * storage.height;
            for _ in 0..updates {
                let x = rng.random_range(0..SIZE_BLOCKS);
                let z = rng.random_range(0..SIZE_BLOCKS);
                let y = rng.random_range(0..=storage.max_y);
                let cell = storage.block(x, y, z);
                if cell.is_air() {
                    continue;
                }
                if let Some(behaviour) = self.registry.behaviour(cell.block_id()) {
                    scheduled.push((Arc::clone(behaviour), x, y, z, cell.meta()));
                }
            }
            for entry in &mut storage.block_data {
                entry.data.update();
            }
        }
        for (behaviour, x, y, z, meta) in scheduled {
            behaviour.random_tick(self, x, y, z, meta);
        }
    }

    /// Takes and clears the sections flagged for re-rendering.
    pub fn take_render_updates(&self) -> Vec<usize> {
        let mut storage = self.storage.write();
        let mut sections = Vec::new();
        for (section, dirty) in storage.render_dirty.iter_mut().enumerate() {
            if std::mem::take(dirty) {
                sections.push(section);
            }
        }
        sections
    }

    // --- persistence bookkeeping -----------------------------------------

    /// Bumps the modification counter.
    pub fn modify(&self) {
        self.storage.write().modify();
    }

    /// Current modification counter.
    pub fn mod_count(&self) -> u64 {
        self.storage.read().mod_count
    }

    /// `true` if the area needs saving: it was modified since the last save
    /// or load, it has live entities, or its last save carried entities.
    pub fn modified_since_save(&self, live_entities: usize) -> bool {
        let storage = self.storage.read();
        live_entities > 0
            || storage.saved_entities > 0
            || storage.save_mod_count != Some(storage.mod_count)
    }

    /// Records the current modification counter as saved.
    pub fn mark_saved(&self) {
        let mut storage = self.storage.write();
        storage.save_mod_count = Some(storage.mod_count);
    }
}

impl Lockable for Area {
    type Target = AreaStorage;

    fn lock_key(&self) -> (i32, i32) {
        (self.coord.z, self.coord.x)
    }

    fn rw_lock(&self) -> &RwLock<AreaStorage> {
        &self.storage
    }
}

impl fmt::Debug for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Area")
            .field("coord", &self.coord)
            .field("features", &self.features_generated())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Area{}", self.coord)
    }
}

/// The loaded part of an area's 3×3 surroundings, centre included.
pub struct Neighbourhood {
    centre: AreaCoord,
    areas: Vec<Arc<Area>>,
    missing: usize,
}

impl Neighbourhood {
    /// Coordinates of the centre area.
    pub fn centre(&self) -> AreaCoord {
        self.centre
    }

    /// The loaded areas.
    pub fn areas(&self) -> &[Arc<Area>] {
        &self.areas
    }

    /// How many of the nine slots were not loaded.
    pub fn missing(&self) -> usize {
        self.missing
    }

    /// Locks every loaded area in global order.
    ///
    /// # Errors
    ///
    /// With `require_all`, fails with [`LockError::NeighboursNotLoaded`]
    /// before acquiring anything if a slot is empty.
    pub fn lock(&self, write: bool, require_all: bool) -> Result<ManyLocked<'_, Area>, LockError> {
        if require_all && self.missing > 0 {
            return Err(LockError::NeighboursNotLoaded {
                area: self.centre,
                missing: self.missing,
            });
        }
        Ok(lock_many(write, self.areas.iter().map(Arc::as_ref)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::test_support::{TestBlocks, flat_area};

    fn area(blocks: &TestBlocks) -> Arc<Area> {
        Arc::new(Area::new(AreaCoord::new(0, 0), Arc::clone(&blocks.registry)))
    }

    /// Visibility must equal "on a boundary or next to a transparent cell".
    fn assert_visibility_consistent(area: &Area) {
        let storage = area.acquire_read_lock();
        let registry = area.registry();
        for y in 0..=storage.max_y() {
            for z in 0..SIZE_BLOCKS {
                for x in 0..SIZE_BLOCKS {
                    let cell = storage.block(x, y, z);
                    if cell.is_air() {
                        assert!(!cell.is_visible());
                        continue;
                    }
                    let boundary = x == 0
                        || z == 0
                        || y == 0
                        || x == SIZE_BLOCKS - 1
                        || z == SIZE_BLOCKS - 1
                        || y == storage.max_y();
                    let expected = boundary
                        || FACE_OFFSETS.iter().any(|&(dx, dy, dz)| {
                            registry.is_transparent(storage.block(x + dx, y + dy, z + dz))
                        });
                    assert_eq!(cell.is_visible(), expected, "cell ({x}, {y}, {z})");
                }
            }
        }
    }

    fn assert_heightmap_consistent(area: &Area) {
        let storage = area.acquire_read_lock();
        for z in 0..SIZE_BLOCKS {
            for x in 0..SIZE_BLOCKS {
                let top = (0..=storage.max_y())
                    .rev()
                    .find(|&y| !storage.block(x, y, z).is_air())
                    .unwrap_or(-1);
                assert_eq!(storage.heightmap(x, z), top, "column ({x}, {z})");
            }
        }
    }

    #[test]
    fn test_blank_area_reads_sentinels() {
        let blocks = TestBlocks::new();
        let area = area(&blocks);
        assert!(area.is_blank());
        assert_eq!(area.get_block(3, 4, 5), BlockId::AIR);
        assert_eq!(area.get_meta(3, 4, 5), 0);
        assert_eq!(area.get_sunlight(3, 4, 5), 15);
        assert_eq!(area.get_light(3, 4, 5), 0);
        assert_eq!(area.get_max_light(3, 4, 5), 15);
        assert_eq!(area.heightmap(3, 5), -1);
    }

    #[test]
    fn test_set_block_allocates_sections_on_demand() {
        let blocks = TestBlocks::new();
        let area = area(&blocks);
        area.set_block(blocks.stone, 1, 40, 1, 3).unwrap();
        assert_eq!(area.height(), 2);
        assert_eq!(area.max_y(), 63);
        assert_eq!(area.get_block(1, 40, 1), blocks.stone);
        assert_eq!(area.get_meta(1, 40, 1), 3);
        assert_eq!(area.heightmap(1, 1), 40);
    }

    #[test]
    fn test_negative_y_is_ignored() {
        let blocks = TestBlocks::new();
        let area = area(&blocks);
        area.set_block(blocks.stone, 1, -1, 1, 0).unwrap();
        assert!(area.is_blank());
        assert_eq!(area.mod_count(), 0);
    }

    #[test]
    fn test_height_above_max_is_rejected() {
        let blocks = TestBlocks::new();
        let area = area(&blocks);
        let result = area.set_block(blocks.stone, 1, MAX_Y + 1, 1, 0);
        assert!(matches!(result, Err(AreaError::HeightOutOfRange { .. })));
        assert!(area.is_blank());
    }

    #[test]
    fn test_unloaded_area_ignores_writes() {
        let blocks = TestBlocks::new();
        let area = area(&blocks);
        area.set_block(blocks.stone, 1, 1, 1, 0).unwrap();
        area.unload();
        area.unload();
        assert!(area.is_unloaded());
        area.set_block(blocks.stone, 2, 2, 2, 0).unwrap();
        assert_eq!(area.get_block(2, 2, 2), BlockId::AIR);
        assert!(matches!(area.setup_arrays(5), Err(AreaError::Unloaded { .. })));
        assert!(matches!(area.shrink(), Err(AreaError::Unloaded { .. })));
    }

    #[test]
    fn test_buried_block_is_hidden() {
        let blocks = TestBlocks::new();
        let area = flat_area(&blocks, AreaCoord::new(0, 0), 10);
        assert!(!area.get_cell(5, 5, 5).is_visible());
        // top of the ground faces air
        assert!(area.get_cell(5, 10, 5).is_visible());
        // area edges are always visible
        assert!(area.get_cell(0, 5, 5).is_visible());
        assert_visibility_consistent(&area);
    }

    #[test]
    fn test_digging_exposes_neighbours() {
        let blocks = TestBlocks::new();
        let area = flat_area(&blocks, AreaCoord::new(0, 0), 10);
        area.set_block(BlockId::AIR, 5, 5, 5, 0).unwrap();
        assert!(area.get_cell(4, 5, 5).is_visible());
        assert!(area.get_cell(5, 4, 5).is_visible());
        assert!(!area.get_cell(3, 5, 5).is_visible());
        assert_visibility_consistent(&area);
    }

    #[test]
    fn test_transparent_neighbour_exposes_cell() {
        let blocks = TestBlocks::new();
        let area = flat_area(&blocks, AreaCoord::new(0, 0), 10);
        area.set_block(blocks.glass, 5, 5, 5, 0).unwrap();
        assert!(area.get_cell(6, 5, 5).is_visible());
        // glass enclosed by stone has nothing to show
        assert!(!area.get_cell(5, 5, 5).is_visible());
        assert_visibility_consistent(&area);
    }

    #[test]
    fn test_heightmap_tracks_top_block() {
        let blocks = TestBlocks::new();
        let area = area(&blocks);
        area.set_block(blocks.stone, 2, 3, 2, 0).unwrap();
        area.set_block(blocks.stone, 2, 9, 2, 0).unwrap();
        assert_eq!(area.heightmap(2, 2), 9);
        area.set_block(BlockId::AIR, 2, 9, 2, 0).unwrap();
        assert_eq!(area.heightmap(2, 2), 3);
        area.set_block(BlockId::AIR, 2, 3, 2, 0).unwrap();
        assert_eq!(area.heightmap(2, 2), -1);
        assert_heightmap_consistent(&area);
    }

    #[test]
    fn test_invariants_hold_after_random_edits() {
        let blocks = TestBlocks::new();
        let area = flat_area(&blocks, AreaCoord::new(0, 0), 6);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let palette = [BlockId::AIR, blocks.stone, blocks.glass];
        for _ in 0..400 {
            let block = palette[rng.random_range(0..palette.len())];
            let x = rng.random_range(0..SIZE_BLOCKS);
            let y = rng.random_range(0..48);
            let z = rng.random_range(0..SIZE_BLOCKS);
            area.set_block(block, x, y, z, 0).unwrap();
        }
        assert_visibility_consistent(&area);
        assert_heightmap_consistent(&area);
    }

    #[test]
    fn test_expand_fills_light_when_features_generated() {
        let blocks = TestBlocks::new();
        let area = area(&blocks);
        area.set_block(blocks.stone, 0, 0, 0, 0).unwrap();
        area.set_features_generated();
        area.set_block(blocks.stone, 0, 40, 0, 0).unwrap();
        assert_eq!(area.get_sunlight(3, 50, 3), 15);
        assert_eq!(area.get_sunlight(3, 10, 3), 0);
    }

    #[test]
    fn test_light_raw_above_top_is_full_sunlight() {
        let blocks = TestBlocks::new();
        let area = area(&blocks);
        area.set_block(blocks.stone, 0, 0, 0, 0).unwrap();
        assert_eq!(area.get_light_raw(0, 32, 0), LightCell::FULL_SUNLIGHT);
        assert_eq!(area.get_light_raw(0, -1, 0), LightCell::DARK);
        area.set_sunlight(0, 1, 0, 9);
        area.set_light(0, 1, 0, 4);
        assert_eq!(area.get_light_raw(0, 1, 0), LightCell(0x94));
        assert_eq!(area.get_max_light(0, 1, 0), 9);
    }

    #[test]
    fn test_shrink_drops_empty_sections() {
        let blocks = TestBlocks::new();
        let area = area(&blocks);
        area.set_block(blocks.stone, 4, 5, 4, 0).unwrap();
        area.set_block(blocks.stone, 4, 100, 4, 0).unwrap();
        assert_eq!(area.height(), 4);
        area.set_block(BlockId::AIR, 4, 100, 4, 0).unwrap();
        assert_eq!(area.used_height(), 1);
        area.shrink().unwrap();
        assert_eq!(area.height(), 1);
        assert_eq!(area.get_block(4, 5, 4), blocks.stone);
        assert_visibility_consistent(&area);

        area.set_block(BlockId::AIR, 4, 5, 4, 0).unwrap();
        area.shrink().unwrap();
        assert!(area.is_blank());
        assert!(!area.is_unloaded());
    }

    #[test]
    fn test_block_data_follows_block_type() {
        let blocks = TestBlocks::new();
        let area = area(&blocks);
        area.set_block(blocks.chest, 3, 3, 3, 0).unwrap();
        assert_eq!(area.block_data_count(), 1);

        // same type again keeps the existing state
        area.modify_block_data(3, 3, 3, |data| data.read(b"gold").unwrap());
        area.set_block(blocks.chest, 3, 3, 3, 1).unwrap();
        assert_eq!(area.block_data_count(), 1);
        assert_eq!(area.with_block_data(3, 3, 3, |data| data.write()), Some(b"gold".to_vec()));

        area.set_block(blocks.stone, 3, 3, 3, 0).unwrap();
        assert_eq!(area.block_data_count(), 0);
        assert!(area.with_block_data(3, 3, 3, |_| ()).is_none());
    }

    #[test]
    fn test_unloaded_area_rejects_block_data() {
        use crate::test_support::ChestData;

        let blocks = TestBlocks::new();
        let area = area(&blocks);
        area.set_block(blocks.stone, 1, 1, 1, 0).unwrap();
        area.unload();
        area.add_block_data(1, 1, 1, Box::new(ChestData::default()));
        assert_eq!(area.block_data_count(), 0);
    }

    #[test]
    fn test_storage_accessors_outside_columns() {
        let blocks = TestBlocks::new();
        let area = flat_area(&blocks, AreaCoord::new(0, 0), 4);
        let mut storage = area.acquire_write_lock();
        assert_eq!(storage.block(-1, 2, 0), BlockCell::AIR);
        assert_eq!(storage.block(0, 2, 32), BlockCell::AIR);
        assert_eq!(storage.light(3, 2, -5), LightCell::DARK);
        assert_eq!(storage.heightmap(-1, 0), -1);
        assert_eq!(storage.heightmap(0, 32), -1);
        assert!(!storage.set_sunlight(-1, 2, 0, 15));
        assert!(!storage.set_block_light(32, 2, 0, 15));
        assert!(!storage.contains(31, 2, -1));
        assert!(storage.contains(31, 2, 31));
        assert_eq!(storage.heightmap(31, 31), 4);
    }

    #[test]
    fn test_expand_keeps_existing_cells() {
        let blocks = TestBlocks::new();
        let area = area(&blocks);
        area.set_block(blocks.stone, 4, 10, 6, 0).unwrap();
        area.set_block(blocks.glass, 4, 70, 6, 0).unwrap();
        assert_eq!(area.height(), 3);
        assert_eq!(area.get_block(4, 10, 6), blocks.stone);
        assert_eq!(area.get_block(4, 70, 6), blocks.glass);
        assert_eq!(area.heightmap(4, 6), 70);
    }

    #[test]
    fn test_modified_since_save() {
        let blocks = TestBlocks::new();
        let area = area(&blocks);
        assert!(area.modified_since_save(0));
        area.mark_saved();
        assert!(!area.modified_since_save(0));
        assert!(area.modified_since_save(2));
        area.set_block(blocks.stone, 0, 0, 0, 0).unwrap();
        assert!(area.modified_since_save(0));
    }

    #[test]
    fn test_render_updates_cover_section_borders() {
        let blocks = TestBlocks::new();
        let area = area(&blocks);
        area.set_block(blocks.stone, 0, 70, 0, 0).unwrap();
        area.take_render_updates();
        area.set_block(blocks.stone, 0, 64, 0, 0).unwrap();
        assert_eq!(area.take_render_updates(), vec![1, 2]);
        assert!(area.take_render_updates().is_empty());
    }

    #[test]
    fn test_snapshot_copies_contents() {
        let blocks = TestBlocks::new();
        let area = flat_area(&blocks, AreaCoord::new(2, -1), 4);
        area.set_sunlight(1, 10, 1, 7);
        let copy = area.snapshot();
        assert_eq!(copy.coord(), area.coord());
        assert_eq!(copy.get_block(1, 4, 1), blocks.stone);
        assert_eq!(copy.get_sunlight(1, 10, 1), 7);
        assert_eq!(copy.heightmap(1, 1), 4);
        assert!(copy.map().is_none());
    }

    #[test]
    fn test_tick_runs_behaviours_and_block_data() {
        use std::sync::atomic::Ordering;

        use crate::test_support::ChestData;

        let blocks = TestBlocks::new();
        let map = AreaMap::new(Arc::clone(&blocks.registry), AreaSettings::default());
        let area = map.get_or_create(AreaCoord::new(0, 0));
        area.setup_arrays(0).unwrap();
        {
            let mut storage = area.acquire_write_lock();
            let cells = storage.blocks.as_mut().unwrap();
            cells.fill(BlockCell::new(blocks.sapling, 0));
        }
        area.set_block(blocks.chest, 1, 1, 1, 0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        // nothing happens before features are generated
        area.tick(&mut rng);
        assert_eq!(blocks.sapling_ticks.load(Ordering::Relaxed), 0);

        area.set_features_generated();
        area.tick(&mut rng);
        let ticks = blocks.sapling_ticks.load(Ordering::Relaxed);
        assert!(ticks > 0);
        assert!(ticks <= area.settings().random_updates_per_section as usize);
        let updates = area.with_block_data(1, 1, 1, |data| {
            data.as_any().downcast_ref::<ChestData>().map(|chest| chest.updates)
        });
        assert_eq!(updates, Some(Some(1)));
    }

    #[test]
    fn test_unattached_area_does_not_tick() {
        use std::sync::atomic::Ordering;

        let blocks = TestBlocks::new();
        let area = area(&blocks);
        area.set_block(blocks.sapling, 0, 0, 0, 0).unwrap();
        area.set_features_generated();
        area.tick(&mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(blocks.sapling_ticks.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_index_roundtrip() {
        let index = block_index(7, 45, 19);
        assert_eq!(index_to_local(index), (7, 45, 19));
    }

    #[test]
    fn test_settings_from_tick_rate() {
        assert_eq!(AreaSettings::from_tick_ms(20).random_updates_per_section, 10);
        assert_eq!(AreaSettings::from_tick_ms(50).random_updates_per_section, 27);
        assert!(AreaSettings::from_tick_ms(0).random_updates_per_section > 0);
    }
}
