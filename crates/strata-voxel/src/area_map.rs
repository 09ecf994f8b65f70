//! Owner of every loaded [`Area`] in one simulation context, keyed by
//! [`AreaCoord`].
//!
//! Areas resolve their neighbours through the map. Every insert or removal
//! bumps a generation counter that invalidates the per-area neighbour caches.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::area::{Area, AreaSettings};
use crate::coords::AreaCoord;
use crate::events::{BlockChangeSink, BlockChangedEvent};
use crate::registry::BlockRegistry;

/// The set of loaded areas plus the listeners interested in their changes.
pub struct AreaMap {
    areas: RwLock<FxHashMap<AreaCoord, Arc<Area>>>,
    generation: AtomicU64,
    registry: Arc<BlockRegistry>,
    settings: AreaSettings,
    sinks: RwLock<Vec<Arc<dyn BlockChangeSink>>>,
}

impl AreaMap {
    /// Creates an empty map. Areas created through it share `registry` and
    /// `settings`.
    pub fn new(registry: Arc<BlockRegistry>, settings: AreaSettings) -> Arc<Self> {
        Arc::new(Self {
            areas: RwLock::new(FxHashMap::default()),
            generation: AtomicU64::new(0),
            registry,
            settings,
            sinks: RwLock::new(Vec::new()),
        })
    }

    /// The shared block registry.
    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    /// Settings handed to new areas.
    pub fn settings(&self) -> AreaSettings {
        self.settings
    }

    /// Changes on every insert or removal.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The loaded area at `coord`.
    pub fn get_area(&self, coord: AreaCoord) -> Option<Arc<Area>> {
        self.areas.read().get(&coord).cloned()
    }

    /// The area at `coord`, creating a blank one if absent.
    pub fn get_or_create(self: &Arc<Self>, coord: AreaCoord) -> Arc<Area> {
        if let Some(area) = self.get_area(coord) {
            return area;
        }
        let area = Arc::new(Area::with_settings(
            coord,
            Arc::clone(&self.registry),
            self.settings,
        ));
        let existing = {
            let mut areas = self.areas.write();
            if let Some(existing) = areas.get(&coord) {
                Some(Arc::clone(existing))
            } else {
                area.attach(self);
                areas.insert(coord, Arc::clone(&area));
                None
            }
        };
        match existing {
            Some(existing) => existing,
            None => {
                self.generation.fetch_add(1, Ordering::AcqRel);
                area
            }
        }
    }

    /// Inserts an area, e.g. one just read from disk. A previously loaded
    /// area at the same coordinates is unloaded and returned.
    pub fn insert(self: &Arc<Self>, area: Arc<Area>) -> Option<Arc<Area>> {
        area.attach(self);
        let replaced = self.areas.write().insert(area.coord(), area);
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(old) = &replaced {
            old.detach();
            old.unload();
        }
        replaced
    }

    /// Removes and unloads the area at `coord`.
    pub fn remove(&self, coord: AreaCoord) -> Option<Arc<Area>> {
        let removed = self.areas.write().remove(&coord)?;
        self.generation.fetch_add(1, Ordering::AcqRel);
        removed.detach();
        removed.unload();
        tracing::debug!(area = %coord, "area removed from map");
        Some(removed)
    }

    /// Number of loaded areas.
    pub fn loaded_count(&self) -> usize {
        self.areas.read().len()
    }

    /// Coordinates of every loaded area, sorted.
    pub fn coords(&self) -> Vec<AreaCoord> {
        let mut coords: Vec<AreaCoord> = self.areas.read().keys().copied().collect();
        coords.sort();
        coords
    }

    /// Every loaded area.
    pub fn areas(&self) -> Vec<Arc<Area>> {
        self.areas.read().values().cloned().collect()
    }

    /// Registers a listener for block changes.
    pub fn add_sink(&self, sink: Arc<dyn BlockChangeSink>) {
        self.sinks.write().push(sink);
    }

    pub(crate) fn notify(&self, event: &BlockChangedEvent) {
        let sinks = self.sinks.read().clone();
        for sink in sinks {
            sink.block_changed(event);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
