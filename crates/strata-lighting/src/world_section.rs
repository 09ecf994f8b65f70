//! Cross-area view used by the flood fills.
//!
//! Propagation works in absolute block coordinates. A [`LightWorld`] maps an
//! area coordinate to that area's write-locked storage, so the fill never
//! deals with area borders itself.

use std::sync::Arc;

use strata_voxel::{Area, AreaCoord, AreaStorage, BlockRegistry, LockError, ManyLocked, Neighbourhood};

/// Resolves areas for light propagation.
pub trait LightWorld {
    /// Registry used for transparency.
    fn registry(&self) -> Arc<BlockRegistry>;

    /// Exclusive access to the storage of a loaded area, `None` if the area
    /// is not part of this view.
    fn storage_mut(&mut self, area: AreaCoord) -> Option<&mut AreaStorage>;
}

/// An area and its loaded 3×3 neighbours, all write-locked for the lifetime
/// of the section.
pub struct LightWorldSection<'a> {
    locked: ManyLocked<'a, Area>,
    registry: Arc<BlockRegistry>,
}

impl<'a> LightWorldSection<'a> {
    /// Write-locks every loaded area of `neighbourhood`. Missing neighbours
    /// are tolerated; light spilling into them is dropped.
    ///
    /// # Errors
    ///
    /// Propagates the lock failure of [`Neighbourhood::lock`].
    pub fn lock(neighbourhood: &'a Neighbourhood) -> Result<Self, LockError> {
        let locked = neighbourhood.lock(true, false)?;
        let registry = neighbourhood
            .areas()
            .first()
            .map(|area| Arc::clone(area.registry()))
            .unwrap_or_default();
        Ok(Self { locked, registry })
    }

    /// Number of areas held.
    pub fn len(&self) -> usize {
        self.locked.len()
    }

    /// Returns `true` if no area is held.
    pub fn is_empty(&self) -> bool {
        self.locked.is_empty()
    }
}

impl LightWorld for LightWorldSection<'_> {
    fn registry(&self) -> Arc<BlockRegistry> {
        Arc::clone(&self.registry)
    }

    fn storage_mut(&mut self, area: AreaCoord) -> Option<&mut AreaStorage> {
        self.locked.find_mut(|candidate| candidate.coord() == area)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
