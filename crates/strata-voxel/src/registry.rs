//! Block type registry: maps compact [`BlockId`] values to [`BlockTypeDef`] metadata.
//!
//! The registry is built once at startup and shared by `Arc` with every area
//! that needs to answer transparency or extended-data questions. Air is always
//! ID 0 so that zero-initialized cell memory represents empty space.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::area::Area;
use crate::block_data::BlockData;
use crate::cell::BlockCell;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Block type identifier stored in the low 20 bits of every [`BlockCell`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl BlockId {
    /// The air block.
    pub const AIR: BlockId = BlockId(0);
    /// Largest id that fits in a packed cell.
    pub const MAX: BlockId = BlockId(BlockCell::ID_MASK);

    /// Returns `true` for air.
    pub fn is_air(self) -> bool {
        self.0 == 0
    }
}

/// Transparency mode for a block type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transparency {
    /// Blocks light and hides neighbouring faces.
    Opaque,
    /// Partially transparent (e.g. leaves, glass).
    SemiTransparent,
    /// Completely transparent (e.g. air).
    FullyTransparent,
}

/// Per-type behaviour hooks. Everything defaults to a plain, inert block.
pub trait BlockBehaviour: Send + Sync {
    /// Whether blocks of this type own extended data.
    fn has_block_data(&self) -> bool {
        false
    }

    /// Creates the extended data for a block placed at local `(x, y, z)`.
    fn create_block_data(&self, _x: i32, _y: i32, _z: i32, _meta: u8) -> Option<Box<dyn BlockData>> {
        None
    }

    /// Called for blocks selected by the area's random tick.
    ///
    /// No area lock is held while this runs, so implementations may call
    /// back into the area (e.g. [`Area::set_block`]).
    fn random_tick(&self, _area: &Arc<Area>, _x: i32, _y: i32, _z: i32, _meta: u8) {}
}

/// Full descriptor for a block type.
#[derive(Clone)]
pub struct BlockTypeDef {
    /// Human-readable name (e.g. "stone", "glass", "chest").
    pub name: String,
    /// Transparency mode.
    pub transparency: Transparency,
    /// Light emission level (0 = none, 15 = max).
    pub light_emission: u8,
    /// Optional behaviour hooks.
    pub behaviour: Option<Arc<dyn BlockBehaviour>>,
}

impl BlockTypeDef {
    /// A behaviour-less block definition.
    pub fn new(name: impl Into<String>, transparency: Transparency) -> Self {
        Self {
            name: name.into(),
            transparency,
            light_emission: 0,
            behaviour: None,
        }
    }

    /// Attaches behaviour hooks.
    #[must_use]
    pub fn with_behaviour(mut self, behaviour: Arc<dyn BlockBehaviour>) -> Self {
        self.behaviour = Some(behaviour);
        self
    }
}

impl fmt::Debug for BlockTypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockTypeDef")
            .field("name", &self.name)
            .field("transparency", &self.transparency)
            .field("light_emission", &self.light_emission)
            .field("behaviour", &self.behaviour.is_some())
            .finish()
    }
}

/// Errors that can occur during block type registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A type with the same name has already been registered.
    #[error("duplicate block type name: {0}")]
    DuplicateName(String),
    /// Every id that fits in a packed cell has been assigned.
    #[error("block registry is full (max {} types)", BlockId::MAX.0 as u64 + 1)]
    RegistryFull,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps [`BlockId`] → [`BlockTypeDef`] with O(1) lookup by index and
/// O(1) reverse lookup by name.
pub struct BlockRegistry {
    /// Dense array where `index == BlockId.0`.
    types: Vec<BlockTypeDef>,
    /// Reverse lookup: name → ID.
    name_to_id: HashMap<String, BlockId>,
    /// Cached transparency per id, read on every propagation step.
    transparent: Vec<bool>,
}

impl BlockRegistry {
    /// Creates a new registry with air pre-registered as ID 0.
    pub fn new() -> Self {
        let air = BlockTypeDef::new("air", Transparency::FullyTransparent);

        let mut name_to_id = HashMap::new();
        name_to_id.insert("air".to_string(), BlockId::AIR);

        Self {
            types: vec![air],
            name_to_id,
            transparent: vec![true],
        }
    }

    /// Registers a new block type and returns its assigned ID.
    ///
    /// IDs are assigned sequentially starting from 1 (0 is air).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] if a type with the same name
    /// already exists, or [`RegistryError::RegistryFull`] if the 20-bit id
    /// space is exhausted.
    pub fn register(&mut self, def: BlockTypeDef) -> Result<BlockId, RegistryError> {
        if self.name_to_id.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        if self.types.len() > BlockId::MAX.0 as usize {
            return Err(RegistryError::RegistryFull);
        }

        let id = BlockId(self.types.len() as u32);
        self.name_to_id.insert(def.name.clone(), id);
        self.transparent
            .push(def.transparency != Transparency::Opaque);
        self.types.push(def);
        Ok(id)
    }

    /// Returns the definition for a given ID, or `None` if unknown.
    pub fn get(&self, id: BlockId) -> Option<&BlockTypeDef> {
        self.types.get(id.0 as usize)
    }

    /// Returns the ID for a named block type, or `None` if not found.
    pub fn lookup_by_name(&self, name: &str) -> Option<BlockId> {
        self.name_to_id.get(name).copied()
    }

    /// Returns the total number of registered types (including air).
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if only air is registered.
    pub fn is_empty(&self) -> bool {
        self.types.len() <= 1
    }

    /// Returns `true` if the id names a registered type.
    pub fn contains(&self, id: BlockId) -> bool {
        (id.0 as usize) < self.types.len()
    }

    /// Returns `true` if light and visibility pass through the cell.
    ///
    /// Air is transparent. Unknown ids are treated like air.
    pub fn is_transparent(&self, cell: BlockCell) -> bool {
        self.transparent
            .get(cell.block_id().0 as usize)
            .copied()
            .unwrap_or(true)
    }

    /// Returns `true` if a raw word read from storage is a well-formed cell
    /// naming a registered type.
    pub fn is_valid_cell(&self, raw: u32) -> bool {
        raw & !BlockCell::VALID_BITS == 0 && self.contains(BlockCell::from_raw(raw).block_id())
    }

    /// Behaviour hooks for a type, if any.
    pub fn behaviour(&self, id: BlockId) -> Option<&Arc<dyn BlockBehaviour>> {
        self.get(id).and_then(|def| def.behaviour.as_ref())
    }

    /// Whether blocks of this type own extended data.
    pub fn has_block_data(&self, id: BlockId) -> bool {
        self.behaviour(id).is_some_and(|b| b.has_block_data())
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Crate;

    impl BlockBehaviour for Crate {
        fn has_block_data(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_air_is_id_zero() {
        let registry = BlockRegistry::new();
        let air = registry.get(BlockId::AIR).unwrap();
        assert_eq!(air.name, "air");
        assert_eq!(air.transparency, Transparency::FullyTransparent);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_returns_sequential_ids() {
        let mut registry = BlockRegistry::new();
        let stone = registry
            .register(BlockTypeDef::new("stone", Transparency::Opaque))
            .unwrap();
        let glass = registry
            .register(BlockTypeDef::new("glass", Transparency::SemiTransparent))
            .unwrap();
        assert_eq!(stone, BlockId(1));
        assert_eq!(glass, BlockId(2));
        assert_eq!(registry.lookup_by_name("glass"), Some(glass));
        assert_eq!(registry.lookup_by_name("dirt"), None);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = BlockRegistry::new();
        registry
            .register(BlockTypeDef::new("stone", Transparency::Opaque))
            .unwrap();
        let result = registry.register(BlockTypeDef::new("stone", Transparency::Opaque));
        assert!(matches!(result, Err(RegistryError::DuplicateName(_))));
    }

    #[test]
    fn test_transparency_lookup() {
        let mut registry = BlockRegistry::new();
        let stone = registry
            .register(BlockTypeDef::new("stone", Transparency::Opaque))
            .unwrap();
        let leaves = registry
            .register(BlockTypeDef::new("leaves", Transparency::SemiTransparent))
            .unwrap();
        assert!(registry.is_transparent(BlockCell::AIR));
        assert!(!registry.is_transparent(BlockCell::new(stone, 0)));
        assert!(registry.is_transparent(BlockCell::new(leaves, 3)));
        // unknown ids behave like air
        assert!(registry.is_transparent(BlockCell::new(BlockId(999), 0)));
    }

    #[test]
    fn test_valid_cell_checks_id_and_reserved_bits() {
        let mut registry = BlockRegistry::new();
        let stone = registry
            .register(BlockTypeDef::new("stone", Transparency::Opaque))
            .unwrap();
        let visible = BlockCell::new(stone, 4).with_visible(true);
        assert!(registry.is_valid_cell(visible.raw()));
        assert!(registry.is_valid_cell(0));
        assert!(!registry.is_valid_cell(BlockCell::new(BlockId(77), 0).raw()));
        assert!(!registry.is_valid_cell(visible.raw() | (1 << 30)));
    }

    #[test]
    fn test_block_data_flag_from_behaviour() {
        let mut registry = BlockRegistry::new();
        let chest = registry
            .register(BlockTypeDef::new("chest", Transparency::Opaque).with_behaviour(Arc::new(Crate)))
            .unwrap();
        let stone = registry
            .register(BlockTypeDef::new("stone", Transparency::Opaque))
            .unwrap();
        assert!(registry.has_block_data(chest));
        assert!(!registry.has_block_data(stone));
        assert!(!registry.has_block_data(BlockId::AIR));
    }
}
