//! Extended per-block state (inventories, timers, ...) attached to a single
//! cell of an area.

use std::any::Any;

use thiserror::Error;

/// Errors raised while decoding persisted extended data.
#[derive(Debug, Error)]
pub enum BlockDataError {
    /// The payload could not be interpreted.
    #[error("malformed block data: {0}")]
    Malformed(String),
}

/// Extended state owned by one block.
///
/// Implementations are created through
/// [`BlockBehaviour::create_block_data`](crate::registry::BlockBehaviour::create_block_data)
/// and live as long as a block of their type occupies the cell.
pub trait BlockData: Send + Sync {
    /// Runs once per area tick.
    fn update(&mut self) {}

    /// Serializes the state into an opaque payload.
    fn write(&self) -> Vec<u8>;

    /// Restores state from a payload produced by [`write`](Self::write).
    fn read(&mut self, payload: &[u8]) -> Result<(), BlockDataError>;

    /// Downcasting support for callers that know the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcasting support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Extended data together with the local cell it belongs to.
pub struct BlockDataEntry {
    /// Local x (0..32).
    pub x: i32,
    /// Absolute y.
    pub y: i32,
    /// Local z (0..32).
    pub z: i32,
    /// The state itself.
    pub data: Box<dyn BlockData>,
}

impl BlockDataEntry {
    /// Returns `true` if the entry belongs to local `(x, y, z)`.
    pub fn is_at(&self, x: i32, y: i32, z: i32) -> bool {
        self.x == x && self.y == y && self.z == z
    }
}

impl std::fmt::Debug for BlockDataEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockDataEntry")
            .field("x", &self.x)
            .field("y", &self.y)
            .field("z", &self.z)
            .finish_non_exhaustive()
    }
}
