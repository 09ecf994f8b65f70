//! Column-based voxel storage: packed block cells, 32×32 areas with on-demand
//! height, ordered multi-area locking, change events and the binary area codec.

pub mod area;
pub mod area_map;
pub mod area_serial;
pub mod block_data;
pub mod cell;
pub mod coords;
pub mod events;
pub mod locks;
pub mod pool;
pub mod registry;
pub mod rle;

#[cfg(test)]
mod test_support;

pub use area::{Area, AreaError, AreaSettings, AreaStorage, MAX_HEIGHT, MAX_Y, Neighbourhood, block_index, column_index};
pub use area_map::AreaMap;
pub use area_serial::AreaSerError;
pub use block_data::{BlockData, BlockDataError};
pub use cell::{BlockCell, LightCell};
pub use coords::{AreaCoord, BlockCoord, SIZE_BLOCKS, SIZE_BLOCKS_CUBED, SIZE_BLOCKS_SQUARED, block_to_area};
pub use events::{BlockChangeSink, BlockChangedEvent, BlockEventBuffer};
pub use locks::{LockError, Lockable, ManyLocked, lock_many};
pub use pool::{Pool, Poolable};
pub use registry::{BlockBehaviour, BlockId, BlockRegistry, BlockTypeDef, RegistryError, Transparency};
pub use rle::{RleError, rle_decode, rle_encode};
