//! Area and block coordinate handles plus the constants of the area grid.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Side length of an area in blocks; also the height of one vertical section.
pub const SIZE_BLOCKS: i32 = 32;
/// Cells in one horizontal layer.
pub const SIZE_BLOCKS_SQUARED: usize = (SIZE_BLOCKS * SIZE_BLOCKS) as usize;
/// Cells in one 32-row vertical section.
pub const SIZE_BLOCKS_CUBED: usize = SIZE_BLOCKS_SQUARED * SIZE_BLOCKS as usize;

/// Floor-divides a block coordinate into an area coordinate.
pub fn block_to_area(block: i32) -> i32 {
    block.div_euclid(SIZE_BLOCKS)
}

/// Position of an area in the area grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AreaCoord {
    /// Area-grid X.
    pub x: i32,
    /// Area-grid Z.
    pub z: i32,
}

impl AreaCoord {
    /// Creates a new area coordinate.
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The area containing an absolute block column.
    pub fn containing(block_x: i32, block_z: i32) -> Self {
        Self::new(block_to_area(block_x), block_to_area(block_z))
    }

    /// Returns the coordinate offset by `(dx, dz)`.
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }

    /// Absolute block x of local x = 0.
    pub fn min_block_x(self) -> i32 {
        self.x * SIZE_BLOCKS
    }

    /// Absolute block z of local z = 0.
    pub fn min_block_z(self) -> i32 {
        self.z * SIZE_BLOCKS
    }
}

impl fmt::Display for AreaCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Absolute position of a block in the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockCoord {
    /// Absolute X.
    pub x: i32,
    /// Absolute Y.
    pub y: i32,
    /// Absolute Z.
    pub z: i32,
}

impl BlockCoord {
    /// Creates a new block coordinate.
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The area that owns this block.
    pub fn area(self) -> AreaCoord {
        AreaCoord::containing(self.x, self.z)
    }

    /// Local `(x, y, z)` inside the owning area.
    pub fn local(self) -> (i32, i32, i32) {
        (
            self.x.rem_euclid(SIZE_BLOCKS),
            self.y,
            self.z.rem_euclid(SIZE_BLOCKS),
        )
    }
}

impl fmt::Display for BlockCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
