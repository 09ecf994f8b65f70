//! Packed per-cell storage words.
//!
//! A [`BlockCell`] packs a block type id, an 8-bit metadata value and a
//! visibility flag into one `u32`. A [`LightCell`] packs sky light and block
//! light into one byte. Both are plain `Copy` values stored in flat arrays
//! owned by an [`Area`](crate::area::Area).

use serde::{Deserialize, Serialize};

use crate::registry::BlockId;

/// A packed block cell: `id` in bits 0..20, metadata in bits 20..28 and the
/// visibility flag in bit 28. Bits 29..32 are always zero.
///
/// The all-zero value is air. An air cell never carries metadata or
/// visibility.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BlockCell(u32);

impl BlockCell {
    /// The air sentinel.
    pub const AIR: BlockCell = BlockCell(0);
    /// Mask covering the 20-bit block type id.
    pub const ID_MASK: u32 = 0x000F_FFFF;
    /// Shift of the 8-bit metadata field.
    pub const META_SHIFT: u32 = 20;
    /// Visibility flag: at least one face of this cell can be seen.
    pub const VISIBLE: u32 = 1 << 28;
    /// Every bit a well-formed cell may have set.
    pub const VALID_BITS: u32 = Self::ID_MASK | (0xFF << Self::META_SHIFT) | Self::VISIBLE;

    /// Packs a block id and metadata. Visibility starts cleared.
    pub fn new(id: BlockId, meta: u8) -> Self {
        if id.is_air() {
            return Self::AIR;
        }
        Self((id.0 & Self::ID_MASK) | (u32::from(meta) << Self::META_SHIFT))
    }

    /// Reinterprets a raw storage word without validation.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw storage word.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The block type id.
    pub fn block_id(self) -> BlockId {
        BlockId(self.0 & Self::ID_MASK)
    }

    /// The metadata byte. Always 0 for air.
    pub fn meta(self) -> u8 {
        if self.is_air() {
            return 0;
        }
        ((self.0 >> Self::META_SHIFT) & 0xFF) as u8
    }

    /// Returns `true` if the cell holds air.
    pub fn is_air(self) -> bool {
        self.0 & Self::ID_MASK == 0
    }

    /// Returns `true` if the visibility flag is set.
    pub fn is_visible(self) -> bool {
        self.0 & Self::VISIBLE != 0
    }

    /// Returns a copy with the visibility flag set or cleared.
    #[must_use]
    pub fn with_visible(self, visible: bool) -> Self {
        if visible {
            Self(self.0 | Self::VISIBLE)
        } else {
            Self(self.0 & !Self::VISIBLE)
        }
    }

    /// Returns `true` if two cells hold the same id and metadata,
    /// ignoring visibility.
    pub fn same_block(self, other: BlockCell) -> bool {
        self.0 & !Self::VISIBLE == other.0 & !Self::VISIBLE
    }
}

/// Packed light byte: sky light in the upper nibble, block light in the
/// lower nibble.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct LightCell(pub u8);

impl LightCell {
    /// Maximum value of either channel.
    pub const MAX_LEVEL: u8 = 15;
    /// Raw byte for full sky light and no block light.
    pub const FULL_SUNLIGHT: LightCell = LightCell(0xF0);
    /// Raw byte for complete darkness.
    pub const DARK: LightCell = LightCell(0);

    /// Sky light level (0..=15).
    pub fn sunlight(self) -> u8 {
        self.0 >> 4
    }

    /// Block light level (0..=15).
    pub fn block_light(self) -> u8 {
        self.0 & 0x0F
    }

    /// The larger of the two channels.
    pub fn max_light(self) -> u8 {
        self.sunlight().max(self.block_light())
    }

    /// Sets the sky light level. Values above 15 are clamped.
    pub fn set_sunlight(&mut self, level: u8) {
        let level = level.min(Self::MAX_LEVEL);
        self.0 = (self.0 & 0x0F) | (level << 4);
    }

    /// Sets the block light level. Values above 15 are clamped.
    pub fn set_block_light(&mut self, level: u8) {
        let level = level.min(Self::MAX_LEVEL);
        self.0 = (self.0 & 0xF0) | level;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
