//! Block change notification.
//!
//! [`Area::set_block`](crate::area::Area::set_block) posts a
//! [`BlockChangedEvent`] to every [`BlockChangeSink`] registered on the
//! owning [`AreaMap`](crate::area_map::AreaMap) after all area locks have
//! been released. Lighting reacts to these directly; render and network
//! consumers usually collect them in a [`BlockEventBuffer`] and drain it
//! once per frame.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::area::Area;
use crate::cell::BlockCell;
use crate::coords::BlockCoord;
use crate::registry::BlockId;

/// Emitted after a single block has been replaced.
#[derive(Clone, Debug)]
pub struct BlockChangedEvent {
    /// Absolute position of the block.
    pub position: BlockCoord,
    /// Type that was there before.
    pub old_block: BlockId,
    /// Metadata that was there before.
    pub old_meta: u8,
    /// Type placed.
    pub new_block: BlockId,
    /// Metadata placed.
    pub new_meta: u8,
    /// The area that owns the block.
    pub area: Arc<Area>,
}

impl BlockChangedEvent {
    /// `(old, new)` transparency of the changed cell.
    pub fn transparency(&self) -> (bool, bool) {
        let registry = self.area.registry();
        (
            registry.is_transparent(BlockCell::new(self.old_block, self.old_meta)),
            registry.is_transparent(BlockCell::new(self.new_block, self.new_meta)),
        )
    }
}

/// Receives block change events. Called from whichever thread changed the
/// block, with no area lock held.
pub trait BlockChangeSink: Send + Sync {
    /// Handles one event.
    fn block_changed(&self, event: &BlockChangedEvent);
}

#[derive(Default)]
struct Buffers {
    prev: Vec<BlockChangedEvent>,
    current: Vec<BlockChangedEvent>,
}

/// Double-buffered event storage.
///
/// Events written in the current frame are readable in the current and next
/// frame. After two [`swap`](BlockEventBuffer::swap) calls, events are
/// dropped. Call [`swap`](BlockEventBuffer::swap) once per frame.
#[derive(Default)]
pub struct BlockEventBuffer {
    buffers: Mutex<Buffers>,
}

impl BlockEventBuffer {
    /// Creates a new empty event buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event for the current frame.
    pub fn send(&self, event: BlockChangedEvent) {
        self.buffers.lock().current.push(event);
    }

    /// All readable events (previous + current frame).
    pub fn read(&self) -> Vec<BlockChangedEvent> {
        let buffers = self.buffers.lock();
        buffers
            .prev
            .iter()
            .chain(buffers.current.iter())
            .cloned()
            .collect()
    }

    /// Returns the number of readable events.
    pub fn len(&self) -> usize {
        let buffers = self.buffers.lock();
        buffers.prev.len() + buffers.current.len()
    }

    /// Returns `true` if there are no readable events.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advances the frame: previous events are dropped, current becomes previous.
    pub fn swap(&self) {
        let mut buffers = self.buffers.lock();
        let Buffers { prev, current } = &mut *buffers;
        prev.clear();
        std::mem::swap(prev, current);
    }

    /// Clears all events from both buffers.
    pub fn clear(&self) {
        let mut buffers = self.buffers.lock();
        buffers.prev.clear();
        buffers.current.clear();
    }
}

impl BlockChangeSink for BlockEventBuffer {
    fn block_changed(&self, event: &BlockChangedEvent) {
        self.send(event.clone());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::AreaSettings;
    use crate::area_map::AreaMap;
    use crate::coords::AreaCoord;
    use crate::test_support::TestBlocks;

    #[test]
    fn test_set_block_posts_event() {
        let blocks = TestBlocks::new();
        let map = AreaMap::new(Arc::clone(&blocks.registry), AreaSettings::default());
        let buffer = Arc::new(BlockEventBuffer::new());
        map.add_sink(buffer.clone());

        let area = map.get_or_create(AreaCoord::new(1, -1));
        area.set_block(blocks.stone, 2, 7, 3, 5).unwrap();

        let events = buffer.read();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.position, BlockCoord::new(34, 7, -29));
        assert_eq!(event.old_block, BlockId::AIR);
        assert_eq!(event.new_block, blocks.stone);
        assert_eq!(event.new_meta, 5);
        assert_eq!(event.transparency(), (true, false));
        assert!(Arc::ptr_eq(&event.area, &area));
    }

    #[test]
    fn test_double_buffering() {
        let blocks = TestBlocks::new();
        let map = AreaMap::new(Arc::clone(&blocks.registry), AreaSettings::default());
        let buffer = Arc::new(BlockEventBuffer::new());
        map.add_sink(buffer.clone());
        let area = map.get_or_create(AreaCoord::new(0, 0));

        area.set_block(blocks.stone, 0, 0, 0, 0).unwrap();
        buffer.swap();
        area.set_block(blocks.glass, 1, 0, 0, 0).unwrap();
        assert_eq!(buffer.len(), 2);

        buffer.swap();
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.read()[0].new_block, blocks.glass);

        buffer.swap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clear() {
        let blocks = TestBlocks::new();
        let map = AreaMap::new(Arc::clone(&blocks.registry), AreaSettings::default());
        let buffer = Arc::new(BlockEventBuffer::new());
        map.add_sink(buffer.clone());
        let area = map.get_or_create(AreaCoord::new(0, 0));
        area.set_block(blocks.stone, 0, 0, 0, 0).unwrap();
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
