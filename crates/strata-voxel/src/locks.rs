//! Deadlock-free acquisition of several area locks at once.
//!
//! Every caller that needs more than one area lock goes through
//! [`lock_many`], which acquires in a single global order: area z, then
//! area x, then address (two handles to the same coordinates can coexist,
//! e.g. while copying an area). Holding locks acquired any other way while
//! calling [`lock_many`] is a bug.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

use crate::coords::AreaCoord;

/// Errors raised when a multi-lock cannot be satisfied.
#[derive(Debug, Error)]
pub enum LockError {
    /// A neighbour required by the caller is not loaded.
    #[error("not all neighbours of area {area} are loaded ({missing} missing)")]
    NeighboursNotLoaded {
        /// The centre of the requested neighbourhood.
        area: AreaCoord,
        /// How many of the 8 neighbours were absent.
        missing: usize,
    },
}

/// Something guarded by a reader/writer lock with a position in the global
/// lock order.
pub trait Lockable: Sync {
    /// The guarded state.
    type Target;

    /// Sort key; smaller keys are locked first. Areas use `(z, x)`.
    fn lock_key(&self) -> (i32, i32);

    /// The lock itself.
    fn rw_lock(&self) -> &RwLock<Self::Target>;
}

/// One held guard, shared or exclusive.
pub enum LockGuard<'a, T> {
    /// Shared access.
    Read(RwLockReadGuard<'a, T>),
    /// Exclusive access.
    Write(RwLockWriteGuard<'a, T>),
}

impl<T> Deref for LockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Self::Read(guard) => guard,
            Self::Write(guard) => guard,
        }
    }
}

/// A set of guards acquired together. Dropping it releases all of them.
pub struct ManyLocked<'a, L: Lockable> {
    entries: Vec<(&'a L, LockGuard<'a, L::Target>)>,
    write: bool,
}

impl<'a, L: Lockable> ManyLocked<'a, L> {
    /// Number of distinct locks held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is locked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the guards are exclusive.
    pub fn is_write(&self) -> bool {
        self.write
    }

    /// Iterates the locked items in acquisition order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a L, &L::Target)> {
        self.entries.iter().map(|(item, guard)| (*item, guard.deref()))
    }

    /// Shared access to the first locked item matching `pred`.
    pub fn find(&self, pred: impl Fn(&L) -> bool) -> Option<&L::Target> {
        self.entries
            .iter()
            .find(|(item, _)| pred(item))
            .map(|(_, guard)| guard.deref())
    }

    /// Exclusive access to the first locked item matching `pred`. Returns
    /// `None` when the set was acquired for reading.
    pub fn find_mut(&mut self, pred: impl Fn(&L) -> bool) -> Option<&mut L::Target> {
        self.entries
            .iter_mut()
            .find(|(item, _)| pred(item))
            .and_then(|(_, guard)| match guard {
                LockGuard::Write(guard) => Some(guard.deref_mut()),
                LockGuard::Read(_) => None,
            })
    }
}

/// Acquires every lock in `items` in global order. Duplicates are locked once.
pub fn lock_many<'a, L, I>(write: bool, items: I) -> ManyLocked<'a, L>
where
    L: Lockable,
    I: IntoIterator<Item = &'a L>,
{
    let mut items: Vec<&'a L> = items.into_iter().collect();
    items.sort_by(|a, b| {
        a.lock_key()
            .cmp(&b.lock_key())
            .then_with(|| address(*a).cmp(&address(*b)))
    });
    items.dedup_by(|a, b| std::ptr::eq(*a, *b));

    let entries = items
        .into_iter()
        .map(|item| {
            let guard = if write {
                LockGuard::Write(item.rw_lock().write())
            } else {
                LockGuard::Read(item.rw_lock().read())
            };
            (item, guard)
        })
        .collect();

    ManyLocked { entries, write }
}

fn address<L>(item: &L) -> usize {
    std::ptr::from_ref(item) as usize
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    struct Cell {
        x: i32,
        z: i32,
        value: RwLock<u32>,
    }

    impl Cell {
        fn new(x: i32, z: i32) -> Self {
            Self {
                x,
                z,
                value: RwLock::new(0),
            }
        }
    }

    impl Lockable for Cell {
        type Target = u32;

        fn lock_key(&self) -> (i32, i32) {
            (self.z, self.x)
        }

        fn rw_lock(&self) -> &RwLock<u32> {
            &self.value
        }
    }

    #[test]
    fn test_lock_order_is_z_then_x() {
        let a = Cell::new(5, 0);
        let b = Cell::new(-3, 1);
        let c = Cell::new(0, 0);
        let locked = lock_many(false, [&b, &a, &c]);
        let order: Vec<(i32, i32)> = locked.iter().map(|(cell, _)| (cell.x, cell.z)).collect();
        assert_eq!(order, vec![(0, 0), (5, 0), (-3, 1)]);
    }

    #[test]
    fn test_duplicates_locked_once() {
        let a = Cell::new(0, 0);
        let locked = lock_many(true, [&a, &a, &a]);
        assert_eq!(locked.len(), 1);
    }

    #[test]
    fn test_write_guards_allow_mutation() {
        let a = Cell::new(0, 0);
        let b = Cell::new(1, 0);
        {
            let mut locked = lock_many(true, [&a, &b]);
            *locked.find_mut(|cell| cell.x == 1).unwrap() = 7;
        }
        assert_eq!(*b.value.read(), 7);
    }

    #[test]
    fn test_read_guards_refuse_mutation() {
        let a = Cell::new(0, 0);
        let mut locked = lock_many(false, [&a]);
        assert!(locked.find_mut(|_| true).is_none());
        assert_eq!(locked.find(|_| true), Some(&0));
    }

    #[test]
    fn test_opposite_request_orders_do_not_deadlock() {
        let cells: Arc<Vec<Cell>> = Arc::new((0..4).map(|i| Cell::new(i, i % 2)).collect());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cells = Arc::clone(&cells);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let mut refs: Vec<&Cell> = cells.iter().collect();
                        if t % 2 == 1 {
                            refs.reverse();
                        }
                        let mut locked = lock_many(true, refs);
                        *locked.find_mut(|c| c.x == t).unwrap() += 1;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let total: u32 = cells.iter().map(|c| *c.value.read()).sum();
        assert_eq!(total, 2000);
    }
}
