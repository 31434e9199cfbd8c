//! Entity handles and generational slot storage.
//!
//! A [`Handle`] is a 32-bit value that packs a *generation* counter in the
//! high 16 bits and a *slot index* in the low 16 bits. The generation of a
//! slot is bumped every time its occupant is removed, so a handle kept across
//! frames can always be checked before use instead of reaching freed data.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::EcsError;

/// Upper bound on the number of slots a [`SlotTable`] can hold. Slot indices
/// must fit in the low 16 bits of a [`Handle`].
pub const MAX_SLOTS: usize = 1 << 16;

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// A generational reference to a slot-table entry.
///
/// Layout: `[generation: u16 | index: u16]`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(u32);

impl Handle {
    /// Construct a `Handle` from a slot index and generation.
    #[inline]
    pub fn new(index: u16, generation: u16) -> Self {
        Self((generation as u32) << 16 | index as u32)
    }

    /// The slot index portion (low 16 bits).
    #[inline]
    pub fn index(self) -> u16 {
        self.0 as u16
    }

    /// The generation portion (high 16 bits).
    #[inline]
    pub fn generation(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Raw `u32` representation.
    #[inline]
    pub fn to_raw(self) -> u32 {
        self.0
    }

    /// Reconstruct from a raw `u32`.
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// SlotTable
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Slot<T> {
    generation: u16,
    value: Option<T>,
}

/// Fixed-capacity storage addressed by [`Handle`]s.
///
/// Free slots are kept in a FIFO queue so that generations are spread out
/// over time rather than concentrated on a hot index. Fresh slots are only
/// created once the free queue is empty.
#[derive(Debug)]
pub struct SlotTable<T> {
    slots: Vec<Slot<T>>,
    free: VecDeque<u16>,
    capacity: usize,
    len: usize,
}

impl<T> SlotTable<T> {
    /// Create an empty table that can hold at most `capacity` values.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or larger than [`MAX_SLOTS`].
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity > 0 && capacity <= MAX_SLOTS,
            "slot table capacity must be in 1..={MAX_SLOTS}, got {capacity}"
        );
        Self {
            slots: Vec::new(),
            free: VecDeque::new(),
            capacity,
            len: 0,
        }
    }

    /// Store `value` in a free slot and return its handle.
    ///
    /// A recycled slot keeps the generation it was given when its previous
    /// occupant was removed.
    pub fn insert(&mut self, value: T) -> Result<Handle, EcsError> {
        if let Some(index) = self.free.pop_front() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            self.len += 1;
            return Ok(Handle::new(index, slot.generation));
        }

        if self.slots.len() >= self.capacity {
            return Err(EcsError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let index = self.slots.len() as u16;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        self.len += 1;
        Ok(Handle::new(index, 0))
    }

    /// Remove the value behind `handle`, bumping the slot generation so that
    /// every outstanding copy of `handle` becomes stale.
    ///
    /// Returns `None` if the handle was already stale.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push_back(handle.index());
        self.len -= 1;
        Some(value)
    }

    /// Borrow the value behind `handle` if the handle is still current.
    #[inline]
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    /// Mutably borrow the value behind `handle` if the handle is still current.
    #[inline]
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// Mutably borrow two distinct values at once.
    ///
    /// Returns `None` if either handle is stale or both refer to the same slot.
    pub fn get_pair_mut(&mut self, a: Handle, b: Handle) -> Option<(&mut T, &mut T)> {
        let (ia, ib) = (a.index() as usize, b.index() as usize);
        if ia == ib || ia >= self.slots.len() || ib >= self.slots.len() {
            return None;
        }

        let (first, second) = if ia < ib {
            let (lo, hi) = self.slots.split_at_mut(ib);
            (&mut lo[ia], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(ia);
            (&mut hi[0], &mut lo[ib])
        };

        if first.generation != a.generation() || second.generation != b.generation() {
            return None;
        }
        match (first.value.as_mut(), second.value.as_mut()) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }

    /// Returns `true` if `handle` refers to an occupied slot of the current
    /// generation.
    #[inline]
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// The current handle of an occupied slot, by raw index.
    pub fn handle_at(&self, index: u16) -> Option<Handle> {
        let slot = self.slots.get(index as usize)?;
        slot.value.as_ref().map(|_| Handle::new(index, slot.generation))
    }

    /// Iterate over occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (Handle::new(i as u16, slot.generation), v))
        })
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of simultaneously occupied slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_unique_handles() {
        let mut table = SlotTable::with_capacity(128);
        let handles: Vec<Handle> = (0..100).map(|i| table.insert(i).unwrap()).collect();
        let mut indices: Vec<u16> = handles.iter().map(|h| h.index()).collect();
        indices.sort();
        indices.dedup();
        assert_eq!(indices.len(), 100);
        assert_eq!(table.len(), 100);
    }

    #[test]
    fn generation_increments_on_recycle() {
        let mut table = SlotTable::with_capacity(4);
        let h0 = table.insert("a").unwrap();
        assert_eq!(h0.generation(), 0);
        assert_eq!(table.remove(h0), Some("a"));
        let h1 = table.insert("b").unwrap();
        // Same slot, newer generation.
        assert_eq!(h1.index(), h0.index());
        assert_eq!(h1.generation(), 1);
    }

    #[test]
    fn stale_handle_detection() {
        let mut table = SlotTable::with_capacity(4);
        let h0 = table.insert(10).unwrap();
        assert_eq!(table.get(h0), Some(&10));
        table.remove(h0);
        assert_eq!(table.get(h0), None, "removed handle must not resolve");
        let _h1 = table.insert(20).unwrap(); // recycles the same slot
        assert_eq!(table.get(h0), None, "stale handle still invalid after reuse");
    }

    #[test]
    fn double_remove_returns_none() {
        let mut table = SlotTable::with_capacity(4);
        let h = table.insert(1).unwrap();
        assert!(table.remove(h).is_some());
        assert!(table.remove(h).is_none());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn capacity_exceeded_is_an_error() {
        let mut table = SlotTable::with_capacity(2);
        table.insert(1).unwrap();
        table.insert(2).unwrap();
        let err = table.insert(3).unwrap_err();
        assert!(matches!(err, EcsError::CapacityExceeded { capacity: 2 }));
    }

    #[test]
    fn freed_slot_makes_room_again() {
        let mut table = SlotTable::with_capacity(1);
        let h = table.insert(1).unwrap();
        assert!(table.insert(2).is_err());
        table.remove(h);
        assert!(table.insert(3).is_ok());
    }

    #[test]
    fn pair_mut_borrows_two_slots() {
        let mut table = SlotTable::with_capacity(4);
        let a = table.insert(1).unwrap();
        let b = table.insert(2).unwrap();
        {
            let (x, y) = table.get_pair_mut(b, a).unwrap();
            *x += 10;
            *y += 20;
        }
        assert_eq!(table.get(a), Some(&21));
        assert_eq!(table.get(b), Some(&12));
        assert!(table.get_pair_mut(a, a).is_none());
    }

    #[test]
    fn pair_mut_rejects_stale_handle() {
        let mut table = SlotTable::with_capacity(4);
        let a = table.insert(1).unwrap();
        let b = table.insert(2).unwrap();
        table.remove(b);
        assert!(table.get_pair_mut(a, b).is_none());
    }

    #[test]
    fn iter_visits_in_slot_order() {
        let mut table = SlotTable::with_capacity(8);
        let a = table.insert('a').unwrap();
        let b = table.insert('b').unwrap();
        let c = table.insert('c').unwrap();
        table.remove(b);
        let seen: Vec<(Handle, char)> = table.iter().map(|(h, v)| (h, *v)).collect();
        assert_eq!(seen, vec![(a, 'a'), (c, 'c')]);
        assert_eq!(table.handle_at(a.index()), Some(a));
        assert_eq!(table.handle_at(b.index()), None);
    }

    #[test]
    #[should_panic(expected = "slot table capacity")]
    fn zero_capacity_panics() {
        let _table: SlotTable<u8> = SlotTable::with_capacity(0);
    }

    #[test]
    fn handle_roundtrip() {
        let h = Handle::new(42, 7);
        assert_eq!(h.index(), 42);
        assert_eq!(h.generation(), 7);
        assert_eq!(Handle::from_raw(h.to_raw()), h);
        assert_eq!(format!("{h:?}"), "Handle(42v7)");
    }
}
