//! # Slot Table
//!
//! Dense storage for live entities. Each slot exclusively owns at most one
//! entity and carries the generation counter that keeps stale handles from
//! resolving.
//!
//! ```text
//! slots:  [ A#3 | ---#2 | B#1 | ---#4 ]
//! free:   [ 3, 1 ]            (LIFO, last pushed is reused first)
//! ```

use crate::entity::Entity;
use crate::error::{ManagerError, ManagerResult};
use crate::handle::Handle;

/// One storage slot.
#[derive(Default)]
pub(crate) struct Slot {
    entity: Option<Box<dyn Entity>>,
    alive: bool,
    generation: u32,
    skip_update_this_frame: bool,
}

impl Slot {
    #[inline]
    fn matches(&self, handle: Handle) -> bool {
        self.alive && self.generation == handle.generation()
    }
}

/// Converts a table position to a handle index.
///
/// The table never grows past `max_slots`, which is capped below `u32::MAX`.
#[inline]
#[allow(clippy::cast_possible_truncation)]
fn slot_index(index: usize) -> u32 {
    debug_assert!(u32::try_from(index).is_ok(), "slot index {index} out of range");
    index as u32
}

/// The slot table and its free list.
pub struct SlotTable {
    slots: Vec<Slot>,
    free_indices: Vec<u32>,
    live_count: usize,
    max_slots: u32,
    /// Generation given to freshly grown slots.
    generation_base: u32,
}

impl SlotTable {
    /// Creates an empty table reserving `capacity` slots, never growing past `max_slots`.
    #[must_use]
    pub fn new(capacity: usize, max_slots: u32) -> Self {
        Self {
            slots: Vec::with_capacity(capacity.min(max_slots as usize)),
            free_indices: Vec::new(),
            live_count: 0,
            max_slots,
            generation_base: 0,
        }
    }

    /// Number of slots ever grown (live or free).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` when no slot has been grown.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub const fn live_count(&self) -> usize {
        self.live_count
    }

    /// Indices waiting for reuse, in push order.
    #[inline]
    #[must_use]
    pub fn free_indices(&self) -> &[u32] {
        &self.free_indices
    }

    /// Current generation of a slot, alive or not.
    #[must_use]
    pub fn generation_of(&self, index: u32) -> Option<u32> {
        self.slots.get(index as usize).map(|slot| slot.generation)
    }

    #[inline]
    fn slot(&self, handle: Handle) -> Option<&Slot> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.matches(handle))
    }

    #[inline]
    fn slot_mut(&mut self, handle: Handle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.matches(handle))
    }

    /// Checks a handle without touching the entity.
    ///
    /// Stays `true` while the entity is lent out to its own callback.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, handle: Handle) -> bool {
        self.slot(handle).is_some()
    }

    /// Resolves a handle to its entity.
    #[inline]
    #[must_use]
    pub fn resolve(&self, handle: Handle) -> Option<&(dyn Entity + 'static)> {
        self.slot(handle).and_then(|slot| slot.entity.as_deref())
    }

    /// Mutably resolves a handle to its entity.
    #[inline]
    pub fn resolve_mut(&mut self, handle: Handle) -> Option<&mut (dyn Entity + 'static)> {
        self.slot_mut(handle).and_then(|slot| slot.entity.as_deref_mut())
    }

    /// Resolves a handle that the caller knows to be live.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::StaleHandle`] if it does not resolve.
    pub fn get(&self, handle: Handle) -> ManagerResult<&(dyn Entity + 'static)> {
        self.resolve(handle).ok_or(ManagerError::StaleHandle {
            index: handle.index(),
            generation: handle.generation(),
        })
    }

    /// Mutable variant of [`SlotTable::get`].
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::StaleHandle`] if it does not resolve.
    pub fn get_mut(&mut self, handle: Handle) -> ManagerResult<&mut (dyn Entity + 'static)> {
        let stale = ManagerError::StaleHandle {
            index: handle.index(),
            generation: handle.generation(),
        };
        self.resolve_mut(handle).ok_or(stale)
    }

    /// Live handles in index order.
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.alive
                .then(|| Handle::new(slot_index(index), slot.generation))
        })
    }

    /// Live entities with their handles, in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &(dyn Entity + 'static))> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            if !slot.alive {
                return None;
            }
            let entity = slot.entity.as_deref()?;
            Some((Handle::new(slot_index(index), slot.generation), entity))
        })
    }

    /// Marks a live slot to be skipped by the physics and logic passes.
    pub fn set_skip(&mut self, handle: Handle) -> bool {
        match self.slot_mut(handle) {
            Some(slot) => {
                slot.skip_update_this_frame = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear_skip_flags(&mut self) {
        for slot in &mut self.slots {
            slot.skip_update_this_frame = false;
        }
    }

    /// Lends the entity at `index` out for a per-frame callback.
    ///
    /// Dead, empty and skip-marked slots yield `None`.
    pub(crate) fn lend(&mut self, index: usize) -> Option<(Handle, Box<dyn Entity>)> {
        let slot = self.slots.get_mut(index)?;
        if !slot.alive || slot.skip_update_this_frame {
            return None;
        }
        let entity = slot.entity.take()?;
        Some((Handle::new(slot_index(index), slot.generation), entity))
    }

    /// Lends the entity behind a handle out, regardless of its skip mark.
    pub(crate) fn lend_handle(&mut self, handle: Handle) -> Option<Box<dyn Entity>> {
        self.slot_mut(handle).and_then(|slot| slot.entity.take())
    }

    /// Puts a lent entity back.
    pub(crate) fn restore(&mut self, index: u32, entity: Box<dyn Entity>) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            debug_assert!(slot.entity.is_none(), "slot {index} restored twice");
            slot.entity = Some(entity);
        }
    }

    /// Picks the slot the next committed entity will occupy.
    ///
    /// Reuses the most recently freed index, otherwise grows the table. The
    /// slot stays dead until [`SlotTable::occupy`].
    ///
    /// # Errors
    ///
    /// Fails without mutating anything if the free list is corrupt, the slot
    /// generation is exhausted, or the table is at its ceiling.
    pub(crate) fn reserve(&mut self) -> ManagerResult<u32> {
        if let Some(index) = self.free_indices.last().copied() {
            let slot = self
                .slots
                .get(index as usize)
                .ok_or(ManagerError::CorruptFreeList { index })?;
            if slot.alive || slot.entity.is_some() {
                return Err(ManagerError::CorruptFreeList { index });
            }
            if slot.generation == u32::MAX {
                return Err(ManagerError::GenerationOverflow { index });
            }
            self.free_indices.pop();
            return Ok(index);
        }

        if self.slots.len() >= self.max_slots as usize {
            return Err(ManagerError::CapacityExceeded { max: self.max_slots });
        }
        if self.generation_base == u32::MAX {
            return Err(ManagerError::GenerationOverflow {
                index: slot_index(self.slots.len()),
            });
        }
        self.slots.push(Slot {
            generation: self.generation_base,
            ..Slot::default()
        });
        Ok(slot_index(self.slots.len() - 1))
    }

    /// Moves an entity into a reserved slot, bumping its generation.
    pub(crate) fn occupy(&mut self, index: u32, mut entity: Box<dyn Entity>) -> Handle {
        let slot = &mut self.slots[index as usize];
        debug_assert!(!slot.alive, "slot {index} occupied twice");
        slot.generation += 1;
        slot.alive = true;
        slot.skip_update_this_frame = false;

        let handle = Handle::new(index, slot.generation);
        entity.base_mut().set_handle(handle);
        slot.entity = Some(entity);
        self.live_count += 1;
        handle
    }

    #[cfg(test)]
    pub(crate) fn allocate(&mut self, entity: Box<dyn Entity>) -> ManagerResult<Handle> {
        let index = self.reserve()?;
        Ok(self.occupy(index, entity))
    }

    /// Frees the slot behind `handle`.
    ///
    /// `teardown` runs on the entity while its handle is still valid; then the
    /// handle is cleared, the generation bumped, the entity dropped and the
    /// index pushed on the free list.
    ///
    /// Returns `Ok(false)` if the handle no longer resolves. A live slot whose
    /// entity went missing is freed without running `teardown`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::GenerationOverflow`] before touching the slot
    /// if its generation cannot move on.
    pub(crate) fn release<F>(&mut self, handle: Handle, teardown: F) -> ManagerResult<bool>
    where
        F: FnOnce(&mut dyn Entity),
    {
        let Some(slot) = self.slot_mut(handle) else {
            return Ok(false);
        };
        let Some(next_generation) = slot.generation.checked_add(1) else {
            return Err(ManagerError::GenerationOverflow { index: handle.index() });
        };
        // A live slot without an entity lost it mid-callback; it is freed all the same
        if let Some(mut entity) = slot.entity.take() {
            teardown(entity.as_mut());
            entity.base_mut().set_handle(Handle::INVALID);
        } else {
            tracing::warn!(handle = %handle, "released a live slot with no entity");
        }

        slot.alive = false;
        slot.skip_update_this_frame = false;
        slot.generation = next_generation;

        self.free_indices.push(handle.index());
        self.live_count -= 1;
        Ok(true)
    }

    /// Drops every entity and forgets every slot.
    ///
    /// Slots grown afterwards start above every generation issued so far, so
    /// handles from before the reset stay stale.
    pub(crate) fn clear(&mut self) {
        let highest = self.slots.iter().map(|slot| slot.generation).max();
        self.generation_base = highest.map_or(self.generation_base, |g| g.max(self.generation_base));
        self.slots.clear();
        self.free_indices.clear();
        self.live_count = 0;
    }

    #[cfg(test)]
    pub(crate) fn force_generation(&mut self, index: u32, generation: u32) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            slot.generation = generation;
        }
    }

    #[cfg(test)]
    pub(crate) fn push_free_index(&mut self, index: u32) {
        self.free_indices.push(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityBase;

    struct Dummy {
        base: EntityBase,
    }

    impl Entity for Dummy {
        fn base(&self) -> &EntityBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut EntityBase {
            &mut self.base
        }
    }

    fn dummy() -> Box<dyn Entity> {
        Box::new(Dummy { base: EntityBase::new() })
    }

    #[test]
    fn test_allocate_and_resolve() {
        let mut table = SlotTable::new(4, 16);
        let handle = table.allocate(dummy()).unwrap();
        assert_eq!(handle, Handle::new(0, 1));
        assert!(table.is_valid(handle));
        assert_eq!(table.resolve(handle).map(|e| e.handle()), Some(handle));
        assert_eq!(table.live_count(), 1);
    }

    #[test]
    fn test_resolve_rejects_mismatch() {
        let mut table = SlotTable::new(4, 16);
        let handle = table.allocate(dummy()).unwrap();
        assert!(table.resolve(Handle::new(0, handle.generation() + 1)).is_none());
        assert!(table.resolve(Handle::new(5, 1)).is_none());
        assert!(table.resolve(Handle::INVALID).is_none());
        assert!(matches!(
            table.get(Handle::new(5, 1)),
            Err(ManagerError::StaleHandle { index: 5, generation: 1 })
        ));
    }

    #[test]
    fn test_release_and_reuse() {
        let mut table = SlotTable::new(4, 16);
        let old = table.allocate(dummy()).unwrap();

        let mut torn_down = false;
        assert!(table.release(old, |_| torn_down = true).unwrap());
        assert!(torn_down);
        assert!(!table.is_valid(old));
        assert_eq!(table.free_indices(), &[0]);
        assert_eq!(table.generation_of(0), Some(old.generation() + 1));

        // Releasing again is a no-op
        assert!(!table.release(old, |_| {}).unwrap());
        assert_eq!(table.live_count(), 0);

        let new = table.allocate(dummy()).unwrap();
        assert_eq!(new.index(), old.index());
        assert!(new.generation() > old.generation());
        assert!(table.resolve(old).is_none());
    }

    #[test]
    fn test_capacity_ceiling() {
        let mut table = SlotTable::new(1, 1);
        table.allocate(dummy()).unwrap();
        assert_eq!(
            table.allocate(dummy()).unwrap_err(),
            ManagerError::CapacityExceeded { max: 1 }
        );
        assert_eq!(table.live_count(), 1);
    }

    #[test]
    fn test_corrupt_free_list_detected() {
        let mut table = SlotTable::new(1, 4);
        let live = table.allocate(dummy()).unwrap();
        table.push_free_index(live.index());
        assert_eq!(
            table.allocate(dummy()).unwrap_err(),
            ManagerError::CorruptFreeList { index: 0 }
        );
        // The live entity is untouched
        assert!(table.is_valid(live));
    }

    #[test]
    fn test_generation_overflow_leaves_slot_intact() {
        let mut table = SlotTable::new(1, 4);
        let handle = table.allocate(dummy()).unwrap();
        table.force_generation(handle.index(), u32::MAX);
        let stuck = Handle::new(handle.index(), u32::MAX);
        assert_eq!(
            table.release(stuck, |_| {}).unwrap_err(),
            ManagerError::GenerationOverflow { index: 0 }
        );
        assert!(table.is_valid(stuck));
    }

    #[test]
    fn test_clear_keeps_old_handles_stale() {
        let mut table = SlotTable::new(2, 4);
        let old = table.allocate(dummy()).unwrap();
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.live_count(), 0);

        let new = table.allocate(dummy()).unwrap();
        assert_eq!(new.index(), old.index());
        assert!(new.generation() > old.generation());
        assert!(!table.is_valid(old));
    }

    #[test]
    fn test_lend_skips_marked_slots() {
        let mut table = SlotTable::new(2, 4);
        let a = table.allocate(dummy()).unwrap();
        assert!(table.set_skip(a));
        assert!(table.lend(0).is_none());
        table.clear_skip_flags();

        let (handle, entity) = table.lend(0).unwrap();
        assert_eq!(handle, a);
        // Still valid while lent, but not resolvable
        assert!(table.is_valid(a));
        assert!(table.resolve(a).is_none());
        table.restore(a.index(), entity);
        assert!(table.resolve(a).is_some());
    }

    #[test]
    fn test_release_frees_slot_that_lost_its_entity() {
        let mut table = SlotTable::new(2, 4);
        let a = table.allocate(dummy()).unwrap();
        let (_, entity) = table.lend(0).unwrap();
        drop(entity);

        let mut torn_down = false;
        assert!(table.release(a, |_| torn_down = true).unwrap());
        assert!(!torn_down);
        assert!(!table.is_valid(a));
        assert_eq!(table.live_count(), 0);
        assert_eq!(table.free_indices(), &[0]);

        let b = table.allocate(dummy()).unwrap();
        assert_eq!(b.index(), a.index());
        assert!(table.resolve(b).is_some());
    }
}
