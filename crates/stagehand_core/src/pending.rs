//! # Deferred Operations
//!
//! Structural changes requested mid-frame are buffered here and applied only
//! at the frame's safe points:
//! - Creates wait in [`PendingCreates`] until the commit phase
//! - Destroys wait in [`PendingDestroys`] until the drain phase
//!
//! Nothing in this module touches the slot table.

use std::collections::{HashMap, HashSet};

use crate::entity::Entity;
use crate::error::contain;
use crate::handle::{Handle, PendingHandle};
use crate::slot::SlotTable;

/// An entity whose `start` ran but which has no slot yet.
pub(crate) struct PendingCreate {
    pub(crate) id: u64,
    pub(crate) entity: Box<dyn Entity>,
}

/// Queue of started-but-uncommitted entities.
pub(crate) struct PendingCreates {
    /// Records in ascending id order.
    records: Vec<PendingCreate>,
    next_id: u64,
    /// Pending id → real handle, filled at commit and pruned once the
    /// entity is gone.
    committed: HashMap<u64, Handle>,
}

impl PendingCreates {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
            committed: HashMap::new(),
        }
    }

    fn push(&mut self, entity: Box<dyn Entity>) -> PendingHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.records.push(PendingCreate { id, entity });
        PendingHandle::new(id)
    }

    fn remove(&mut self, id: u64) -> Option<Box<dyn Entity>> {
        let position = self.records.binary_search_by_key(&id, |r| r.id).ok()?;
        Some(self.records.remove(position).entity)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn take_all(&mut self) -> Vec<PendingCreate> {
        std::mem::take(&mut self.records)
    }

    /// Puts uncommitted records back at the front of the queue.
    pub(crate) fn requeue(&mut self, mut records: Vec<PendingCreate>) {
        records.append(&mut self.records);
        self.records = records;
    }

    pub(crate) fn record_commit(&mut self, id: u64, handle: Handle) {
        self.committed.insert(id, handle);
    }

    /// Forgets commits whose entity is no longer live.
    pub(crate) fn prune(&mut self, slots: &SlotTable) {
        self.committed.retain(|_, handle| slots.is_valid(*handle));
    }

    #[cfg(test)]
    pub(crate) fn committed_len(&self) -> usize {
        self.committed.len()
    }

    pub(crate) fn resolve(&self, pending: PendingHandle) -> Handle {
        if !pending.is_valid() {
            return Handle::INVALID;
        }
        self.committed
            .get(&pending.id())
            .copied()
            .unwrap_or(Handle::INVALID)
    }

    fn clear(&mut self) {
        self.records.clear();
        self.committed.clear();
    }
}

/// Deduplicated set of handles awaiting teardown.
pub(crate) struct PendingDestroys {
    order: Vec<Handle>,
    keys: HashSet<u64>,
}

impl PendingDestroys {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            keys: HashSet::new(),
        }
    }

    fn insert(&mut self, handle: Handle) -> bool {
        if self.keys.insert(handle.key()) {
            self.order.push(handle);
            true
        } else {
            false
        }
    }

    pub(crate) fn contains(&self, handle: Handle) -> bool {
        self.keys.contains(&handle.key())
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    /// Takes the queued handles and clears the set.
    pub(crate) fn drain(&mut self) -> Vec<Handle> {
        self.keys.clear();
        std::mem::take(&mut self.order)
    }

    fn clear(&mut self) {
        self.order.clear();
        self.keys.clear();
    }
}

/// Both pending queues, borrowed apart from the slot table during callbacks.
pub(crate) struct Deferred {
    pub(crate) creates: PendingCreates,
    pub(crate) destroys: PendingDestroys,
}

impl Deferred {
    pub(crate) fn new() -> Self {
        Self {
            creates: PendingCreates::new(),
            destroys: PendingDestroys::new(),
        }
    }

    /// Runs `start` and queues the entity, or rolls it back.
    pub(crate) fn create(&mut self, mut entity: Box<dyn Entity>) -> PendingHandle {
        if let Err(err) = contain(|| entity.start()) {
            tracing::warn!(
                entity = entity.type_name(),
                error = %err,
                "start failed, creation rolled back"
            );
            return PendingHandle::INVALID;
        }

        let pending = self.creates.push(entity);
        tracing::debug!(pending_id = pending.id(), "entity queued for commit");
        pending
    }

    /// Queues a live handle for the next drain. Stale and repeated requests are ignored.
    pub(crate) fn destroy(&mut self, slots: &SlotTable, handle: Handle) -> bool {
        if !slots.is_valid(handle) {
            tracing::debug!(handle = %handle, "destroy ignored, handle not live");
            return false;
        }
        if self.destroys.insert(handle) {
            tracing::debug!(handle = %handle, "destroy queued");
            true
        } else {
            false
        }
    }

    /// Tears down an uncommitted entity on the spot.
    pub(crate) fn destroy_pending(&mut self, pending: PendingHandle) -> bool {
        if !pending.is_valid() {
            return false;
        }
        let Some(mut entity) = self.creates.remove(pending.id()) else {
            return false;
        };
        if let Err(err) = contain(|| entity.on_destroy()) {
            tracing::warn!(
                pending_id = pending.id(),
                entity = entity.type_name(),
                error = %err,
                "on_destroy failed for pending entity"
            );
        }
        entity.base_mut().set_handle(Handle::INVALID);
        tracing::debug!(pending_id = pending.id(), "pending entity destroyed");
        true
    }

    pub(crate) fn clear(&mut self) {
        self.creates.clear();
        self.destroys.clear();
    }
}
