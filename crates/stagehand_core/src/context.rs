//! # Callback Context
//!
//! The view an entity receives in every per-frame callback. It can read other
//! entities and request structural changes, but every request is deferred:
//! the slot table is never mutated through a context.

use crate::entity::Entity;
use crate::handle::{Handle, PendingHandle};
use crate::pending::Deferred;
use crate::slot::SlotTable;

/// Per-callback access to the object manager.
///
/// The entity currently executing is lent out of its slot, so resolving its
/// own handle yields `None`; use `self` instead.
pub struct Context<'a> {
    slots: &'a SlotTable,
    deferred: &'a mut Deferred,
    this: Handle,
    frame: u64,
    delta_time: f32,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        slots: &'a SlotTable,
        deferred: &'a mut Deferred,
        this: Handle,
        frame: u64,
        delta_time: f32,
    ) -> Self {
        Self {
            slots,
            deferred,
            this,
            frame,
            delta_time,
        }
    }

    /// Handle of the entity receiving the callback.
    #[inline]
    #[must_use]
    pub fn this(&self) -> Handle {
        self.this
    }

    /// Index of the frame being processed.
    #[inline]
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Fixed seconds per frame.
    #[inline]
    #[must_use]
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Checks whether a handle refers to a live entity.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, handle: Handle) -> bool {
        self.slots.is_valid(handle)
    }

    /// Reads another live entity.
    #[must_use]
    pub fn resolve(&self, handle: Handle) -> Option<&(dyn Entity + 'static)> {
        self.slots.resolve(handle)
    }

    /// Reads another live entity as a concrete type.
    #[must_use]
    pub fn resolve_as<T: Entity>(&self, handle: Handle) -> Option<&T> {
        self.resolve(handle)?.downcast_ref::<T>()
    }

    /// Creates an entity. It joins the frame pipeline starting next frame.
    pub fn create<E: Entity>(&mut self, entity: E) -> PendingHandle {
        self.deferred.create(Box::new(entity))
    }

    /// Queues a live entity for destruction at the end of this frame.
    pub fn destroy(&mut self, handle: Handle) -> bool {
        self.deferred.destroy(self.slots, handle)
    }

    /// Queues the calling entity for destruction.
    pub fn destroy_self(&mut self) -> bool {
        let this = self.this;
        self.destroy(this)
    }

    /// Tears down an entity that has not been committed yet.
    pub fn destroy_pending(&mut self, pending: PendingHandle) -> bool {
        self.deferred.destroy_pending(pending)
    }

    /// Real handle of a committed entity, or [`Handle::INVALID`].
    #[must_use]
    pub fn resolve_pending(&self, pending: PendingHandle) -> Handle {
        self.deferred.creates.resolve(pending)
    }
}
