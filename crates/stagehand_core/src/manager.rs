//! # Object Manager
//!
//! Owns every entity and drives them through a fixed five-phase frame:
//!
//! ```text
//! ┌───────────────┐  ┌──────────────┐  ┌──────────────┐  ┌──────────┐  ┌──────────┐
//! │ physics_apply │→ │ physics step │→ │    update    │→ │  drain   │→ │  commit  │
//! │  (live only)  │  │ (collisions) │  │  (live only) │  │ destroys │  │ creates  │
//! └───────────────┘  └──────────────┘  └──────────────┘  └──────────┘  └──────────┘
//! ```
//!
//! Creates and destroys requested during phases 1 to 3 are buffered, so the
//! set of live entities never changes while a pass walks it. An entity
//! created in frame N receives its first callback in frame N+1.

use std::ops::{Index, IndexMut};
use std::time::Instant;

use crate::config::ManagerConfig;
use crate::context::Context;
use crate::entity::Entity;
use crate::error::{contain, ManagerError, ManagerResult};
use crate::handle::{Handle, PendingHandle};
use crate::pending::{Deferred, PendingCreate};
use crate::physics::{Bodies, NullPhysics, PhysicsBackend};
use crate::slot::SlotTable;
use crate::stats::FrameStats;

/// Per-entity passes run by the manager itself.
#[derive(Clone, Copy, Debug)]
enum Pass {
    PhysicsApply,
    Update,
}

/// Owner of all entities and their frame pipeline.
pub struct ObjectManager<P: PhysicsBackend = NullPhysics> {
    slots: SlotTable,
    deferred: Deferred,
    physics: P,
    config: ManagerConfig,
    frame: u64,
}

impl ObjectManager<NullPhysics> {
    /// Creates a manager without collision detection.
    #[must_use]
    pub fn new(config: ManagerConfig) -> Self {
        Self::with_physics(config, NullPhysics)
    }
}

impl Default for ObjectManager<NullPhysics> {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl<P: PhysicsBackend> ObjectManager<P> {
    /// Creates a manager driving the given physics backend.
    #[must_use]
    pub fn with_physics(config: ManagerConfig, physics: P) -> Self {
        let slots = SlotTable::new(config.initial_capacity, config.slot_limit());
        tracing::debug!(
            initial_capacity = config.initial_capacity,
            max_slots = config.slot_limit(),
            "object manager created"
        );
        Self {
            slots,
            deferred: Deferred::new(),
            physics,
            config,
            frame: 0,
        }
    }

    /// Active configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// The physics backend.
    #[inline]
    #[must_use]
    pub fn physics(&self) -> &P {
        &self.physics
    }

    /// Mutable access to the physics backend.
    #[inline]
    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    /// Read-only view of the slot table.
    #[inline]
    #[must_use]
    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    /// Number of frames completed.
    #[inline]
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    /// Checks whether a handle refers to a live entity.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, handle: Handle) -> bool {
        self.slots.is_valid(handle)
    }

    /// Resolves a handle, or `None` if it is stale.
    #[inline]
    #[must_use]
    pub fn resolve(&self, handle: Handle) -> Option<&(dyn Entity + 'static)> {
        self.slots.resolve(handle)
    }

    /// Mutably resolves a handle, or `None` if it is stale.
    #[inline]
    pub fn resolve_mut(&mut self, handle: Handle) -> Option<&mut (dyn Entity + 'static)> {
        self.slots.resolve_mut(handle)
    }

    /// Resolves a handle to a concrete entity type.
    #[must_use]
    pub fn resolve_as<T: Entity>(&self, handle: Handle) -> Option<&T> {
        self.slots.resolve(handle)?.downcast_ref::<T>()
    }

    /// Mutably resolves a handle to a concrete entity type.
    pub fn resolve_as_mut<T: Entity>(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots.resolve_mut(handle)?.downcast_mut::<T>()
    }

    /// Resolves a handle the caller requires to be live.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::StaleHandle`] if it does not resolve.
    pub fn get(&self, handle: Handle) -> ManagerResult<&(dyn Entity + 'static)> {
        self.slots.get(handle)
    }

    /// Mutable variant of [`ObjectManager::get`].
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::StaleHandle`] if it does not resolve.
    pub fn get_mut(&mut self, handle: Handle) -> ManagerResult<&mut (dyn Entity + 'static)> {
        self.slots.get_mut(handle)
    }

    /// Current generation of a slot.
    #[must_use]
    pub fn generation_of(&self, index: u32) -> Option<u32> {
        self.slots.generation_of(index)
    }

    /// Live handles in index order.
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.slots.handles()
    }

    /// Live entities with their handles, in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &(dyn Entity + 'static))> + '_ {
        self.slots.iter()
    }

    /// Live entities carrying `tag`, in index order.
    #[must_use]
    pub fn find_by_tag(&self, tag: &str) -> Vec<Handle> {
        self.slots
            .iter()
            .filter(|(_, entity)| entity.base().has_tag(tag))
            .map(|(handle, _)| handle)
            .collect()
    }

    // ========================================================================
    // COUNTS
    // ========================================================================

    /// Live entities plus entities waiting to be committed.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.slots.live_count() + self.deferred.creates.len()
    }

    /// Entities currently occupying a slot.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.slots.live_count()
    }

    /// Entities waiting for the commit phase.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.deferred.creates.len()
    }

    /// Handles waiting for the drain phase.
    #[must_use]
    pub fn pending_destroy_count(&self) -> usize {
        self.deferred.destroys.len()
    }

    /// Slots ever grown.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Slots waiting for reuse.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.slots.free_indices().len()
    }

    // ========================================================================
    // STRUCTURAL REQUESTS
    // ========================================================================

    /// Runs the entity's `start` and queues it for the next commit.
    ///
    /// Returns [`PendingHandle::INVALID`] if `start` fails; the entity is
    /// dropped and never becomes visible.
    pub fn create<E: Entity>(&mut self, entity: E) -> PendingHandle {
        self.deferred.create(Box::new(entity))
    }

    /// [`ObjectManager::create`] for an already boxed entity.
    pub fn create_boxed(&mut self, entity: Box<dyn Entity>) -> PendingHandle {
        self.deferred.create(entity)
    }

    /// Real handle of a committed entity, or [`Handle::INVALID`] before commit
    /// and once the entity has been destroyed.
    #[must_use]
    pub fn resolve_pending(&self, pending: PendingHandle) -> Handle {
        self.deferred.creates.resolve(pending)
    }

    /// Queues a live entity for teardown at the end of the next drain phase.
    ///
    /// Stale handles and repeated requests return `false`.
    pub fn destroy(&mut self, handle: Handle) -> bool {
        self.deferred.destroy(&self.slots, handle)
    }

    /// Whether a destroy is queued for `handle`.
    #[must_use]
    pub fn is_destroy_queued(&self, handle: Handle) -> bool {
        self.deferred.destroys.contains(handle)
    }

    /// Tears down an uncommitted entity immediately.
    pub fn destroy_pending(&mut self, pending: PendingHandle) -> bool {
        self.deferred.destroy_pending(pending)
    }

    /// Excludes a live entity from this frame's physics and logic passes.
    ///
    /// The mark is cleared once the logic pass finishes.
    pub fn skip_this_frame(&mut self, handle: Handle) -> bool {
        self.slots.set_skip(handle)
    }

    /// Tears down every live entity and resets the manager.
    ///
    /// Pending creates are dropped without teardown. Returns the number of
    /// entities torn down.
    pub fn destroy_all(&mut self) -> usize {
        tracing::info!(
            live = self.slots.live_count(),
            pending = self.deferred.creates.len(),
            "destroying all entities"
        );
        self.deferred.clear();

        let handles: Vec<Handle> = self.slots.handles().collect();
        for &handle in &handles {
            self.physics.unregister(handle);
        }

        let mut torn_down = 0;
        for handle in handles {
            let Some(entity) = self.slots.resolve_mut(handle) else {
                continue;
            };
            if let Err(err) = contain(|| entity.on_destroy()) {
                tracing::warn!(
                    handle = %handle,
                    entity = entity.type_name(),
                    error = %err,
                    "on_destroy fault during reset"
                );
            }
            entity.base_mut().set_handle(Handle::INVALID);
            torn_down += 1;
        }

        self.slots.clear();
        torn_down
    }

    // ========================================================================
    // FRAME PIPELINE
    // ========================================================================

    /// Runs one frame.
    ///
    /// Callback faults are contained and counted in the returned stats.
    ///
    /// # Errors
    ///
    /// Returns a structural error if the slot table cannot absorb this
    /// frame's destroys or creates. The frame counter does not advance and
    /// uncommitted entities stay pending.
    pub fn update(&mut self) -> ManagerResult<FrameStats> {
        let started = Instant::now();
        let mut stats = FrameStats {
            frame: self.frame,
            ..FrameStats::default()
        };

        self.run_pass(Pass::PhysicsApply, &mut stats);
        self.step_physics(&mut stats);
        self.run_pass(Pass::Update, &mut stats);
        self.slots.clear_skip_flags();

        self.drain_destroys(&mut stats)?;
        self.commit_creates(&mut stats)?;

        stats.total_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        tracing::trace!(
            frame = stats.frame,
            updated = stats.updated,
            destroyed = stats.destroyed,
            committed = stats.committed,
            faults = stats.faults,
            total_us = stats.total_us,
            "frame complete"
        );
        self.frame += 1;
        Ok(stats)
    }

    /// Walks every slot that was live when the pass began.
    fn run_pass(&mut self, pass: Pass, stats: &mut FrameStats) {
        let delta_time = self.config.fixed_delta_time;
        for index in 0..self.slots.len() {
            let Some((handle, mut entity)) = self.slots.lend(index) else {
                continue;
            };

            let mut ctx = Context::new(&self.slots, &mut self.deferred, handle, self.frame, delta_time);
            let result = match pass {
                Pass::PhysicsApply => {
                    stats.physics_applied += 1;
                    contain(|| entity.physics_apply(&mut ctx))
                }
                Pass::Update => {
                    stats.updated += 1;
                    contain(|| entity.update(&mut ctx))
                }
            };

            if let Err(err) = result {
                stats.faults += 1;
                tracing::warn!(
                    handle = %handle,
                    entity = entity.type_name(),
                    pass = ?pass,
                    error = %err,
                    "callback fault"
                );
            }

            self.slots.restore(handle.index(), entity);
        }
    }

    fn step_physics(&mut self, stats: &mut FrameStats) {
        let mut bodies = Bodies::new(
            &mut self.slots,
            &mut self.deferred,
            self.frame,
            self.config.fixed_delta_time,
        );
        self.physics.step(&mut bodies);
        stats.collisions += bodies.dispatched();
        stats.faults += bodies.faults();
    }

    /// Tears down every queued handle that still resolves.
    ///
    /// A structural failure on one handle does not stop the others; the
    /// first one is returned once the queue is empty.
    fn drain_destroys(&mut self, stats: &mut FrameStats) -> ManagerResult<()> {
        let mut fatal: Option<ManagerError> = None;

        for handle in self.deferred.destroys.drain() {
            let physics = &mut self.physics;
            let faults = &mut stats.faults;
            let released = self.slots.release(handle, |entity| {
                physics.unregister(handle);
                if let Err(err) = contain(|| entity.on_destroy()) {
                    *faults += 1;
                    tracing::warn!(
                        handle = %handle,
                        entity = entity.type_name(),
                        error = %err,
                        "on_destroy fault"
                    );
                }
            });

            match released {
                Ok(true) => {
                    stats.destroyed += 1;
                    tracing::debug!(handle = %handle, "entity destroyed");
                }
                Ok(false) => {
                    tracing::debug!(handle = %handle, "queued destroy target already gone");
                }
                Err(err) => {
                    tracing::error!(handle = %handle, error = %err, "destroy failed");
                    fatal.get_or_insert(err);
                }
            }
        }

        if stats.destroyed > 0 {
            self.deferred.creates.prune(&self.slots);
        }

        fatal.map_or(Ok(()), Err)
    }

    /// Moves pending creates into slots in request order.
    fn commit_creates(&mut self, stats: &mut FrameStats) -> ManagerResult<()> {
        let mut records = self.deferred.creates.take_all().into_iter();

        while let Some(record) = records.next() {
            let index = match self.slots.reserve() {
                Ok(index) => index,
                Err(err) => {
                    tracing::error!(
                        pending_id = record.id,
                        error = %err,
                        "commit failed, creates left pending"
                    );
                    let mut rest: Vec<PendingCreate> = vec![record];
                    rest.extend(records);
                    self.deferred.creates.requeue(rest);
                    return Err(err);
                }
            };

            let PendingCreate { id, entity } = record;
            let handle = self.slots.occupy(index, entity);
            if let Some(entity) = self.slots.resolve(handle) {
                self.physics.register(handle, entity);
            }
            self.deferred.creates.record_commit(id, handle);
            stats.committed += 1;
            tracing::debug!(pending_id = id, handle = %handle, "entity committed");
        }

        Ok(())
    }
}

impl<P: PhysicsBackend> Index<Handle> for ObjectManager<P> {
    type Output = dyn Entity;

    /// # Panics
    ///
    /// Panics if the handle is stale.
    fn index(&self, handle: Handle) -> &Self::Output {
        match self.slots.get(handle) {
            Ok(entity) => entity,
            Err(err) => panic!("object manager lookup of {handle} failed: {err}"),
        }
    }
}

impl<P: PhysicsBackend> IndexMut<Handle> for ObjectManager<P> {
    fn index_mut(&mut self, handle: Handle) -> &mut Self::Output {
        match self.slots.get_mut(handle) {
            Ok(entity) => entity,
            Err(err) => panic!("object manager lookup of {handle} failed: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityBase;
    use crate::error::{EntityError, EntityResult};

    #[derive(Default)]
    struct Counter {
        base: EntityBase,
        physics: u32,
        updates: u32,
    }

    impl Entity for Counter {
        fn base(&self) -> &EntityBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut EntityBase {
            &mut self.base
        }

        fn physics_apply(&mut self, _ctx: &mut Context<'_>) -> EntityResult<()> {
            self.physics += 1;
            Ok(())
        }

        fn update(&mut self, _ctx: &mut Context<'_>) -> EntityResult<()> {
            self.updates += 1;
            Ok(())
        }
    }

    /// Faults on every update.
    #[derive(Default)]
    struct Faulty {
        base: EntityBase,
    }

    impl Entity for Faulty {
        fn base(&self) -> &EntityBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut EntityBase {
            &mut self.base
        }

        fn update(&mut self, _ctx: &mut Context<'_>) -> EntityResult<()> {
            Err(EntityError::fault("always"))
        }
    }

    /// Panics in every callback it can.
    #[derive(Default)]
    struct Panicky {
        base: EntityBase,
        attempts: u32,
    }

    impl Entity for Panicky {
        fn base(&self) -> &EntityBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut EntityBase {
            &mut self.base
        }

        fn update(&mut self, _ctx: &mut Context<'_>) -> EntityResult<()> {
            self.attempts += 1;
            panic!("update blew up");
        }

        fn on_destroy(&mut self) -> EntityResult<()> {
            panic!("teardown blew up");
        }
    }

    fn committed(manager: &mut ObjectManager, entity: Counter) -> Handle {
        let pending = manager.create(entity);
        manager.update().unwrap();
        manager.resolve_pending(pending)
    }

    #[test]
    fn test_create_commits_next_frame() {
        let mut manager = ObjectManager::default();
        let pending = manager.create(Counter::default());

        assert_eq!(pending.id(), 1);
        assert_eq!(manager.resolve_pending(pending), Handle::INVALID);
        assert_eq!(manager.alive_count(), 1);
        assert_eq!(manager.live_count(), 0);

        let stats = manager.update().unwrap();
        assert_eq!(stats.committed, 1);
        assert_eq!(stats.updated, 0);

        let handle = manager.resolve_pending(pending);
        assert_eq!(handle, Handle::new(0, 1));
        assert_eq!(manager.resolve(handle).unwrap().handle(), handle);

        manager.update().unwrap();
        let counter = manager.resolve_as::<Counter>(handle).unwrap();
        assert_eq!(counter.physics, 1);
        assert_eq!(counter.updates, 1);
    }

    #[test]
    fn test_destroy_and_slot_reuse() {
        let mut manager = ObjectManager::default();
        let first = committed(&mut manager, Counter::default());

        assert!(manager.destroy(first));
        assert!(!manager.destroy(first));
        assert!(manager.is_destroy_queued(first));
        // Still live until the drain
        assert!(manager.is_valid(first));

        let stats = manager.update().unwrap();
        assert_eq!(stats.destroyed, 1);
        assert!(!manager.is_valid(first));
        assert_eq!(manager.free_count(), 1);
        assert_eq!(manager.generation_of(0), Some(2));

        let second = committed(&mut manager, Counter::default());
        assert_eq!(second.index(), first.index());
        assert_eq!(second.generation(), 3);
        assert!(manager.resolve(first).is_none());
        assert_eq!(manager.slot_count(), 1);
    }

    #[test]
    fn test_faults_are_contained() {
        let mut manager = ObjectManager::default();
        manager.create(Faulty::default());
        let counter = committed(&mut manager, Counter::default());

        let stats = manager.update().unwrap();
        assert_eq!(stats.faults, 1);
        assert_eq!(stats.updated, 2);
        assert_eq!(manager.resolve_as::<Counter>(counter).unwrap().updates, 1);
    }

    #[test]
    fn test_panicking_callback_keeps_slot_intact() {
        let mut manager = ObjectManager::default();
        let pending = manager.create(Panicky::default());
        let counter = committed(&mut manager, Counter::default());
        let panicky = manager.resolve_pending(pending);

        let stats = manager.update().unwrap();
        assert_eq!(stats.faults, 1);
        assert_eq!(stats.updated, 2);
        assert_eq!(manager.resolve_as::<Counter>(counter).unwrap().updates, 1);
        // The entity went back into its slot
        assert_eq!(manager.resolve_as::<Panicky>(panicky).unwrap().attempts, 1);

        // A panicking on_destroy still frees the slot
        assert!(manager.destroy(panicky));
        let stats = manager.update().unwrap();
        assert_eq!(stats.destroyed, 1);
        assert_eq!(stats.faults, 2);
        assert!(!manager.is_valid(panicky));
        assert_eq!(manager.live_count(), 1);
        assert_eq!(manager.free_count(), 1);
    }

    #[test]
    fn test_commit_map_forgets_destroyed_entities() {
        let mut manager = ObjectManager::default();
        let first = manager.create(Counter::default());
        manager.update().unwrap();
        let keeper = committed(&mut manager, Counter::default());

        for _ in 0..1_000 {
            let handle = committed(&mut manager, Counter::default());
            assert!(manager.destroy(handle));
            manager.update().unwrap();
        }
        let first_handle = manager.resolve_pending(first);
        assert!(manager.destroy(first_handle));
        manager.update().unwrap();

        assert_eq!(manager.live_count(), 1);
        assert!(manager.deferred.creates.committed_len() <= manager.live_count());
        assert_eq!(manager.resolve_pending(first), Handle::INVALID);
        assert!(manager.is_valid(keeper));
    }

    #[test]
    fn test_skip_this_frame() {
        let mut manager = ObjectManager::default();
        let handle = committed(&mut manager, Counter::default());

        assert!(manager.skip_this_frame(handle));
        manager.update().unwrap();
        assert_eq!(manager.resolve_as::<Counter>(handle).unwrap().updates, 0);

        manager.update().unwrap();
        assert_eq!(manager.resolve_as::<Counter>(handle).unwrap().updates, 1);
    }

    #[test]
    fn test_find_by_tag() {
        let mut manager = ObjectManager::default();
        let tagged = committed(
            &mut manager,
            Counter {
                base: EntityBase::with_tags(&["enemy"]),
                ..Counter::default()
            },
        );
        committed(&mut manager, Counter::default());

        assert_eq!(manager.find_by_tag("enemy"), vec![tagged]);
        assert!(manager.find_by_tag("player").is_empty());
    }

    #[test]
    fn test_destroy_all_resets() {
        let mut manager = ObjectManager::default();
        let a = committed(&mut manager, Counter::default());
        committed(&mut manager, Counter::default());
        manager.create(Counter::default());

        assert_eq!(manager.destroy_all(), 2);
        assert_eq!(manager.alive_count(), 0);
        assert_eq!(manager.slot_count(), 0);
        assert_eq!(manager.free_count(), 0);
        assert!(!manager.is_valid(a));

        let b = committed(&mut manager, Counter::default());
        assert_eq!(b.index(), 0);
        assert!(!manager.is_valid(a));
    }

    #[test]
    fn test_generation_overflow_is_fatal() {
        let mut manager = ObjectManager::default();
        let handle = committed(&mut manager, Counter::default());
        manager.slots.force_generation(0, u32::MAX);
        let saturated = Handle::new(handle.index(), u32::MAX);

        assert!(manager.destroy(saturated));
        let frame = manager.frame();
        let err = manager.update().unwrap_err();
        assert_eq!(err, ManagerError::GenerationOverflow { index: 0 });
        assert!(err.is_structural());
        assert_eq!(manager.frame(), frame);
        // The slot was never touched
        assert!(manager.is_valid(saturated));
    }

    #[test]
    fn test_capacity_keeps_creates_pending() {
        let config = ManagerConfig {
            max_slots: Some(1),
            ..ManagerConfig::default()
        };
        let mut manager = ObjectManager::new(config);
        manager.create(Counter::default());
        let second = manager.create(Counter::default());

        let err = manager.update().unwrap_err();
        assert_eq!(err, ManagerError::CapacityExceeded { max: 1 });
        assert_eq!(manager.live_count(), 1);
        assert_eq!(manager.pending_count(), 1);

        assert!(manager.destroy_pending(second));
        assert_eq!(manager.pending_count(), 0);
        manager.update().unwrap();
    }

    #[test]
    fn test_index_resolves_live_handle() {
        let mut manager = ObjectManager::default();
        let handle = committed(&mut manager, Counter::default());
        assert_eq!(manager[handle].handle(), handle);
        manager[handle].base_mut().add_tag("boss");
        assert!(manager[handle].base().has_tag("boss"));
    }

    #[test]
    #[should_panic(expected = "lookup")]
    fn test_index_panics_on_stale_handle() {
        let manager = ObjectManager::default();
        let _ = &manager[Handle::new(3, 1)];
    }
}
