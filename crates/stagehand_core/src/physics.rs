//! # Physics Collaborator
//!
//! The object manager does not detect collisions itself. It talks to a
//! [`PhysicsBackend`] through three calls:
//! - `register` when an entity is committed
//! - `unregister` when it is destroyed
//! - `step` once per frame, between the physics and logic passes
//!
//! During `step` the backend reads colliders and delivers contacts through
//! [`Bodies`], which routes each event to the entity by handle.

use crate::context::Context;
use crate::entity::Entity;
use crate::error::contain;
use crate::handle::Handle;
use crate::pending::Deferred;
use crate::slot::SlotTable;

// ============================================================================
// COLLISION DATA
// ============================================================================

/// Axis-aligned box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Minimum corner (x, y).
    pub min: [f32; 2],
    /// Maximum corner (x, y).
    pub max: [f32; 2],
}

impl Aabb {
    /// Creates a box from its corners.
    #[must_use]
    pub const fn new(min: [f32; 2], max: [f32; 2]) -> Self {
        Self { min, max }
    }

    /// Creates a box centered at `center` with the given half extents.
    #[must_use]
    pub fn from_center(center: [f32; 2], half_extents: [f32; 2]) -> Self {
        Self {
            min: [center[0] - half_extents[0], center[1] - half_extents[1]],
            max: [center[0] + half_extents[0], center[1] + half_extents[1]],
        }
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> [f32; 2] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
        ]
    }

    /// Checks if this box intersects another. Touching edges do not count.
    #[must_use]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min[0] < other.max[0]
            && self.max[0] > other.min[0]
            && self.min[1] < other.max[1]
            && self.max[1] > other.min[1]
    }

    /// Overlap on each axis. Positive = overlap, negative = gap.
    #[must_use]
    pub fn overlap(&self, other: &Aabb) -> [f32; 2] {
        [
            self.max[0].min(other.max[0]) - self.min[0].max(other.min[0]),
            self.max[1].min(other.max[1]) - self.min[1].max(other.min[1]),
        ]
    }

    /// Moves the box by `delta`.
    #[must_use]
    pub fn translate(&self, delta: [f32; 2]) -> Self {
        Self {
            min: [self.min[0] + delta[0], self.min[1] + delta[1]],
            max: [self.max[0] + delta[0], self.max[1] + delta[1]],
        }
    }
}

/// Circle in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle {
    /// Center point.
    pub center: [f32; 2],
    /// Radius.
    pub radius: f32,
}

/// Collision shape reported by an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Collider {
    /// Axis-aligned box.
    Aabb(Aabb),
    /// Circle.
    Circle(Circle),
}

/// Contact data handed to collision callbacks.
///
/// The normal points from the receiving entity towards the other one.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Manifold {
    /// Unit contact normal.
    pub normal: [f32; 2],
    /// Penetration depth along the normal.
    pub depth: f32,
    /// Representative contact point.
    pub point: [f32; 2],
}

impl Manifold {
    /// Same contact seen from the other participant.
    #[must_use]
    pub fn flipped(self) -> Self {
        Self {
            normal: [-self.normal[0], -self.normal[1]],
            ..self
        }
    }
}

/// Phase of a contact between two bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactPhase {
    /// First frame of contact.
    Enter,
    /// Contact continues.
    Stay,
    /// Contact ended.
    Exit,
}

/// One collision callback to deliver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionEvent {
    /// Which callback to invoke.
    pub phase: ContactPhase,
    /// The other participant.
    pub other: Handle,
    /// Contact data, oriented for the receiver.
    pub manifold: Manifold,
}

// ============================================================================
// BACKEND CONTRACT
// ============================================================================

/// A collision engine driven by the object manager.
pub trait PhysicsBackend {
    /// Starts tracking a freshly committed entity.
    fn register(&mut self, handle: Handle, entity: &dyn Entity);

    /// Stops tracking an entity. Unknown handles are ignored.
    fn unregister(&mut self, handle: Handle);

    /// Runs one detection pass and dispatches contacts through `bodies`.
    fn step(&mut self, bodies: &mut Bodies<'_>);
}

impl<P: PhysicsBackend + ?Sized> PhysicsBackend for Box<P> {
    fn register(&mut self, handle: Handle, entity: &dyn Entity) {
        (**self).register(handle, entity);
    }

    fn unregister(&mut self, handle: Handle) {
        (**self).unregister(handle);
    }

    fn step(&mut self, bodies: &mut Bodies<'_>) {
        (**self).step(bodies);
    }
}

/// Backend that tracks nothing and never reports a contact.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPhysics;

impl PhysicsBackend for NullPhysics {
    fn register(&mut self, _handle: Handle, _entity: &dyn Entity) {}

    fn unregister(&mut self, _handle: Handle) {}

    fn step(&mut self, _bodies: &mut Bodies<'_>) {}
}

// ============================================================================
// STEP VIEW
// ============================================================================

/// The manager's side of a physics step.
pub struct Bodies<'a> {
    slots: &'a mut SlotTable,
    deferred: &'a mut Deferred,
    frame: u64,
    delta_time: f32,
    dispatched: u32,
    faults: u32,
}

impl<'a> Bodies<'a> {
    pub(crate) fn new(
        slots: &'a mut SlotTable,
        deferred: &'a mut Deferred,
        frame: u64,
        delta_time: f32,
    ) -> Self {
        Self {
            slots,
            deferred,
            frame,
            delta_time,
            dispatched: 0,
            faults: 0,
        }
    }

    /// Checks whether a handle refers to a live entity.
    #[must_use]
    pub fn is_valid(&self, handle: Handle) -> bool {
        self.slots.is_valid(handle)
    }

    /// Current collider of a live entity.
    #[must_use]
    pub fn collider(&self, handle: Handle) -> Option<Collider> {
        self.slots.resolve(handle)?.collider()
    }

    /// Live handles in index order.
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.slots.handles()
    }

    /// Seconds per frame.
    #[must_use]
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Delivers a collision callback to `target`.
    ///
    /// Returns `false` if the target is no longer live. Faults raised by the
    /// callback are logged and counted, never propagated.
    pub fn dispatch(&mut self, target: Handle, event: &CollisionEvent) -> bool {
        let Some(mut entity) = self.slots.lend_handle(target) else {
            return false;
        };

        let mut ctx = Context::new(self.slots, self.deferred, target, self.frame, self.delta_time);
        let result = contain(|| match event.phase {
            ContactPhase::Enter => entity.on_collision_enter(event.other, &event.manifold, &mut ctx),
            ContactPhase::Stay => entity.on_collision_stay(event.other, &event.manifold, &mut ctx),
            ContactPhase::Exit => entity.on_collision_exit(event.other, &event.manifold, &mut ctx),
        });

        if let Err(err) = result {
            self.faults += 1;
            tracing::warn!(
                handle = %target,
                other = %event.other,
                entity = entity.type_name(),
                phase = ?event.phase,
                error = %err,
                "collision callback fault"
            );
        }

        self.slots.restore(target.index(), entity);
        self.dispatched += 1;
        true
    }

    pub(crate) fn dispatched(&self) -> u32 {
        self.dispatched
    }

    pub(crate) fn faults(&self) -> u32 {
        self.faults
    }
}
