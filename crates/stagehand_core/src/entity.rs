//! # Entity Contract
//!
//! Every game object implements [`Entity`]. The manager drives it through a
//! fixed lifecycle:
//!
//! ```text
//! create ──> start() ──> [pending] ──commit──> [live]
//!                                               │  physics_apply()   phase 1
//!                                               │  on_collision_*()  phase 2
//!                                               │  update()          phase 3
//!                                 destroy ──> on_destroy()           phase 4
//! ```
//!
//! Entity-specific state (timers, flags, tags) belongs in the entity itself.

use std::any::Any;

use crate::context::Context;
use crate::error::EntityResult;
use crate::handle::Handle;
use crate::physics::{Collider, Manifold};

/// Contract state every entity carries.
///
/// The handle is written by the manager when the entity is committed and
/// cleared when it is destroyed; entities can only read it.
#[derive(Clone, Debug, Default)]
pub struct EntityBase {
    handle: Handle,
    tags: Vec<&'static str>,
}

impl EntityBase {
    /// Creates an empty base with an invalid handle and no tags.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a base carrying the given tags.
    #[must_use]
    pub fn with_tags(tags: &[&'static str]) -> Self {
        Self {
            handle: Handle::INVALID,
            tags: tags.to_vec(),
        }
    }

    /// The entity's own handle. Invalid until committed and after destruction.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[inline]
    pub(crate) fn set_handle(&mut self, handle: Handle) {
        self.handle = handle;
    }

    /// Adds a tag. Duplicates are ignored.
    pub fn add_tag(&mut self, tag: &'static str) {
        if !self.has_tag(tag) {
            self.tags.push(tag);
        }
    }

    /// Removes a tag, returning whether it was present.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| *t != tag);
        self.tags.len() != before
    }

    /// Checks for a tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| *t == tag)
    }

    /// All tags in insertion order.
    #[must_use]
    pub fn tags(&self) -> &[&'static str] {
        &self.tags
    }
}

/// Upcast helper so handles can be resolved to concrete entity types.
pub trait AsAny: Any {
    /// Borrows `self` as [`Any`].
    fn as_any(&self) -> &dyn Any;
    /// Mutably borrows `self` as [`Any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A game object managed by the object manager.
///
/// Only [`Entity::base`] and [`Entity::base_mut`] are required. Fallible
/// callbacks report faults through [`EntityResult`]; a fault is logged and
/// contained to this entity.
pub trait Entity: AsAny + Send {
    /// Shared contract state.
    fn base(&self) -> &EntityBase;

    /// Mutable shared contract state.
    fn base_mut(&mut self) -> &mut EntityBase;

    /// One-time setup, run synchronously inside `create`.
    ///
    /// # Errors
    ///
    /// An error rolls the creation back; the entity is dropped without ever
    /// being queued.
    fn start(&mut self) -> EntityResult<()> {
        Ok(())
    }

    /// Physics integration, phase 1 of every frame.
    ///
    /// # Errors
    ///
    /// Reported as a fault of this entity.
    fn physics_apply(&mut self, _ctx: &mut Context<'_>) -> EntityResult<()> {
        Ok(())
    }

    /// Gameplay logic, phase 3 of every frame.
    ///
    /// # Errors
    ///
    /// Reported as a fault of this entity.
    fn update(&mut self, _ctx: &mut Context<'_>) -> EntityResult<()> {
        Ok(())
    }

    /// Teardown hook, called exactly once.
    ///
    /// # Errors
    ///
    /// Reported as a fault; teardown continues regardless.
    fn on_destroy(&mut self) -> EntityResult<()> {
        Ok(())
    }

    /// Contact with `other` began this frame.
    ///
    /// # Errors
    ///
    /// Reported as a fault of this entity.
    fn on_collision_enter(
        &mut self,
        _other: Handle,
        _manifold: &Manifold,
        _ctx: &mut Context<'_>,
    ) -> EntityResult<()> {
        Ok(())
    }

    /// Contact with `other` continues.
    ///
    /// # Errors
    ///
    /// Reported as a fault of this entity.
    fn on_collision_stay(
        &mut self,
        _other: Handle,
        _manifold: &Manifold,
        _ctx: &mut Context<'_>,
    ) -> EntityResult<()> {
        Ok(())
    }

    /// Contact with `other` ended.
    ///
    /// # Errors
    ///
    /// Reported as a fault of this entity.
    fn on_collision_exit(
        &mut self,
        _other: Handle,
        _manifold: &Manifold,
        _ctx: &mut Context<'_>,
    ) -> EntityResult<()> {
        Ok(())
    }

    /// Current collision shape in world space. `None` opts out of collisions.
    fn collider(&self) -> Option<Collider> {
        None
    }

    /// The entity's own handle.
    fn handle(&self) -> Handle {
        self.base().handle()
    }

    /// Type name used in diagnostics.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl dyn Entity {
    /// Downcasts to a concrete entity type.
    #[must_use]
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably downcasts to a concrete entity type.
    #[must_use]
    pub fn downcast_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}
