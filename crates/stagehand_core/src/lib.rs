//! # Stagehand Core
//!
//! Object manager for single-threaded, frame-driven simulations:
//! - Generational handles that never dangle
//! - Creates and destroys deferred to safe points of the frame
//! - A fixed five-phase frame with a pluggable physics step
//!
//! ## Architecture Rules
//!
//! 1. **Entities are owned by the manager** - Everyone else holds a [`Handle`]
//! 2. **The live set is frozen during a pass** - Structural changes are queued
//! 3. **Callback faults are contained** - One failing entity never aborts a frame
//!
//! ## Example
//!
//! ```rust,ignore
//! use stagehand_core::{ObjectManager, ManagerConfig};
//!
//! let mut manager = ObjectManager::new(ManagerConfig::default());
//! let pending = manager.create(Player::default());
//! manager.update()?;
//! let player = manager.resolve_pending(pending);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod handle;
pub mod manager;
mod pending;
pub mod physics;
pub mod slot;
pub mod stats;

pub use config::{ConfigError, ManagerConfig};
pub use context::Context;
pub use entity::{AsAny, Entity, EntityBase};
pub use error::{EntityError, EntityResult, ManagerError, ManagerResult};
pub use handle::{Handle, PendingHandle};
pub use manager::ObjectManager;
pub use physics::{
    Aabb, Bodies, Circle, Collider, CollisionEvent, ContactPhase, Manifold, NullPhysics,
    PhysicsBackend,
};
pub use slot::SlotTable;
pub use stats::FrameStats;
