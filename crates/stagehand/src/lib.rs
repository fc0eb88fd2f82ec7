//! # STAGEHAND
//!
//! Frame-driven object management for games and simulations.
//!
//! ## Crate Structure
//!
//! - `stagehand_core`: handles, slot table, deferred queues, frame pipeline
//! - `stagehand_physics`: reference overlap backend and kinematics
//! - this crate: the process-wide registry and the [`Stage`] frame driver
//!
//! ## Example
//!
//! ```rust,ignore
//! use stagehand::{global, ManagerConfig};
//!
//! global::init(ManagerConfig::default())?;
//! global::with(|manager| manager.create(Player::default()))?;
//! global::with(|manager| manager.update())??;
//! global::shutdown()?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod global;
pub mod stage;

pub use stage::{FrameStatsAccumulator, Stage};

pub use stagehand_core::{
    Aabb, Bodies, Circle, Collider, CollisionEvent, ConfigError, ContactPhase, Context, Entity,
    EntityBase, EntityError, EntityResult, FrameStats, Handle, ManagerConfig, ManagerError,
    ManagerResult, Manifold, NullPhysics, ObjectManager, PendingHandle, PhysicsBackend,
};
pub use stagehand_physics::{Kinematics, OverlapPhysics};
