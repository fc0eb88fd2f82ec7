//! # Stagehand Physics
//!
//! Reference collision backend for the object manager.
//!
//! Features:
//! - AABB and circle overlap tests with contact manifolds
//! - Contact tracking that turns overlaps into Enter/Stay/Exit callbacks
//! - Kinematic position integration for entities
//!
//! Detection is brute force over registered pairs, which keeps it simple and
//! deterministic for scenes of a few hundred bodies.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod kinematics;
pub mod overlap;
pub mod shapes;

pub use kinematics::Kinematics;
pub use overlap::OverlapPhysics;
pub use shapes::collide;
