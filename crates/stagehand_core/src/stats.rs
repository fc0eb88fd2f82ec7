//! # Frame Statistics
//!
//! Counters produced by one run of the frame pipeline.

/// What happened during one `update` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame index.
    pub frame: u64,
    /// Entities that received `physics_apply`.
    pub physics_applied: u32,
    /// Collision callbacks delivered.
    pub collisions: u32,
    /// Entities that received `update`.
    pub updated: u32,
    /// Entities torn down in the drain phase.
    pub destroyed: u32,
    /// Entities committed in the commit phase.
    pub committed: u32,
    /// Callback faults contained this frame.
    pub faults: u32,
    /// Wall time of the whole pipeline in microseconds.
    pub total_us: u64,
}
