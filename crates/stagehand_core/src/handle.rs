//! # Handles
//!
//! Entities are never referenced directly. Everything outside the manager
//! holds a [`Handle`]:
//! - An index into the slot table
//! - A generation counter for detecting stale references
//!
//! Entities that were created but not yet committed to the slot table are
//! identified by a [`PendingHandle`] instead.

use std::fmt;

/// Generational reference to a live entity.
///
/// A handle resolves only while its slot is alive and the slot's generation
/// matches. Once the entity is destroyed the slot generation moves on and the
/// handle can never resolve again, even after the slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Sentinel handle that never resolves.
    pub const INVALID: Self = Self {
        index: u32::MAX,
        generation: u32::MAX,
    };

    /// Creates a handle from its raw parts.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation the handle was issued with.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Checks if this is the [`Handle::INVALID`] sentinel.
    #[inline]
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.index == u32::MAX && self.generation == u32::MAX
    }

    /// Packs the handle into a single key.
    ///
    /// - Upper 32 bits: index
    /// - Lower 32 bits: generation
    #[inline]
    #[must_use]
    pub const fn key(self) -> u64 {
        ((self.index as u64) << 32) | (self.generation as u64)
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            f.write_str("invalid")
        } else {
            write!(f, "{}#{}", self.index, self.generation)
        }
    }
}

/// Lightweight reference to an entity waiting for its commit.
///
/// Returned by `create`. Turn it into a real [`Handle`] with
/// `resolve_pending` once a frame has committed the entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PendingHandle {
    id: u64,
}

impl PendingHandle {
    /// Returned when creation was rolled back.
    pub const INVALID: Self = Self { id: 0 };

    #[inline]
    pub(crate) const fn new(id: u64) -> Self {
        Self { id }
    }

    /// Returns the pending id. Ids start at 1 and only grow.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u64 {
        self.id
    }

    /// Returns `false` for [`PendingHandle::INVALID`].
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.id != 0
    }
}

impl Default for PendingHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for PendingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pending:{}", self.id)
    }
}
