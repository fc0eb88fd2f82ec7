//! # Error Types
//!
//! Two families of failures exist:
//! - [`ManagerError`]: misuse of a handle or a broken slot table invariant
//! - [`EntityError`]: a fault local to one entity's callback

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

/// Errors raised by the object manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManagerError {
    /// A lookup that requires a live entity received a stale or invalid handle.
    #[error("stale handle: index {index}, generation {generation}")]
    StaleHandle {
        /// Slot index carried by the handle.
        index: u32,
        /// Generation carried by the handle.
        generation: u32,
    },

    /// The slot table cannot grow any further.
    #[error("slot table full: limit of {max} slots reached")]
    CapacityExceeded {
        /// Configured slot ceiling.
        max: u32,
    },

    /// A slot generation would wrap around.
    #[error("generation overflow in slot {index}")]
    GenerationOverflow {
        /// The exhausted slot.
        index: u32,
    },

    /// The free list pointed at a slot that is still occupied.
    #[error("corrupt free list: slot {index} is not free")]
    CorruptFreeList {
        /// The slot found on the free list.
        index: u32,
    },

    /// The process-wide registry was used before `init`.
    #[error("object manager not initialized")]
    NotInitialized,

    /// `init` was called twice without a `shutdown` in between.
    #[error("object manager already initialized")]
    AlreadyInitialized,

    /// The process-wide registry was entered while already in use.
    #[error("object manager is already in use (re-entrant access)")]
    Reentrant,
}

impl ManagerError {
    /// Returns `true` for errors that leave the manager unusable.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded { .. }
                | Self::GenerationOverflow { .. }
                | Self::CorruptFreeList { .. }
        )
    }
}

/// A fault reported by an entity callback.
///
/// Faults are contained to the entity that raised them: they are logged and
/// counted, and the rest of the frame proceeds. Panicking callbacks are
/// caught and reported the same way.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntityError {
    /// One-time setup refused to complete; the entity is rolled back.
    #[error("setup failed: {0}")]
    SetupFailed(String),

    /// Any other callback failure.
    #[error("entity fault: {0}")]
    Fault(String),

    /// The callback panicked. The entity is kept and the frame goes on.
    #[error("entity panicked: {0}")]
    Panicked(String),
}

impl EntityError {
    /// Shorthand for [`EntityError::Fault`].
    pub fn fault(message: impl Into<String>) -> Self {
        Self::Fault(message.into())
    }

    /// Shorthand for [`EntityError::SetupFailed`].
    pub fn setup(message: impl Into<String>) -> Self {
        Self::SetupFailed(message.into())
    }
}

impl EntityError {
    fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|message| (*message).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Self::Panicked(message)
    }
}

/// Runs an entity callback, turning a panic into [`EntityError::Panicked`].
pub(crate) fn contain<F>(callback: F) -> EntityResult<()>
where
    F: FnOnce() -> EntityResult<()>,
{
    panic::catch_unwind(AssertUnwindSafe(callback))
        .unwrap_or_else(|payload| Err(EntityError::from_panic(payload.as_ref())))
}

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Result type for entity callbacks.
pub type EntityResult<T> = Result<T, EntityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_classification() {
        assert!(ManagerError::GenerationOverflow { index: 0 }.is_structural());
        assert!(ManagerError::CorruptFreeList { index: 0 }.is_structural());
        assert!(!ManagerError::StaleHandle { index: 0, generation: 0 }.is_structural());
        assert!(!ManagerError::Reentrant.is_structural());
    }

    #[test]
    fn test_messages() {
        let err = ManagerError::StaleHandle { index: 3, generation: 8 };
        assert_eq!(err.to_string(), "stale handle: index 3, generation 8");
        assert_eq!(EntityError::fault("boom").to_string(), "entity fault: boom");
    }

    #[test]
    fn test_contain_turns_panics_into_faults() {
        assert_eq!(contain(|| Ok(())), Ok(()));
        assert_eq!(
            contain(|| Err(EntityError::fault("plain"))),
            Err(EntityError::fault("plain"))
        );
        assert_eq!(
            contain(|| panic!("static message")),
            Err(EntityError::Panicked("static message".into()))
        );
        let id = 7;
        assert_eq!(
            contain(|| panic!("formatted {id}")),
            Err(EntityError::Panicked("formatted 7".into()))
        );
    }
}
