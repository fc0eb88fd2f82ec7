//! # Global Registry
//!
//! One process-wide object manager for code that cannot thread a manager
//! reference through. Access is scoped: [`with`] lends the manager to a
//! closure and takes it back afterwards.
//!
//! Calling back into the registry from inside [`with`] is reported as
//! [`ManagerError::Reentrant`] instead of deadlocking.

use std::cell::Cell;

use parking_lot::Mutex;
use stagehand_core::{
    ManagerConfig, ManagerError, ManagerResult, NullPhysics, ObjectManager, PhysicsBackend,
};

/// The manager type held by the registry.
pub type GlobalManager = ObjectManager<Box<dyn PhysicsBackend + Send>>;

static REGISTRY: Mutex<Option<GlobalManager>> = parking_lot::const_mutex(None);

thread_local! {
    /// Set while this thread is inside [`with`].
    static IN_SCOPE: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside the registry until dropped.
struct ScopeGuard;

impl ScopeGuard {
    fn enter() -> ManagerResult<Self> {
        if IN_SCOPE.with(Cell::get) {
            return Err(ManagerError::Reentrant);
        }
        IN_SCOPE.with(|flag| flag.set(true));
        Ok(Self)
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        IN_SCOPE.with(|flag| flag.set(false));
    }
}

/// Installs a manager without collision detection.
///
/// # Errors
///
/// [`ManagerError::AlreadyInitialized`] if a manager is installed,
/// [`ManagerError::Reentrant`] if called from inside [`with`].
pub fn init(config: ManagerConfig) -> ManagerResult<()> {
    init_with_physics(config, NullPhysics)
}

/// Installs a manager driving `physics`.
///
/// # Errors
///
/// Same as [`init`].
pub fn init_with_physics<P>(config: ManagerConfig, physics: P) -> ManagerResult<()>
where
    P: PhysicsBackend + Send + 'static,
{
    let _scope = ScopeGuard::enter()?;
    let mut registry = REGISTRY.lock();
    if registry.is_some() {
        tracing::warn!("global object manager already initialized");
        return Err(ManagerError::AlreadyInitialized);
    }

    let physics: Box<dyn PhysicsBackend + Send> = Box::new(physics);
    *registry = Some(ObjectManager::with_physics(config, physics));
    tracing::info!("global object manager initialized");
    Ok(())
}

/// Runs `f` against the installed manager.
///
/// # Errors
///
/// [`ManagerError::NotInitialized`] if no manager is installed,
/// [`ManagerError::Reentrant`] if called from inside another [`with`].
pub fn with<R>(f: impl FnOnce(&mut GlobalManager) -> R) -> ManagerResult<R> {
    let _scope = ScopeGuard::enter()?;
    let mut registry = REGISTRY.lock();
    let manager = registry.as_mut().ok_or(ManagerError::NotInitialized)?;
    Ok(f(manager))
}

/// Tears down every entity and removes the manager.
///
/// Returns the number of entities torn down.
///
/// # Errors
///
/// [`ManagerError::NotInitialized`] if no manager is installed,
/// [`ManagerError::Reentrant`] if called from inside [`with`].
pub fn shutdown() -> ManagerResult<usize> {
    let _scope = ScopeGuard::enter()?;
    let mut manager = REGISTRY.lock().take().ok_or(ManagerError::NotInitialized)?;
    let torn_down = manager.destroy_all();
    tracing::info!(torn_down, "global object manager shut down");
    Ok(torn_down)
}

/// Whether a manager is installed. Always `true` from inside [`with`].
#[must_use]
pub fn is_initialized() -> bool {
    if IN_SCOPE.with(Cell::get) {
        return true;
    }
    REGISTRY.lock().is_some()
}
