//! # Global Registry Tests
//!
//! The registry is process-wide, so the whole lifecycle is exercised in a
//! single test to keep it independent of test-thread scheduling.
//!
//! Run with: cargo test --package stagehand --test global_test

use stagehand::global;
use stagehand::{Context, Entity, EntityBase, EntityResult, ManagerConfig, ManagerError, OverlapPhysics};

/// Tries to reach the registry from inside a frame.
struct Meddler {
    base: EntityBase,
    saw: Option<ManagerError>,
}

impl Entity for Meddler {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn update(&mut self, _ctx: &mut Context<'_>) -> EntityResult<()> {
        self.saw = global::with(|manager| manager.live_count()).err();
        Ok(())
    }
}

#[test]
fn test_registry_lifecycle() {
    assert!(!global::is_initialized());
    assert_eq!(global::with(|m| m.frame()), Err(ManagerError::NotInitialized));
    assert_eq!(global::shutdown(), Err(ManagerError::NotInitialized));

    global::init_with_physics(ManagerConfig::default(), OverlapPhysics::new()).unwrap();
    assert!(global::is_initialized());
    assert_eq!(
        global::init(ManagerConfig::default()),
        Err(ManagerError::AlreadyInitialized)
    );

    // Nested access is refused, not deadlocked
    let nested = global::with(|_| global::with(|m| m.frame())).unwrap();
    assert_eq!(nested, Err(ManagerError::Reentrant));
    let nested_init = global::with(|_| global::init(ManagerConfig::default())).unwrap();
    assert_eq!(nested_init, Err(ManagerError::Reentrant));
    assert!(global::with(|_| global::is_initialized()).unwrap());

    let pending = global::with(|m| {
        m.create(Meddler {
            base: EntityBase::new(),
            saw: None,
        })
    })
    .unwrap();
    global::with(|m| m.update()).unwrap().unwrap();
    global::with(|m| m.update()).unwrap().unwrap();

    let saw = global::with(|m| {
        let handle = m.resolve_pending(pending);
        m.resolve_as::<Meddler>(handle).and_then(|meddler| meddler.saw.clone())
    })
    .unwrap();
    assert_eq!(saw, Some(ManagerError::Reentrant));

    assert_eq!(global::shutdown(), Ok(1));
    assert!(!global::is_initialized());

    // A fresh manager can be installed after shutdown
    global::init(ManagerConfig::default()).unwrap();
    assert_eq!(global::with(|m| m.live_count()), Ok(0));
    assert_eq!(global::shutdown(), Ok(0));
}
