//! # Overlap Physics
//!
//! A [`PhysicsBackend`] that tests every registered pair once per step and
//! diffs the result against the previous step:
//!
//! ```text
//! previous   current   callback
//! ───────────────────────────────
//!    no        yes     Enter
//!    yes       yes     Stay
//!    yes       no      Exit
//! ```
//!
//! Both participants of a contact are notified, each with the manifold
//! oriented towards the other. Pairs are visited in handle order, so a run is
//! fully reproducible.

use std::collections::{BTreeMap, BTreeSet};

use stagehand_core::{
    Bodies, Collider, CollisionEvent, ContactPhase, Entity, Handle, Manifold, PhysicsBackend,
};

use crate::shapes::collide;

/// Pair key, smaller handle first.
type Pair = (Handle, Handle);

fn pair(a: Handle, b: Handle) -> Pair {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Brute-force overlap detection with contact tracking.
#[derive(Debug, Default)]
pub struct OverlapPhysics {
    /// Registered bodies.
    bodies: BTreeSet<Handle>,
    /// Contacts from the last step. Manifold oriented from `.0` to `.1`.
    contacts: BTreeMap<Pair, Manifold>,
    /// Exits owed to survivors whose partner was unregistered.
    orphaned: Vec<(Handle, Handle, Manifold)>,
}

impl OverlapPhysics {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Whether `handle` is registered.
    #[must_use]
    pub fn is_registered(&self, handle: Handle) -> bool {
        self.bodies.contains(&handle)
    }

    /// Number of contacts found by the last step.
    #[must_use]
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// Whether `a` and `b` were touching after the last step.
    #[must_use]
    pub fn in_contact(&self, a: Handle, b: Handle) -> bool {
        self.contacts.contains_key(&pair(a, b))
    }

    /// Delivers one contact phase to both participants.
    fn notify(bodies: &mut Bodies<'_>, phase: ContactPhase, (a, b): Pair, manifold: Manifold) {
        bodies.dispatch(
            a,
            &CollisionEvent {
                phase,
                other: b,
                manifold,
            },
        );
        bodies.dispatch(
            b,
            &CollisionEvent {
                phase,
                other: a,
                manifold: manifold.flipped(),
            },
        );
    }
}

impl PhysicsBackend for OverlapPhysics {
    fn register(&mut self, handle: Handle, entity: &dyn Entity) {
        self.bodies.insert(handle);
        tracing::debug!(
            handle = %handle,
            entity = entity.type_name(),
            has_collider = entity.collider().is_some(),
            "body registered"
        );
    }

    fn unregister(&mut self, handle: Handle) {
        if !self.bodies.remove(&handle) {
            return;
        }

        let ended: Vec<Pair> = self
            .contacts
            .keys()
            .filter(|(a, b)| *a == handle || *b == handle)
            .copied()
            .collect();
        for key in ended {
            if let Some(manifold) = self.contacts.remove(&key) {
                let (survivor, manifold) = if key.0 == handle {
                    (key.1, manifold.flipped())
                } else {
                    (key.0, manifold)
                };
                self.orphaned.push((survivor, handle, manifold));
            }
        }
        tracing::debug!(handle = %handle, "body unregistered");
    }

    fn step(&mut self, bodies: &mut Bodies<'_>) {
        // Contacts broken by unregistration
        for (survivor, gone, manifold) in std::mem::take(&mut self.orphaned) {
            if self.bodies.contains(&survivor) {
                bodies.dispatch(
                    survivor,
                    &CollisionEvent {
                        phase: ContactPhase::Exit,
                        other: gone,
                        manifold,
                    },
                );
            }
        }

        let shapes: Vec<(Handle, Collider)> = self
            .bodies
            .iter()
            .filter_map(|&handle| bodies.collider(handle).map(|collider| (handle, collider)))
            .collect();

        let mut current = BTreeMap::new();
        for (i, (a, shape_a)) in shapes.iter().enumerate() {
            for (b, shape_b) in &shapes[i + 1..] {
                if let Some(manifold) = collide(shape_a, shape_b) {
                    current.insert((*a, *b), manifold);
                }
            }
        }

        let previous = std::mem::replace(&mut self.contacts, current);

        for (&key, &manifold) in &previous {
            if !self.contacts.contains_key(&key) {
                Self::notify(bodies, ContactPhase::Exit, key, manifold);
            }
        }
        for (&key, &manifold) in &self.contacts {
            let phase = if previous.contains_key(&key) {
                ContactPhase::Stay
            } else {
                ContactPhase::Enter
            };
            Self::notify(bodies, phase, key, manifold);
        }

        tracing::trace!(
            bodies = shapes.len(),
            contacts = self.contacts.len(),
            "overlap step"
        );
    }
}
