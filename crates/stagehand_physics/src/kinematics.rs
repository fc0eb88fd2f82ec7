//! # Kinematics
//!
//! Position and velocity bookkeeping for entities that move themselves in
//! their `physics_apply` callback and may need to back out of a contact.

/// Kinematic state of a moving body.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Kinematics {
    /// Current position.
    pub position: [f32; 2],
    /// Position before the last [`Kinematics::integrate`].
    pub previous: [f32; 2],
    /// Velocity (units per second).
    pub velocity: [f32; 2],
}

impl Kinematics {
    /// Creates a body at rest.
    #[must_use]
    pub fn new(position: [f32; 2]) -> Self {
        Self {
            position,
            previous: position,
            velocity: [0.0, 0.0],
        }
    }

    /// Sets the starting velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: [f32; 2]) -> Self {
        self.velocity = velocity;
        self
    }

    /// Advances the position by `velocity * dt`, remembering where it was.
    pub fn integrate(&mut self, dt: f32) {
        self.previous = self.position;
        self.position[0] += self.velocity[0] * dt;
        self.position[1] += self.velocity[1] * dt;
    }

    /// Moves back to the position before the last step.
    pub fn revert(&mut self) {
        self.position = self.previous;
    }

    /// Movement made by the last step.
    #[must_use]
    pub fn displacement(&self) -> [f32; 2] {
        [
            self.position[0] - self.previous[0],
            self.position[1] - self.previous[1],
        ]
    }

    /// Stops the body.
    pub fn halt(&mut self) {
        self.velocity = [0.0, 0.0];
    }
}
