//! The simulated boid.

use crate::integrator::orientation_for;
use crate::visuals::AgentTransform;
use glam::{Quat, Vec3};

/// A single boid.
///
/// Orientation is always derived from velocity by the integrator; scale is
/// the flock-wide boid size copied from the current parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Agent {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Rotation taking +Z onto the heading.
    pub orientation: Quat,
    pub scale: f32,
}

impl Agent {
    pub fn new(position: Vec3, velocity: Vec3, scale: f32) -> Self {
        Self {
            position,
            velocity,
            orientation: orientation_for(velocity, Quat::IDENTITY),
            scale,
        }
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// Unit heading, or `None` when the agent is effectively stationary.
    #[inline]
    pub fn heading(&self) -> Option<Vec3> {
        self.velocity.try_normalize()
    }

    pub fn transform(&self) -> AgentTransform {
        AgentTransform::new(self.position, self.orientation, self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_orients_along_velocity() {
        let agent = Agent::new(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), 1.0);
        let forward = agent.orientation * Vec3::Z;
        assert!(forward.abs_diff_eq(Vec3::X, 1e-5));
        assert!((agent.speed() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_stationary_has_no_heading() {
        let agent = Agent::new(Vec3::ONE, Vec3::ZERO, 2.0);
        assert!(agent.heading().is_none());
        assert_eq!(agent.orientation, Quat::IDENTITY);
        assert_eq!(agent.transform().scale, 2.0);
    }
}
