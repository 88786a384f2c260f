//! Semi-implicit Euler integration with speed limits and hard corrections.
//!
//! Per agent and tick, in order:
//!
//! 1. `velocity += acceleration * dt`, then the speed is clamped to the
//!    scaled `[min_speed, max_speed]` band;
//! 2. `position += velocity * dt`;
//! 3. agents that ended up inside an obstacle's collision sphere are pushed
//!    back onto its surface and lose their inward velocity;
//! 4. agents outside the bounding box are clamped onto the wall and bounce;
//! 5. orientation is re-derived from the final velocity.

use crate::agent::Agent;
use crate::config::SimulationParameters;
use crate::obstacle::ObstacleSet;
use glam::{Quat, Vec3};

/// Speeds below this are treated as zero when deriving a heading.
pub const SPEED_EPSILON: f32 = 1e-4;

/// Rotation taking +Z onto `velocity`, or `previous` when the velocity is too
/// small to define a heading.
pub fn orientation_for(velocity: Vec3, previous: Quat) -> Quat {
    if velocity.length_squared() <= SPEED_EPSILON * SPEED_EPSILON {
        return previous;
    }
    match velocity.try_normalize() {
        Some(dir) => Quat::from_rotation_arc(Vec3::Z, dir),
        None => previous,
    }
}

/// Integration settings for one tick, derived from the parameter snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Integrator {
    pub min_speed: f32,
    pub max_speed: f32,
    pub half_extent: f32,
}

impl Integrator {
    pub fn new(params: &SimulationParameters) -> Self {
        let (min_speed, max_speed) = params.speed_limits();
        Self {
            min_speed,
            max_speed,
            half_extent: params.half_extent,
        }
    }

    /// Clamp the magnitude of `velocity` into the speed band.
    ///
    /// A near-zero velocity takes `fallback` (a unit heading) at minimum speed.
    pub fn clamp_speed(&self, velocity: Vec3, fallback: Vec3) -> Vec3 {
        let speed = velocity.length();
        if speed <= SPEED_EPSILON {
            return fallback * self.min_speed;
        }
        let clamped = speed.clamp(self.min_speed, self.max_speed);
        velocity * (clamped / speed)
    }

    /// Apply `acceleration` for `dt` seconds and move the agent.
    pub fn integrate(&self, agent: &mut Agent, acceleration: Vec3, dt: f32) {
        let heading = agent.orientation * Vec3::Z;
        let velocity = agent.velocity + acceleration * dt;
        agent.velocity = self.clamp_speed(velocity, heading);
        agent.position += agent.velocity * dt;
        agent.orientation = orientation_for(agent.velocity, agent.orientation);
    }

    /// Push the agent out of every enabled collision sphere it penetrates.
    ///
    /// Returns `true` if a correction was made.
    pub fn resolve_obstacles(&self, agent: &mut Agent, obstacles: &ObstacleSet) -> bool {
        let mut corrected = false;
        for obstacle in obstacles.active() {
            let radius = obstacle.collision_radius();
            let offset = agent.position - obstacle.position;
            let distance_sq = offset.length_squared();
            if distance_sq >= radius * radius {
                continue;
            }
            let normal = offset
                .try_normalize()
                .or_else(|| agent.velocity.try_normalize())
                .unwrap_or(Vec3::Y);
            agent.position = obstacle.position + normal * radius;

            let inward = agent.velocity.dot(normal);
            if inward < 0.0 {
                agent.velocity -= normal * inward;
                agent.velocity = self.clamp_speed(agent.velocity, normal);
            }
            corrected = true;
        }
        if corrected {
            agent.orientation = orientation_for(agent.velocity, agent.orientation);
        }
        corrected
    }

    /// Clamp an agent that left the box back onto the wall, reflecting the
    /// outward velocity component.
    ///
    /// Returns `true` if a correction was made.
    pub fn contain(&self, agent: &mut Agent) -> bool {
        let bounds = self.half_extent;
        let mut corrected = false;
        for axis in 0..3 {
            let p = agent.position[axis];
            if p < -bounds {
                agent.position[axis] = -bounds;
                agent.velocity[axis] = agent.velocity[axis].abs();
                corrected = true;
            } else if p > bounds {
                agent.position[axis] = bounds;
                agent.velocity[axis] = -agent.velocity[axis].abs();
                corrected = true;
            }
        }
        if corrected {
            agent.orientation = orientation_for(agent.velocity, agent.orientation);
        }
        corrected
    }

    /// Full per-agent update: integrate, then obstacle and box corrections.
    ///
    /// Returns `true` if any hard correction was applied.
    pub fn advance(
        &self,
        agent: &mut Agent,
        acceleration: Vec3,
        dt: f32,
        obstacles: &ObstacleSet,
    ) -> bool {
        self.integrate(agent, acceleration, dt);
        let hit_obstacle = self.resolve_obstacles(agent, obstacles);
        let hit_wall = self.contain(agent);
        hit_obstacle || hit_wall
    }
}
