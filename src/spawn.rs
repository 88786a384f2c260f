//! Seeded placement of new boids.
//!
//! All randomness in the simulation lives here. A [`Spawner`] owns one
//! `SmallRng` seeded when the simulation is built, so a given seed always
//! reproduces the same flock.

use crate::agent::Agent;
use crate::config::SimulationParameters;
use crate::obstacle::ObstacleSet;
use glam::Vec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

/// Attempts at finding a spawn point outside every collision zone before
/// giving up and projecting onto the nearest surface.
const MAX_PLACEMENT_ATTEMPTS: usize = 16;

/// Random source for new agents.
#[derive(Clone, Debug)]
pub struct Spawner {
    seed: u64,
    rng: SmallRng,
}

impl Spawner {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Seed this spawner was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the random sequence from the creation seed.
    pub fn reseed(&mut self) {
        self.rng = SmallRng::seed_from_u64(self.seed);
    }

    // ========== Primitives ==========

    /// Random point inside a cube of given half-size, centred at origin.
    pub fn random_in_cube(&mut self, half_size: f32) -> Vec3 {
        if half_size <= 0.0 {
            return Vec3::ZERO;
        }
        Vec3::new(
            self.rng.gen_range(-half_size..half_size),
            self.rng.gen_range(-half_size..half_size),
            self.rng.gen_range(-half_size..half_size),
        )
    }

    /// Random unit vector, uniform on the sphere.
    pub fn random_direction(&mut self) -> Vec3 {
        let theta = self.rng.gen_range(0.0..TAU);
        let z: f32 = self.rng.gen_range(-1.0..=1.0);
        let r = (1.0 - z * z).max(0.0).sqrt();
        let dir = Vec3::new(r * theta.cos(), r * theta.sin(), z);
        dir.try_normalize().unwrap_or(Vec3::Z)
    }

    /// Random speed within `[min, max]`.
    pub fn random_speed(&mut self, min: f32, max: f32) -> f32 {
        if max > min {
            self.rng.gen_range(min..=max)
        } else {
            min
        }
    }

    // ========== Agents ==========

    /// A new agent inside the containment threshold, outside every enabled
    /// collision zone, moving in a random direction at a speed within the
    /// current limits.
    pub fn spawn_agent(&mut self, params: &SimulationParameters, obstacles: &ObstacleSet) -> Agent {
        let half = params.containment_threshold().max(0.0);
        let mut position = self.random_in_cube(half);
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            if obstacles.active().all(|o| o.collision_gap(position) > 0.0) {
                break;
            }
            position = self.random_in_cube(half);
        }
        for o in obstacles.active() {
            if o.collision_gap(position) <= 0.0 {
                let normal = (position - o.position).try_normalize().unwrap_or(Vec3::Y);
                position = o.position + normal * (o.collision_radius() + 1.0);
            }
        }

        let (min, max) = params.speed_limits();
        let velocity = self.random_direction() * self.random_speed(min, max);
        Agent::new(position, velocity, params.boid_size)
    }

    pub fn spawn_agents(
        &mut self,
        count: usize,
        params: &SimulationParameters,
        obstacles: &ObstacleSet,
    ) -> Vec<Agent> {
        (0..count).map(|_| self.spawn_agent(params, obstacles)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_flock() {
        let params = SimulationParameters::default();
        let obstacles = ObstacleSet::with_default_obstacle();
        let a = Spawner::new(9).spawn_agents(50, &params, &obstacles);
        let b = Spawner::new(9).spawn_agents(50, &params, &obstacles);
        let c = Spawner::new(10).spawn_agents(50, &params, &obstacles);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_reseed_restarts_sequence() {
        let mut spawner = Spawner::new(3);
        let first = spawner.random_in_cube(10.0);
        spawner.reseed();
        assert_eq!(spawner.random_in_cube(10.0), first);
        assert_eq!(spawner.seed(), 3);
    }

    #[test]
    fn test_spawned_agents_respect_limits() {
        let params = SimulationParameters::default();
        let obstacles = ObstacleSet::with_default_obstacle();
        let (min, max) = params.speed_limits();
        for agent in Spawner::new(1).spawn_agents(500, &params, &obstacles) {
            assert!(agent.position.abs().max_element() <= params.containment_threshold());
            assert!(agent.speed() >= min - 1e-3 && agent.speed() <= max + 1e-3);
            assert!(obstacles.active().all(|o| o.collision_gap(agent.position) > 0.0));
            assert_eq!(agent.scale, params.boid_size);
        }
    }

    #[test]
    fn test_random_direction_is_unit() {
        let mut spawner = Spawner::new(0);
        for _ in 0..100 {
            assert!((spawner.random_direction().length() - 1.0).abs() < 1e-4);
        }
    }
}
