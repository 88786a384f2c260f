//! Flock simulation builder and tick pipeline.
//!
//! A [`FlockSimulation`] owns the boids, the obstacle set and the current
//! parameter snapshot. Every call to [`step`](FlockSimulation::step) runs the
//! full pipeline to completion:
//!
//! 1. rebuild the spatial index from current positions;
//! 2. compute steering for every agent against the frozen index (in
//!    parallel with the `parallel` feature);
//! 3. integrate and apply hard corrections;
//! 4. publish a fresh [`RenderFrame`].
//!
//! Configuration calls take `&mut self`, so they can only happen between
//! ticks and a tick always sees one immutable snapshot.
//!
//! ```ignore
//! let mut sim = FlockSimulation::builder()
//!     .with_density(500)
//!     .with_seed(7)
//!     .with_method(ForceMethod::Legacy)
//!     .build()?;
//!
//! let report = sim.step(1.0 / 60.0)?;
//! renderer.upload(sim.frame());
//! ```

use crate::agent::Agent;
use crate::config::{
    PanelSettings, SimulationParameters, DEFAULT_DENSITY, DENSITY_INCREMENT, DENSITY_RANGE,
};
use crate::error::FlockError;
use crate::forces::{ForceMethod, ForceModel, Steering};
use crate::integrator::Integrator;
use crate::obstacle::{Obstacle, ObstacleSet};
use crate::spatial::{SpatialConfig, SpatialIndex};
use crate::spawn::Spawner;
use crate::time::StepTimings;
use crate::visuals::{Material, RenderFrame};
use glam::Vec3;
use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

/// Seed used when none is supplied.
pub const DEFAULT_SEED: u64 = 0x5EED_B01D;

/// Where the simulation is in its tick cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Between ticks; configuration may change.
    Idle,
    /// Inside `step`.
    Stepping,
}

/// Summary of one completed tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepReport {
    /// Tick number just completed, starting at 1.
    pub tick: u64,
    pub agents: usize,
    /// Agents that started the tick inside a collision zone.
    pub colliding: usize,
    /// Agents that needed a hard obstacle or wall correction.
    pub corrected: usize,
    /// Wall time spent in `step`.
    pub elapsed: Duration,
}

/// Builder for [`FlockSimulation`].
///
/// Use method chaining to configure, then call `.build()`.
#[derive(Clone, Debug)]
pub struct FlockBuilder {
    density: usize,
    seed: u64,
    method: ForceMethod,
    params: SimulationParameters,
    obstacles: ObstacleSet,
    density_bounds: (usize, usize),
    increment: usize,
    flock_material: Material,
}

impl Default for FlockBuilder {
    fn default() -> Self {
        Self {
            density: DEFAULT_DENSITY,
            seed: DEFAULT_SEED,
            method: ForceMethod::default(),
            params: SimulationParameters::default(),
            obstacles: ObstacleSet::with_default_obstacle(),
            density_bounds: (*DENSITY_RANGE.start(), *DENSITY_RANGE.end()),
            increment: DENSITY_INCREMENT,
            flock_material: Material::FLOCK,
        }
    }
}

impl FlockBuilder {
    /// Initial population, clamped to the density bounds at build time.
    pub fn with_density(mut self, density: usize) -> Self {
        self.density = density;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_method(mut self, method: ForceMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_parameters(mut self, params: SimulationParameters) -> Self {
        self.params = params;
        self
    }

    /// Replace the default single obstacle. Entries are re-validated by
    /// [`build`](Self::build).
    pub fn with_obstacles(mut self, obstacles: ObstacleSet) -> Self {
        self.obstacles = obstacles;
        self
    }

    /// Population limits. Bounds given in the wrong order are swapped.
    pub fn with_density_bounds(mut self, min: usize, max: usize) -> Self {
        self.density_bounds = (min.min(max), min.max(max));
        self
    }

    /// Step used by [`FlockSimulation::grow`] and [`FlockSimulation::shrink`].
    pub fn with_density_increment(mut self, increment: usize) -> Self {
        self.increment = increment;
        self
    }

    pub fn with_flock_material(mut self, material: Material) -> Self {
        self.flock_material = material;
        self
    }

    /// Validate the parameters and obstacles, then spawn the initial flock.
    pub fn build(self) -> Result<FlockSimulation, FlockError> {
        let params = self.params.sanitized()?;
        let obstacles = self.obstacles.validated()?;
        let mut sim = FlockSimulation {
            agents: Vec::new(),
            grid: SpatialIndex::new(grid_config(&params)),
            params,
            obstacles,
            model: ForceModel::new(self.method),
            spawner: Spawner::new(self.seed),
            density_bounds: self.density_bounds.0..=self.density_bounds.1,
            increment: self.increment,
            flock_material: self.flock_material,
            phase: Phase::Idle,
            tick: 0,
            frame: RenderFrame::default(),
            timings: StepTimings::new(),
        };
        sim.reset(self.density);
        Ok(sim)
    }
}

fn grid_config(params: &SimulationParameters) -> SpatialConfig {
    SpatialConfig::for_radius(params.query_radius(), params.half_extent)
}

/// A boid flock with obstacles inside a bounding box.
#[derive(Debug)]
pub struct FlockSimulation {
    agents: Vec<Agent>,
    params: SimulationParameters,
    obstacles: ObstacleSet,
    model: ForceModel,
    grid: SpatialIndex,
    spawner: Spawner,
    density_bounds: RangeInclusive<usize>,
    increment: usize,
    flock_material: Material,
    phase: Phase,
    tick: u64,
    frame: RenderFrame,
    timings: StepTimings,
}

impl FlockSimulation {
    pub fn builder() -> FlockBuilder {
        FlockBuilder::default()
    }

    // ========== Population ==========

    /// Destroy every agent and spawn `density` new ones (clamped to the
    /// density bounds). Returns the new population.
    pub fn reset(&mut self, density: usize) -> usize {
        let density = self.clamp_density(density);
        self.agents = self.spawner.spawn_agents(density, &self.params, &self.obstacles);
        self.tick = 0;
        self.timings.clear();
        self.phase = Phase::Idle;
        tracing::debug!(density, seed = self.spawner.seed(), "flock reset");
        self.publish();
        density
    }

    /// Spawn up to `n` agents without touching existing ones. Returns how
    /// many were added.
    pub fn add_agents(&mut self, n: usize) -> usize {
        let target = self.clamp_density(self.agents.len().saturating_add(n));
        let added = target.saturating_sub(self.agents.len());
        if added > 0 {
            let new = self.spawner.spawn_agents(added, &self.params, &self.obstacles);
            self.agents.extend(new);
            tracing::debug!(added, population = self.agents.len(), "agents added");
            self.publish();
        }
        added
    }

    /// Remove up to `n` agents from the end of the flock. Returns how many
    /// were removed.
    pub fn remove_agents(&mut self, n: usize) -> usize {
        let target = self.clamp_density(self.agents.len().saturating_sub(n));
        let removed = self.agents.len().saturating_sub(target);
        if removed > 0 {
            self.agents.truncate(target);
            tracing::debug!(removed, population = self.agents.len(), "agents removed");
            self.publish();
        }
        removed
    }

    /// Add one density increment.
    pub fn grow(&mut self) -> usize {
        self.add_agents(self.increment)
    }

    /// Remove one density increment.
    pub fn shrink(&mut self) -> usize {
        self.remove_agents(self.increment)
    }

    /// Move the population to `density` (clamped) by adding or removing
    /// agents. Returns the new population.
    pub fn set_density(&mut self, density: usize) -> usize {
        let density = self.clamp_density(density);
        let len = self.agents.len();
        if density > len {
            self.add_agents(density - len);
        } else if density < len {
            self.remove_agents(len - density);
        }
        self.agents.len()
    }

    fn clamp_density(&self, density: usize) -> usize {
        density.clamp(*self.density_bounds.start(), *self.density_bounds.end())
    }

    // ========== Tick ==========

    /// Advance the flock by `dt` seconds.
    pub fn step(&mut self, dt: f32) -> Result<StepReport, FlockError> {
        if self.agents.is_empty() {
            return Err(FlockError::EmptyFlock);
        }
        if !dt.is_finite() || dt <= 0.0 {
            return Err(FlockError::InvalidTimeStep(dt));
        }

        let started = Instant::now();
        self.phase = Phase::Stepping;

        let positions: Vec<Vec3> = self.agents.iter().map(|a| a.position).collect();
        self.grid.rebuild(&positions);

        let steering = self.compute_steering();

        let integrator = Integrator::new(&self.params);
        let scale = self.params.boid_size;
        let mut colliding = 0;
        let mut corrected = 0;
        for (agent, s) in self.agents.iter_mut().zip(&steering) {
            agent.scale = scale;
            if integrator.advance(agent, s.total, dt, &self.obstacles) {
                corrected += 1;
            }
            if s.colliding {
                colliding += 1;
            }
        }

        self.tick += 1;
        self.publish();
        self.phase = Phase::Idle;

        let elapsed = started.elapsed();
        self.timings.record(elapsed);
        tracing::trace!(
            tick = self.tick,
            agents = self.agents.len(),
            colliding,
            corrected,
            elapsed_us = elapsed.as_micros() as u64,
            "step"
        );

        Ok(StepReport {
            tick: self.tick,
            agents: self.agents.len(),
            colliding,
            corrected,
            elapsed,
        })
    }

    /// Steering for every agent against the frozen index, in agent order.
    fn compute_steering(&self) -> Vec<Steering> {
        let model = &self.model;
        let agents = &self.agents[..];
        let grid = &self.grid;
        let obstacles = &self.obstacles;
        let params = &self.params;

        #[cfg(feature = "parallel")]
        let steering = {
            use rayon::prelude::*;
            (0..agents.len())
                .into_par_iter()
                .map(|i| model.steering(i, agents, grid, obstacles, params))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let steering = (0..agents.len())
            .map(|i| model.steering(i, agents, grid, obstacles, params))
            .collect();

        steering
    }

    fn publish(&mut self) {
        self.frame.tick = self.tick;
        self.frame.agents.clear();
        self.frame.agents.extend(self.agents.iter().map(Agent::transform));
        self.frame.obstacles = self.obstacles.transforms();
        self.frame.flock_material = self.flock_material;
    }

    // ========== Configuration ==========

    /// Validate and swap in a new parameter snapshot, effective next tick.
    pub fn apply_parameters(&mut self, params: SimulationParameters) -> Result<(), FlockError> {
        let params = params.sanitized()?;
        if params != self.params {
            tracing::debug!(?params, "parameters applied");
        }
        self.params = params;
        self.grid.set_config(grid_config(&params));
        for agent in &mut self.agents {
            agent.scale = params.boid_size;
        }
        self.publish();
        Ok(())
    }

    /// Apply a full control-panel state: parameters, first obstacle, flock
    /// appearance, force method and density.
    ///
    /// Nothing changes if any value is rejected.
    pub fn apply_panel(&mut self, panel: &PanelSettings) -> Result<(), FlockError> {
        let params = panel.parameters(&self.params)?;
        let settings = panel.obstacle()?;

        let id = match self.obstacles.first_id() {
            Some(id) => id,
            None => self.obstacles.insert(Obstacle::default())?,
        };
        self.obstacles.set_enabled(id, settings.enabled)?;
        self.obstacles.set_position(id, settings.position)?;
        self.obstacles.set_size(id, settings.radius)?;
        self.obstacles.set_avoidance_params(id, settings.avoidance)?;
        self.obstacles.set_material(id, settings.material)?;

        self.flock_material = panel.flock_material();
        self.set_method(panel.method);
        self.apply_parameters(params)?;
        self.set_density(panel.density());
        Ok(())
    }

    /// Switch force formulation, effective next tick.
    pub fn set_method(&mut self, method: ForceMethod) {
        if method != self.model.method() {
            tracing::debug!(%method, "force method changed");
            self.model = ForceModel::new(method);
        }
    }

    /// Replace the whole force model, e.g. to override the separation falloff.
    pub fn set_force_model(&mut self, model: ForceModel) {
        self.model = model;
    }

    pub fn set_flock_material(&mut self, material: Material) {
        self.flock_material = material;
        self.frame.flock_material = material;
    }

    /// Mutable access to the obstacles. Changes show up in the next
    /// published frame and take effect next tick.
    pub fn obstacles_mut(&mut self) -> &mut ObstacleSet {
        &mut self.obstacles
    }

    /// Mutable access to agent state. The population size cannot change
    /// through this.
    pub fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    // ========== Accessors ==========

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn parameters(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn obstacles(&self) -> &ObstacleSet {
        &self.obstacles
    }

    pub fn method(&self) -> ForceMethod {
        self.model.method()
    }

    pub fn force_model(&self) -> &ForceModel {
        &self.model
    }

    pub fn flock_material(&self) -> Material {
        self.flock_material
    }

    /// Last published render state.
    pub fn frame(&self) -> &RenderFrame {
        &self.frame
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Ticks completed since the last reset.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn density_bounds(&self) -> RangeInclusive<usize> {
        self.density_bounds.clone()
    }

    pub fn density_increment(&self) -> usize {
        self.increment
    }

    pub fn seed(&self) -> u64 {
        self.spawner.seed()
    }

    pub fn timings(&self) -> &StepTimings {
        &self.timings
    }

    /// Spatial index as rebuilt by the last tick.
    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.grid
    }
}
