//! # flocksim - boid flocking with obstacle avoidance
//!
//! A real-time flocking engine. It owns a population of boids inside a
//! bounding box, steers them with the classic cohesion / separation /
//! alignment rules, keeps them clear of spherical obstacles and publishes one
//! transform per boid and per obstacle after every tick for a renderer to
//! draw.
//!
//! ## Quick Start
//!
//! ```ignore
//! use flocksim::prelude::*;
//!
//! fn main() -> Result<(), FlockError> {
//!     let mut sim = FlockSimulation::builder()
//!         .with_density(500)
//!         .with_seed(42)
//!         .build()?;
//!
//!     for _ in 0..600 {
//!         sim.step(1.0 / 60.0)?;
//!     }
//!     println!("{} boids at tick {}", sim.len(), sim.tick());
//!     Ok(())
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Tick pipeline
//!
//! Each [`FlockSimulation::step`] rebuilds the [`SpatialIndex`], asks the
//! [`ForceModel`] for a [`Steering`] per boid, advances every boid with the
//! [`Integrator`] and publishes a [`RenderFrame`]. Nothing from a half-done
//! tick is ever observable.
//!
//! ### Parameters
//!
//! [`SimulationParameters`] is an immutable snapshot swapped wholesale by
//! [`FlockSimulation::apply_parameters`]. NaN or infinite values are rejected;
//! out-of-range values are clamped. [`PanelSettings`] holds the same knobs in
//! control-panel units and loads from JSON:
//!
//! ```ignore
//! let panel = PanelSettings::from_json_file("flock.json")?;
//! sim.apply_panel(&panel)?;
//! ```
//!
//! ### Force methods
//!
//! [`ForceMethod::Modern`] (default) and [`ForceMethod::Legacy`] steer the
//! same way with different weighting. Switch with
//! [`FlockSimulation::set_method`].
//!
//! ## Spatial Hashing
//!
//! Neighbour queries use a uniform grid keyed by Morton codes with cells as
//! wide as the largest query radius, so each boid only inspects the 27 cells
//! around it.
//!
//! ## Features
//!
//! - `parallel` (default): compute steering across threads with rayon.

pub mod agent;
pub mod config;
pub mod error;
pub mod forces;
pub mod integrator;
pub mod obstacle;
pub mod simulation;
pub mod spatial;
pub mod spawn;
pub mod time;
pub mod visuals;

pub use bytemuck;
pub use glam::{Quat, Vec3};

pub use agent::Agent;
pub use config::{ObstacleSettings, PanelSettings, SimulationParameters};
pub use error::{ConfigError, FlockError};
pub use forces::{Falloff, ForceMethod, ForceModel, MethodComparison, Steering, TermAgreement};
pub use integrator::Integrator;
pub use obstacle::{AvoidanceParams, Obstacle, ObstacleId, ObstacleSet};
pub use simulation::{FlockBuilder, FlockSimulation, Phase, StepReport};
pub use spatial::{Neighbor, SpatialConfig, SpatialIndex};
pub use spawn::Spawner;
pub use time::{StepTimings, TickClock};
pub use visuals::{AgentTransform, Material, ObstacleTransform, RenderFrame};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use flocksim::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{PanelSettings, SimulationParameters};
    pub use crate::error::{ConfigError, FlockError};
    pub use crate::forces::ForceMethod;
    pub use crate::obstacle::{AvoidanceParams, Obstacle, ObstacleId, ObstacleSet};
    pub use crate::simulation::{FlockSimulation, StepReport};
    pub use crate::time::TickClock;
    pub use crate::visuals::{Material, RenderFrame};
    pub use crate::{Quat, Vec3};
}
