//! Simulation parameters and control-panel settings.
//!
//! Two layers live here:
//!
//! - [`SimulationParameters`] is the immutable snapshot a tick reads. It is in
//!   engine units (world units, seconds) and is swapped wholesale between
//!   ticks by [`FlockSimulation::apply_parameters`](crate::FlockSimulation::apply_parameters).
//! - [`PanelSettings`] mirrors the host control panel in *its* units (percent,
//!   tenths, hundredths) and can be loaded from / saved to JSON. It converts
//!   into parameters and obstacle configuration.
//!
//! Out-of-range values are clamped to the documented bounds. Non-finite
//! values are rejected with [`ConfigError::NonFinite`] before they can reach
//! a snapshot.

use crate::error::ConfigError;
use crate::forces::ForceMethod;
use crate::obstacle::AvoidanceParams;
use crate::visuals::Material;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

/// Allowed flock population.
pub const DENSITY_RANGE: RangeInclusive<usize> = 20..=2000;
/// Number of boids added or removed by a single grow/shrink command.
pub const DENSITY_INCREMENT: usize = 10;
/// Population after a reset.
pub const DEFAULT_DENSITY: usize = 200;
pub const BOID_SIZE_RANGE: RangeInclusive<f32> = 0.5..=10.0;
/// Speed scale as a fraction (the panel shows 10-300 %).
pub const SPEED_SCALE_RANGE: RangeInclusive<f32> = 0.1..=3.0;
pub const HALF_EXTENT_RANGE: RangeInclusive<f32> = 50.0..=220.0;
pub const OBSTACLE_SIZE_RANGE: RangeInclusive<f32> = 1.0..=10.0;
/// Lowest coordinate the panel allows for an obstacle centre.
pub const OBSTACLE_POSITION_MIN: f32 = -99.0;
pub const AVOIDANCE_SCALE_RANGE: RangeInclusive<f32> = 1.0..=10.0;
pub const COLLISION_SCALE_RANGE: RangeInclusive<f32> = 1.0..=6.0;
pub const REPULSION_RANGE: RangeInclusive<f32> = 0.1..=2.0;

/// Reject NaN and infinities.
pub(crate) fn finite(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NonFinite { field })
    }
}

/// Clamp into `range`, logging when the input had to move.
pub(crate) fn clamp_field(field: &'static str, value: f32, range: RangeInclusive<f32>) -> f32 {
    let clamped = value.clamp(*range.start(), *range.end());
    if clamped != value {
        tracing::warn!(field, value, clamped, "parameter out of range, clamped");
    }
    clamped
}

/// Reject non-finite values, then clamp at zero.
fn non_negative(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    Ok(clamp_field(field, finite(field, value)?, 0.0..=f32::MAX))
}

/// Per-tick parameter snapshot.
///
/// Distances are in world units, speeds in units per second and
/// accelerations in units per second squared.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    /// Radius within which other boids count for cohesion and alignment.
    pub neighbourhood_distance: f32,
    /// Radius within which other boids trigger separation.
    pub flock_distance: f32,
    pub cohesion_weight: f32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    /// Multiplier on both speed limits.
    pub speed_scale: f32,
    /// Bounding box spans `-half_extent..=half_extent` on every axis.
    pub half_extent: f32,
    /// Shared render scale of every boid.
    pub boid_size: f32,
    /// Unscaled lower speed limit.
    pub min_speed: f32,
    /// Unscaled upper speed limit.
    pub max_speed: f32,
    /// Depth of the band inside each wall where containment steering acts.
    pub containment_margin: f32,
    /// Containment acceleration per unit of penetration into the margin band.
    pub containment_strength: f32,
    /// Converts a unit flocking weight into acceleration.
    pub steering_gain: f32,
    /// Upper bound on the combined cohesion/separation/alignment acceleration.
    pub max_flocking_acceleration: f32,
    /// Converts an obstacle's repulsion force into acceleration.
    pub obstacle_gain: f32,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            neighbourhood_distance: 20.0,
            flock_distance: 4.0,
            cohesion_weight: 2.0,
            separation_weight: 9.0,
            alignment_weight: 10.0,
            speed_scale: 1.0,
            half_extent: 120.0,
            boid_size: 1.0,
            min_speed: 18.0,
            max_speed: 54.0,
            containment_margin: 10.0,
            containment_strength: 60.0,
            steering_gain: 10.0,
            max_flocking_acceleration: 150.0,
            obstacle_gain: 600.0,
        }
    }
}

impl SimulationParameters {
    /// Validate and clamp every field.
    ///
    /// Returns [`ConfigError::NonFinite`] naming the first NaN/infinite field.
    pub fn sanitized(self) -> Result<Self, ConfigError> {
        let half_extent = clamp_field(
            "half_extent",
            finite("half_extent", self.half_extent)?,
            HALF_EXTENT_RANGE,
        );
        let min_speed = non_negative("min_speed", self.min_speed)?;
        let max_speed = clamp_field(
            "max_speed",
            finite("max_speed", self.max_speed)?,
            min_speed..=f32::MAX,
        );

        Ok(Self {
            neighbourhood_distance: non_negative(
                "neighbourhood_distance",
                self.neighbourhood_distance,
            )?,
            flock_distance: non_negative("flock_distance", self.flock_distance)?,
            cohesion_weight: non_negative("cohesion_weight", self.cohesion_weight)?,
            separation_weight: non_negative("separation_weight", self.separation_weight)?,
            alignment_weight: non_negative("alignment_weight", self.alignment_weight)?,
            speed_scale: clamp_field(
                "speed_scale",
                finite("speed_scale", self.speed_scale)?,
                SPEED_SCALE_RANGE,
            ),
            half_extent,
            boid_size: clamp_field(
                "boid_size",
                finite("boid_size", self.boid_size)?,
                BOID_SIZE_RANGE,
            ),
            min_speed,
            max_speed,
            containment_margin: clamp_field(
                "containment_margin",
                finite("containment_margin", self.containment_margin)?,
                0.0..=half_extent,
            ),
            containment_strength: non_negative(
                "containment_strength",
                self.containment_strength,
            )?,
            steering_gain: non_negative("steering_gain", self.steering_gain)?,
            max_flocking_acceleration: non_negative(
                "max_flocking_acceleration",
                self.max_flocking_acceleration,
            )?,
            obstacle_gain: non_negative("obstacle_gain", self.obstacle_gain)?,
        })
    }

    /// Effective `(min, max)` speed after applying `speed_scale`.
    #[inline]
    pub fn speed_limits(&self) -> (f32, f32) {
        (self.min_speed * self.speed_scale, self.max_speed * self.speed_scale)
    }

    /// Largest radius any neighbour query needs this tick.
    #[inline]
    pub fn query_radius(&self) -> f32 {
        self.neighbourhood_distance.max(self.flock_distance)
    }

    /// Distance from the centre at which containment starts acting on an axis.
    #[inline]
    pub fn containment_threshold(&self) -> f32 {
        self.half_extent - self.containment_margin
    }
}

/// Obstacle settings as delivered by the control panel, already converted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObstacleSettings {
    pub enabled: bool,
    pub position: Vec3,
    pub radius: f32,
    pub avoidance: AvoidanceParams,
    pub material: Material,
}

/// Control-panel state in the panel's own units.
///
/// Missing JSON fields fall back to the panel defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    pub flock_density: u32,
    pub boid_size: f64,
    /// Percent, 10-300.
    pub speed_percent: u32,
    pub flock_wireframe: bool,
    pub flock_colour: [f32; 4],
    pub obstacle_enabled: bool,
    pub obstacle_position: [f64; 3],
    pub obstacle_size: f64,
    /// Tenths, 10-100.
    pub avoidance_radius_tenths: u32,
    /// Tenths, 10-60.
    pub collision_radius_tenths: u32,
    /// Hundredths, 10-200.
    pub repulsion_force_hundredths: u32,
    pub obstacle_wireframe: bool,
    pub obstacle_colour: [f32; 4],
    pub neighbourhood_distance: f64,
    pub flock_distance: f64,
    pub cohesion: f64,
    pub separation: f64,
    pub alignment: f64,
    /// Bounding box half-extent, 50-220.
    pub bbox_size: f64,
    pub method: ForceMethod,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            flock_density: DEFAULT_DENSITY as u32,
            boid_size: 1.0,
            speed_percent: 100,
            flock_wireframe: false,
            flock_colour: Material::FLOCK.colour,
            obstacle_enabled: true,
            obstacle_position: [0.0; 3],
            obstacle_size: 4.0,
            avoidance_radius_tenths: 30,
            collision_radius_tenths: 13,
            repulsion_force_hundredths: 45,
            obstacle_wireframe: false,
            obstacle_colour: Material::OBSTACLE.colour,
            neighbourhood_distance: 20.0,
            flock_distance: 4.0,
            cohesion: 2.0,
            separation: 9.0,
            alignment: 10.0,
            bbox_size: 120.0,
            method: ForceMethod::default(),
        }
    }
}

impl PanelSettings {
    /// Requested population, clamped to [`DENSITY_RANGE`].
    pub fn density(&self) -> usize {
        (self.flock_density as usize).clamp(*DENSITY_RANGE.start(), *DENSITY_RANGE.end())
    }

    /// Build a parameter snapshot from the panel values.
    ///
    /// Engine tuning that the panel does not expose (speed limits, gains,
    /// containment) is taken from `base`.
    pub fn parameters(
        &self,
        base: &SimulationParameters,
    ) -> Result<SimulationParameters, ConfigError> {
        SimulationParameters {
            neighbourhood_distance: finite(
                "neighbourhood_distance",
                self.neighbourhood_distance as f32,
            )?,
            flock_distance: finite("flock_distance", self.flock_distance as f32)?,
            cohesion_weight: finite("cohesion", self.cohesion as f32)?,
            separation_weight: finite("separation", self.separation as f32)?,
            alignment_weight: finite("alignment", self.alignment as f32)?,
            speed_scale: self.speed_percent as f32 / 100.0,
            half_extent: finite("bbox_size", self.bbox_size as f32)?,
            boid_size: finite("boid_size", self.boid_size as f32)?,
            ..*base
        }
        .sanitized()
    }

    /// Obstacle configuration in engine units.
    ///
    /// Only finiteness is checked here. Position and size bounds are applied
    /// by the [`ObstacleSet`](crate::ObstacleSet) setters.
    pub fn obstacle(&self) -> Result<ObstacleSettings, ConfigError> {
        let [x, y, z] = self.obstacle_position;
        let position = Vec3::new(
            finite("obstacle_position.x", x as f32)?,
            finite("obstacle_position.y", y as f32)?,
            finite("obstacle_position.z", z as f32)?,
        );
        let radius = finite("obstacle_size", self.obstacle_size as f32)?;

        Ok(ObstacleSettings {
            enabled: self.obstacle_enabled,
            position,
            radius,
            avoidance: AvoidanceParams::new(
                self.avoidance_radius_tenths as f32 / 10.0,
                self.collision_radius_tenths as f32 / 10.0,
                self.repulsion_force_hundredths as f32 / 100.0,
            ),
            material: Material::OBSTACLE
                .with_colour(self.obstacle_colour)
                .with_wireframe(self.obstacle_wireframe),
        })
    }

    /// Appearance shared by every boid.
    pub fn flock_material(&self) -> Material {
        Material::FLOCK
            .with_colour(self.flock_colour)
            .with_wireframe(self.flock_wireframe)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = self.to_json_string()?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
