//! Steering forces: the three flocking rules, obstacle avoidance and
//! boundary containment.
//!
//! Every term is an acceleration in units per second squared. For each agent
//! the [`ForceModel`] returns a [`Steering`] breakdown whose `total` is what
//! the integrator applies:
//!
//! ```text
//! flocking = clamp(cohesion + separation + alignment, max_flocking_acceleration)
//! total    = flocking + avoidance + containment      (not colliding)
//! total    = avoidance + containment                 (inside a collision zone)
//! ```
//!
//! Two numerical formulations of the flocking rules are available through
//! [`ForceMethod`]. They steer the same way and differ only in how each
//! term is weighted.
//!
//! | Term       | `Modern`                    | `Legacy`                                   |
//! |------------|-----------------------------|--------------------------------------------|
//! | Cohesion   | towards neighbour centroid  | towards centroid including self            |
//! | Separation | inverse-distance falloff    | linear falloff to zero at flock distance   |
//! | Alignment  | mean heading minus own      | (mean velocity incl. self − own) / max     |
//!
//! [`ForceModel::compare_methods`] runs both side by side for one agent.

use crate::agent::Agent;
use crate::config::SimulationParameters;
use crate::obstacle::ObstacleSet;
use crate::spatial::SpatialIndex;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Floor applied to every distance a force divides by.
pub const MIN_DISTANCE: f32 = 0.05;

/// Squared distance below which two agents are treated as coincident.
const COINCIDENT_SQ: f32 = 1e-12;

/// Numerical formulation of the flocking rules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForceMethod {
    /// Linear separation, self-inclusive averages.
    Legacy,
    /// Inverse-distance separation, heading-based alignment.
    #[default]
    Modern,
}

impl ForceMethod {
    /// Separation weighting used by this method.
    pub fn separation_falloff(&self) -> Falloff {
        match self {
            ForceMethod::Legacy => Falloff::Linear,
            ForceMethod::Modern => Falloff::Inverse,
        }
    }
}

impl std::fmt::Display for ForceMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForceMethod::Legacy => f.write_str("legacy"),
            ForceMethod::Modern => f.write_str("modern"),
        }
    }
}

/// How a force scales with distance inside its radius.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Falloff {
    /// Constant force regardless of distance.
    Constant,
    /// Decreases linearly to zero at the radius.
    Linear,
    /// `1 / distance`.
    #[default]
    Inverse,
    /// `1 / distance²`.
    InverseSquare,
    /// `1 - smoothstep(0, radius, distance)`.
    Smooth,
    /// `((radius - distance) / radius)²`, zero at the radius and 1 at the centre.
    Quadratic,
}

impl Falloff {
    /// Weight at `distance` for a force acting out to `radius`.
    ///
    /// `distance` is floored at [`MIN_DISTANCE`]; the result is never negative.
    pub fn weight(&self, distance: f32, radius: f32) -> f32 {
        let d = distance.max(MIN_DISTANCE);
        let normalized = if radius > 0.0 { (d / radius).min(1.0) } else { 1.0 };
        match self {
            Falloff::Constant => 1.0,
            Falloff::Linear => 1.0 - normalized,
            Falloff::Inverse => 1.0 / d,
            Falloff::InverseSquare => 1.0 / (d * d),
            Falloff::Smooth => {
                let t = normalized;
                1.0 - t * t * (3.0 - 2.0 * t)
            }
            Falloff::Quadratic => {
                // Measured from the true centre so the weight reaches 1
                let t = if radius > 0.0 { (distance.max(0.0) / radius).min(1.0) } else { 1.0 };
                (1.0 - t) * (1.0 - t)
            }
        }
    }
}

/// Per-agent force breakdown. All terms are already weighted.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Steering {
    pub cohesion: Vec3,
    pub separation: Vec3,
    pub alignment: Vec3,
    pub avoidance: Vec3,
    pub containment: Vec3,
    /// Acceleration handed to the integrator.
    pub total: Vec3,
    /// Inside at least one obstacle's collision zone.
    pub colliding: bool,
}

impl Steering {
    /// Combined flocking contribution before the acceleration clamp.
    pub fn flocking(&self) -> Vec3 {
        self.cohesion + self.separation + self.alignment
    }
}

#[derive(Default)]
struct NeighbourSums {
    count: u32,
    position: Vec3,
    heading: Vec3,
    velocity: Vec3,
    separation: Vec3,
}

/// Computes steering for one agent at a time against a frozen snapshot.
///
/// Holds no per-tick state, so one model can be shared across threads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceModel {
    method: ForceMethod,
    separation_falloff: Falloff,
}

impl Default for ForceModel {
    fn default() -> Self {
        Self::new(ForceMethod::default())
    }
}

impl ForceModel {
    pub fn new(method: ForceMethod) -> Self {
        Self {
            method,
            separation_falloff: method.separation_falloff(),
        }
    }

    /// Override the separation weighting of the selected method.
    pub fn with_separation_falloff(mut self, falloff: Falloff) -> Self {
        self.separation_falloff = falloff;
        self
    }

    pub fn method(&self) -> ForceMethod {
        self.method
    }

    pub fn separation_falloff(&self) -> Falloff {
        self.separation_falloff
    }

    /// Steering for `agents[index]`.
    ///
    /// `grid` must have been rebuilt from the positions of `agents`.
    pub fn steering(
        &self,
        index: usize,
        agents: &[Agent],
        grid: &SpatialIndex,
        obstacles: &ObstacleSet,
        params: &SimulationParameters,
    ) -> Steering {
        let agent = &agents[index];
        let mut steering = self.flocking(index, agents, grid, params);

        let (avoidance, colliding) = obstacle_avoidance(agent.position, obstacles, params);
        steering.avoidance = avoidance;
        steering.colliding = colliding;
        steering.containment = containment(agent.position, params);

        let flocking = if colliding {
            Vec3::ZERO
        } else {
            steering.flocking().clamp_length_max(params.max_flocking_acceleration)
        };
        steering.total = flocking + steering.avoidance + steering.containment;
        steering
    }

    /// Steering for `agents[index]` under both methods, side by side.
    ///
    /// Each method uses its own separation falloff. Obstacle and containment
    /// terms do not depend on the method and come out identical.
    pub fn compare_methods(
        index: usize,
        agents: &[Agent],
        grid: &SpatialIndex,
        obstacles: &ObstacleSet,
        params: &SimulationParameters,
    ) -> MethodComparison {
        let run = |method| Self::new(method).steering(index, agents, grid, obstacles, params);
        let legacy = run(ForceMethod::Legacy);
        let modern = run(ForceMethod::Modern);
        MethodComparison {
            cohesion: TermAgreement::between(legacy.cohesion, modern.cohesion),
            separation: TermAgreement::between(legacy.separation, modern.separation),
            alignment: TermAgreement::between(legacy.alignment, modern.alignment),
            legacy,
            modern,
        }
    }

    fn flocking(
        &self,
        index: usize,
        agents: &[Agent],
        grid: &SpatialIndex,
        params: &SimulationParameters,
    ) -> Steering {
        let agent = &agents[index];
        let neighbourhood_sq = params.neighbourhood_distance * params.neighbourhood_distance;
        let flock_distance = params.flock_distance;
        let flock_sq = flock_distance * flock_distance;
        let mut sums = NeighbourSums::default();

        grid.for_each_neighbor(agent.position, params.query_radius(), Some(index), |n| {
            let other = &agents[n.index];

            if n.distance_sq < neighbourhood_sq {
                sums.count += 1;
                sums.position += other.position;
                sums.heading += other.velocity.normalize_or_zero();
                sums.velocity += other.velocity;
            }

            if n.distance_sq < flock_sq {
                let away = if n.distance_sq < COINCIDENT_SQ {
                    // Deterministic split for stacked agents
                    if index < n.index {
                        Vec3::NEG_X
                    } else {
                        Vec3::X
                    }
                } else {
                    -n.offset / n.distance_sq.sqrt()
                };
                let d = n.distance_sq.sqrt();
                sums.separation += away * self.separation_falloff.weight(d, flock_distance);
            }
        });

        let gain = params.steering_gain;
        let mut steering = Steering {
            separation: sums.separation * params.separation_weight * gain,
            ..Default::default()
        };
        if sums.count == 0 {
            return steering;
        }

        let (cohesion, alignment) = match self.method {
            ForceMethod::Modern => {
                let n = sums.count as f32;
                let centroid = sums.position / n;
                let cohesion = (centroid - agent.position).normalize_or_zero();
                let mean_heading = (sums.heading / n).normalize_or_zero();
                let alignment = mean_heading - agent.velocity.normalize_or_zero();
                (cohesion, alignment)
            }
            ForceMethod::Legacy => {
                let n = (sums.count + 1) as f32;
                let centroid = (sums.position + agent.position) / n;
                let cohesion = (centroid - agent.position).normalize_or_zero();
                let mean_velocity = (sums.velocity + agent.velocity) / n;
                let max_speed = params.speed_limits().1.max(MIN_DISTANCE);
                let alignment = (mean_velocity - agent.velocity) / max_speed;
                (cohesion, alignment)
            }
        };
        steering.cohesion = cohesion * params.cohesion_weight * gain;
        steering.alignment = alignment * params.alignment_weight * gain;
        steering
    }
}

/// How closely one steering term agrees between two methods.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TermAgreement {
    /// Cosine of the angle between the two vectors. 1.0 when both are zero,
    /// 0.0 when only one is.
    pub cosine: f32,
    /// `|modern| / |legacy|`. 1.0 when both are zero, infinite when only the
    /// legacy term is.
    pub magnitude_ratio: f32,
}

impl TermAgreement {
    fn between(legacy: Vec3, modern: Vec3) -> Self {
        let (a, b) = (legacy.length(), modern.length());
        if a <= f32::EPSILON && b <= f32::EPSILON {
            return Self {
                cosine: 1.0,
                magnitude_ratio: 1.0,
            };
        }
        let cosine = if a <= f32::EPSILON || b <= f32::EPSILON {
            0.0
        } else {
            (legacy.dot(modern) / (a * b)).clamp(-1.0, 1.0)
        };
        let magnitude_ratio = if a <= f32::EPSILON { f32::INFINITY } else { b / a };
        Self {
            cosine,
            magnitude_ratio,
        }
    }

    /// Same direction to within `min_cosine`.
    pub fn agrees(&self, min_cosine: f32) -> bool {
        self.cosine >= min_cosine
    }
}

/// Legacy and modern steering for one agent, with per-term agreement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MethodComparison {
    pub legacy: Steering,
    pub modern: Steering,
    pub cohesion: TermAgreement,
    pub separation: TermAgreement,
    pub alignment: TermAgreement,
}

impl MethodComparison {
    /// Cohesion and separation point the same way under both methods.
    ///
    /// Alignment is left out: the two methods measure it from different
    /// quantities (unit headings against raw velocities).
    pub fn directions_agree(&self, min_cosine: f32) -> bool {
        self.cohesion.agrees(min_cosine) && self.separation.agrees(min_cosine)
    }
}

/// Repulsion from every enabled obstacle whose avoidance zone contains
/// `position`, and whether any collision zone does.
///
/// Inside a collision zone the obstacle pushes at full strength, even when
/// the collision sphere reaches past the avoidance sphere.
pub fn obstacle_avoidance(
    position: Vec3,
    obstacles: &ObstacleSet,
    params: &SimulationParameters,
) -> (Vec3, bool) {
    let mut force = Vec3::ZERO;
    let mut colliding = false;

    for obstacle in obstacles.query_nearby(position, 0.0) {
        let offset = position - obstacle.position;
        let distance = offset.length();
        let radius = obstacle.avoidance_radius();
        if distance >= obstacle.reach() {
            continue;
        }
        let away = if distance > MIN_DISTANCE * 0.01 {
            offset / distance
        } else {
            Vec3::Y
        };
        let strength = obstacle.avoidance.repulsion * params.obstacle_gain;
        let weight = if distance < obstacle.collision_radius() {
            colliding = true;
            1.0
        } else {
            Falloff::Quadratic.weight(distance, radius)
        };
        force += away * weight * strength;
    }

    (force, colliding)
}

/// Per-axis push back towards the box interior.
///
/// Zero while `|p| <= half_extent - margin` on an axis, then proportional to
/// the distance beyond that threshold.
pub fn containment(position: Vec3, params: &SimulationParameters) -> Vec3 {
    let threshold = params.containment_threshold();
    let excess = (position.abs() - Vec3::splat(threshold)).max(Vec3::ZERO);
    -position.signum() * excess * params.containment_strength
}
