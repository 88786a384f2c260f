//! Sphere obstacles and the queries the force model runs against them.
//!
//! Each obstacle defines two concentric zones around its surface radius `r`:
//!
//! - the **avoidance** sphere, `avoidance_scale × r`, inside which boids are
//!   steered away with a smooth repulsion;
//! - the **collision** sphere, `collision_scale × r`, which boids may never
//!   enter. Penetration is corrected positionally by the integrator.
//!
//! Obstacles are configured only between ticks. Disabled obstacles are still
//! stored and published for rendering but are invisible to every query.

use crate::config::{
    clamp_field, finite, AVOIDANCE_SCALE_RANGE, COLLISION_SCALE_RANGE, OBSTACLE_POSITION_MIN,
    OBSTACLE_SIZE_RANGE, REPULSION_RANGE,
};
use crate::error::{ConfigError, FlockError};
use crate::visuals::{Material, ObstacleTransform};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Stable handle to an obstacle in an [`ObstacleSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObstacleId(pub u32);

/// Zone scales and repulsion strength of one obstacle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AvoidanceParams {
    /// Avoidance zone radius as a multiple of the obstacle radius.
    pub avoidance_scale: f32,
    /// Collision zone radius as a multiple of the obstacle radius.
    pub collision_scale: f32,
    /// Repulsion strength inside the avoidance zone.
    pub repulsion: f32,
}

impl AvoidanceParams {
    /// Build from raw values, clamping each into its documented range.
    ///
    /// Non-finite inputs fall back to the defaults.
    pub fn new(avoidance_scale: f32, collision_scale: f32, repulsion: f32) -> Self {
        let defaults = Self::default();
        let pick = |v: f32, d: f32| if v.is_finite() { v } else { d };
        Self {
            avoidance_scale: clamp_field(
                "avoidance_scale",
                pick(avoidance_scale, defaults.avoidance_scale),
                AVOIDANCE_SCALE_RANGE,
            ),
            collision_scale: clamp_field(
                "collision_scale",
                pick(collision_scale, defaults.collision_scale),
                COLLISION_SCALE_RANGE,
            ),
            repulsion: clamp_field(
                "repulsion",
                pick(repulsion, defaults.repulsion),
                REPULSION_RANGE,
            ),
        }
    }

    /// Like [`new`](Self::new), but NaN and infinities are errors.
    pub fn validated(self) -> Result<Self, ConfigError> {
        Ok(Self::new(
            finite("avoidance_scale", self.avoidance_scale)?,
            finite("collision_scale", self.collision_scale)?,
            finite("repulsion", self.repulsion)?,
        ))
    }
}

impl Default for AvoidanceParams {
    fn default() -> Self {
        Self {
            avoidance_scale: 3.0,
            collision_scale: 1.3,
            repulsion: 0.45,
        }
    }
}

/// A spherical obstacle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub position: Vec3,
    pub radius: f32,
    pub enabled: bool,
    pub avoidance: AvoidanceParams,
    /// Rendering only.
    pub material: Material,
}

impl Obstacle {
    /// Enabled obstacle with default avoidance settings.
    pub fn new(position: Vec3, radius: f32) -> Self {
        Self {
            position,
            radius: radius.clamp(*OBSTACLE_SIZE_RANGE.start(), *OBSTACLE_SIZE_RANGE.end()),
            enabled: true,
            avoidance: AvoidanceParams::default(),
            material: Material::OBSTACLE,
        }
    }

    #[inline]
    pub fn avoidance_radius(&self) -> f32 {
        self.radius * self.avoidance.avoidance_scale
    }

    #[inline]
    pub fn collision_radius(&self) -> f32 {
        self.radius * self.avoidance.collision_scale
    }

    /// Outermost zone radius. The collision scale may exceed the avoidance
    /// scale, so this is not always the avoidance radius.
    #[inline]
    pub fn reach(&self) -> f32 {
        self.avoidance_radius().max(self.collision_radius())
    }

    /// Signed distance from `point` to the collision sphere surface.
    ///
    /// Negative values are penetration depth.
    #[inline]
    pub fn collision_gap(&self, point: Vec3) -> f32 {
        point.distance(self.position) - self.collision_radius()
    }

    pub fn transform(&self) -> ObstacleTransform {
        ObstacleTransform::new(self.position, self.radius, self.material, self.enabled)
    }

    /// Reject non-finite values and clamp everything else into range.
    pub fn validated(self) -> Result<Self, ConfigError> {
        Ok(Self {
            position: clamp_position(self.position)?,
            radius: clamp_radius(self.radius)?,
            avoidance: self.avoidance.validated()?,
            ..self
        })
    }
}

fn clamp_position(position: Vec3) -> Result<Vec3, ConfigError> {
    let axis = |field: &'static str, v: f32| -> Result<f32, ConfigError> {
        Ok(clamp_field(field, finite(field, v)?, OBSTACLE_POSITION_MIN..=f32::MAX))
    };
    Ok(Vec3::new(
        axis("obstacle_position.x", position.x)?,
        axis("obstacle_position.y", position.y)?,
        axis("obstacle_position.z", position.z)?,
    ))
}

fn clamp_radius(radius: f32) -> Result<f32, ConfigError> {
    Ok(clamp_field("obstacle_size", finite("obstacle_size", radius)?, OBSTACLE_SIZE_RANGE))
}

impl Default for Obstacle {
    fn default() -> Self {
        Self::new(Vec3::ZERO, 4.0)
    }
}

/// Collection of obstacles addressed by [`ObstacleId`].
#[derive(Clone, Debug)]
pub struct ObstacleSet {
    entries: Vec<(ObstacleId, Obstacle)>,
    next_id: u32,
}

impl ObstacleSet {
    /// An empty set.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// The single default obstacle: enabled, at the origin, radius 4.
    pub fn with_default_obstacle() -> Self {
        let mut set = Self::new();
        set.push(Obstacle::default());
        set
    }

    /// Validate `obstacle` and add it. Out-of-range values are clamped.
    pub fn insert(&mut self, obstacle: Obstacle) -> Result<ObstacleId, FlockError> {
        Ok(self.push(obstacle.validated()?))
    }

    /// Re-validate every entry, keeping ids.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        for (_, obstacle) in &mut self.entries {
            *obstacle = obstacle.validated()?;
        }
        Ok(self)
    }

    fn push(&mut self, obstacle: Obstacle) -> ObstacleId {
        let id = ObstacleId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, obstacle));
        id
    }

    pub fn remove(&mut self, id: ObstacleId) -> Result<Obstacle, FlockError> {
        let idx = self.index_of(id)?;
        Ok(self.entries.remove(idx).1)
    }

    pub fn get(&self, id: ObstacleId) -> Option<&Obstacle> {
        self.entries.iter().find(|(i, _)| *i == id).map(|(_, o)| o)
    }

    /// Id of the first obstacle, if any.
    pub fn first_id(&self) -> Option<ObstacleId> {
        self.entries.first().map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObstacleId, &Obstacle)> {
        self.entries.iter().map(|(id, o)| (*id, o))
    }

    /// Enabled obstacles only.
    pub fn active(&self) -> impl Iterator<Item = &Obstacle> {
        self.entries.iter().map(|(_, o)| o).filter(|o| o.enabled)
    }

    /// Enabled obstacles whose outer zone (avoidance or collision, whichever
    /// is larger) intersects the sphere of radius `max_radius` around
    /// `position`.
    ///
    /// With `max_radius == 0.0` this is "obstacles with a zone containing
    /// `position`".
    pub fn query_nearby(
        &self,
        position: Vec3,
        max_radius: f32,
    ) -> impl Iterator<Item = &Obstacle> + '_ {
        self.active().filter(move |o| {
            let reach = o.reach() + max_radius;
            o.position.distance_squared(position) < reach * reach
        })
    }

    // ========== Configuration ==========

    pub fn set_enabled(&mut self, id: ObstacleId, enabled: bool) -> Result<(), FlockError> {
        self.get_mut(id)?.enabled = enabled;
        Ok(())
    }

    /// Move the centre. Each axis is clamped to at least
    /// [`OBSTACLE_POSITION_MIN`].
    pub fn set_position(&mut self, id: ObstacleId, position: Vec3) -> Result<(), FlockError> {
        let position = clamp_position(position)?;
        self.get_mut(id)?.position = position;
        Ok(())
    }

    /// Set the surface radius, clamped to [`OBSTACLE_SIZE_RANGE`].
    pub fn set_size(&mut self, id: ObstacleId, radius: f32) -> Result<(), FlockError> {
        let radius = clamp_radius(radius)?;
        self.get_mut(id)?.radius = radius;
        Ok(())
    }

    pub fn set_avoidance_params(
        &mut self,
        id: ObstacleId,
        params: AvoidanceParams,
    ) -> Result<(), FlockError> {
        let params = params.validated()?;
        self.get_mut(id)?.avoidance = params;
        Ok(())
    }

    pub fn set_material(&mut self, id: ObstacleId, material: Material) -> Result<(), FlockError> {
        self.get_mut(id)?.material = material;
        Ok(())
    }

    /// Render records for every obstacle, enabled or not.
    pub fn transforms(&self) -> Vec<ObstacleTransform> {
        self.entries.iter().map(|(_, o)| o.transform()).collect()
    }

    fn index_of(&self, id: ObstacleId) -> Result<usize, FlockError> {
        self.entries
            .iter()
            .position(|(i, _)| *i == id)
            .ok_or(FlockError::UnknownObstacle(id))
    }

    fn get_mut(&mut self, id: ObstacleId) -> Result<&mut Obstacle, FlockError> {
        let idx = self.index_of(id)?;
        Ok(&mut self.entries[idx].1)
    }
}

impl Default for ObstacleSet {
    fn default() -> Self {
        Self::new()
    }
}
