//! Render-facing output of the simulation.
//!
//! The core never draws anything. After each tick it publishes a
//! [`RenderFrame`] holding one [`AgentTransform`] per boid and one
//! [`ObstacleTransform`] per obstacle. Both are plain-old-data records so a
//! renderer can upload them straight into an instance buffer:
//!
//! ```ignore
//! let frame = sim.frame();
//! queue.write_buffer(&instances, 0, frame.agent_bytes());
//! ```
//!
//! Colours and wireframe flags are carried through untouched; they have no
//! effect on the simulation.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Surface appearance passed through to the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// RGBA colour, each channel 0.0-1.0.
    pub colour: [f32; 4],
    /// Draw as wireframe instead of filled.
    pub wireframe: bool,
}

impl Material {
    /// Default boid appearance (magenta).
    pub const FLOCK: Material = Material {
        colour: [1.0, 0.0, 0.5, 1.0],
        wireframe: false,
    };

    /// Default obstacle appearance (pale green).
    pub const OBSTACLE: Material = Material {
        colour: [0.5, 1.0, 0.6, 1.0],
        wireframe: false,
    };

    pub fn with_colour(mut self, colour: [f32; 4]) -> Self {
        self.colour = colour.map(|c| if c.is_finite() { c.clamp(0.0, 1.0) } else { 0.0 });
        self
    }

    pub fn with_wireframe(mut self, wireframe: bool) -> Self {
        self.wireframe = wireframe;
        self
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::FLOCK
    }
}

/// Per-boid instance data.
///
/// Layout is 32 bytes: `position.xyz, scale, orientation.xyzw`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AgentTransform {
    pub position: [f32; 3],
    pub scale: f32,
    /// Unit quaternion (x, y, z, w) rotating +Z onto the heading.
    pub orientation: [f32; 4],
}

impl AgentTransform {
    pub fn new(position: Vec3, orientation: Quat, scale: f32) -> Self {
        Self {
            position: position.to_array(),
            scale,
            orientation: orientation.to_array(),
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    #[inline]
    pub fn orientation(&self) -> Quat {
        Quat::from_array(self.orientation)
    }
}

/// Per-obstacle instance data.
///
/// Layout is 48 bytes: `position.xyz, radius, colour.rgba, wireframe,
/// enabled, padding`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObstacleTransform {
    pub position: [f32; 3],
    pub radius: f32,
    pub colour: [f32; 4],
    /// 1 when the obstacle should be drawn as wireframe.
    pub wireframe: u32,
    /// 1 when the obstacle takes part in the simulation.
    pub enabled: u32,
    _pad: [u32; 2],
}

impl ObstacleTransform {
    pub fn new(position: Vec3, radius: f32, material: Material, enabled: bool) -> Self {
        Self {
            position: position.to_array(),
            radius,
            colour: material.colour,
            wireframe: material.wireframe as u32,
            enabled: enabled as u32,
            _pad: [0; 2],
        }
    }
}

/// Everything a renderer needs to draw one tick.
#[derive(Clone, Debug, Default)]
pub struct RenderFrame {
    /// Tick number this frame was published at (0 before the first step).
    pub tick: u64,
    pub agents: Vec<AgentTransform>,
    pub obstacles: Vec<ObstacleTransform>,
    /// Shared appearance of every boid.
    pub flock_material: Material,
}

impl RenderFrame {
    /// Raw bytes of the agent instance array.
    pub fn agent_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.agents)
    }

    /// Raw bytes of the obstacle instance array.
    pub fn obstacle_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.obstacles)
    }
}
