//! Error types for flocksim.
//!
//! Nothing in a running tick can fail. Errors only surface at the edges:
//! rejecting malformed configuration, stepping an empty flock, or
//! addressing an obstacle that does not exist.

use crate::obstacle::ObstacleId;
use std::path::PathBuf;

/// Errors raised while validating or loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A numeric input was NaN or infinite.
    #[error("parameter `{field}` must be a finite number")]
    NonFinite {
        /// Name of the offending field.
        field: &'static str,
    },
    /// Failed to read or write a settings file.
    #[error("failed to access settings file {path}: {source}")]
    Io {
        /// File that could not be accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Settings file contents were not valid JSON for the expected schema.
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors returned by [`FlockSimulation`](crate::FlockSimulation) operations.
#[derive(Debug, thiserror::Error)]
pub enum FlockError {
    /// `step` was called on a flock with no agents.
    #[error("cannot step an empty flock")]
    EmptyFlock,
    /// `step` was called with a non-finite or non-positive time step.
    #[error("time step must be finite and positive, got {0}")]
    InvalidTimeStep(f32),
    /// An obstacle setter referenced an id that is not in the set.
    #[error("no obstacle with id {0:?}")]
    UnknownObstacle(ObstacleId),
    /// Configuration was rejected at the boundary.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
