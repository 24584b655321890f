//! Error type shared by the core pipeline.

use thiserror::Error;

/// Everything that can go wrong inside the gesture pipeline.
///
/// Only [`ConductorError::SourceUnavailable`] is fatal to a session; the
/// others describe a single bad frame (or a bad constructor argument) and are
/// recovered locally by the caller.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConductorError {
    #[error("expected {expected} landmarks, got {actual}")]
    LandmarkCount { expected: usize, actual: usize },

    #[error("landmark {index} out of range: ({x}, {y}, {z})")]
    LandmarkOutOfRange { index: usize, x: f32, y: f32, z: f32 },

    #[error("smoothing factor must be in [0, 1), got {0}")]
    InvalidSmoothing(f32),

    #[error("unknown handedness label {0:?}")]
    UnknownHandedness(String),

    #[error("unknown profile {0:?} (expected single-hand or two-hand)")]
    UnknownProfile(String),

    /// Camera permission denied, detector missing, device busy, …
    #[error("landmark source unavailable: {0}")]
    SourceUnavailable(String),
}
