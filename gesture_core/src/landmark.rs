//! Hand landmarks as delivered by the external detector.
//!
//! Coordinates are normalised to the camera frame: `x` grows to the right,
//! `y` grows *downward*, both nominally in `[0, 1]`.  `z` is relative depth
//! and is carried along but never used for classification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConductorError;

// ════════════════════════════════════════════════════════════════════════════
// Anatomical indices (MediaPipe hand model)
// ════════════════════════════════════════════════════════════════════════════

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// How far outside `[0, 1]` a coordinate may stray before the whole hand is
/// rejected.  Detectors report partially visible hands slightly off-frame.
pub const COORDINATE_SLACK: f32 = 0.1;

// ════════════════════════════════════════════════════════════════════════════
// Landmark
// ════════════════════════════════════════════════════════════════════════════

/// One tracked anatomical point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Landmark { x, y, z: 0.0 }
    }

    /// Planar distance to `other`; depth is ignored.
    pub fn distance(&self, other: &Landmark) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    fn in_frame(&self) -> bool {
        let lo = -COORDINATE_SLACK;
        let hi = 1.0 + COORDINATE_SLACK;
        self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
            && (lo..=hi).contains(&self.x)
            && (lo..=hi).contains(&self.y)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Handedness
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
    #[serde(alias = "left", alias = "LEFT")]
    Left,
    #[serde(alias = "right", alias = "RIGHT")]
    Right,
}

impl FromStr for Handedness {
    type Err = ConductorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Handedness::Left),
            "right" => Ok(Handedness::Right),
            _ => Err(ConductorError::UnknownHandedness(s.to_string())),
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handedness::Left => write!(f, "Left"),
            Handedness::Right => write!(f, "Right"),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandObservation
// ════════════════════════════════════════════════════════════════════════════

/// One frame's reading for one hand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandObservation {
    pub handedness: Handedness,
    pub landmarks: Vec<Landmark>,
}

impl HandObservation {
    pub fn new(handedness: Handedness, landmarks: Vec<Landmark>) -> Self {
        HandObservation { handedness, landmarks }
    }

    /// Reject hands the classifier must not see: wrong landmark count,
    /// non-finite values, or points far outside the frame.
    pub fn validate(&self) -> Result<(), ConductorError> {
        if self.landmarks.len() != LANDMARK_COUNT {
            return Err(ConductorError::LandmarkCount {
                expected: LANDMARK_COUNT,
                actual: self.landmarks.len(),
            });
        }
        match self.landmarks.iter().position(|lm| !lm.in_frame()) {
            None => Ok(()),
            Some(index) => {
                let lm = self.landmarks[index];
                Err(ConductorError::LandmarkOutOfRange { index, x: lm.x, y: lm.y, z: lm.z })
            }
        }
    }

    /// Callers must have run [`validate`](Self::validate) first.
    pub fn point(&self, index: usize) -> &Landmark {
        &self.landmarks[index]
    }

    pub fn wrist(&self) -> &Landmark {
        self.point(WRIST)
    }

    pub fn thumb_tip(&self) -> &Landmark {
        self.point(THUMB_TIP)
    }

    pub fn index_tip(&self) -> &Landmark {
        self.point(INDEX_TIP)
    }

    pub fn distance(&self, a: usize, b: usize) -> f32 {
        self.point(a).distance(self.point(b))
    }

    /// Build a synthetic hand with its wrist at `(wrist_x, wrist_y)` whose
    /// geometry classifies as `shape` under both threshold sets.
    ///
    /// Fingers always point toward the centre of the frame so every point
    /// stays in range wherever the wrist is placed.
    pub fn posed(handedness: Handedness, wrist_x: f32, wrist_y: f32, shape: HandShape) -> Self {
        let wx = wrist_x.clamp(0.0, 1.0);
        let wy = wrist_y.clamp(0.0, 1.0);
        let sx = if wx < 0.5 { 1.0 } else { -1.0 };
        let sy = if wy < 0.5 { 1.0 } else { -1.0 };
        let at = |dx: f32, dy: f32| Landmark::new(wx + sx * dx, wy + sy * dy);

        // (finger reach along y, thumb tip offset)
        let (reach, thumb) = match shape {
            HandShape::Open   => (0.36, (0.12, 0.15)),
            HandShape::Other  => (0.22, (0.08, 0.12)),
            HandShape::Closed => (0.10, (0.02, 0.08)),
        };

        let mut landmarks = Vec::with_capacity(LANDMARK_COUNT);
        landmarks.push(at(0.0, 0.0));

        // Thumb: CMC, MCP, IP, TIP on the way from wrist to thumb tip.
        for step in 1..=4 {
            let t = step as f32 / 4.0;
            landmarks.push(at(thumb.0 * t, thumb.1 * t));
        }

        // Index, middle, ring, pinky: MCP → TIP.
        const SPREAD: [(f32, f32); 4] = [(0.0, 1.0), (0.03, 1.0), (0.06, 0.95), (0.09, 0.8)];
        const KNUCKLE: f32 = 0.08;
        for (dx, scale) in SPREAD {
            let tip = reach * scale;
            for step in 0..4 {
                let t = step as f32 / 3.0;
                landmarks.push(at(dx, KNUCKLE.min(tip) + (tip - KNUCKLE.min(tip)) * t));
            }
        }

        HandObservation { handedness, landmarks }
    }
}

/// Shape requested from [`HandObservation::posed`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandShape {
    Open,
    Closed,
    Other,
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
