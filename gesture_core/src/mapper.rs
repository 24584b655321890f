//! Linear maps from normalised hand coordinates to musical ranges, and the
//! edge-triggered play/pause latch.

use serde::Serialize;

use crate::classifier::{GestureState, HandPosition};

// ════════════════════════════════════════════════════════════════════════════
// Tempo
// ════════════════════════════════════════════════════════════════════════════

/// Inclusive BPM bounds of a profile.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TempoRange {
    pub min: f32,
    pub max: f32,
}

impl TempoRange {
    pub const PRIMARY: TempoRange = TempoRange { min: 40.0, max: 180.0 };
    pub const ALTERNATE: TempoRange = TempoRange { min: 60.0, max: 140.0 };

    /// Non-finite input collapses to `min`.
    pub fn clamp(&self, bpm: f32) -> f32 {
        if bpm.is_nan() {
            return self.min;
        }
        bpm.clamp(self.min, self.max)
    }
}

/// Primary: hand further right → faster.  `40 + 140·x`, not rounded.
pub fn map_tempo_horizontal(x: f32) -> f32 {
    TempoRange::PRIMARY.clamp(40.0 + x * 140.0)
}

/// Ties go up: `-7.5` becomes `-7`, not `-8` as with [`f32::round`].
fn round_half_up(v: f32) -> f32 {
    (v + 0.5).floor()
}

/// Alternate: hand higher (smaller Y) → faster.  `round(60 + 80·(1 − y))`.
pub fn map_tempo_vertical(y: f32) -> f32 {
    TempoRange::ALTERNATE.clamp(round_half_up(60.0 + (1.0 - y) * 80.0))
}

/// Publish a new BPM only when it moves by more than one beat per minute,
/// so a hovering hand doesn't make the tempo flicker between neighbours.
pub fn with_hysteresis(current: f32, proposed: f32) -> f32 {
    if (current - proposed).abs() > 1.0 {
        proposed
    } else {
        current
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Volume
// ════════════════════════════════════════════════════════════════════════════

pub const LINEAR_VOLUME_MIN: f32 = 0.1;
pub const LINEAR_VOLUME_MAX: f32 = 1.0;
pub const DECIBEL_VOLUME_MIN: f32 = -30.0;
pub const DECIBEL_VOLUME_MAX: f32 = 0.0;

/// Output level, in whichever unit the active profile speaks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "unit", content = "value", rename_all = "lowercase")]
pub enum Volume {
    /// Linear amplitude in `[0.1, 1]`.
    Linear(f32),
    /// Attenuation in `[-30, 0]` dB.
    Decibels(f32),
}

impl Volume {
    /// Re-apply the unit's bounds.
    pub fn clamped(self) -> Volume {
        match self {
            Volume::Linear(v) => {
                Volume::Linear(nan_to(v, LINEAR_VOLUME_MIN).clamp(LINEAR_VOLUME_MIN, LINEAR_VOLUME_MAX))
            }
            Volume::Decibels(db) => Volume::Decibels(
                nan_to(db, DECIBEL_VOLUME_MIN).clamp(DECIBEL_VOLUME_MIN, DECIBEL_VOLUME_MAX),
            ),
        }
    }

    /// Linear amplitude, `0 < gain ≤ 1`.
    pub fn gain(&self) -> f32 {
        match self.clamped() {
            Volume::Linear(v) => v,
            Volume::Decibels(db) => 10f32.powf(db / 20.0),
        }
    }
}

fn nan_to(v: f32, fallback: f32) -> f32 {
    if v.is_nan() { fallback } else { v }
}

/// Primary: hand higher → louder.  `1 − y` in `[0.1, 1]`.
pub fn map_volume_linear(y: f32) -> Volume {
    Volume::Linear(1.0 - y).clamped()
}

/// Alternate: hand higher → louder.  `round(−30 + 30·(1 − y))` dB.
pub fn map_volume_db(y: f32) -> Volume {
    Volume::Decibels(round_half_up(-30.0 + (1.0 - y) * 30.0)).clamped()
}

// ════════════════════════════════════════════════════════════════════════════
// Play / pause
// ════════════════════════════════════════════════════════════════════════════

/// A transport change the mapper asks the playback controller for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Transport {
    Start,
    Stop,
}

/// Remembers whether we are playing and fires only on real transitions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayLatch {
    playing: bool,
}

impl PlayLatch {
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn observe(&mut self, gesture: GestureState) -> Option<Transport> {
        match (gesture, self.playing) {
            (GestureState::OpenHand, false) => {
                self.playing = true;
                Some(Transport::Start)
            }
            (GestureState::ClosedHand, true) => {
                self.playing = false;
                Some(Transport::Stop)
            }
            _ => None,
        }
    }

    /// Sync with a transport change made outside the gesture path.
    pub fn force(&mut self, playing: bool) {
        self.playing = playing;
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ControlParameters
// ════════════════════════════════════════════════════════════════════════════

/// The externally visible snapshot emitted after every processed frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlParameters {
    #[serde(rename = "tempoBPM")]
    pub tempo_bpm: f32,
    pub volume: Volume,
    pub is_playing: bool,
    pub hand_position: HandPosition,
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
