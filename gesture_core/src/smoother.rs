//! Jitter suppression and conducting-stroke detection.
//!
//! [`SmoothedSignal`] is a single-pole low-pass filter over one axis.
//! [`DownstrokeDetector`] turns sharp downward motion into debounced pulses.
//! Both are plain owned state: the strategy that owns them feeds one sample
//! per frame and calls `reset()` when detection restarts.

use std::time::{Duration, Instant};

use crate::error::ConductorError;

/// Weight kept on the previous smoothed value (15% goes to the new sample).
pub const DEFAULT_ALPHA: f32 = 0.85;

/// Frame-to-frame Y change (normalised units) below which a downstroke fires.
/// Negative because Y grows downward in image space.
pub const DOWNSTROKE_VELOCITY: f32 = -0.03;

/// Minimum real time between two downstroke events.
pub const DOWNSTROKE_DEBOUNCE: Duration = Duration::from_millis(200);

// ════════════════════════════════════════════════════════════════════════════
// SmoothedSignal
// ════════════════════════════════════════════════════════════════════════════

/// Exponential moving average, seeded from its first sample.
#[derive(Clone, Debug, PartialEq)]
pub struct SmoothedSignal {
    alpha: f32,
    value: Option<f32>,
}

impl SmoothedSignal {
    pub fn new(alpha: f32) -> Result<Self, ConductorError> {
        if !(0.0..1.0).contains(&alpha) {
            return Err(ConductorError::InvalidSmoothing(alpha));
        }
        Ok(SmoothedSignal { alpha, value: None })
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Feed one raw sample and return the new smoothed value.
    pub fn update(&mut self, raw: f32) -> f32 {
        let next = match self.value {
            None => raw,
            Some(prev) => prev * self.alpha + raw * (1.0 - self.alpha),
        };
        self.value = Some(next);
        next
    }

    /// `None` until the first sample arrives.
    pub fn value(&self) -> Option<f32> {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

impl Default for SmoothedSignal {
    fn default() -> Self {
        SmoothedSignal { alpha: DEFAULT_ALPHA, value: None }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// DownstrokeDetector
// ════════════════════════════════════════════════════════════════════════════

/// Velocity-threshold detector with a real-time debounce.
#[derive(Clone, Debug, Default)]
pub struct DownstrokeDetector {
    prev_y: Option<f32>,
    last_fired: Option<Instant>,
}

impl DownstrokeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the raw Y of the tracked landmark at time `now`.  Returns true
    /// when a downstroke fires.
    pub fn update(&mut self, y: f32, now: Instant) -> bool {
        let velocity = match self.prev_y.replace(y) {
            Some(prev) => prev - y,
            None => return false,
        };
        if velocity >= DOWNSTROKE_VELOCITY {
            return false;
        }
        let debounced = match self.last_fired {
            Some(t) => now.saturating_duration_since(t) >= DOWNSTROKE_DEBOUNCE,
            None => true,
        };
        if debounced {
            self.last_fired = Some(now);
        }
        debounced
    }

    pub fn reset(&mut self) {
        self.prev_y = None;
        self.last_fired = None;
    }
}

// ════════════════════════════════════════════════════════════════════════════
// AxisTracker
// ════════════════════════════════════════════════════════════════════════════

/// The per-hand bundle both profiles use: a smoothed vertical signal plus
/// downstroke detection on the same landmark.
#[derive(Clone, Debug)]
pub struct AxisTracker {
    pub y: SmoothedSignal,
    pub strokes: DownstrokeDetector,
}

impl AxisTracker {
    pub fn new(alpha: f32) -> Result<Self, ConductorError> {
        Ok(AxisTracker { y: SmoothedSignal::new(alpha)?, strokes: DownstrokeDetector::new() })
    }

    /// Returns `(smoothed_y, downstroke_fired)`.
    pub fn update(&mut self, raw_y: f32, now: Instant) -> (f32, bool) {
        (self.y.update(raw_y), self.strokes.update(raw_y, now))
    }

    pub fn reset(&mut self) {
        self.y.reset();
        self.strokes.reset();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
