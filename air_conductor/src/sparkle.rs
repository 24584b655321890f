//! The sparkle trail that follows the conducting hand.
//!
//! Sparkles are appended at the reported hand position and fade on a fixed
//! 100 ms decay tick, independent of the camera frame rate.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use gesture_core::HandPosition;

// ════════════════════════════════════════════════════════════════════════════
// Color palette
// ════════════════════════════════════════════════════════════════════════════

/// Gold when fresh, through coral to teal as the sparkle burns out.
pub fn sparkle_color(life: i32) -> u32 {
    let spent = 1.0 - (life as f32 / SPARKLE_LIFE as f32).clamp(0.0, 1.0);
    hsv_to_argb(50.0 - spent * 230.0, 0.75, 1.0)
}

/// Convert HSV → packed ARGB (0xAARRGGBB, A=0xFF).
fn hsv_to_argb(h: f32, s: f32, v: f32) -> u32 {
    let h  = h.rem_euclid(360.0);
    let hi = (h / 60.0) as u32;
    let f  = h / 60.0 - hi as f32;
    let p  = v * (1.0 - s);
    let q  = v * (1.0 - s * f);
    let t  = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match hi {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    let ri = (r * 255.0) as u32;
    let gi = (g * 255.0) as u32;
    let bi = (b * 255.0) as u32;
    0xFF000000 | (ri << 16) | (gi << 8) | bi
}

// ════════════════════════════════════════════════════════════════════════════
// Sparkle
// ════════════════════════════════════════════════════════════════════════════

pub const MAX_SPARKLES: usize = 20;
pub const SPARKLE_LIFE: i32 = 100;
pub const DECAY_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, PartialEq)]
pub struct Sparkle {
    /// Normalised frame coordinates.
    pub x:       f32,
    pub y:       f32,
    /// Diameter in pixels.
    pub size:    f32,
    pub opacity: f32,
    pub life:    i32,
}

// ════════════════════════════════════════════════════════════════════════════
// SparkleField
// ════════════════════════════════════════════════════════════════════════════

/// The most recent [`MAX_SPARKLES`] sparkles, oldest first.
#[derive(Debug, Default)]
pub struct SparkleField {
    sparkles: VecDeque<Sparkle>,
    spawned:  u32,
}

impl SparkleField {
    /// Drop a sparkle at the hand.  Positions on the top or left edge (the
    /// "no hand yet" origin included) leave no trail.
    pub fn push(&mut self, at: HandPosition) -> bool {
        if !(at.x > 0.0 && at.y > 0.0) {
            return false;
        }
        if self.sparkles.len() >= MAX_SPARKLES {
            self.sparkles.pop_front();
        }
        // Sizes cycle through 5–15 px so neighbours don't look stamped.
        let size = 5.0 + (self.spawned.wrapping_mul(7) % 11) as f32;
        self.spawned = self.spawned.wrapping_add(1);
        self.sparkles.push_back(Sparkle { x: at.x, y: at.y, size, opacity: 1.0, life: SPARKLE_LIFE });
        true
    }

    /// One decay step: fade, shrink, and drop the dead.
    pub fn decay(&mut self) {
        for s in &mut self.sparkles {
            s.opacity *= 0.95;
            s.life -= 5;
            s.size *= 0.98;
        }
        self.sparkles.retain(|s| s.life > 0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sparkle> {
        self.sparkles.iter()
    }

    pub fn len(&self) -> usize { self.sparkles.len() }
    pub fn is_empty(&self) -> bool { self.sparkles.is_empty() }

    pub fn clear(&mut self) {
        self.sparkles.clear();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// DecayTicker
// ════════════════════════════════════════════════════════════════════════════

/// Fixed-rate timer polled from the render loop.  Owning it is the
/// subscription; dropping it stops the decay.
#[derive(Clone, Debug)]
pub struct DecayTicker {
    interval: Duration,
    next:     Instant,
}

impl DecayTicker {
    pub fn new(now: Instant) -> Self {
        DecayTicker { interval: DECAY_INTERVAL, next: now + DECAY_INTERVAL }
    }

    /// How many intervals have elapsed since the last poll.  A stalled
    /// frame catches up instead of drifting.
    pub fn poll(&mut self, now: Instant) -> u32 {
        let mut fired = 0;
        while now >= self.next {
            self.next += self.interval;
            fired += 1;
        }
        fired
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
