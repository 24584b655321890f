//! Gesture classification from a single hand's landmarks.
//!
//! Two threshold sets exist.  The primary one measures how far the index
//! fingertip reaches from the wrist; the alternate one measures the gap
//! between thumb tip and index tip.  Both are empirically fixed.

use std::fmt;

use serde::Serialize;

use crate::landmark::{HandObservation, INDEX_TIP, THUMB_TIP, WRIST};

/// Wrist → index tip distance above which the hand counts as open.
pub const OPEN_REACH: f32 = 0.30;
/// Wrist → index tip distance below which the hand counts as closed.
pub const CLOSED_REACH: f32 = 0.15;
/// Thumb tip → index tip distance above which the hand counts as open
/// (alternate, two-hand profile).
pub const PINCH_OPEN: f32 = 0.12;

/// Discrete hand-shape classification for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum GestureState {
    OpenHand,
    ClosedHand,
    Other,
    #[default]
    NoHandDetected,
}

impl fmt::Display for GestureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GestureState::OpenHand       => "Open Hand",
            GestureState::ClosedHand     => "Closed Hand",
            GestureState::Other          => "Other Gesture",
            GestureState::NoHandDetected => "No gesture detected",
        };
        f.write_str(label)
    }
}

/// Representative position of a hand: its wrist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct HandPosition {
    pub x: f32,
    pub y: f32,
}

impl HandPosition {
    pub fn new(x: f32, y: f32) -> Self {
        HandPosition { x, y }
    }
}

pub fn hand_position(hand: &HandObservation) -> HandPosition {
    let wrist = hand.wrist();
    HandPosition::new(wrist.x, wrist.y)
}

/// Primary classifier.  Exactly `0.15` and exactly `0.30` are both `Other`.
pub fn classify_wrist_index(hand: &HandObservation) -> GestureState {
    classify_reach(hand.distance(WRIST, INDEX_TIP))
}

pub fn classify_reach(d: f32) -> GestureState {
    if d > OPEN_REACH {
        GestureState::OpenHand
    } else if d < CLOSED_REACH {
        GestureState::ClosedHand
    } else {
        GestureState::Other
    }
}

/// Alternate classifier: binary, never `Other`.  Exactly `0.12` is closed.
pub fn classify_thumb_index(hand: &HandObservation) -> GestureState {
    classify_pinch(hand.distance(THUMB_TIP, INDEX_TIP))
}

pub fn classify_pinch(d: f32) -> GestureState {
    if d > PINCH_OPEN {
        GestureState::OpenHand
    } else {
        GestureState::ClosedHand
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
