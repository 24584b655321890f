//! Gesture mapping profiles.
//!
//! A profile decides which hand drives which parameter and which threshold
//! set classifies hand shape.  Two profiles ship:
//!
//! | Profile | Gesture | Tempo | Volume | Downstroke |
//! |---|---|---|---|---|
//! | [`SingleHandProfile`] (default) | wrist → index tip | wrist X, 40–180 BPM | wrist Y, linear 0.1–1 | index tip Y |
//! | [`TwoHandProfile`] | thumb ↔ index tip, every hand | right index Y, 60–140 BPM | left index Y, −30–0 dB | right index Y |
//!
//! Profiles own their smoothing state; [`GestureMappingStrategy::reset`]
//! clears it when detection restarts.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::classifier::{
    classify_thumb_index, classify_wrist_index, hand_position, GestureState, HandPosition,
};
use crate::error::ConductorError;
use crate::landmark::{HandObservation, Handedness};
use crate::mapper::{
    map_tempo_horizontal, map_tempo_vertical, map_volume_db, map_volume_linear,
    ControlParameters, TempoRange, Volume,
};
use crate::smoother::{AxisTracker, DownstrokeDetector, SmoothedSignal};

/// What a profile made of one frame.  `None` means "no opinion this frame".
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReading {
    pub gesture: GestureState,
    pub hand_position: Option<HandPosition>,
    pub tempo: Option<f32>,
    pub volume: Option<Volume>,
    pub downstroke: bool,
}

/// A selectable mapping from hands to musical parameters.
pub trait GestureMappingStrategy: Send {
    fn name(&self) -> &'static str;

    fn tempo_range(&self) -> TempoRange;

    /// Parameters before the first hand is seen.
    fn initial_parameters(&self) -> ControlParameters;

    /// Whether tempo updates should ignore changes of one BPM or less.
    fn tempo_hysteresis(&self) -> bool {
        false
    }

    /// `hands` is never empty and every hand has passed validation.
    fn read(&mut self, hands: &[HandObservation], now: Instant) -> FrameReading;

    fn reset(&mut self);
}

// ════════════════════════════════════════════════════════════════════════════
// SingleHandProfile
// ════════════════════════════════════════════════════════════════════════════

/// One hand drives everything: left/right for tempo, up/down for volume,
/// open/closed for play/pause.
#[derive(Clone, Debug)]
pub struct SingleHandProfile {
    x: SmoothedSignal,
    y: SmoothedSignal,
    strokes: DownstrokeDetector,
}

impl SingleHandProfile {
    pub fn new(alpha: f32) -> Result<Self, ConductorError> {
        Ok(SingleHandProfile {
            x: SmoothedSignal::new(alpha)?,
            y: SmoothedSignal::new(alpha)?,
            strokes: DownstrokeDetector::new(),
        })
    }
}

impl GestureMappingStrategy for SingleHandProfile {
    fn name(&self) -> &'static str {
        "Motion Melody"
    }

    fn tempo_range(&self) -> TempoRange {
        TempoRange::PRIMARY
    }

    fn initial_parameters(&self) -> ControlParameters {
        ControlParameters {
            tempo_bpm: 120.0,
            volume: Volume::Linear(0.5),
            is_playing: false,
            hand_position: HandPosition::default(),
        }
    }

    fn read(&mut self, hands: &[HandObservation], now: Instant) -> FrameReading {
        let hand = &hands[0];
        let position = hand_position(hand);
        let x = self.x.update(position.x);
        let y = self.y.update(position.y);
        FrameReading {
            gesture: classify_wrist_index(hand),
            hand_position: Some(position),
            tempo: Some(map_tempo_horizontal(x)),
            volume: Some(map_volume_linear(y)),
            downstroke: self.strokes.update(hand.index_tip().y, now),
        }
    }

    fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
        self.strokes.reset();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TwoHandProfile
// ════════════════════════════════════════════════════════════════════════════

/// Right hand conducts tempo and beats, left hand shapes dynamics.
#[derive(Clone, Debug)]
pub struct TwoHandProfile {
    right: AxisTracker,
    left: SmoothedSignal,
}

impl TwoHandProfile {
    pub fn new(alpha: f32) -> Result<Self, ConductorError> {
        Ok(TwoHandProfile { right: AxisTracker::new(alpha)?, left: SmoothedSignal::new(alpha)? })
    }
}

impl GestureMappingStrategy for TwoHandProfile {
    fn name(&self) -> &'static str {
        "Air-Conductor"
    }

    fn tempo_range(&self) -> TempoRange {
        TempoRange::ALTERNATE
    }

    fn initial_parameters(&self) -> ControlParameters {
        ControlParameters {
            tempo_bpm: 90.0,
            volume: Volume::Decibels(0.0),
            is_playing: false,
            hand_position: HandPosition::default(),
        }
    }

    fn tempo_hysteresis(&self) -> bool {
        true
    }

    fn read(&mut self, hands: &[HandObservation], now: Instant) -> FrameReading {
        let right = hands.iter().find(|h| h.handedness == Handedness::Right);
        let left = hands.iter().find(|h| h.handedness == Handedness::Left);

        let mut reading = FrameReading {
            gesture: unanimous(hands.iter().map(classify_thumb_index)),
            hand_position: right.or(left).map(hand_position),
            tempo: None,
            volume: None,
            downstroke: false,
        };

        if let Some(hand) = right {
            let (y, stroke) = self.right.update(hand.index_tip().y, now);
            reading.tempo = Some(map_tempo_vertical(y));
            reading.downstroke = stroke;
        }
        if let Some(hand) = left {
            let y = self.left.update(hand.index_tip().y);
            reading.volume = Some(map_volume_db(y));
        }
        reading
    }

    fn reset(&mut self) {
        self.right.reset();
        self.left.reset();
    }
}

/// All hands agree → that gesture; any disagreement → `Other`.
fn unanimous(mut gestures: impl Iterator<Item = GestureState>) -> GestureState {
    let first = match gestures.next() {
        Some(g) => g,
        None => return GestureState::NoHandDetected,
    };
    if gestures.all(|g| g == first) {
        first
    } else {
        GestureState::Other
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ProfileKind
// ════════════════════════════════════════════════════════════════════════════

/// Names a profile in settings files and on the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileKind {
    #[default]
    SingleHand,
    TwoHand,
}

impl ProfileKind {
    pub fn build(self, alpha: f32) -> Result<Box<dyn GestureMappingStrategy>, ConductorError> {
        Ok(match self {
            ProfileKind::SingleHand => Box::new(SingleHandProfile::new(alpha)?),
            ProfileKind::TwoHand => Box::new(TwoHandProfile::new(alpha)?),
        })
    }
}

impl FromStr for ProfileKind {
    type Err = ConductorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single-hand" | "single" | "primary" => Ok(ProfileKind::SingleHand),
            "two-hand" | "two" | "alternate" => Ok(ProfileKind::TwoHand),
            _ => Err(ConductorError::UnknownProfile(s.to_string())),
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileKind::SingleHand => f.write_str("single-hand"),
            ProfileKind::TwoHand => f.write_str("two-hand"),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::{HandShape, Landmark, INDEX_TIP};
    use crate::smoother::DEFAULT_ALPHA;
    use float_cmp::approx_eq;
    use std::time::Duration;

    fn single() -> SingleHandProfile {
        SingleHandProfile::new(DEFAULT_ALPHA).unwrap()
    }

    fn two() -> TwoHandProfile {
        TwoHandProfile::new(DEFAULT_ALPHA).unwrap()
    }

    fn right_index_at(y: f32, shape: HandShape) -> HandObservation {
        let mut hand = HandObservation::posed(Handedness::Right, 0.5, 0.5, shape);
        hand.landmarks[INDEX_TIP].y = y;
        hand
    }

    #[test]
    fn single_hand_floor_corner() {
        let hand = HandObservation::posed(Handedness::Right, 0.0, 1.0, HandShape::Open);
        let r = single().read(&[hand], Instant::now());
        assert_eq!(r.tempo, Some(40.0));
        assert_eq!(r.volume, Some(Volume::Linear(0.1)));
        assert_eq!(r.hand_position, Some(HandPosition::new(0.0, 1.0)));
        assert_eq!(r.gesture, GestureState::OpenHand);
    }

    #[test]
    fn single_hand_ceiling_corner() {
        let hand = HandObservation::posed(Handedness::Left, 1.0, 0.0, HandShape::Closed);
        let r = single().read(&[hand], Instant::now());
        assert_eq!(r.tempo, Some(180.0));
        assert_eq!(r.volume, Some(Volume::Linear(1.0)));
        assert_eq!(r.gesture, GestureState::ClosedHand);
    }

    #[test]
    fn single_hand_smooths_position_not_reported_position() {
        let mut p = single();
        let t0 = Instant::now();
        p.read(&[HandObservation::posed(Handedness::Right, 0.0, 0.5, HandShape::Other)], t0);
        let r = p.read(
            &[HandObservation::posed(Handedness::Right, 1.0, 0.5, HandShape::Other)],
            t0 + Duration::from_millis(33),
        );
        // smoothed x = 0.15 → 40 + 21
        assert!(approx_eq!(f32, r.tempo.unwrap(), 61.0, epsilon = 1e-3));
        assert_eq!(r.hand_position, Some(HandPosition::new(1.0, 0.5)));
    }

    #[test]
    fn single_hand_uses_first_hand_only() {
        let a = HandObservation::posed(Handedness::Right, 0.0, 0.0, HandShape::Open);
        let b = HandObservation::posed(Handedness::Left, 1.0, 1.0, HandShape::Closed);
        let r = single().read(&[a, b], Instant::now());
        assert_eq!(r.gesture, GestureState::OpenHand);
        assert_eq!(r.tempo, Some(40.0));
    }

    #[test]
    fn two_hand_static_right_hand_maps_to_100_bpm() {
        let mut p = two();
        let t0 = Instant::now();
        let mut last = None;
        for i in 0..3 {
            let hand = right_index_at(0.5, HandShape::Open);
            last = p.read(&[hand], t0 + Duration::from_millis(33 * i)).tempo;
        }
        assert_eq!(last, Some(100.0));
    }

    #[test]
    fn two_hand_left_hand_drives_decibels_only() {
        let mut hand = HandObservation::posed(Handedness::Left, 0.5, 0.5, HandShape::Open);
        hand.landmarks[INDEX_TIP] = Landmark::new(0.5, 0.0);
        let r = two().read(&[hand], Instant::now());
        assert_eq!(r.volume, Some(Volume::Decibels(0.0)));
        assert_eq!(r.tempo, None);
        assert!(!r.downstroke);
    }

    #[test]
    fn two_hand_gesture_needs_agreement() {
        let open = |h| HandObservation::posed(h, 0.3, 0.3, HandShape::Open);
        let closed = |h| HandObservation::posed(h, 0.7, 0.7, HandShape::Closed);
        let now = Instant::now();

        let both_open = [open(Handedness::Right), open(Handedness::Left)];
        assert_eq!(two().read(&both_open, now).gesture, GestureState::OpenHand);

        let both_closed = [closed(Handedness::Right), closed(Handedness::Left)];
        assert_eq!(two().read(&both_closed, now).gesture, GestureState::ClosedHand);

        let mixed = [open(Handedness::Right), closed(Handedness::Left)];
        assert_eq!(two().read(&mixed, now).gesture, GestureState::Other);
    }

    #[test]
    fn two_hand_downstroke_from_right_index() {
        let mut p = two();
        let t0 = Instant::now();
        assert!(!p.read(&[right_index_at(0.3, HandShape::Open)], t0).downstroke);
        let r = p.read(&[right_index_at(0.4, HandShape::Open)], t0 + Duration::from_millis(33));
        assert!(r.downstroke);
    }

    #[test]
    fn reset_reseeds_smoothing() {
        let mut p = two();
        let t0 = Instant::now();
        p.read(&[right_index_at(0.0, HandShape::Open)], t0);
        p.reset();
        let r = p.read(&[right_index_at(1.0, HandShape::Open)], t0 + Duration::from_millis(33));
        assert_eq!(r.tempo, Some(60.0));
        assert!(!r.downstroke);
    }

    #[test]
    fn profile_kind_names() {
        assert_eq!("two-hand".parse::<ProfileKind>(), Ok(ProfileKind::TwoHand));
        assert_eq!("Single-Hand".parse::<ProfileKind>(), Ok(ProfileKind::SingleHand));
        assert!("three-hand".parse::<ProfileKind>().is_err());
        assert_eq!(ProfileKind::TwoHand.to_string(), "two-hand");
    }

    #[test]
    fn built_profiles_report_their_ranges() {
        let p = ProfileKind::SingleHand.build(DEFAULT_ALPHA).unwrap();
        assert_eq!(p.tempo_range(), TempoRange::PRIMARY);
        let p = ProfileKind::TwoHand.build(DEFAULT_ALPHA).unwrap();
        assert_eq!(p.tempo_range(), TempoRange::ALTERNATE);
        assert!(ProfileKind::TwoHand.build(1.5).is_err());
    }
}
