//! The per-frame pipeline: validate → classify/smooth (via the profile) →
//! map → drive the playback controller.
//!
//! Everything runs synchronously inside the frame callback.  The conductor
//! is the single writer of its state, so no locking is involved.

use std::time::Instant;

use log::{debug, error, warn};

use crate::classifier::GestureState;
use crate::controller::PlaybackController;
use crate::error::ConductorError;
use crate::landmark::HandObservation;
use crate::mapper::{with_hysteresis, ControlParameters, PlayLatch, TempoRange, Transport};
use crate::strategy::{GestureMappingStrategy, ProfileKind};

/// What happened while processing one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    pub gesture: GestureState,
    pub parameters: ControlParameters,
    pub downstroke: bool,
    pub transport: Option<Transport>,
    /// Hands discarded as malformed this frame.
    pub dropped: usize,
}

pub struct Conductor {
    strategy: Box<dyn GestureMappingStrategy>,
    latch: PlayLatch,
    params: ControlParameters,
    gesture: GestureState,
    /// While set, gesture-derived tempo is ignored and manual edits persist.
    decoupled: bool,
    failure: Option<ConductorError>,
}

impl Conductor {
    pub fn new(strategy: Box<dyn GestureMappingStrategy>) -> Self {
        let params = strategy.initial_parameters();
        Conductor {
            strategy,
            latch: PlayLatch::default(),
            params,
            gesture: GestureState::NoHandDetected,
            decoupled: false,
            failure: None,
        }
    }

    pub fn with_profile(kind: ProfileKind, alpha: f32) -> Result<Self, ConductorError> {
        Ok(Self::new(kind.build(alpha)?))
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn parameters(&self) -> ControlParameters { self.params }
    pub fn gesture(&self) -> GestureState        { self.gesture }
    pub fn profile_name(&self) -> &'static str    { self.strategy.name() }
    pub fn tempo_range(&self) -> TempoRange       { self.strategy.tempo_range() }
    pub fn is_playing(&self) -> bool              { self.latch.is_playing() }
    pub fn is_decoupled(&self) -> bool            { self.decoupled }
    pub fn failure(&self) -> Option<&ConductorError> { self.failure.as_ref() }

    // ── Frame processing ──────────────────────────────────────────────────

    pub fn process_frame(
        &mut self,
        hands: &[HandObservation],
        now: Instant,
        out: &mut dyn PlaybackController,
    ) -> FrameReport {
        if self.failure.is_some() {
            return self.report(false, None, 0);
        }

        let valid: Vec<HandObservation>;
        let mut dropped = 0;
        let hands = if hands.iter().all(|h| h.validate().is_ok()) {
            hands
        } else {
            valid = hands
                .iter()
                .filter(|h| match h.validate() {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("ignoring {} hand: {}", h.handedness, e);
                        dropped += 1;
                        false
                    }
                })
                .cloned()
                .collect();
            &valid
        };

        if hands.is_empty() {
            self.gesture = GestureState::NoHandDetected;
            return self.report(false, None, dropped);
        }

        let reading = self.strategy.read(hands, now);
        self.gesture = reading.gesture;

        if let Some(position) = reading.hand_position {
            self.params.hand_position = position;
        }
        if let Some(bpm) = reading.tempo.filter(|_| !self.decoupled) {
            let bpm = self.strategy.tempo_range().clamp(bpm);
            self.params.tempo_bpm = if self.strategy.tempo_hysteresis() {
                with_hysteresis(self.params.tempo_bpm, bpm)
            } else {
                bpm
            };
        }
        if let Some(volume) = reading.volume {
            self.params.volume = volume.clamped();
        }

        let transport = self.latch.observe(reading.gesture);
        match transport {
            Some(Transport::Start) => {
                debug!("{} → start at {:.1} BPM", reading.gesture, self.params.tempo_bpm);
                out.start();
            }
            Some(Transport::Stop) => {
                debug!("{} → stop", reading.gesture);
                out.stop();
            }
            None => {}
        }
        self.params.is_playing = self.latch.is_playing();

        if self.params.is_playing {
            out.set_tempo(self.params.tempo_bpm);
            out.set_volume(self.params.volume);
        }
        if reading.downstroke {
            debug!("downstroke");
            out.accent();
        }

        self.report(reading.downstroke, transport, dropped)
    }

    fn report(&self, downstroke: bool, transport: Option<Transport>, dropped: usize) -> FrameReport {
        FrameReport {
            gesture: self.gesture,
            parameters: self.params,
            downstroke,
            transport,
            dropped,
        }
    }

    // ── Manual controls ───────────────────────────────────────────────────

    /// Slider input.  Clamped exactly like the gesture path and applied at
    /// once; the next gesture frame overwrites it unless decoupled.
    pub fn override_tempo(&mut self, bpm: f32, out: &mut dyn PlaybackController) -> f32 {
        self.params.tempo_bpm = self.strategy.tempo_range().clamp(bpm);
        if self.params.is_playing {
            out.set_tempo(self.params.tempo_bpm);
        }
        self.params.tempo_bpm
    }

    pub fn set_decoupled(&mut self, decoupled: bool) {
        self.decoupled = decoupled;
    }

    /// The play/pause button.  Keeps the gesture latch in step so the next
    /// open or closed hand is judged against the new state.
    pub fn toggle_playback(&mut self, out: &mut dyn PlaybackController) -> Transport {
        if self.latch.is_playing() {
            out.stop();
            self.latch.force(false);
            self.params.is_playing = false;
            Transport::Stop
        } else {
            out.start();
            out.set_tempo(self.params.tempo_bpm);
            out.set_volume(self.params.volume);
            self.latch.force(true);
            self.params.is_playing = true;
            Transport::Start
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// The landmark source could not be acquired or died.  Playback stops,
    /// and frames are ignored until [`reset`](Self::reset).
    pub fn fail_source(&mut self, reason: ConductorError, out: &mut dyn PlaybackController) {
        error!("{}", reason);
        self.halt(out);
        self.failure = Some(reason);
    }

    /// Detection restart: stop playback, forget all smoothing state, and
    /// return to the profile's initial parameters.
    pub fn reset(&mut self, out: &mut dyn PlaybackController) {
        self.halt(out);
        self.strategy.reset();
        self.params = self.strategy.initial_parameters();
        self.failure = None;
    }

    fn halt(&mut self, out: &mut dyn PlaybackController) {
        if self.latch.is_playing() {
            out.stop();
        }
        self.latch.force(false);
        self.params.is_playing = false;
        self.gesture = GestureState::NoHandDetected;
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::HandPosition;
    use crate::controller::{CommandLog, PlaybackCommand};
    use crate::landmark::{Handedness, HandShape, INDEX_TIP};
    use crate::mapper::Volume;
    use crate::smoother::DEFAULT_ALPHA;
    use std::time::Duration;

    fn single() -> Conductor {
        Conductor::with_profile(ProfileKind::SingleHand, DEFAULT_ALPHA).unwrap()
    }

    fn two() -> Conductor {
        Conductor::with_profile(ProfileKind::TwoHand, DEFAULT_ALPHA).unwrap()
    }

    fn hand(shape: HandShape) -> HandObservation {
        HandObservation::posed(Handedness::Right, 0.5, 0.5, shape)
    }

    /// Feed frames 33 ms apart starting at `t0`.
    fn feed(c: &mut Conductor, log: &mut CommandLog, frames: &[Vec<HandObservation>]) -> Vec<FrameReport> {
        let t0 = Instant::now();
        frames
            .iter()
            .enumerate()
            .map(|(i, f)| c.process_frame(f, t0 + Duration::from_millis(33 * i as u64), log))
            .collect()
    }

    #[test]
    fn starts_and_stops_exactly_once() {
        let mut c = single();
        let mut log = CommandLog::new();
        let shapes = [HandShape::Other, HandShape::Open, HandShape::Open, HandShape::Open, HandShape::Closed];
        let frames: Vec<_> = shapes.iter().map(|s| vec![hand(*s)]).collect();
        let reports = feed(&mut c, &mut log, &frames);

        assert_eq!(log.count(PlaybackCommand::Start), 1);
        assert_eq!(log.count(PlaybackCommand::Stop), 1);
        let transports: Vec<_> = reports.iter().filter_map(|r| r.transport).collect();
        assert_eq!(transports, vec![Transport::Start, Transport::Stop]);
        assert!(!c.is_playing());
    }

    #[test]
    fn tempo_and_volume_follow_every_frame_while_playing() {
        let mut c = single();
        let mut log = CommandLog::new();
        let frames: Vec<_> = (0..4).map(|_| vec![hand(HandShape::Open)]).collect();
        feed(&mut c, &mut log, &frames);
        let tempos = log.commands.iter().filter(|c| matches!(c, PlaybackCommand::SetTempo(_))).count();
        let volumes = log.commands.iter().filter(|c| matches!(c, PlaybackCommand::SetVolume(_))).count();
        assert_eq!(tempos, 4);
        assert_eq!(volumes, 4);
        assert_eq!(log.commands[0], PlaybackCommand::Start);
    }

    #[test]
    fn parameters_update_while_stopped_without_commands() {
        let mut c = single();
        let mut log = CommandLog::new();
        let frame = vec![HandObservation::posed(Handedness::Right, 1.0, 0.0, HandShape::Other)];
        let r = c.process_frame(&frame, Instant::now(), &mut log);
        assert_eq!(r.parameters.tempo_bpm, 180.0);
        assert_eq!(r.parameters.volume, Volume::Linear(1.0));
        assert!(log.commands.is_empty());
    }

    #[test]
    fn floor_corner_end_to_end() {
        let mut c = single();
        let mut log = CommandLog::new();
        let frame = vec![HandObservation::posed(Handedness::Right, 0.0, 1.0, HandShape::Open)];
        let r = c.process_frame(&frame, Instant::now(), &mut log);
        assert_eq!(r.parameters.tempo_bpm, 40.0);
        assert_eq!(r.parameters.volume, Volume::Linear(0.1));
        assert_eq!(r.parameters.hand_position, HandPosition::new(0.0, 1.0));
        assert!(r.parameters.is_playing);
        assert_eq!(log.last_tempo(), Some(40.0));
    }

    #[test]
    fn no_hand_keeps_previous_parameters() {
        let mut c = single();
        let mut log = CommandLog::new();
        let reports = feed(&mut c, &mut log, &[vec![hand(HandShape::Open)], vec![]]);
        assert_eq!(reports[1].gesture, GestureState::NoHandDetected);
        assert_eq!(reports[1].parameters, reports[0].parameters);
        assert!(c.is_playing());
        assert_eq!(log.count(PlaybackCommand::Stop), 0);
    }

    #[test]
    fn malformed_hand_is_ignored_for_the_frame() {
        let mut c = single();
        let mut log = CommandLog::new();
        let mut bad = hand(HandShape::Open);
        bad.landmarks.truncate(5);
        let r = c.process_frame(&[bad], Instant::now(), &mut log);
        assert_eq!(r.gesture, GestureState::NoHandDetected);
        assert_eq!(r.dropped, 1);
        assert!(log.commands.is_empty());
    }

    #[test]
    fn malformed_hand_does_not_hide_a_good_one() {
        let mut c = single();
        let mut log = CommandLog::new();
        let mut bad = hand(HandShape::Closed);
        bad.landmarks[3].x = f32::NAN;
        let r = c.process_frame(&[bad, hand(HandShape::Open)], Instant::now(), &mut log);
        assert_eq!(r.gesture, GestureState::OpenHand);
        assert_eq!(r.dropped, 1);
    }

    #[test]
    fn two_hand_static_right_hand_yields_100_bpm() {
        let mut c = two();
        let mut log = CommandLog::new();
        let mut right = HandObservation::posed(Handedness::Right, 0.5, 0.5, HandShape::Closed);
        right.landmarks[INDEX_TIP].y = 0.5;
        let frames: Vec<_> = (0..3).map(|_| vec![right.clone()]).collect();
        let reports = feed(&mut c, &mut log, &frames);
        assert_eq!(reports[2].parameters.tempo_bpm, 100.0);
    }

    #[test]
    fn two_hand_hysteresis_holds_small_changes() {
        let mut c = two();
        let mut log = CommandLog::new();
        c.override_tempo(101.0, &mut log);
        let mut right = HandObservation::posed(Handedness::Right, 0.5, 0.5, HandShape::Closed);
        right.landmarks[INDEX_TIP].y = 0.5; // maps to 100
        let r = c.process_frame(&[right], Instant::now(), &mut log);
        assert_eq!(r.parameters.tempo_bpm, 101.0);
    }

    #[test]
    fn manual_override_is_clamped_like_gestures() {
        let mut c = single();
        let mut log = CommandLog::new();
        assert_eq!(c.override_tempo(500.0, &mut log), 180.0);
        assert_eq!(c.override_tempo(-3.0, &mut log), 40.0);
        assert!(log.commands.is_empty(), "nothing pushed while stopped");

        let mut c = two();
        assert_eq!(c.override_tempo(20.0, &mut log), 60.0);
    }

    #[test]
    fn manual_override_is_superseded_unless_decoupled() {
        let mut c = single();
        let mut log = CommandLog::new();
        let left_edge = vec![HandObservation::posed(Handedness::Right, 0.0, 0.5, HandShape::Other)];

        c.override_tempo(150.0, &mut log);
        let r = c.process_frame(&left_edge, Instant::now(), &mut log);
        assert_eq!(r.parameters.tempo_bpm, 40.0);

        c.set_decoupled(true);
        c.override_tempo(150.0, &mut log);
        let r = c.process_frame(&left_edge, Instant::now(), &mut log);
        assert_eq!(r.parameters.tempo_bpm, 150.0);
    }

    #[test]
    fn toggle_keeps_latch_in_sync() {
        let mut c = single();
        let mut log = CommandLog::new();
        assert_eq!(c.toggle_playback(&mut log), Transport::Start);
        // Open hand while already playing must not restart.
        c.process_frame(&[hand(HandShape::Open)], Instant::now(), &mut log);
        assert_eq!(log.count(PlaybackCommand::Start), 1);
        assert_eq!(c.toggle_playback(&mut log), Transport::Stop);
        assert!(!c.parameters().is_playing);
    }

    #[test]
    fn downstroke_becomes_accent() {
        let mut c = single();
        let mut log = CommandLog::new();
        let mut up = hand(HandShape::Other);
        up.landmarks[INDEX_TIP].y = 0.2;
        let mut down = hand(HandShape::Other);
        down.landmarks[INDEX_TIP].y = 0.5;
        let reports = feed(&mut c, &mut log, &[vec![up], vec![down]]);
        assert!(reports[1].downstroke);
        assert_eq!(log.count(PlaybackCommand::Accent), 1);
    }

    #[test]
    fn source_failure_stops_and_freezes() {
        let mut c = single();
        let mut log = CommandLog::new();
        c.process_frame(&[hand(HandShape::Open)], Instant::now(), &mut log);
        c.fail_source(ConductorError::SourceUnavailable("camera denied".into()), &mut log);

        assert_eq!(log.count(PlaybackCommand::Stop), 1);
        assert!(!c.parameters().is_playing);
        assert_eq!(c.gesture(), GestureState::NoHandDetected);
        assert!(c.failure().is_some());

        let r = c.process_frame(&[hand(HandShape::Open)], Instant::now(), &mut log);
        assert_eq!(r.gesture, GestureState::NoHandDetected);
        assert_eq!(log.count(PlaybackCommand::Start), 1);
    }

    #[test]
    fn reset_returns_to_initial_state() {
        let mut c = two();
        let mut log = CommandLog::new();
        c.process_frame(&[hand(HandShape::Open)], Instant::now(), &mut log);
        assert!(c.is_playing());
        c.reset(&mut log);
        assert!(!c.is_playing());
        assert_eq!(log.count(PlaybackCommand::Stop), 1);
        assert_eq!(c.parameters().tempo_bpm, 90.0);
        assert_eq!(c.parameters().volume, Volume::Decibels(0.0));
        assert!(c.failure().is_none());
    }
}
