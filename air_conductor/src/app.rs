//! Top-level application state machine.
//!
//! `AppState` owns the `Conductor`, the playback controller, the landmark
//! source and the sparkle trail.  It turns `SourceEvent`s and key presses into
//! conductor calls and hands the visualizer a `Scene` each frame.

use std::sync::mpsc;
use std::time::Instant;

use log::{info, warn};

use gesture_core::{Conductor, ConductorError, GestureState, PlaybackController, Transport};

use crate::config::AppConfig;
use crate::player::Player;
use crate::source::{spawn_source, DetectorSource, SimInput, SimLandmarkSource, SourceEvent, SourceHandle};
use crate::sparkle::{DecayTicker, SparkleField};
use crate::visualizer::{KeyAction, Scene, Visualizer};

/// BPM added or removed per `+` / `-` press.
pub const TEMPO_STEP: f32 = 5.0;

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

pub struct AppState<P: PlaybackController = Player> {
    // ── core ─────────────────────────────────────────────────────────────
    conductor: Conductor,
    player:    P,

    // ── input ────────────────────────────────────────────────────────────
    source:      Option<SourceHandle>,
    source_name: String,

    // ── feedback ─────────────────────────────────────────────────────────
    sparkles: SparkleField,
    ticker:   DecayTicker,
    pub status: String,
}

impl<P: PlaybackController> AppState<P> {
    pub fn new(conductor: Conductor, player: P, now: Instant) -> Self {
        let status = format!(
            "Ready ({} profile): show an open hand to start",
            conductor.profile_name()
        );
        AppState {
            conductor,
            player,
            source: None,
            source_name: "none".to_string(),
            sparkles: SparkleField::default(),
            ticker: DecayTicker::new(now),
            status,
        }
    }

    /// Replace the landmark source.  The old one, if any, is stopped and
    /// the conductor starts over from its initial parameters.
    pub fn attach_source(&mut self, source: SourceHandle) {
        if self.source.is_some() {
            self.conductor.reset(&mut self.player);
            self.sparkles.clear();
            self.status = format!("Detection restarted ({})", source.name());
        }
        self.source_name = source.name().to_string();
        self.source = Some(source);
    }

    // ── source events ────────────────────────────────────────────────────

    /// Process everything the source has queued.
    pub fn pump_source(&mut self, now: Instant) {
        let events = match &self.source {
            Some(source) => source.drain(),
            None => return,
        };
        for event in events {
            self.handle_source_event(event, now);
        }
    }

    pub fn handle_source_event(&mut self, event: SourceEvent, now: Instant) {
        match event {
            SourceEvent::Frame(hands) => {
                if self.conductor.failure().is_some() {
                    return;
                }
                let report = self.conductor.process_frame(&hands, now, &mut self.player);
                if report.gesture != GestureState::NoHandDetected {
                    self.sparkles.push(report.parameters.hand_position);
                }
                if report.dropped > 0 {
                    warn!("{} malformed hand(s) ignored", report.dropped);
                }
                match report.transport {
                    Some(Transport::Start) => {
                        self.status = format!("{}: playing at {:.0} BPM", report.gesture, report.parameters.tempo_bpm);
                    }
                    Some(Transport::Stop) => {
                        self.status = format!("{}: stopped", report.gesture);
                    }
                    None => {}
                }
            }
            SourceEvent::Failed(reason) => {
                let err = ConductorError::SourceUnavailable(reason);
                self.status = format!("{}  (press R to retry)", err);
                self.conductor.fail_source(err, &mut self.player);
            }
            SourceEvent::Closed => {
                if self.conductor.failure().is_some() {
                    return;
                }
                info!("source {} closed", self.source_name);
                let err = ConductorError::SourceUnavailable(format!("{} closed", self.source_name));
                self.status = format!("{}  (press R to restart)", err);
                self.conductor.fail_source(err, &mut self.player);
            }
        }
    }

    // ── keys ─────────────────────────────────────────────────────────────

    /// Returns false when the app should quit.  `RestartDetection` needs a
    /// new source and is handled by the caller through [`attach_source`].
    ///
    /// [`attach_source`]: Self::attach_source
    pub fn handle_key(&mut self, action: KeyAction) -> bool {
        match action {
            KeyAction::Quit => return false,
            KeyAction::TogglePlayback => {
                if self.conductor.failure().is_some() {
                    self.status = "No landmark source; press R to restart detection".to_string();
                    return true;
                }
                self.status = match self.conductor.toggle_playback(&mut self.player) {
                    Transport::Start => "Playback started".to_string(),
                    Transport::Stop => "Playback stopped".to_string(),
                };
            }
            KeyAction::TempoUp | KeyAction::TempoDown => {
                let step = if action == KeyAction::TempoUp { TEMPO_STEP } else { -TEMPO_STEP };
                let bpm = self.conductor.parameters().tempo_bpm + step;
                let bpm = self.conductor.override_tempo(bpm, &mut self.player);
                self.status = format!("Tempo set to {:.0} BPM", bpm);
            }
            KeyAction::ToggleDecouple => {
                let decoupled = !self.conductor.is_decoupled();
                self.conductor.set_decoupled(decoupled);
                self.status = if decoupled {
                    "Manual tempo: hand position no longer changes tempo".to_string()
                } else {
                    "Gesture tempo: hand position drives tempo".to_string()
                };
            }
            KeyAction::RestartDetection => {}
        }
        true
    }

    // ── per-frame tick ───────────────────────────────────────────────────

    pub fn tick(&mut self, now: Instant) {
        for _ in 0..self.ticker.poll(now) {
            self.sparkles.decay();
        }
    }

    // ── accessors for the render loop ────────────────────────────────────

    pub fn conductor(&self) -> &Conductor     { &self.conductor }
    pub fn player(&self) -> &P                { &self.player }
    pub fn sparkles(&self) -> &SparkleField   { &self.sparkles }

    pub fn scene(&self) -> Scene<'_> {
        Scene {
            params:      self.conductor.parameters(),
            gesture:     self.conductor.gesture(),
            tempo_range: self.conductor.tempo_range(),
            sparkles:    &self.sparkles,
            profile:     self.conductor.profile_name(),
            source:      &self.source_name,
            status:      &self.status,
            decoupled:   self.conductor.is_decoupled(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Source selection
// ════════════════════════════════════════════════════════════════════════════

/// Start the configured landmark source: the external detector if one is
/// set, else LeapMotion hardware (`leap` feature), else the pointer
/// simulator wired to the window.
fn start_source(cfg: &AppConfig, vis: &mut Visualizer) -> SourceHandle {
    if let Some(command) = &cfg.detector {
        vis.set_sim_sender(None);
        return spawn_source(DetectorSource::new(command.clone(), cfg.min_confidence));
    }
    start_local_source(vis)
}

#[cfg(feature = "leap")]
fn start_local_source(vis: &mut Visualizer) -> SourceHandle {
    vis.set_sim_sender(None);
    spawn_source(crate::source::LeapLandmarkSource)
}

#[cfg(not(feature = "leap"))]
fn start_local_source(vis: &mut Visualizer) -> SourceHandle {
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    vis.set_sim_sender(Some(sim_tx));
    spawn_source(SimLandmarkSource::new(sim_rx))
}

// ════════════════════════════════════════════════════════════════════════════
// run() — the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the interactive application until the window closes or `Q` is hit.
pub fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let conductor = Conductor::with_profile(cfg.profile, cfg.alpha)?;
    let player = Player::spawn(cfg.arrangement(), cfg.midi_port.clone());
    let mut vis = Visualizer::new(cfg.window_scale)?;

    let mut app = AppState::new(conductor, player, Instant::now());
    app.attach_source(start_source(&cfg, &mut vis));

    while vis.is_open() {
        // 1. Keys and pointer
        for action in vis.poll_input() {
            if action == KeyAction::RestartDetection {
                info!("restarting detection");
                app.attach_source(start_source(&cfg, &mut vis));
            } else if !app.handle_key(action) {
                return Ok(());
            }
        }

        // 2. Landmark frames → conductor → player
        let now = Instant::now();
        app.pump_source(now);

        // 3. Sparkle decay
        app.tick(now);

        // 4. Render
        vis.render(&app.scene());
    }

    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use gesture_core::{
        CommandLog, HandObservation, HandShape, Handedness, PlaybackCommand, ProfileKind, DEFAULT_ALPHA,
    };
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;

    fn make_app(kind: ProfileKind) -> (AppState<CommandLog>, Instant) {
        let now = Instant::now();
        let conductor = Conductor::with_profile(kind, DEFAULT_ALPHA).unwrap();
        (AppState::new(conductor, CommandLog::new(), now), now)
    }

    fn frame(shape: HandShape, x: f32, y: f32) -> SourceEvent {
        SourceEvent::Frame(vec![HandObservation::posed(Handedness::Right, x, y, shape)])
    }

    /// A source that emits nothing and exits when asked.
    struct Idle;
    impl crate::source::LandmarkSource for Idle {
        fn name(&self) -> String { "idle".to_string() }
        fn run(self: Box<Self>, _tx: mpsc::Sender<SourceEvent>, stop: Arc<AtomicBool>) {
            while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
    }

    #[test]
    fn open_hand_starts_and_leaves_a_sparkle() {
        let (mut app, now) = make_app(ProfileKind::SingleHand);
        app.handle_source_event(frame(HandShape::Open, 0.5, 0.5), now);
        assert_eq!(app.player().count(PlaybackCommand::Start), 1);
        assert!(app.conductor().is_playing());
        assert_eq!(app.sparkles().len(), 1);
        assert!(app.status.contains("playing"));
    }

    #[test]
    fn empty_frame_leaves_no_sparkle() {
        let (mut app, now) = make_app(ProfileKind::SingleHand);
        app.handle_source_event(SourceEvent::Frame(Vec::new()), now);
        assert!(app.sparkles().is_empty());
        assert!(app.player().commands.is_empty());
    }

    #[test]
    fn closed_hand_stops() {
        let (mut app, now) = make_app(ProfileKind::SingleHand);
        app.handle_source_event(frame(HandShape::Open, 0.5, 0.5), now);
        app.handle_source_event(frame(HandShape::Closed, 0.5, 0.5), now + Duration::from_millis(33));
        assert_eq!(app.player().count(PlaybackCommand::Stop), 1);
        assert!(!app.conductor().is_playing());
        assert!(app.status.contains("stopped"));
    }

    #[test]
    fn source_failure_halts_and_ignores_later_frames() {
        let (mut app, now) = make_app(ProfileKind::SingleHand);
        app.handle_source_event(frame(HandShape::Open, 0.5, 0.5), now);
        app.handle_source_event(SourceEvent::Failed("camera permission denied".into()), now);
        assert_eq!(app.player().count(PlaybackCommand::Stop), 1);
        assert!(app.status.contains("camera permission denied"));

        let before = app.player().commands.len();
        app.handle_source_event(frame(HandShape::Open, 0.9, 0.1), now + Duration::from_millis(33));
        assert_eq!(app.player().commands.len(), before);
        assert!(!app.conductor().is_playing());
    }

    #[test]
    fn space_is_refused_while_failed() {
        let (mut app, now) = make_app(ProfileKind::SingleHand);
        app.handle_source_event(SourceEvent::Closed, now);
        assert!(app.handle_key(KeyAction::TogglePlayback));
        assert_eq!(app.player().count(PlaybackCommand::Start), 0);
    }

    #[test]
    fn space_toggles_playback() {
        let (mut app, _) = make_app(ProfileKind::SingleHand);
        assert!(app.handle_key(KeyAction::TogglePlayback));
        assert_eq!(app.player().count(PlaybackCommand::Start), 1);
        assert_eq!(app.player().last_tempo(), Some(120.0));
        app.handle_key(KeyAction::TogglePlayback);
        assert_eq!(app.player().count(PlaybackCommand::Stop), 1);
    }

    #[test]
    fn plus_and_minus_step_the_tempo() {
        let (mut app, _) = make_app(ProfileKind::TwoHand);
        app.handle_key(KeyAction::TempoUp);
        assert_eq!(app.conductor().parameters().tempo_bpm, 95.0);
        for _ in 0..20 {
            app.handle_key(KeyAction::TempoDown);
        }
        assert_eq!(app.conductor().parameters().tempo_bpm, 60.0);
        // Stopped, so nothing was pushed to the player.
        assert!(app.player().commands.is_empty());
    }

    #[test]
    fn m_toggles_decoupling() {
        let (mut app, _) = make_app(ProfileKind::SingleHand);
        app.handle_key(KeyAction::ToggleDecouple);
        assert!(app.conductor().is_decoupled());
        app.handle_key(KeyAction::ToggleDecouple);
        assert!(!app.conductor().is_decoupled());
    }

    #[test]
    fn q_quits() {
        let (mut app, _) = make_app(ProfileKind::SingleHand);
        assert!(!app.handle_key(KeyAction::Quit));
    }

    #[test]
    fn sparkles_decay_on_the_ticker() {
        let (mut app, now) = make_app(ProfileKind::SingleHand);
        app.handle_source_event(frame(HandShape::Other, 0.5, 0.5), now);
        assert_eq!(app.sparkles().len(), 1);
        app.tick(now + Duration::from_millis(100));
        assert_eq!(app.sparkles().iter().next().map(|s| s.life), Some(95));
        app.tick(now + Duration::from_secs(3));
        assert!(app.sparkles().is_empty());
    }

    #[test]
    fn restart_resets_the_conductor() {
        let (mut app, now) = make_app(ProfileKind::TwoHand);
        app.attach_source(spawn_source(Idle));
        app.handle_key(KeyAction::TogglePlayback);
        app.handle_key(KeyAction::TempoUp);
        app.handle_source_event(SourceEvent::Failed("device busy".into()), now);
        assert!(app.conductor().failure().is_some());

        app.attach_source(spawn_source(Idle));
        assert!(app.conductor().failure().is_none());
        assert_eq!(app.conductor().parameters().tempo_bpm, 90.0);
        assert!(app.sparkles().is_empty());
        assert!(app.status.contains("restarted"));
        assert_eq!(app.scene().source, "idle");
    }
}
