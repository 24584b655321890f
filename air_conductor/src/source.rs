//! Landmark sources: where hands come from.
//!
//! The public interface is [`SourceEvent`] delivered over a `mpsc` channel.
//! Consumers don't need to know whether frames came from the simulator, an
//! external detector process, or LeapMotion hardware.

use std::io::{self, BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;

use gesture_core::{HandObservation, HandShape, Handedness, Landmark};

// ════════════════════════════════════════════════════════════════════════════
// SourceEvent
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum SourceEvent {
    /// One camera frame.  Empty when no hand is visible.
    Frame(Vec<HandObservation>),
    /// The source could not be acquired or stopped working.
    Failed(String),
    /// The source ran out of input.
    Closed,
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkSource trait — unified interface for every backend
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver [`SourceEvent`]s over a channel.
///
/// `run` must return promptly once `stop` is set, releasing whatever device
/// or process it holds.  A source whose `run` can block in a read should
/// hand out a [`Shutdown`] that unblocks it.
pub trait LandmarkSource: Send + 'static {
    fn name(&self) -> String;
    fn run(self: Box<Self>, tx: Sender<SourceEvent>, stop: Arc<AtomicBool>);

    fn shutdown(&self) -> Option<Shutdown> {
        None
    }
}

/// Run by [`SourceHandle`] on drop, after the stop flag is set.
pub type Shutdown = Box<dyn FnOnce() + Send>;

// ════════════════════════════════════════════════════════════════════════════
// Spawn helper
// ════════════════════════════════════════════════════════════════════════════

/// Receiving end of a running source.  Dropping it asks the source thread
/// to stop and runs the source's [`Shutdown`], if any.
pub struct SourceHandle {
    name:     String,
    rx:       Receiver<SourceEvent>,
    stop:     Arc<AtomicBool>,
    shutdown: Option<Shutdown>,
}

impl SourceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pending events, oldest first.  A vanished source thread reads as
    /// [`SourceEvent::Closed`].
    pub fn drain(&self) -> Vec<SourceEvent> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => out.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    out.push(SourceEvent::Closed);
                    break;
                }
            }
        }
        out
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(shutdown) = self.shutdown.take() {
            shutdown();
        }
        debug!("stopping source {}", self.name);
    }
}

/// Spawn a landmark source on its own thread.
pub fn spawn_source<S: LandmarkSource>(source: S) -> SourceHandle {
    let (tx, rx) = mpsc::channel();
    let stop = Arc::new(AtomicBool::new(false));
    let name = source.name();
    let shutdown = source.shutdown();
    info!("starting source {}", name);

    let flag = Arc::clone(&stop);
    thread::spawn(move || Box::new(source).run(tx, flag));
    SourceHandle { name, rx, stop, shutdown }
}

// ════════════════════════════════════════════════════════════════════════════
// SimLandmarkSource — pointer/keyboard simulation (always available)
// ════════════════════════════════════════════════════════════════════════════

/// Raw input event from the simulation window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimInput {
    /// Pointer moved, in normalised frame coordinates.
    Pointer { x: f32, y: f32 },
    Shape(HandShape),
    /// Toggle whether the simulated hand is in view.
    ToggleVisible,
    /// Toggle a mirrored left hand next to the right one.
    ToggleLeftHand,
}

/// What the simulated camera currently sees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimState {
    pub x:         f32,
    pub y:         f32,
    pub shape:     HandShape,
    pub visible:   bool,
    pub left_hand: bool,
}

impl Default for SimState {
    fn default() -> Self {
        SimState { x: 0.5, y: 0.5, shape: HandShape::Other, visible: true, left_hand: false }
    }
}

impl SimState {
    pub fn apply(&mut self, input: SimInput) {
        match input {
            SimInput::Pointer { x, y } => {
                self.x = x.clamp(0.0, 1.0);
                self.y = y.clamp(0.0, 1.0);
            }
            SimInput::Shape(shape) => self.shape = shape,
            SimInput::ToggleVisible => self.visible = !self.visible,
            SimInput::ToggleLeftHand => self.left_hand = !self.left_hand,
        }
    }

    pub fn hands(&self) -> Vec<HandObservation> {
        if !self.visible {
            return Vec::new();
        }
        let mut hands = vec![HandObservation::posed(Handedness::Right, self.x, self.y, self.shape)];
        if self.left_hand {
            hands.push(HandObservation::posed(Handedness::Left, 1.0 - self.x, self.y, self.shape));
        }
        hands
    }
}

/// Emits a posed hand every frame from [`SimInput`]s sent by the
/// visualizer's window.
pub struct SimLandmarkSource {
    pub rx:         Receiver<SimInput>,
    pub frame_time: Duration,
}

impl SimLandmarkSource {
    pub fn new(rx: Receiver<SimInput>) -> Self {
        SimLandmarkSource { rx, frame_time: Duration::from_millis(33) }
    }
}

impl LandmarkSource for SimLandmarkSource {
    fn name(&self) -> String {
        "simulation".to_string()
    }

    fn run(self: Box<Self>, tx: Sender<SourceEvent>, stop: Arc<AtomicBool>) {
        let mut state = SimState::default();
        while !stop.load(Ordering::Relaxed) {
            match self.rx.recv_timeout(self.frame_time) {
                Ok(input) => {
                    state.apply(input);
                    // Fold in everything already queued before emitting.
                    while let Ok(more) = self.rx.try_recv() {
                        state.apply(more);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    let _ = tx.send(SourceEvent::Closed);
                    return;
                }
            }
            if tx.send(SourceEvent::Frame(state.hands())).is_err() {
                return;
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// DetectorSource — external landmark detector speaking JSON lines
// ════════════════════════════════════════════════════════════════════════════

/// Reads one JSON object per line from an external hand-landmark detector,
/// e.g. a MediaPipe script:
///
/// ```text
/// READY
/// {"hands":[{"handedness":"Right","score":0.93,"landmarks":[{"x":0.51,"y":0.62,"z":-0.01}, …]}]}
/// {"hands":[],"error":"camera permission denied"}
/// ```
///
/// A `command` of `-` reads the same stream from stdin.
pub struct DetectorSource {
    pub command:        String,
    pub min_confidence: f32,
    /// The running detector, shared with the handle so it can be killed
    /// while `run` is blocked reading its stdout.
    child:              Arc<Mutex<Option<Child>>>,
}

#[derive(Deserialize, Debug)]
struct HandJson {
    handedness: String,
    #[serde(default = "full_confidence")]
    score:      f32,
    landmarks:  Vec<Landmark>,
}

fn full_confidence() -> f32 { 1.0 }

#[derive(Deserialize, Debug)]
struct DetectionJson {
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

/// One line of detector output, interpreted.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectorLine {
    Ready,
    Hands(Vec<HandObservation>),
    /// The detector itself reported a failure.
    Error(String),
    /// Unparseable; skipped.
    Garbage(String),
}

/// Interpret one detector line.  Hands below `min_confidence` or with an
/// unknown handedness label are dropped here; landmark validation is left to
/// the conductor.
pub fn parse_detector_line(line: &str, min_confidence: f32) -> DetectorLine {
    let line = line.trim();
    if line.eq_ignore_ascii_case("ready") {
        return DetectorLine::Ready;
    }
    let parsed: DetectionJson = match serde_json::from_str(line) {
        Ok(p) => p,
        Err(e) => return DetectorLine::Garbage(e.to_string()),
    };
    if let Some(error) = parsed.error {
        return DetectorLine::Error(error);
    }

    let hands = parsed
        .hands
        .into_iter()
        .filter(|h| h.score >= min_confidence)
        .filter_map(|h| match h.handedness.parse::<Handedness>() {
            Ok(handedness) => Some(HandObservation::new(handedness, h.landmarks)),
            Err(e) => {
                warn!("{}", e);
                None
            }
        })
        .collect();
    DetectorLine::Hands(hands)
}

/// Kill and reap whatever detector sits in `slot`.
fn kill_detector(slot: &Mutex<Option<Child>>) {
    let child = match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    if let Some(mut child) = child {
        debug!("killing detector pid {}", child.id());
        let _ = child.kill();
        let _ = child.wait();
    }
}

impl DetectorSource {
    pub fn new(command: impl Into<String>, min_confidence: f32) -> Self {
        DetectorSource {
            command: command.into(),
            min_confidence,
            child: Arc::new(Mutex::new(None)),
        }
    }

    fn pump<R: BufRead>(&self, reader: R, tx: &Sender<SourceEvent>, stop: &AtomicBool) {
        for line in reader.lines() {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    let _ = tx.send(SourceEvent::Failed(format!("detector read error: {}", e)));
                    return;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let event = match parse_detector_line(&line, self.min_confidence) {
                DetectorLine::Ready => {
                    info!("detector ready");
                    continue;
                }
                DetectorLine::Garbage(e) => {
                    warn!("skipping detector line: {}", e);
                    continue;
                }
                DetectorLine::Error(e) => {
                    let _ = tx.send(SourceEvent::Failed(e));
                    return;
                }
                DetectorLine::Hands(hands) => SourceEvent::Frame(hands),
            };
            if tx.send(event).is_err() {
                return;
            }
        }
        let _ = tx.send(SourceEvent::Closed);
    }
}

impl LandmarkSource for DetectorSource {
    fn name(&self) -> String {
        if self.command == "-" {
            "detector (stdin)".to_string()
        } else {
            format!("detector `{}`", self.command)
        }
    }

    fn run(self: Box<Self>, tx: Sender<SourceEvent>, stop: Arc<AtomicBool>) {
        if self.command == "-" {
            let stdin = io::stdin();
            self.pump(stdin.lock(), &tx, &stop);
            return;
        }

        let mut words = self.command.split_whitespace();
        let program = match words.next() {
            Some(p) => p,
            None => {
                let _ = tx.send(SourceEvent::Failed("empty detector command".to_string()));
                return;
            }
        };
        let child = Command::new(program)
            .args(words)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn();
        let mut child = match child {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(SourceEvent::Failed(format!("couldn't start `{}`: {}", self.command, e)));
                return;
            }
        };
        let stdout = child.stdout.take();

        // Park the child where the handle can reach it.  Checking `stop`
        // under the lock closes the window where the handle was dropped
        // before the child existed.
        match self.child.lock() {
            Ok(mut slot) if !stop.load(Ordering::SeqCst) => *slot = Some(child),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return;
            }
        }

        match stdout {
            Some(stdout) => self.pump(BufReader::new(stdout), &tx, &stop),
            None => {
                let _ = tx.send(SourceEvent::Failed("detector stdout unavailable".to_string()));
            }
        }
        kill_detector(&self.child);
    }

    fn shutdown(&self) -> Option<Shutdown> {
        let slot = Arc::clone(&self.child);
        Some(Box::new(move || kill_detector(&slot)))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LeapLandmarkSource — real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Landmark source backed by a LeapMotion controller.
///
/// Requires the `leap` feature flag and the LeapC shared library installed.
/// Joint positions (millimetres above the device) are projected onto a
/// 400 × 400 mm window so the hand lands in the same normalised frame a
/// camera detector would report, with Y growing downward.
#[cfg(feature = "leap")]
pub struct LeapLandmarkSource;

#[cfg(feature = "leap")]
impl LeapLandmarkSource {
    const HALF_WIDTH_MM: f32 = 200.0;
    const FLOOR_MM:      f32 = 100.0;
    const HEIGHT_MM:     f32 = 400.0;

    fn project(v: leaprs::LeapVectorRef<'_>) -> Landmark {
        Landmark {
            x: (v.x + Self::HALF_WIDTH_MM) / (2.0 * Self::HALF_WIDTH_MM),
            y: 1.0 - (v.y - Self::FLOOR_MM) / Self::HEIGHT_MM,
            z: v.z / Self::HEIGHT_MM,
        }
    }

    /// Wrist, then four joints per digit from thumb to pinky, in the
    /// 21-point layout.
    fn landmarks(hand: &leaprs::HandRef<'_>) -> Vec<Landmark> {
        let digits: Vec<_> = hand.digits().collect();
        let mut out = Vec::with_capacity(gesture_core::LANDMARK_COUNT);
        if let Some(middle) = digits.get(2) {
            out.push(Self::project(middle.metacarpal().prev_joint()));
        }
        for (i, digit) in digits.iter().enumerate() {
            // The thumb's metacarpal has zero length; start one bone later.
            if i == 0 {
                out.push(Self::project(digit.proximal().prev_joint()));
            } else {
                out.push(Self::project(digit.metacarpal().next_joint()));
            }
            out.push(Self::project(digit.intermediate().prev_joint()));
            out.push(Self::project(digit.distal().prev_joint()));
            out.push(Self::project(digit.distal().next_joint()));
        }
        out
    }
}

#[cfg(feature = "leap")]
impl LandmarkSource for LeapLandmarkSource {
    fn name(&self) -> String {
        "LeapMotion".to_string()
    }

    fn run(self: Box<Self>, tx: Sender<SourceEvent>, stop: Arc<AtomicBool>) {
        use leaprs::*;

        let mut connection = match Connection::create(ConnectionConfig::default()) {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(SourceEvent::Failed(format!("LeapC connection: {:?}", e)));
                return;
            }
        };
        if let Err(e) = connection.open() {
            let _ = tx.send(SourceEvent::Failed(format!("LeapMotion device: {:?}", e)));
            return;
        }

        while !stop.load(Ordering::Relaxed) {
            let msg = match connection.poll(100) {
                Ok(m) => m,
                Err(_) => continue,
            };
            if let Event::Tracking(frame) = msg.event() {
                let hands = frame
                    .hands()
                    .map(|h| {
                        let handedness = match h.hand_type() {
                            HandType::Left => Handedness::Left,
                            HandType::Right => Handedness::Right,
                        };
                        HandObservation::new(handedness, Self::landmarks(&h))
                    })
                    .collect();
                if tx.send(SourceEvent::Frame(hands)).is_err() {
                    return;
                }
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
