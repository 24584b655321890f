//! Real-time MIDI playback thread.
//!
//! The arrangement's loops are scheduled on a tick clock whose rate follows
//! the live tempo, and sent to a MIDI output port.  [`Player`] is the
//! [`PlaybackController`] the conductor drives; every call becomes a
//! [`PlayerCommand`] on the thread's channel.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use conductor_midi::{
    channel_volume, ticks_per_ms, ticks_to_ms, Arrangement, ScheduledEvent, PERCUSSION_CHANNEL,
};
use gesture_core::{PlaybackController, Volume};

/// Shortest audible accent, whatever the tempo.
pub const MIN_NOTE_MS: u64 = 50;

/// How often the thread wakes to schedule notes.
const TICK_SLEEP: Duration = Duration::from_millis(5);

// ════════════════════════════════════════════════════════════════════════════
// PlayerCommand — sent to the playback thread
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlayerCommand {
    Start,
    Stop,
    SetTempo(f32),
    SetVolume(Volume),
    Accent,
    /// Terminate the thread.
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// MidiOut — abstraction over midir / null (for testing)
// ════════════════════════════════════════════════════════════════════════════

pub trait MidiOut: Send {
    fn send(&mut self, message: &[u8]);

    fn program_change(&mut self, channel: u8, program: u8) {
        self.send(&[0xC0 | (channel & 0x0F), program]);
    }
    fn control_change(&mut self, channel: u8, controller: u8, value: u8) {
        self.send(&[0xB0 | (channel & 0x0F), controller, value]);
    }
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        self.send(&[0x90 | (channel & 0x0F), note, velocity]);
    }
    fn note_off(&mut self, channel: u8, note: u8) {
        self.send(&[0x80 | (channel & 0x0F), note, 0]);
    }
}

const CC_CHANNEL_VOLUME: u8 = 7;
const CC_ALL_NOTES_OFF:  u8 = 123;

// ── midir backend ─────────────────────────────────────────────────────────

struct MidirOut {
    conn: midir::MidiOutputConnection,
}

impl MidiOut for MidirOut {
    fn send(&mut self, message: &[u8]) {
        if let Err(e) = self.conn.send(message) {
            debug!("MIDI send failed: {}", e);
        }
    }
}

// ── null backend (used when no MIDI port is available) ────────────────────

struct NullOut;
impl MidiOut for NullOut {
    fn send(&mut self, _message: &[u8]) {}
}

// ════════════════════════════════════════════════════════════════════════════
// open_midi_output — enumerate ports and pick one
// ════════════════════════════════════════════════════════════════════════════

/// Open the port whose name contains `hint`, else a likely softsynth, else
/// the first port.  Falls back to a silent output with a warning.
fn open_midi_output(hint: Option<&str>) -> Box<dyn MidiOut> {
    let midi_out = match midir::MidiOutput::new("air_conductor") {
        Ok(m) => m,
        Err(e) => {
            warn!("MIDI init error: {}; playing silently", e);
            return Box::new(NullOut);
        }
    };

    let ports = midi_out.ports();
    if ports.is_empty() {
        warn!("no MIDI output ports found; playing silently");
        warn!("start a synthesiser such as `fluidsynth` or `timidity -iA` (Linux), \
               or use the built-in CoreMIDI / GS Wavetable synth");
        return Box::new(NullOut);
    }

    let names: Vec<String> = ports
        .iter()
        .map(|p| midi_out.port_name(p).unwrap_or_else(|_| "Unknown".to_string()))
        .collect();
    let port_idx = pick_port(&names, hint);
    info!("opening MIDI port: {}", names[port_idx]);

    match midi_out.connect(&ports[port_idx], "air-conductor-out") {
        Ok(conn) => Box::new(MidirOut { conn }),
        Err(e) => {
            warn!("failed to connect: {}; playing silently", e);
            Box::new(NullOut)
        }
    }
}

/// `names` must not be empty.
fn pick_port(names: &[String], hint: Option<&str>) -> usize {
    const SYNTHS: [&str; 5] = ["fluid", "timidity", "microsoft", "gm", "synth"];
    let lower: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();

    if let Some(hint) = hint.map(str::to_lowercase) {
        if let Some(i) = lower.iter().position(|n| n.contains(hint.as_str())) {
            return i;
        }
        warn!("no MIDI port matches {:?}", hint);
    }
    lower
        .iter()
        .position(|n| SYNTHS.iter().any(|s| n.contains(s)))
        .unwrap_or(0)
}

// ════════════════════════════════════════════════════════════════════════════
// Player — handle to the playback thread
// ════════════════════════════════════════════════════════════════════════════

pub struct Player {
    cmd_tx: Sender<PlayerCommand>,
    thread: Option<JoinHandle<()>>,
}

impl Player {
    /// Spawn the playback thread.  The port is opened on the thread.
    pub fn spawn(arrangement: Arrangement, port_hint: Option<String>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<PlayerCommand>();
        let thread = thread::spawn(move || {
            let midi = open_midi_output(port_hint.as_deref());
            player_thread(PlayerState::new(arrangement, midi), cmd_rx);
        });
        Player { cmd_tx, thread: Some(thread) }
    }

    fn send(&self, cmd: PlayerCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            debug!("player thread gone; dropped {:?}", cmd);
        }
    }
}

impl PlaybackController for Player {
    fn start(&mut self)               { self.send(PlayerCommand::Start); }
    fn stop(&mut self)                { self.send(PlayerCommand::Stop); }
    fn set_tempo(&mut self, bpm: f32) { self.send(PlayerCommand::SetTempo(bpm)); }
    fn set_volume(&mut self, v: Volume) { self.send(PlayerCommand::SetVolume(v)); }
    fn accent(&mut self)              { self.send(PlayerCommand::Accent); }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.send(PlayerCommand::Quit);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PlayerState: everything the thread owns
// ════════════════════════════════════════════════════════════════════════════

pub struct PlayerState {
    arrangement: Arrangement,
    midi:        Box<dyn MidiOut>,
    playing:     bool,
    bpm:         f32,
    gain:        f32,
    /// Fractional tick position in the arrangement.
    tick:        f64,
    last:        Option<Instant>,
    accent_off:  Option<(Instant, u8)>,
}

impl PlayerState {
    pub fn new(arrangement: Arrangement, midi: Box<dyn MidiOut>) -> Self {
        PlayerState {
            arrangement,
            midi,
            playing: false,
            bpm: 120.0,
            gain: 1.0,
            tick: 0.0,
            last: None,
            accent_off: None,
        }
    }

    pub fn is_playing(&self) -> bool { self.playing }
    pub fn tick(&self) -> f64 { self.tick }

    /// Returns false on [`PlayerCommand::Quit`].
    pub fn apply(&mut self, cmd: PlayerCommand, now: Instant) -> bool {
        match cmd {
            PlayerCommand::Start => {
                if self.playing {
                    return true;
                }
                // Resume from where Stop left the clock, like a transport pause.
                debug!("start at tick {:.0}, {:.1} BPM", self.tick, self.bpm);
                self.playing = true;
                self.last = Some(now);
                self.setup_channels();
            }
            PlayerCommand::Stop => {
                if !self.playing {
                    return true;
                }
                debug!("stop");
                self.advance(now);
                self.playing = false;
                self.last = None;
                self.silence();
            }
            PlayerCommand::SetTempo(bpm) => {
                // Time already elapsed is counted at the old tempo.
                self.advance(now);
                if bpm.is_finite() && bpm > 0.0 {
                    self.bpm = bpm;
                }
            }
            PlayerCommand::SetVolume(v) => {
                self.gain = v.gain();
                self.send_volumes();
            }
            PlayerCommand::Accent => {
                let accent = self.arrangement.accent;
                if let Some((_, note)) = self.accent_off.take() {
                    self.midi.note_off(PERCUSSION_CHANNEL, note);
                }
                let ms = ticks_to_ms(accent.length, self.arrangement.ticks_per_quarter, self.bpm)
                    .max(MIN_NOTE_MS);
                self.midi.note_on(PERCUSSION_CHANNEL, accent.note, accent.velocity);
                self.accent_off = Some((now + Duration::from_millis(ms), accent.note));
            }
            PlayerCommand::Quit => {
                self.silence();
                return false;
            }
        }
        true
    }

    /// Send every event scheduled between the last call and `now`.
    pub fn advance(&mut self, now: Instant) {
        if let Some((due, note)) = self.accent_off {
            if now >= due {
                self.midi.note_off(PERCUSSION_CHANNEL, note);
                self.accent_off = None;
            }
        }
        if !self.playing {
            return;
        }
        let last = match self.last.replace(now) {
            Some(t) => t,
            None => return,
        };
        let elapsed_ms = now.saturating_duration_since(last).as_secs_f64() * 1000.0;
        let next = self.tick + elapsed_ms * ticks_per_ms(self.bpm, self.arrangement.ticks_per_quarter);

        // Events at integer ticks in [tick, next).
        let events = self.arrangement.events_between(self.tick.ceil() as u64, next.ceil() as u64);
        for e in &events {
            self.emit(e);
        }
        self.tick = next;
    }

    fn emit(&mut self, e: &ScheduledEvent) {
        self.midi.send(&e.message());
    }

    fn setup_channels(&mut self) {
        for v in &self.arrangement.voices {
            self.midi.program_change(v.channel, v.program.program());
        }
        self.send_volumes();
    }

    fn send_volumes(&mut self) {
        for v in &self.arrangement.voices {
            self.midi.control_change(v.channel, CC_CHANNEL_VOLUME, channel_volume(self.gain, v.level));
        }
    }

    fn silence(&mut self) {
        for v in &self.arrangement.voices {
            self.midi.control_change(v.channel, CC_ALL_NOTES_OFF, 0);
        }
        if let Some((_, note)) = self.accent_off.take() {
            self.midi.note_off(PERCUSSION_CHANNEL, note);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// player_thread
// ════════════════════════════════════════════════════════════════════════════

fn player_thread(mut state: PlayerState, cmd_rx: Receiver<PlayerCommand>) {
    loop {
        // ── drain commands ────────────────────────────────────────────────
        loop {
            match cmd_rx.try_recv() {
                Ok(cmd) => {
                    if !state.apply(cmd, Instant::now()) {
                        return;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    state.apply(PlayerCommand::Quit, Instant::now());
                    return;
                }
            }
        }

        state.advance(Instant::now());
        thread::sleep(TICK_SLEEP);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Vec<u8>>>>);

    impl MidiOut for Recorder {
        fn send(&mut self, message: &[u8]) {
            self.0.lock().unwrap().push(message.to_vec());
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<Vec<u8>> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    fn state() -> (PlayerState, Recorder) {
        let rec = Recorder::default();
        (PlayerState::new(Arrangement::air_conductor(), Box::new(rec.clone())), rec)
    }

    fn note_ons(msgs: &[Vec<u8>]) -> Vec<(u8, u8)> {
        msgs.iter().filter(|m| m[0] & 0xF0 == 0x90).map(|m| (m[0] & 0x0F, m[1])).collect()
    }

    #[test]
    fn start_is_idempotent() {
        let (mut s, rec) = state();
        let t0 = Instant::now();
        s.apply(PlayerCommand::Start, t0);
        let first = rec.take();
        // program change + volume per voice
        assert_eq!(first.len(), 6);
        assert_eq!(first[0], vec![0xC0, 48]);
        s.apply(PlayerCommand::Start, t0);
        assert!(rec.take().is_empty());
    }

    #[test]
    fn stop_when_stopped_is_silent() {
        let (mut s, rec) = state();
        s.apply(PlayerCommand::Stop, Instant::now());
        assert!(rec.take().is_empty());
    }

    #[test]
    fn first_beat_at_120_bpm() {
        let (mut s, rec) = state();
        let t0 = Instant::now();
        s.apply(PlayerCommand::SetTempo(120.0), t0);
        s.apply(PlayerCommand::Start, t0);
        rec.take();
        // 1 ms in: the downbeat at tick 0 has sounded.
        s.advance(t0 + Duration::from_millis(1));
        let ons = note_ons(&rec.take());
        assert_eq!(ons, vec![(0, 60), (0, 64), (0, 67), (1, 64), (2, 69)]);
        // Second beat (tick 480) lands at 500 ms.
        s.advance(t0 + Duration::from_millis(499));
        assert!(note_ons(&rec.take()).is_empty());
        s.advance(t0 + Duration::from_millis(501));
        assert_eq!(note_ons(&rec.take()), vec![(1, 67)]);
    }

    #[test]
    fn tempo_change_speeds_up_the_clock() {
        let (mut s, _rec) = state();
        let t0 = Instant::now();
        s.apply(PlayerCommand::SetTempo(60.0), t0);
        s.apply(PlayerCommand::Start, t0);
        s.apply(PlayerCommand::SetTempo(120.0), t0 + Duration::from_millis(1000));
        s.advance(t0 + Duration::from_millis(2000));
        // 1 s at 60 BPM (480 ticks) + 1 s at 120 BPM (960 ticks)
        assert!((s.tick() - 1440.0).abs() < 1.0);
    }

    #[test]
    fn start_after_stop_resumes_the_loop() {
        let (mut s, rec) = state();
        let t0 = Instant::now();
        s.apply(PlayerCommand::Start, t0);
        s.apply(PlayerCommand::Stop, t0 + Duration::from_millis(750));
        let paused_at = s.tick();
        assert!((paused_at - 720.0).abs() < 1.0);

        // Time spent stopped does not move the clock.
        let t1 = t0 + Duration::from_secs(10);
        s.apply(PlayerCommand::Start, t1);
        assert_eq!(s.tick(), paused_at);
        rec.take();

        // No fresh downbeat; the next note-ons are beat three at tick 960.
        s.advance(t1 + Duration::from_millis(1));
        assert!(note_ons(&rec.take()).is_empty());
        s.advance(t1 + Duration::from_millis(260));
        let ons = note_ons(&rec.take());
        assert!(ons.contains(&(1, 71)));
        assert!(ons.contains(&(2, 69)));
    }

    #[test]
    fn stop_sends_all_notes_off() {
        let (mut s, rec) = state();
        let t0 = Instant::now();
        s.apply(PlayerCommand::Start, t0);
        rec.take();
        s.apply(PlayerCommand::Stop, t0);
        let msgs = rec.take();
        assert!(msgs.contains(&vec![0xB0, 123, 0]));
        assert!(msgs.contains(&vec![0xB2, 123, 0]));
        assert!(!s.is_playing());
    }

    #[test]
    fn volume_becomes_channel_volume() {
        let (mut s, rec) = state();
        s.apply(PlayerCommand::SetVolume(Volume::Linear(0.5)), Instant::now());
        let msgs = rec.take();
        assert_eq!(msgs.len(), 3);
        assert!(msgs.iter().all(|m| m[1] == 7 && m[2] == 64));
    }

    #[test]
    fn accent_hits_percussion_and_releases() {
        let (mut s, rec) = state();
        let t0 = Instant::now();
        s.apply(PlayerCommand::Accent, t0);
        assert_eq!(rec.take(), vec![vec![0x99, 48, 110]]);
        s.advance(t0 + Duration::from_millis(10));
        assert!(rec.take().is_empty());
        s.advance(t0 + Duration::from_secs(2));
        assert_eq!(rec.take(), vec![vec![0x89, 48, 0]]);
    }

    #[test]
    fn nothing_scheduled_while_stopped() {
        let (mut s, rec) = state();
        s.advance(Instant::now() + Duration::from_secs(3));
        assert!(rec.take().is_empty());
    }

    #[test]
    fn port_choice() {
        let names: Vec<String> = ["Midi Through", "FLUID Synth (1234)", "USB Keys"]
            .iter().map(|s| s.to_string()).collect();
        assert_eq!(pick_port(&names, None), 1);
        assert_eq!(pick_port(&names, Some("usb")), 2);
        assert_eq!(pick_port(&names, Some("nothing")), 1);
        let plain = vec!["A".to_string(), "B".to_string()];
        assert_eq!(pick_port(&plain, None), 0);
    }
}
