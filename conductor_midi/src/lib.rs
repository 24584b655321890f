//! # conductor_midi
//!
//! The musical material the air conductor plays, expressed as looping
//! MIDI voices on a shared tick grid.
//!
//! * [`Arrangement::motion_melody`]: an eight-note C major line doubled an
//!   octave below and a fifth above.
//! * [`Arrangement::air_conductor`]: strings, piano and woodwind loops with
//!   a percussion accent for conducting downstrokes.
//!
//! Playback (real-time or file rendering) asks an arrangement for the events
//! that fall inside a tick window with [`Arrangement::events_between`], so
//! tempo can change between windows without re-planning anything.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use conductor_midi::{write_smf, Arrangement};
//!
//! let arrangement = Arrangement::air_conductor();
//! write_smf("air.mid", &arrangement, 8, 90.0).unwrap();
//! ```

use std::io::Write;
use std::ops::Range;
use std::path::Path;

// ════════════════════════════════════════════════════════════════════════════
// General MIDI instrument numbers (Program 0–127)
// ════════════════════════════════════════════════════════════════════════════

/// The General MIDI programs the arrangements play.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum GeneralMidi {
    AcousticGrandPiano   = 0,
    StringEnsemble1      = 48,
    Clarinet             = 71,
    Flute                = 73,
    Ocarina              = 79,
    Lead2Sawtooth        = 81,
}

impl GeneralMidi {
    /// Raw MIDI program number (0–127).
    pub fn program(self) -> u8 { self as u8 }
}

/// GM reserves channel 10 (index 9) for percussion.
pub const PERCUSSION_CHANNEL: u8 = 9;

/// Velocity for every scheduled loop note.  Loudness is carried by channel
/// volume instead, so live volume changes apply to notes already sounding.
pub const NOTE_VELOCITY: u8 = 96;

// ════════════════════════════════════════════════════════════════════════════
// Note names
// ════════════════════════════════════════════════════════════════════════════

/// MIDI numbers of the pitches the arrangements use.
pub mod pitch {
    pub const C3: u8 = 48;
    pub const G3: u8 = 55;
    pub const C4: u8 = 60;
    pub const D4: u8 = 62;
    pub const E4: u8 = 64;
    pub const F4: u8 = 65;
    pub const G4: u8 = 67;
    pub const A4: u8 = 69;
    pub const B4: u8 = 71;
    pub const C5: u8 = 72;
}

// ════════════════════════════════════════════════════════════════════════════
// Voice and Arrangement
// ════════════════════════════════════════════════════════════════════════════

/// One looping part.  Step `k` sounds `pattern[k % pattern.len()]` at tick
/// `k * every` and releases it `length` ticks later.
#[derive(Clone, Debug, PartialEq)]
pub struct Voice {
    pub name:    String,
    pub channel: u8,
    pub program: GeneralMidi,
    /// Relative loudness within the arrangement, `0.0–1.0`.
    pub level:   f32,
    pub every:   u32,
    pub length:  u32,
    pub pattern: Vec<Vec<u8>>,
}

impl Voice {
    fn chord(&self, step: u64) -> &[u8] {
        if self.pattern.is_empty() {
            return &[];
        }
        &self.pattern[(step % self.pattern.len() as u64) as usize]
    }
}

/// The hit played on [`PERCUSSION_CHANNEL`] for a conducting downstroke.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Accent {
    pub note:     u8,
    pub velocity: u8,
    /// Sounding length in ticks.
    pub length:   u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Arrangement {
    pub name:              String,
    pub ticks_per_quarter: u16,
    pub voices:            Vec<Voice>,
    pub accent:            Accent,
}

impl Arrangement {
    /// C major scale in eighth notes, sounded by three voices: an octave
    /// below, in unison, and a fifth above, at falling levels.
    pub fn motion_melody() -> Self {
        use crate::pitch::*;
        const TPQ: u16 = 480;
        let eighth = TPQ as u32 / 2;
        let melody = [C4, D4, E4, F4, G4, A4, B4, C5];

        let voice = |name: &str, channel: u8, program: GeneralMidi, level: f32, shift: i16| Voice {
            name: name.to_string(),
            channel,
            program,
            level,
            every: eighth,
            length: eighth,
            pattern: melody.iter().map(|n| vec![(*n as i16 + shift) as u8]).collect(),
        };

        Arrangement {
            name: "Motion Melody".to_string(),
            ticks_per_quarter: TPQ,
            voices: vec![
                voice("low", 0, GeneralMidi::Flute, 1.0, -12),
                voice("unison", 1, GeneralMidi::Ocarina, 0.7, 0),
                voice("fifth", 2, GeneralMidi::Lead2Sawtooth, 0.4, 7),
            ],
            accent: Accent { note: C3, velocity: 110, length: eighth },
        }
    }

    /// Strings hold a C–G–E chord every half note, the piano steps through
    /// E–G–B–C on each beat, and a woodwind taps A4 every half note.
    pub fn air_conductor() -> Self {
        use crate::pitch::*;
        const TPQ: u16 = 480;
        let quarter = TPQ as u32;

        Arrangement {
            name: "Air-Conductor".to_string(),
            ticks_per_quarter: TPQ,
            voices: vec![
                Voice {
                    name: "strings".to_string(),
                    channel: 0,
                    program: GeneralMidi::StringEnsemble1,
                    level: 1.0,
                    every: quarter * 2,
                    length: quarter * 2,
                    pattern: vec![vec![C4, G4, E4]],
                },
                Voice {
                    name: "piano".to_string(),
                    channel: 1,
                    program: GeneralMidi::AcousticGrandPiano,
                    level: 1.0,
                    every: quarter,
                    length: quarter / 2,
                    pattern: vec![vec![E4], vec![G4], vec![B4], vec![C5]],
                },
                Voice {
                    name: "woodwind".to_string(),
                    channel: 2,
                    program: GeneralMidi::Clarinet,
                    level: 1.0,
                    every: quarter * 2,
                    length: quarter / 4,
                    pattern: vec![vec![A4]],
                },
            ],
            accent: Accent { note: C3, velocity: 110, length: quarter / 2 },
        }
    }

    /// Every note-on and note-off with `from <= tick < to`, sorted by tick.
    /// On a shared tick, note-offs come first so a repeated note re-sounds.
    pub fn events_between(&self, from: u64, to: u64) -> Vec<ScheduledEvent> {
        let mut out = Vec::new();
        if to <= from {
            return out;
        }
        for voice in &self.voices {
            if voice.every == 0 || voice.pattern.is_empty() {
                continue;
            }
            let every = voice.every as u64;
            let length = voice.length.max(1) as u64;

            for step in steps_landing_in(from, to, every, 0) {
                for &note in voice.chord(step) {
                    out.push(ScheduledEvent::on(step * every, voice.channel, note));
                }
            }
            for step in steps_landing_in(from, to, every, length) {
                for &note in voice.chord(step) {
                    out.push(ScheduledEvent::off(step * every + length, voice.channel, note));
                }
            }
        }
        out.sort_by_key(|e| (e.tick, e.kind, e.channel, e.note));
        out
    }

    /// Ticks in one 4/4 bar.
    pub fn ticks_per_bar(&self) -> u64 {
        self.ticks_per_quarter as u64 * 4
    }
}

/// Steps `k` whose tick `k * every + offset` lies in `from..to`.
fn steps_landing_in(from: u64, to: u64, every: u64, offset: u64) -> Range<u64> {
    let first_at_or_after = |t: u64| {
        if t <= offset { 0 } else { (t - offset + every - 1) / every }
    };
    first_at_or_after(from)..first_at_or_after(to)
}

// ════════════════════════════════════════════════════════════════════════════
// ScheduledEvent
// ════════════════════════════════════════════════════════════════════════════

/// Declaration order is the tie-break order on a shared tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventKind {
    NoteOff,
    NoteOn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub tick:     u64,
    pub kind:     EventKind,
    pub channel:  u8,
    pub note:     u8,
    pub velocity: u8,
}

impl ScheduledEvent {
    fn on(tick: u64, channel: u8, note: u8) -> Self {
        ScheduledEvent { tick, kind: EventKind::NoteOn, channel, note, velocity: NOTE_VELOCITY }
    }

    fn off(tick: u64, channel: u8, note: u8) -> Self {
        ScheduledEvent { tick, kind: EventKind::NoteOff, channel, note, velocity: 0 }
    }

    /// The raw three-byte channel message.
    pub fn message(&self) -> [u8; 3] {
        let ch = self.channel & 0x0F;
        match self.kind {
            EventKind::NoteOn  => [0x90 | ch, self.note, self.velocity],
            EventKind::NoteOff => [0x80 | ch, self.note, 0],
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tempo and level conversions
// ════════════════════════════════════════════════════════════════════════════

/// Ticks that elapse per millisecond at `bpm`.
pub fn ticks_per_ms(bpm: f32, tpq: u16) -> f64 {
    bpm.max(1.0) as f64 * tpq as f64 / 60_000.0
}

/// Convert ticks to (rounded) milliseconds given TPQ and BPM.
pub fn ticks_to_ms(ticks: u32, tpq: u16, bpm: f32) -> u64 {
    // ms = ticks * (60_000 / bpm) / tpq
    (ticks as f64 * 60_000.0 / (bpm.max(1.0) as f64 * tpq.max(1) as f64)).round() as u64
}

/// Microseconds per quarter note, as stored in the SMF tempo meta event.
pub fn micros_per_quarter(bpm: f32) -> u32 {
    (60_000_000.0 / bpm.max(1.0) as f64).round() as u32
}

/// CC7 channel volume for a voice at `level` under a master `gain`.
pub fn channel_volume(gain: f32, level: f32) -> u8 {
    let v = gain * level;
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 127.0).round() as u8
}

// ════════════════════════════════════════════════════════════════════════════
// Standard MIDI File output
// ════════════════════════════════════════════════════════════════════════════

/// Render `bars` bars of 4/4 at a fixed `bpm` into a Type-0 MIDI file.
pub fn render_smf(arrangement: &Arrangement, bars: u32, bpm: f32) -> Vec<u8> {
    let track = build_track_chunk(arrangement, bars, bpm);

    let mut out = Vec::new();
    // ── Header chunk ──────────────────────────────────────────────────────
    // MThd  length=6  format=0  ntrks=1  division
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // format 0
    out.extend_from_slice(&1u16.to_be_bytes()); // 1 track
    out.extend_from_slice(&arrangement.ticks_per_quarter.to_be_bytes());

    // ── Track chunk ───────────────────────────────────────────────────────
    out.extend_from_slice(b"MTrk");
    out.extend_from_slice(&(track.len() as u32).to_be_bytes());
    out.extend_from_slice(&track);

    out
}

/// Render and write to `path`.
pub fn write_smf(
    path: impl AsRef<Path>,
    arrangement: &Arrangement,
    bars: u32,
    bpm: f32,
) -> std::io::Result<()> {
    let bytes = render_smf(arrangement, bars, bpm);
    let mut f = std::fs::File::create(path)?;
    f.write_all(&bytes)
}

/// All note events for the rendered span, with notes still sounding at the
/// end released on the final tick.
fn timeline(arrangement: &Arrangement, bars: u32) -> Vec<ScheduledEvent> {
    let end = bars as u64 * arrangement.ticks_per_bar();
    let mut events = arrangement.events_between(0, end);

    let mut sounding: Vec<(u8, u8)> = Vec::new();
    for e in &events {
        match e.kind {
            EventKind::NoteOn => sounding.push((e.channel, e.note)),
            EventKind::NoteOff => {
                if let Some(i) = sounding.iter().position(|s| *s == (e.channel, e.note)) {
                    sounding.swap_remove(i);
                }
            }
        }
    }
    sounding.sort_unstable();
    events.extend(sounding.into_iter().map(|(ch, note)| ScheduledEvent::off(end, ch, note)));
    events
}

fn build_track_chunk(arrangement: &Arrangement, bars: u32, bpm: f32) -> Vec<u8> {
    let mut t: Vec<u8> = Vec::new();

    // ── Tempo meta-event (delta=0) ────────────────────────────────────────
    let micros = micros_per_quarter(bpm);
    t.extend_from_slice(&[0x00, 0xFF, 0x51, 0x03]);
    t.push(((micros >> 16) & 0xFF) as u8);
    t.push(((micros >>  8) & 0xFF) as u8);
    t.push(( micros        & 0xFF) as u8);

    // ── Time signature 4/4, 24 clocks per click, 8 32nds per quarter ─────
    t.extend_from_slice(&[0x00, 0xFF, 0x58, 0x04, 0x04, 0x02, 0x18, 0x08]);

    // ── Track name meta-event ─────────────────────────────────────────────
    let name = arrangement.name.as_bytes();
    t.extend_from_slice(&[0x00, 0xFF, 0x03]);
    write_vlq(&mut t, name.len() as u32);
    t.extend_from_slice(name);

    // ── Program and channel volume per voice ──────────────────────────────
    for voice in &arrangement.voices {
        let ch = voice.channel & 0x0F;
        t.extend_from_slice(&[0x00, 0xC0 | ch, voice.program.program()]);
        t.extend_from_slice(&[0x00, 0xB0 | ch, 0x07, channel_volume(1.0, voice.level)]);
    }

    // ── Note events ───────────────────────────────────────────────────────
    let mut last = 0u64;
    for e in timeline(arrangement, bars) {
        write_vlq(&mut t, (e.tick - last) as u32);
        t.extend_from_slice(&e.message());
        last = e.tick;
    }

    // ── End of Track meta-event ───────────────────────────────────────────
    t.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

    t
}

/// Write a MIDI variable-length quantity (VLQ).
fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    let mut bytes = [0u8; 5];
    let mut i = 4;
    bytes[i] = (value & 0x7F) as u8;
    value >>= 7;
    while value > 0 {
        i -= 1;
        bytes[i] = ((value & 0x7F) | 0x80) as u8;
        value >>= 7;
    }
    buf.extend_from_slice(&bytes[i..]);
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
