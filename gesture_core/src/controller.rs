//! The boundary between the mapper and whatever actually makes sound.

use crate::mapper::Volume;

/// Anything that can play the arrangement.
///
/// Implementations must accept `set_tempo` / `set_volume` at any time, before
/// `start` or after `stop`, and must treat a redundant `start` or `stop` as a
/// no-op.  Engine failures are absorbed here, never reported back upstream.
pub trait PlaybackController {
    fn start(&mut self);
    fn stop(&mut self);
    fn set_tempo(&mut self, bpm: f32);
    fn set_volume(&mut self, volume: Volume);
    /// A conducting downstroke landed.
    fn accent(&mut self) {}
}

/// One call made on a [`PlaybackController`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlaybackCommand {
    Start,
    Stop,
    SetTempo(f32),
    SetVolume(Volume),
    Accent,
}

/// A controller that only remembers what it was asked to do.
#[derive(Clone, Debug, Default)]
pub struct CommandLog {
    pub commands: Vec<PlaybackCommand>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, wanted: PlaybackCommand) -> usize {
        self.commands.iter().filter(|c| **c == wanted).count()
    }

    pub fn last_tempo(&self) -> Option<f32> {
        self.commands.iter().rev().find_map(|c| match c {
            PlaybackCommand::SetTempo(bpm) => Some(*bpm),
            _ => None,
        })
    }

    pub fn last_volume(&self) -> Option<Volume> {
        self.commands.iter().rev().find_map(|c| match c {
            PlaybackCommand::SetVolume(v) => Some(*v),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl PlaybackController for CommandLog {
    fn start(&mut self)                  { self.commands.push(PlaybackCommand::Start); }
    fn stop(&mut self)                   { self.commands.push(PlaybackCommand::Stop); }
    fn set_tempo(&mut self, bpm: f32)    { self.commands.push(PlaybackCommand::SetTempo(bpm)); }
    fn set_volume(&mut self, v: Volume)  { self.commands.push(PlaybackCommand::SetVolume(v)); }
    fn accent(&mut self)                 { self.commands.push(PlaybackCommand::Accent); }
}
