//! # gesture_core
//!
//! Turns per-frame hand landmarks into musical control: a gesture label,
//! a tempo, a volume, a play/pause transport, and conducting accents.
//!
//! ## Pipeline
//!
//! ```text
//! landmarks ──▶ validate ──▶ profile (classify + smooth) ──▶ map ──▶ PlaybackController
//! ```
//!
//! [`Conductor::process_frame`] runs the whole chain synchronously, once per
//! camera frame, and returns a [`FrameReport`] with the new
//! [`ControlParameters`].
//!
//! ## Gesture → Action mapping
//!
//! | Gesture | Action |
//! |---|---|
//! | Open hand (while stopped) | `start()` then `set_tempo` + `set_volume` |
//! | Closed hand (while playing) | `stop()` |
//! | Any hand (while playing) | `set_tempo` + `set_volume` every frame |
//! | Sharp downward index motion | `accent()`, at most every 200 ms |
//! | No hand | nothing; parameters hold |
//!
//! Which hand and which axis drive tempo and volume depends on the
//! [`ProfileKind`]; see [`strategy`].

pub mod classifier;
pub mod conductor;
pub mod controller;
pub mod error;
pub mod landmark;
pub mod mapper;
pub mod smoother;
pub mod strategy;

pub use classifier::{GestureState, HandPosition};
pub use conductor::{Conductor, FrameReport};
pub use controller::{CommandLog, PlaybackCommand, PlaybackController};
pub use error::ConductorError;
pub use landmark::{HandObservation, HandShape, Handedness, Landmark, LANDMARK_COUNT};
pub use mapper::{ControlParameters, TempoRange, Transport, Volume};
pub use smoother::DEFAULT_ALPHA;
pub use strategy::{GestureMappingStrategy, ProfileKind};
