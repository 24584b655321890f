//! # air_conductor
//!
//! Conduct a looping MIDI arrangement with your hands.  Landmark frames
//! from a camera detector (or LeapMotion, or the built-in pointer
//! simulator) run through [`gesture_core::Conductor`], which drives a
//! real-time MIDI player; a `minifb` window shows the hand, its sparkle
//! trail, and the live tempo and volume.
//!
//! ## Landmark sources
//!
//! * (default) **Simulation**: the mouse over the camera panel is the wrist,
//!   number keys pick the hand shape.
//! * `--detector "<command>"`: any program printing one JSON detection per
//!   line (see [`source::DetectorSource`]); `-` reads stdin.
//! * `leap` feature: a LeapMotion controller via LeapC.
//!
//! ### Keys
//!
//! | Key | Action |
//! |---|---|
//! | `1` / `2` / `3` | Simulated hand open / closed / other |
//! | `H` | Hide or show the simulated hand |
//! | `L` | Add or remove a mirrored left hand |
//! | `Space` | Play / pause |
//! | `+` / `-` | Tempo ± 5 BPM |
//! | `M` | Manual tempo: hand position stops changing tempo |
//! | `R` | Restart detection |
//! | `Q` / `Esc` | Quit |

pub mod app;
pub mod config;
pub mod player;
pub mod source;
pub mod sparkle;
pub mod visualizer;
