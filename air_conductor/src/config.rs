//! User settings: a JSON file, then command-line overrides.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use conductor_midi::Arrangement;
use gesture_core::{ProfileKind, DEFAULT_ALPHA};

/// Confidence below which a detected hand is ignored.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

/// Everything the interactive app needs to start.  Every field has a
/// default, so a settings file may name only what it changes:
///
/// ```json
/// { "profile": "two-hand", "detector": "python3 hands.py", "midi-port": "fluid" }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AppConfig {
    pub profile:        ProfileKind,
    /// Weight of the previous smoothed value, in `[0, 1)`.
    pub alpha:          f32,
    /// Landmark detector command line.  `None` runs the simulator; `-`
    /// reads detector output from stdin.
    pub detector:       Option<String>,
    pub min_confidence: f32,
    /// Substring of the MIDI output port to prefer.
    pub midi_port:      Option<String>,
    /// Integer window magnification (1, 2 or 4).
    pub window_scale:   u8,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            profile:        ProfileKind::default(),
            alpha:          DEFAULT_ALPHA,
            detector:       None,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            midi_port:      None,
            window_scale:   1,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut contents = String::new();
        let mut file = File::open(path)
            .map_err(|e| anyhow::format_err!("Couldn't open {path:?}: {}", e))?;
        file.read_to_string(&mut contents)
            .map_err(|e| anyhow::format_err!("Couldn't read {path:?}: {}", e))?;
        Self::parse(&contents).map_err(|e| anyhow::format_err!("Couldn't parse {path:?}: {}", e))
    }

    pub fn parse(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if !(0.0..1.0).contains(&config.alpha) {
            anyhow::bail!("alpha must be in [0, 1), got {}", config.alpha);
        }
        if !(0.0..=1.0).contains(&config.min_confidence) {
            anyhow::bail!("min-confidence must be in [0, 1], got {}", config.min_confidence);
        }
        Ok(config)
    }

    /// The loops each profile conducts: one hand plays the harmonised
    /// melody, two hands lead the strings/piano/woodwind ensemble.
    pub fn arrangement(&self) -> Arrangement {
        match self.profile {
            ProfileKind::SingleHand => Arrangement::motion_melody(),
            ProfileKind::TwoHand => Arrangement::air_conductor(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
