//! air_conductor: interactive entry point.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use air_conductor::app::run;
use air_conductor::config::AppConfig;
use conductor_midi::write_smf;
use gesture_core::{Conductor, ProfileKind};

/// Command line arguments.  Flags override the settings file.
#[derive(Parser, Debug)]
#[command(name = "air_conductor")]
#[command(about = "Conduct a MIDI ensemble with hand gestures", long_about = None)]
struct Args {
    /// JSON settings file (kebab-case keys, every field optional)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Gesture mapping: single-hand or two-hand
    #[arg(long, value_name = "PROFILE")]
    profile: Option<ProfileKind>,

    /// Landmark detector command printing JSON lines; `-` reads stdin
    #[arg(long, value_name = "COMMAND")]
    detector: Option<String>,

    /// Smoothing factor in [0, 1); higher is smoother and slower
    #[arg(long, value_name = "ALPHA")]
    alpha: Option<f32>,

    /// Prefer the MIDI output port whose name contains this text
    #[arg(long, value_name = "NAME")]
    midi_port: Option<String>,

    /// Write the profile's arrangement to a Standard MIDI File and exit
    #[arg(long, value_name = "FILE.mid")]
    render: Option<PathBuf>,

    /// Bars to render with --render
    #[arg(long, value_name = "N", default_value = "8")]
    bars: u32,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(AppConfig, Option<PathBuf>, u32)> {
        let mut cfg = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        if let Some(profile) = self.profile {
            cfg.profile = profile;
        }
        if let Some(alpha) = self.alpha {
            cfg.alpha = alpha;
        }
        if self.detector.is_some() {
            cfg.detector = self.detector;
        }
        if self.midi_port.is_some() {
            cfg.midi_port = self.midi_port;
        }
        Ok((cfg, self.render, self.bars))
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let (cfg, render, bars) = Args::parse().into_config()?;

    if let Some(path) = render {
        let bpm = Conductor::with_profile(cfg.profile, cfg.alpha)?.parameters().tempo_bpm;
        let arrangement = cfg.arrangement();
        write_smf(&path, &arrangement, bars, bpm)
            .with_context(|| format!("Couldn't write {path:?}"))?;
        info!("wrote {} bars of {} at {} BPM to {:?}", bars, arrangement.name, bpm, path);
        return Ok(());
    }

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║        Air Conductor: hand gestures → live MIDI ensemble     ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("  Profile: {}", cfg.profile);
    match &cfg.detector {
        Some(cmd) => println!("  Source:  detector `{}`", cmd),
        #[cfg(feature = "leap")]
        None => println!("  Source:  LeapMotion hardware"),
        #[cfg(not(feature = "leap"))]
        None => println!("  Source:  mouse simulation  (--detector or --features leap for real hands)"),
    }
    println!();
    println!("  Open hand to start, closed hand to stop.  Opening visualizer window…");
    println!();

    run(cfg)
}
