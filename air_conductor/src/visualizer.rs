//! Software-rendered visualizer using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────────────────────┬───────────────┐
//! │  CAMERA                                  │  TEMPO  VOL   │
//! │                                          │  ┌──┐   ┌──┐  │
//! │        * * *  ◇  (hand + sparkle trail)  │  │  │   │  │  │
//! │                                          │  │██│   │  │  │
//! │                                          │  │██│   │██│  │
//! │                                          │  └──┘   └──┘  │
//! │                                          │  gesture      │
//! ├──────────────────────────────────────────┴───────────────┤
//! │  status line                                             │
//! │  key legend                                              │
//! └──────────────────────────────────────────────────────────┘
//! ```

use std::sync::mpsc::Sender;
use std::time::Duration;

use minifb::{Key, KeyRepeat, MouseMode, Scale, Window, WindowOptions};

use gesture_core::{
    ControlParameters, GestureState, HandPosition, HandShape, TempoRange, Volume,
};
use gesture_core::mapper::{DECIBEL_VOLUME_MIN, LINEAR_VOLUME_MIN};

use crate::source::SimInput;
use crate::sparkle::{sparkle_color, SparkleField};

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:    usize = 900;
pub const WIN_H:    usize = 560;
const CAM_X:        usize = 10;
const CAM_Y:        usize = 10;
const CAM_W:        usize = 640;
const CAM_H:        usize = 480;
const PANEL_X:      usize = CAM_X + CAM_W + 10;
const BAR_W:        usize = 60;
const BAR_H:        usize = 360;
const BAR_Y:        usize = CAM_Y + 30;
const TEMPO_BAR_X:  usize = PANEL_X + 20;
const VOLUME_BAR_X: usize = PANEL_X + 130;
const STATUS_Y:     usize = CAM_Y + CAM_H + 12;
const BG_COLOR:     u32   = 0xFF1A1A2E;
const CAM_BG:       u32   = 0xFF0F0F1E;
const PANEL_BG:     u32   = 0xFF16213E;
const TEXT_BG:      u32   = 0xFF0F3460;
const TEMPO_COLOR:  u32   = 0xFF4FC3F7;
const VOLUME_COLOR: u32   = 0xFF81C784;
const PLAY_COLOR:   u32   = 0xFFFFD700;  // gold
const OPEN_COLOR:   u32   = 0xFF66FF99;
const CLOSED_COLOR: u32   = 0xFFFF5566;
const OTHER_COLOR:  u32   = 0xFFCCCCCC;

// ════════════════════════════════════════════════════════════════════════════
// Keyboard actions the app handles itself
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    TogglePlayback,
    TempoUp,
    TempoDown,
    ToggleDecouple,
    RestartDetection,
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// Scene — everything one frame shows
// ════════════════════════════════════════════════════════════════════════════

pub struct Scene<'a> {
    pub params:      ControlParameters,
    pub gesture:     GestureState,
    pub tempo_range: TempoRange,
    pub sparkles:    &'a SparkleField,
    pub profile:     &'a str,
    pub source:      &'a str,
    pub status:      &'a str,
    pub decoupled:   bool,
}

/// Fill fraction of the tempo bar.
pub fn tempo_fraction(bpm: f32, range: TempoRange) -> f32 {
    let span = range.max - range.min;
    if span <= 0.0 {
        return 0.0;
    }
    ((bpm - range.min) / span).clamp(0.0, 1.0)
}

/// Fill fraction of the volume bar, over the unit's own range.
pub fn volume_fraction(volume: Volume) -> f32 {
    match volume.clamped() {
        Volume::Linear(v) => (v - LINEAR_VOLUME_MIN) / (1.0 - LINEAR_VOLUME_MIN),
        Volume::Decibels(db) => (db - DECIBEL_VOLUME_MIN) / -DECIBEL_VOLUME_MIN,
    }
}

pub fn volume_label(volume: Volume) -> String {
    match volume.clamped() {
        Volume::Linear(v) => format!("VOL {:.2}", v),
        Volume::Decibels(db) => format!("VOL {:.0} DB", db),
    }
}

fn gesture_color(gesture: GestureState) -> u32 {
    match gesture {
        GestureState::OpenHand       => OPEN_COLOR,
        GestureState::ClosedHand     => CLOSED_COLOR,
        GestureState::Other          => OTHER_COLOR,
        GestureState::NoHandDetected => 0xFF555555,
    }
}

/// Window point → normalised camera coordinates, if it lies on the camera.
pub fn pointer_to_frame(x: f32, y: f32) -> Option<(f32, f32)> {
    let fx = (x - CAM_X as f32) / CAM_W as f32;
    let fy = (y - CAM_Y as f32) / CAM_H as f32;
    if (0.0..=1.0).contains(&fx) && (0.0..=1.0).contains(&fy) {
        Some((fx, fy))
    } else {
        None
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Canvas — the pixel buffer and its drawing primitives
// ════════════════════════════════════════════════════════════════════════════

pub struct Canvas {
    buf: Vec<u32>,
}

impl Default for Canvas {
    fn default() -> Self {
        Canvas { buf: vec![BG_COLOR; WIN_W * WIN_H] }
    }
}

impl Canvas {
    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.buf[y * WIN_W + x]
    }

    pub fn draw(&mut self, scene: &Scene<'_>) {
        self.buf.fill(BG_COLOR);

        // ── Camera panel ──────────────────────────────────────────────────
        self.fill(CAMERA, CAM_BG);
        for s in scene.sparkles.iter() {
            let (cx, cy) = to_camera(HandPosition::new(s.x, s.y));
            let r = (s.size / 2.0).max(1.0) as usize;
            let color = blend(CAM_BG, sparkle_color(s.life), s.opacity);
            self.fill(Rect::new(cx.saturating_sub(r), cy.saturating_sub(r), r * 2, r * 2), color);
        }
        if scene.gesture != GestureState::NoHandDetected {
            let (hx, hy) = to_camera(scene.params.hand_position);
            let color = gesture_color(scene.gesture);
            self.diamond_ring(hx, hy, 12, 2, color);
        }
        let cam_border = if scene.params.is_playing { PLAY_COLOR } else { 0xFF333355 };
        self.stroke(CAMERA, cam_border);
        self.text(&format!("PROFILE {}", scene.profile), CAM_X + 8, CAM_Y + 8, 0xFF888888);
        self.text(&format!("SOURCE {}", scene.source), CAM_X + 8, CAM_Y + 16, 0xFF888888);

        // ── Parameter panel ───────────────────────────────────────────────
        self.fill(Rect::new(PANEL_X, CAM_Y, WIN_W - PANEL_X - 10, CAM_H), PANEL_BG);
        let tempo_label = if scene.decoupled {
            format!("{:.0} BPM M", scene.params.tempo_bpm)
        } else {
            format!("{:.0} BPM", scene.params.tempo_bpm)
        };
        self.draw_bar(
            TEMPO_BAR_X,
            tempo_fraction(scene.params.tempo_bpm, scene.tempo_range),
            TEMPO_COLOR,
            &tempo_label,
        );
        self.draw_bar(
            VOLUME_BAR_X,
            volume_fraction(scene.params.volume),
            VOLUME_COLOR,
            &volume_label(scene.params.volume),
        );
        self.text(&scene.gesture.to_string(), PANEL_X + 20, BAR_Y + BAR_H + 30, gesture_color(scene.gesture));
        let transport = if scene.params.is_playing { "PLAYING" } else { "STOPPED" };
        self.text(transport, PANEL_X + 20, BAR_Y + BAR_H + 42, PLAY_COLOR);

        // ── Status bar ────────────────────────────────────────────────────
        self.fill(Rect::new(0, STATUS_Y, WIN_W, WIN_H - STATUS_Y), TEXT_BG);
        self.text(scene.status, 10, STATUS_Y + 10, 0xFFEEEEEE);

        // ── Key legend ────────────────────────────────────────────────────
        self.text(
            "MOUSE=move  1=open 2=closed 3=other  H=hide  L=left hand  \
             SPACE=play/pause  +/-=tempo  M=manual tempo  R=restart  Q=quit",
            10, WIN_H - 16, 0xFF888888,
        );
    }

    // ── Bars ──────────────────────────────────────────────────────────────

    fn draw_bar(&mut self, x: usize, fraction: f32, color: u32, label: &str) {
        let filled = (BAR_H as f32 * fraction.clamp(0.0, 1.0)) as usize;
        self.fill(Rect::new(x, BAR_Y + BAR_H - filled, BAR_W, filled), color);
        self.stroke(Rect::new(x, BAR_Y, BAR_W, BAR_H), 0xFF000000);
        self.text(label, x, BAR_Y + BAR_H + 8, color);
    }

    // ── Primitives, all clipped to the window ───────────────────────────

    fn fill(&mut self, r: Rect, color: u32) {
        let r = r.clipped();
        for row in r.y..r.y + r.h {
            self.buf[row * WIN_W + r.x..row * WIN_W + r.x + r.w].fill(color);
        }
    }

    /// One-pixel outline just inside `r`.
    fn stroke(&mut self, r: Rect, color: u32) {
        if r.w == 0 || r.h == 0 {
            return;
        }
        for edge in [
            Rect { h: 1, ..r },
            Rect { y: r.y + r.h - 1, h: 1, ..r },
            Rect { w: 1, ..r },
            Rect { x: r.x + r.w - 1, w: 1, ..r },
        ] {
            self.fill(edge, color);
        }
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < WIN_W && y < WIN_H {
            self.buf[y * WIN_W + x] = color;
        }
    }

    /// Hand marker: the outline of a diamond, `thickness` pixels deep,
    /// with its centre pixel lit.
    fn diamond_ring(&mut self, cx: usize, cy: usize, radius: usize, thickness: usize, color: u32) {
        let inner = radius.saturating_sub(thickness);
        let (cx, cy, r) = (cx as isize, cy as isize, radius as isize);
        for dy in -r..=r {
            for dx in -r..=r {
                let d = (dx.abs() + dy.abs()) as usize;
                if d > inner && d <= radius {
                    if let (Ok(x), Ok(y)) = (usize::try_from(cx + dx), usize::try_from(cy + dy)) {
                        self.set_pixel(x, y, color);
                    }
                }
            }
        }
        if cx >= 0 && cy >= 0 {
            self.set_pixel(cx as usize, cy as usize, color);
        }
    }

    fn text(&mut self, text: &str, x: usize, y: usize, color: u32) {
        for (i, ch) in text.chars().enumerate() {
            let left = x + i * GLYPH_ADVANCE;
            if left + GLYPH_ADVANCE > WIN_W {
                break;
            }
            let bits = glyph_bits(ch);
            for bit in 0..15 {
                if bits & (1 << (14 - bit)) != 0 {
                    self.set_pixel(left + bit % 3, y + bit / 3, color);
                }
            }
        }
    }
}

/// Screen rectangle in window pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Rect {
    x: usize,
    y: usize,
    w: usize,
    h: usize,
}

impl Rect {
    const fn new(x: usize, y: usize, w: usize, h: usize) -> Self {
        Rect { x, y, w, h }
    }

    fn clipped(self) -> Rect {
        let x = self.x.min(WIN_W);
        let y = self.y.min(WIN_H);
        Rect {
            x,
            y,
            w: (self.x + self.w).min(WIN_W) - x,
            h: (self.y + self.h).min(WIN_H) - y,
        }
    }
}

/// A glyph is 3 pixels wide plus a 1-pixel gap.
const GLYPH_ADVANCE: usize = 4;

const CAMERA: Rect = Rect::new(CAM_X, CAM_Y, CAM_W, CAM_H);

fn to_camera(p: HandPosition) -> (usize, usize) {
    let x = CAM_X as f32 + p.x.clamp(0.0, 1.0) * (CAM_W - 1) as f32;
    let y = CAM_Y as f32 + p.y.clamp(0.0, 1.0) * (CAM_H - 1) as f32;
    (x as usize, y as usize)
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer — the window
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window: Window,
    canvas: Canvas,
    /// Where simulated hand input goes; `None` while a real source runs.
    sim_tx: Option<Sender<SimInput>>,
    last_pointer: Option<(f32, f32)>,
}

impl Visualizer {
    pub fn new(scale: u8) -> anyhow::Result<Self> {
        let scale = match scale {
            2 => Scale::X2,
            4 => Scale::X4,
            _ => Scale::X1,
        };
        let mut window = Window::new(
            "Air Conductor",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                scale,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| anyhow::format_err!("Couldn't open window: {}", e))?;

        window.limit_update_rate(Some(Duration::from_millis(16))); // ~60fps

        Ok(Visualizer {
            window,
            canvas: Canvas::default(),
            sim_tx: None,
            last_pointer: None,
        })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    pub fn set_sim_sender(&mut self, tx: Option<Sender<SimInput>>) {
        self.sim_tx = tx;
        self.last_pointer = None;
    }

    /// Forward pointer and shape keys to the simulator and return the
    /// app-level key presses of this frame.
    pub fn poll_input(&mut self) -> Vec<KeyAction> {
        let mut actions = Vec::new();
        if !self.window.is_open() {
            actions.push(KeyAction::Quit);
            return actions;
        }

        let one_shot = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);
        let held     = |k: Key| self.window.is_key_pressed(k, KeyRepeat::Yes);

        if one_shot(Key::Q) || one_shot(Key::Escape) { actions.push(KeyAction::Quit); }
        if one_shot(Key::Space) { actions.push(KeyAction::TogglePlayback); }
        if one_shot(Key::M)     { actions.push(KeyAction::ToggleDecouple); }
        if one_shot(Key::R)     { actions.push(KeyAction::RestartDetection); }
        if held(Key::Equal) || held(Key::NumPadPlus)   { actions.push(KeyAction::TempoUp); }
        if held(Key::Minus) || held(Key::NumPadMinus)  { actions.push(KeyAction::TempoDown); }

        let mut sim = Vec::new();
        if one_shot(Key::Key1) { sim.push(SimInput::Shape(HandShape::Open)); }
        if one_shot(Key::Key2) { sim.push(SimInput::Shape(HandShape::Closed)); }
        if one_shot(Key::Key3) { sim.push(SimInput::Shape(HandShape::Other)); }
        if one_shot(Key::H)    { sim.push(SimInput::ToggleVisible); }
        if one_shot(Key::L)    { sim.push(SimInput::ToggleLeftHand); }

        let pointer = self.window
            .get_mouse_pos(MouseMode::Discard)
            .and_then(|(x, y)| pointer_to_frame(x, y));
        if pointer.is_some() && pointer != self.last_pointer {
            if let Some((x, y)) = pointer {
                sim.push(SimInput::Pointer { x, y });
            }
            self.last_pointer = pointer;
        }

        if let Some(tx) = &self.sim_tx {
            for input in sim {
                let _ = tx.send(input);
            }
        }
        actions
    }

    pub fn render(&mut self, scene: &Scene<'_>) {
        self.canvas.draw(scene);
        self.window.update_with_buffer(&self.canvas.buf, WIN_W, WIN_H).ok();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

/// Each glyph packs five 3-pixel rows into 15 bits, top row in the high
/// octal digit, so `0o75557` reads as `111 101 101 101 111`.
const FONT: &[(char, u16)] = &[
    ('0', 0o75557), ('1', 0o26227), ('2', 0o71747), ('3', 0o71717),
    ('4', 0o55711), ('5', 0o74717), ('6', 0o74757), ('7', 0o71111),
    ('8', 0o75757), ('9', 0o75717), ('A', 0o75755), ('B', 0o65656),
    ('C', 0o74447), ('D', 0o65556), ('E', 0o74747), ('F', 0o74744),
    ('G', 0o74557), ('H', 0o55755), ('I', 0o72227), ('J', 0o11157),
    ('K', 0o55655), ('L', 0o44447), ('M', 0o57555), ('N', 0o75555),
    ('O', 0o75557), ('P', 0o75744), ('Q', 0o75571), ('R', 0o65655),
    ('S', 0o74717), ('T', 0o72222), ('U', 0o55557), ('V', 0o55522),
    ('W', 0o55575), ('X', 0o55255), ('Y', 0o55722), ('Z', 0o71247),
    ('/', 0o11244), ('-', 0o00700), ('.', 0o00002), (',', 0o00024),
    (':', 0o02020), ('=', 0o07070), ('+', 0o02720), ('(', 0o24442),
    (')', 0o21112), ('`', 0o22000), ('\'', 0o22000), (' ', 0o00000),
];

/// Unknown characters draw as a centred dot.
const MISSING_GLYPH: u16 = 0o00200;

fn glyph_bits(c: char) -> u16 {
    let c = c.to_ascii_uppercase();
    FONT.iter()
        .find(|(g, _)| *g == c)
        .map_or(MISSING_GLYPH, |&(_, bits)| bits)
}

/// Mix `to` over `from` with weight `t` in `[0, 1]`, per RGB channel.
fn blend(from: u32, to: u32, t: f32) -> u32 {
    let t = t.clamp(0.0, 1.0);
    [16u32, 8, 0].iter().fold(0xFF00_0000, |acc, &shift| {
        let lo = ((from >> shift) & 0xFF) as f32;
        let hi = ((to >> shift) & 0xFF) as f32;
        acc | (((lo + (hi - lo) * t) as u32) << shift)
    })
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn scene<'a>(sparkles: &'a SparkleField, gesture: GestureState, playing: bool) -> Scene<'a> {
        Scene {
            params: ControlParameters {
                tempo_bpm: 110.0,
                volume: Volume::Linear(0.55),
                is_playing: playing,
                hand_position: HandPosition::new(0.5, 0.5),
            },
            gesture,
            tempo_range: TempoRange::PRIMARY,
            sparkles,
            profile: "single-hand",
            source: "simulation",
            status: "ready",
            decoupled: false,
        }
    }

    #[test]
    fn bar_fractions() {
        assert!(approx_eq!(f32, tempo_fraction(40.0, TempoRange::PRIMARY), 0.0));
        assert!(approx_eq!(f32, tempo_fraction(180.0, TempoRange::PRIMARY), 1.0));
        assert!(approx_eq!(f32, tempo_fraction(100.0, TempoRange::ALTERNATE), 0.5));
        assert!(approx_eq!(f32, volume_fraction(Volume::Linear(0.1)), 0.0, epsilon = 1e-6));
        assert!(approx_eq!(f32, volume_fraction(Volume::Linear(1.0)), 1.0, epsilon = 1e-6));
        assert!(approx_eq!(f32, volume_fraction(Volume::Decibels(-15.0)), 0.5, epsilon = 1e-6));
        assert!(approx_eq!(f32, volume_fraction(Volume::Decibels(-99.0)), 0.0, epsilon = 1e-6));
    }

    #[test]
    fn volume_labels_follow_the_unit() {
        assert_eq!(volume_label(Volume::Linear(0.5)), "VOL 0.50");
        assert_eq!(volume_label(Volume::Decibels(-12.0)), "VOL -12 DB");
    }

    #[test]
    fn pointer_mapping_covers_only_the_camera() {
        assert_eq!(pointer_to_frame(CAM_X as f32, CAM_Y as f32), Some((0.0, 0.0)));
        let (x, y) = pointer_to_frame((CAM_X + CAM_W / 2) as f32, (CAM_Y + CAM_H) as f32).unwrap();
        assert!(approx_eq!(f32, x, 0.5, epsilon = 1e-6));
        assert!(approx_eq!(f32, y, 1.0, epsilon = 1e-6));
        assert_eq!(pointer_to_frame((WIN_W - 5) as f32, 100.0), None);
        assert_eq!(pointer_to_frame(2.0, 2.0), None);
    }

    #[test]
    fn hand_indicator_is_drawn_only_with_a_hand() {
        let sparkles = SparkleField::default();
        let mut c = Canvas::default();
        let (hx, hy) = to_camera(HandPosition::new(0.5, 0.5));

        c.draw(&scene(&sparkles, GestureState::OpenHand, false));
        assert_eq!(c.pixel(hx, hy), OPEN_COLOR);

        c.draw(&scene(&sparkles, GestureState::NoHandDetected, false));
        assert_eq!(c.pixel(hx, hy), CAM_BG);
    }

    #[test]
    fn camera_border_turns_gold_while_playing() {
        let sparkles = SparkleField::default();
        let mut c = Canvas::default();
        c.draw(&scene(&sparkles, GestureState::Other, true));
        assert_eq!(c.pixel(CAM_X + CAM_W / 2, CAM_Y), PLAY_COLOR);
        c.draw(&scene(&sparkles, GestureState::Other, false));
        assert_ne!(c.pixel(CAM_X + CAM_W / 2, CAM_Y), PLAY_COLOR);
    }

    #[test]
    fn sparkles_are_painted() {
        let mut sparkles = SparkleField::default();
        sparkles.push(HandPosition::new(0.25, 0.75));
        let mut c = Canvas::default();
        c.draw(&scene(&sparkles, GestureState::NoHandDetected, false));
        let (sx, sy) = to_camera(HandPosition::new(0.25, 0.75));
        assert_ne!(c.pixel(sx, sy), CAM_BG);
    }

    #[test]
    fn blend_endpoints() {
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 0.0), 0xFF000000);
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 1.0), 0xFFFFFFFF);
        assert_eq!(blend(0xFF000000, 0xFF804020, 0.5), 0xFF402010);
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 7.0), 0xFFFFFFFF);
    }

    #[test]
    fn rects_clip_at_the_window_edge() {
        let mut c = Canvas::default();
        c.fill(Rect::new(WIN_W - 2, WIN_H - 2, 10, 10), 0xFFABCDEF);
        assert_eq!(c.pixel(WIN_W - 1, WIN_H - 1), 0xFFABCDEF);
        assert_eq!(c.pixel(WIN_W - 3, WIN_H - 1), BG_COLOR);
        c.fill(Rect::new(WIN_W + 5, 0, 3, 3), 0xFFABCDEF);
        assert_eq!(Rect::new(WIN_W + 5, 0, 3, 3).clipped().w, 0);
    }

    #[test]
    fn stroke_outlines_without_filling() {
        let mut c = Canvas::default();
        c.stroke(Rect::new(10, 10, 5, 4), TEMPO_COLOR);
        for (x, y) in [(10, 10), (14, 10), (10, 13), (14, 13), (12, 10), (10, 12)] {
            assert_eq!(c.pixel(x, y), TEMPO_COLOR, "({}, {})", x, y);
        }
        assert_eq!(c.pixel(12, 11), BG_COLOR);
        assert_eq!(c.pixel(15, 10), BG_COLOR);
    }

    #[test]
    fn hand_marker_is_a_hollow_diamond() {
        let mut c = Canvas::default();
        c.diamond_ring(100, 100, 12, 2, OPEN_COLOR);
        assert_eq!(c.pixel(112, 100), OPEN_COLOR);
        assert_eq!(c.pixel(111, 100), OPEN_COLOR);
        assert_eq!(c.pixel(110, 100), BG_COLOR);
        assert_eq!(c.pixel(100, 88), OPEN_COLOR);
        assert_eq!(c.pixel(106, 106), OPEN_COLOR);
        assert_eq!(c.pixel(100, 100), OPEN_COLOR);
        // Near the corner the ring clips instead of wrapping.
        c.diamond_ring(0, 0, 3, 1, OPEN_COLOR);
        assert_eq!(c.pixel(3, 0), OPEN_COLOR);
        assert_eq!(c.pixel(WIN_W - 3, 0), BG_COLOR);
    }

    #[test]
    fn font_is_case_insensitive_with_a_fallback() {
        assert_eq!(glyph_bits('a'), glyph_bits('A'));
        assert_eq!(glyph_bits('#'), MISSING_GLYPH);
        let mut c = Canvas::default();
        c.text("1", 0, 0, OTHER_COLOR);
        // 010 / 110 / 010 / 010 / 111
        assert_eq!(c.pixel(1, 0), OTHER_COLOR);
        assert_eq!(c.pixel(0, 0), BG_COLOR);
        assert_eq!(c.pixel(0, 1), OTHER_COLOR);
        assert_eq!(c.pixel(0, 4), OTHER_COLOR);
        assert_eq!(c.pixel(3, 0), BG_COLOR);
    }
}
