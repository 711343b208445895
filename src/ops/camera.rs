// ============================================================================
// CAMERA & LIGHT - continuous view/light controls and their prompt wording
// ============================================================================
//
// The camera widget is a cube the user drags to orbit; two sliders (pitch and
// yaw) mirror the cube rotation. The light widget is a pad with a draggable
// handle plus sliders. Both end up as plain text in a re-render request, so
// the continuous values are discretised into named bands here.

use egui::{Pos2, Rect, vec2};

use crate::components::tools::{parse_hex_color, to_hex_color};

pub const DEFAULT_LENS_MM: u32 = 50;
pub const MIN_LENS_MM: u32 = 10;
pub const MAX_LENS_MM: u32 = 200;
/// Degrees of cube rotation per dragged pixel.
pub const DRAG_DEGREES_PER_PIXEL: f32 = 0.5;

/// Maps any angle to `(-180, 180]`. Values already in range come back unchanged.
pub fn normalize_yaw(degrees: f32) -> f32 {
    if degrees > -180.0 && degrees <= 180.0 {
        return degrees;
    }
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped > 180.0 { wrapped - 360.0 } else { wrapped }
}

// ============================================================================
// VIEW BANDS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerticalAngle {
    HighAngle,
    SlightlyHigh,
    EyeLevel,
    SlightlyLow,
    LowAngle,
}

impl VerticalAngle {
    pub fn from_pitch(pitch: f32) -> Self {
        if pitch > 60.0 {
            VerticalAngle::HighAngle
        } else if pitch > 20.0 {
            VerticalAngle::SlightlyHigh
        } else if pitch > -20.0 {
            VerticalAngle::EyeLevel
        } else if pitch > -60.0 {
            VerticalAngle::SlightlyLow
        } else {
            VerticalAngle::LowAngle
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VerticalAngle::HighAngle => "High Angle",
            VerticalAngle::SlightlyHigh => "Slightly High",
            VerticalAngle::EyeLevel => "Eye-Level",
            VerticalAngle::SlightlyLow => "Slightly Low",
            VerticalAngle::LowAngle => "Low Angle",
        }
    }

    /// Line used in the camera template. For the extreme low band this is the
    /// shot description quoted by the dedicated low-angle template.
    pub fn instruction(&self) -> &'static str {
        match self {
            VerticalAngle::HighAngle => {
                "Dramatic High Angle: redraw the subject as seen from directly above using three-point perspective. \
                 The head is closest to the camera and looks exaggeratedly large, and the body narrows and shrinks \
                 sharply toward the feet with strong perspective distortion."
            }
            VerticalAngle::SlightlyHigh => {
                "Slightly High Angle: a shot looking down at the subject from slightly above. Apply mild perspective \
                 distortion so the upper part appears slightly larger."
            }
            VerticalAngle::EyeLevel => {
                "Eye-Level: a natural shot at the subject's eye height without distortion."
            }
            VerticalAngle::SlightlyLow => {
                "Slightly Low Angle: a shot looking up at the subject from slightly below. Apply mild perspective \
                 distortion so the lower part appears slightly larger."
            }
            VerticalAngle::LowAngle => {
                "extreme low-angle shot, ultra wide lens, ground-level camera position, upward perspective, \
                 dramatic foreshortening, exaggerated vertical scale, towering upward composition, camera placed \
                 near the floor, wide dynamic perspective, cinematic upward view, strong vertical stretch, \
                 perspective distortion from below"
            }
        }
    }
}

/// Eight 45° sectors around the subject. Positive yaw orbits to the
/// subject's left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HorizontalDirection {
    Front,
    LeftFront,
    Left,
    LeftBack,
    Back,
    RightBack,
    Right,
    RightFront,
}

impl HorizontalDirection {
    pub fn from_yaw(yaw: f32) -> Self {
        let yaw = normalize_yaw(yaw);
        if yaw > -22.5 && yaw <= 22.5 {
            HorizontalDirection::Front
        } else if yaw > 22.5 && yaw <= 67.5 {
            HorizontalDirection::LeftFront
        } else if yaw > 67.5 && yaw <= 112.5 {
            HorizontalDirection::Left
        } else if yaw > 112.5 && yaw <= 157.5 {
            HorizontalDirection::LeftBack
        } else if yaw > 157.5 || yaw <= -157.5 {
            HorizontalDirection::Back
        } else if yaw <= -112.5 {
            HorizontalDirection::RightBack
        } else if yaw <= -67.5 {
            HorizontalDirection::Right
        } else {
            HorizontalDirection::RightFront
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HorizontalDirection::Front => "Front",
            HorizontalDirection::LeftFront => "Left-Front",
            HorizontalDirection::Left => "Left Side",
            HorizontalDirection::LeftBack => "Left-Back",
            HorizontalDirection::Back => "Back",
            HorizontalDirection::RightBack => "Right-Back",
            HorizontalDirection::Right => "Right Side",
            HorizontalDirection::RightFront => "Right-Front",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            HorizontalDirection::Front => {
                "front view, camera positioned directly in front, straight-on angle, zero-degree rotation, \
                 neutral perspective, symmetrical viewpoint, character facing forward"
            }
            HorizontalDirection::LeftFront => {
                "front-side three-quarter view, 315-degree angle, between front and side, diagonal perspective"
            }
            HorizontalDirection::Left | HorizontalDirection::Right => {
                "perfect side view, camera positioned at 90 degrees, profile view, straight lateral angle, \
                 zero foreshortening, clean silhouette from the side"
            }
            HorizontalDirection::LeftBack => {
                "back-side three-quarter view, 225-degree angle, between back and side view, \
                 partially showing rear and profile"
            }
            HorizontalDirection::Back => {
                "back view, camera placed directly behind the position, 180-degree rotation, \
                 straight-on rear view, symmetrical back silhouette"
            }
            HorizontalDirection::RightBack => {
                "rear three-quarter view (3/4 back view), camera at 135-degree angle, partially showing the back \
                 and side, angled backward view, natural perspective rotation"
            }
            HorizontalDirection::RightFront => {
                "front three-quarter view (3/4 view), 45-degree camera angle from the front, slight rotation, \
                 visible two sides of the form, natural perspective, facing diagonally"
            }
        }
    }
}

// ============================================================================
// CAMERA STATE
// ============================================================================

/// Orbit camera. `rot_x`/`rot_y` are the cube rotation; `pitch`/`yaw` are
/// the slider values derived from it.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraState {
    rot_x: f32,
    rot_y: f32,
    pitch: f32,
    yaw: f32,
    lens_mm: u32,
    pub invert_drag: bool,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            rot_x: 0.0,
            rot_y: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            lens_mm: DEFAULT_LENS_MM,
            invert_drag: false,
        }
    }
}

impl CameraState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Cube rotation `(x, y)` in degrees, `y` unwrapped.
    pub fn rotation(&self) -> (f32, f32) {
        (self.rot_x, self.rot_y)
    }

    pub fn lens_mm(&self) -> u32 {
        self.lens_mm
    }

    pub fn set_lens_mm(&mut self, lens: u32) {
        self.lens_mm = lens.clamp(MIN_LENS_MM, MAX_LENS_MM);
    }

    /// Cube drag by a pointer delta in screen pixels.
    pub fn drag(&mut self, dx: f32, dy: f32) {
        let s = if self.invert_drag { -1.0 } else { 1.0 };
        self.rot_y += dx * DRAG_DEGREES_PER_PIXEL * s;
        self.rot_x -= dy * DRAG_DEGREES_PER_PIXEL * s;
        self.rot_x = self.rot_x.clamp(-90.0, 90.0);
        self.pitch = -self.rot_x;
        self.yaw = normalize_yaw(self.rot_y);
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(-90.0, 90.0);
        self.rot_x = -self.pitch;
    }

    pub fn set_yaw(&mut self, yaw: f32) {
        self.yaw = normalize_yaw(yaw);
        self.rot_y = self.yaw;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn vertical(&self) -> VerticalAngle {
        VerticalAngle::from_pitch(self.pitch)
    }

    pub fn horizontal(&self) -> HorizontalDirection {
        HorizontalDirection::from_yaw(self.yaw)
    }

    pub fn lens_label(&self) -> String {
        format!("{}mm", self.lens_mm)
    }
}

// ============================================================================
// LIGHT STATE
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LightType {
    #[default]
    Point,
    Directional,
    Spot,
    Ambient,
}

impl LightType {
    pub const ALL: [LightType; 4] = [
        LightType::Point,
        LightType::Directional,
        LightType::Spot,
        LightType::Ambient,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            LightType::Point => "Point",
            LightType::Directional => "Directional",
            LightType::Spot => "Spot",
            LightType::Ambient => "Ambient",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(name.trim()))
    }

    fn phrase(&self) -> &'static str {
        match self {
            LightType::Point => "a single point light source",
            LightType::Directional => "a directional light with parallel rays, like sunlight",
            LightType::Spot => "a focused spotlight with a defined cone",
            LightType::Ambient => "soft ambient illumination without a distinct source",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightPreset {
    Daylight,
    GoldenHour,
    Studio,
    Rim,
    Horror,
    Mono,
    Fantasy,
    Cinematic,
}

impl LightPreset {
    pub const ALL: [LightPreset; 8] = [
        LightPreset::Daylight,
        LightPreset::GoldenHour,
        LightPreset::Studio,
        LightPreset::Rim,
        LightPreset::Horror,
        LightPreset::Mono,
        LightPreset::Fantasy,
        LightPreset::Cinematic,
    ];

    /// Identifier used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            LightPreset::Daylight => "daylight",
            LightPreset::GoldenHour => "golden-hour",
            LightPreset::Studio => "studio",
            LightPreset::Rim => "rim",
            LightPreset::Horror => "horror",
            LightPreset::Mono => "mono",
            LightPreset::Fantasy => "fantasy",
            LightPreset::Cinematic => "cinematic",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LightPreset::Daylight => "Daylight",
            LightPreset::GoldenHour => "Golden Hour",
            LightPreset::Studio => "Studio",
            LightPreset::Rim => "Rim Light",
            LightPreset::Horror => "Horror",
            LightPreset::Mono => "Mono",
            LightPreset::Fantasy => "Fantasy",
            LightPreset::Cinematic => "Cinematic",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// `(x, y, intensity, temperature, hardness, colour)`
    fn values(&self) -> (f32, f32, u32, u32, u32, [u8; 4]) {
        const WHITE: [u8; 4] = [255, 255, 255, 255];
        match self {
            LightPreset::Daylight => (0.5, -0.8, 120, 5800, 70, WHITE),
            LightPreset::GoldenHour => (-0.9, 0.2, 80, 3500, 30, [0xFF, 0xD7, 0xA9, 255]),
            LightPreset::Studio => (-0.6, -0.6, 150, 5000, 80, WHITE),
            LightPreset::Rim => (0.8, -0.3, 180, 6500, 90, WHITE),
            LightPreset::Horror => (0.0, 0.9, 70, 4000, 20, [0xB2, 0xEB, 0xF2, 255]),
            LightPreset::Mono => (-0.7, -0.5, 110, 7000, 60, WHITE),
            LightPreset::Fantasy => (0.6, 0.6, 130, 8000, 40, [0xE1, 0xBE, 0xE7, 255]),
            LightPreset::Cinematic => (-0.8, -0.2, 90, 4500, 50, [0xFF, 0xCC, 0x80, 255]),
        }
    }
}

pub const MAX_LIGHT_INTENSITY: u32 = 200;
pub const MIN_LIGHT_TEMP_K: u32 = 2000;
pub const MAX_LIGHT_TEMP_K: u32 = 10000;

/// Position on the light pad is `(x, y)` in `[-1, 1]`, `y = -1` at the top.
#[derive(Clone, Debug, PartialEq)]
pub struct LightState {
    pub x: f32,
    pub y: f32,
    /// Percent, 0..=200.
    pub intensity: u32,
    pub temperature_k: u32,
    /// Percent, 0 = fully diffused.
    pub hardness: u32,
    pub color: [u8; 4],
    pub kind: LightType,
    /// Last applied preset, cleared by reset.
    pub preset: Option<LightPreset>,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: -0.8,
            intensity: 100,
            temperature_k: 5500,
            hardness: 50,
            color: [255, 255, 255, 255],
            kind: LightType::Point,
            preset: None,
        }
    }
}

/// Preview shading drawn over the image: a radial gradient transparent
/// inside `hard_stop_pct` and darkening to the edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightOverlay {
    pub center_x_pct: f32,
    pub center_y_pct: f32,
    pub hard_stop_pct: f32,
    pub opacity: f32,
}

impl LightState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Presets leave the light type alone.
    pub fn apply_preset(&mut self, preset: LightPreset) {
        let (x, y, intensity, temp, hardness, color) = preset.values();
        self.x = x;
        self.y = y;
        self.intensity = intensity;
        self.temperature_k = temp;
        self.hardness = hardness;
        self.color = color;
        self.preset = Some(preset);
    }

    pub fn set_color_hex(&mut self, hex: &str) -> bool {
        match parse_hex_color(hex) {
            Some(c) => {
                self.color = c;
                true
            }
            None => false,
        }
    }

    pub fn color_hex(&self) -> String {
        to_hex_color(self.color)
    }

    /// Pointer inside the pad; outside positions are clamped to its edge.
    pub fn set_handle_position(&mut self, pad: Rect, pointer: Pos2) {
        if !pad.is_positive() {
            return;
        }
        let t = (pad.clamp(pointer) - pad.min) / pad.size();
        self.x = t.x * 2.0 - 1.0;
        self.y = t.y * 2.0 - 1.0;
    }

    pub fn handle_position(&self, pad: Rect) -> Pos2 {
        pad.lerp_inside(vec2((self.x + 1.0) / 2.0, (self.y + 1.0) / 2.0))
    }

    /// The bright spot of the preview sits opposite the shading centre, so
    /// the gradient centre mirrors the handle.
    pub fn overlay(&self) -> LightOverlay {
        LightOverlay {
            center_x_pct: self.x * -50.0 + 50.0,
            center_y_pct: self.y * -50.0 + 50.0,
            hard_stop_pct: 100.0 - self.hardness.min(100) as f32,
            opacity: self.intensity.min(MAX_LIGHT_INTENSITY) as f32 / 200.0,
        }
    }

    pub fn direction(&self) -> &'static str {
        const T: f32 = 1.0 / 3.0;
        let horizontal = if self.x < -T { -1 } else if self.x > T { 1 } else { 0 };
        let vertical = if self.y < -T { -1 } else if self.y > T { 1 } else { 0 };
        match (vertical, horizontal) {
            (-1, -1) => "the upper left",
            (-1, 0) => "directly above",
            (-1, 1) => "the upper right",
            (0, -1) => "the left",
            (0, 1) => "the right",
            (1, -1) => "the lower left",
            (1, 0) => "directly below",
            (1, 1) => "the lower right",
            _ => "the front",
        }
    }

    pub fn intensity_phrase(&self) -> &'static str {
        match self.intensity {
            0..60 => "dim",
            60..=120 => "moderate",
            121..=160 => "bright",
            _ => "very strong",
        }
    }

    pub fn temperature_phrase(&self) -> &'static str {
        if self.temperature_k < 4500 {
            "warm"
        } else if self.temperature_k <= 6500 {
            "neutral"
        } else {
            "cool"
        }
    }

    pub fn softness_phrase(&self) -> &'static str {
        match self.hardness {
            0..35 => "soft, diffused light with gentle, wrapping shadows",
            35..70 => "medium-soft light with defined but smooth shadow edges",
            _ => "hard light with crisp, sharply defined shadows",
        }
    }

    /// Plain-language lighting description for a re-render request.
    pub fn describe(&self) -> String {
        format!(
            "Light type: {}.\n\
             Direction: the key light comes from {}.\n\
             Intensity: {} ({}%).\n\
             Color temperature: {} ({}K).\n\
             Quality: {}.\n\
             Light color: {}.",
            self.kind.phrase(),
            self.direction(),
            self.intensity_phrase(),
            self.intensity,
            self.temperature_phrase(),
            self.temperature_k,
            self.softness_phrase(),
            self.color_hex(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn yaw_boundaries() {
        assert_eq!(normalize_yaw(180.0), 180.0);
        assert_eq!(normalize_yaw(-180.0), 180.0);
        assert_eq!(normalize_yaw(540.0), 180.0);
        assert_eq!(normalize_yaw(190.0), -170.0);
        assert_eq!(normalize_yaw(-190.0), 170.0);
        assert_eq!(normalize_yaw(360.0), 0.0);
    }

    #[test]
    fn pitch_bands_follow_thresholds() {
        assert_eq!(VerticalAngle::from_pitch(61.0), VerticalAngle::HighAngle);
        assert_eq!(VerticalAngle::from_pitch(60.0), VerticalAngle::SlightlyHigh);
        assert_eq!(VerticalAngle::from_pitch(20.0), VerticalAngle::EyeLevel);
        assert_eq!(VerticalAngle::from_pitch(-20.0), VerticalAngle::SlightlyLow);
        assert_eq!(VerticalAngle::from_pitch(-60.0), VerticalAngle::LowAngle);
    }

    #[test]
    fn yaw_bands_follow_sectors() {
        assert_eq!(HorizontalDirection::from_yaw(22.5), HorizontalDirection::Front);
        assert_eq!(HorizontalDirection::from_yaw(23.0), HorizontalDirection::LeftFront);
        assert_eq!(HorizontalDirection::from_yaw(90.0), HorizontalDirection::Left);
        assert_eq!(HorizontalDirection::from_yaw(157.5), HorizontalDirection::LeftBack);
        assert_eq!(HorizontalDirection::from_yaw(180.0), HorizontalDirection::Back);
        assert_eq!(HorizontalDirection::from_yaw(-157.5), HorizontalDirection::Back);
        assert_eq!(HorizontalDirection::from_yaw(-135.0), HorizontalDirection::RightBack);
        assert_eq!(HorizontalDirection::from_yaw(-90.0), HorizontalDirection::Right);
        assert_eq!(HorizontalDirection::from_yaw(-45.0), HorizontalDirection::RightFront);
        assert_eq!(HorizontalDirection::from_yaw(-22.5), HorizontalDirection::RightFront);
    }

    #[test]
    fn drag_syncs_sliders() {
        let mut cam = CameraState::new();
        cam.drag(100.0, -40.0);
        assert_eq!(cam.yaw(), 50.0);
        assert_eq!(cam.pitch(), -20.0);
        assert_eq!(cam.rotation(), (20.0, 50.0));

        cam.invert_drag = true;
        cam.drag(100.0, 0.0);
        assert_eq!(cam.yaw(), 0.0);
    }

    #[test]
    fn drag_clamps_pitch_and_wraps_yaw() {
        let mut cam = CameraState::new();
        cam.drag(0.0, 1000.0);
        assert_eq!(cam.rotation().0, -90.0);
        assert_eq!(cam.pitch(), 90.0);
        assert_eq!(cam.vertical(), VerticalAngle::HighAngle);

        cam.drag(420.0, 0.0);
        assert_eq!(cam.rotation().1, 210.0);
        assert_eq!(cam.yaw(), -150.0);
        assert_eq!(cam.horizontal(), HorizontalDirection::RightBack);
    }

    #[test]
    fn sliders_write_rotation() {
        let mut cam = CameraState::new();
        cam.set_pitch(30.0);
        cam.set_yaw(-200.0);
        assert_eq!(cam.rotation(), (-30.0, 160.0));
        cam.set_lens_mm(5);
        assert_eq!(cam.lens_mm(), MIN_LENS_MM);
        cam.reset();
        assert_eq!(cam, CameraState::default());
        assert_eq!(cam.lens_label(), "50mm");
    }

    #[test]
    fn presets_keep_light_type() {
        let mut light = LightState { kind: LightType::Spot, ..Default::default() };
        light.apply_preset(LightPreset::GoldenHour);
        assert_eq!(light.kind, LightType::Spot);
        assert_eq!(light.temperature_k, 3500);
        assert_eq!(light.color_hex(), "#FFD7A9");
        assert_eq!(light.temperature_phrase(), "warm");
        light.reset();
        assert_eq!(light, LightState::default());
    }

    #[test]
    fn handle_maps_to_pad() {
        let pad = crate::geometry::rect_xywh(10.0, 10.0, 200.0, 100.0);
        let mut light = LightState::default();
        light.set_handle_position(pad, egui::pos2(500.0, 10.0));
        assert_eq!((light.x, light.y), (1.0, -1.0));
        light.set_handle_position(pad, egui::pos2(110.0, 60.0));
        assert_eq!((light.x, light.y), (0.0, 0.0));
        assert_eq!(light.handle_position(pad), egui::pos2(110.0, 60.0));
    }

    #[test]
    fn overlay_mirrors_handle() {
        let light = LightState::default();
        let o = light.overlay();
        assert_eq!(o.center_x_pct, 50.0);
        assert!((o.center_y_pct - 90.0).abs() < 1e-4);
        assert_eq!(o.hard_stop_pct, 50.0);
        assert_eq!(o.opacity, 0.5);
    }

    #[test]
    fn description_names_every_aspect() {
        let mut light = LightState::default();
        light.apply_preset(LightPreset::Horror);
        let text = light.describe();
        assert!(text.contains("directly below"));
        assert!(text.contains("warm"));
        assert!(text.contains("soft, diffused"));
        assert!(text.contains("#B2EBF2"));
        assert_eq!(LightPreset::parse("Golden-Hour"), Some(LightPreset::GoldenHour));
        assert_eq!(LightType::parse("spot"), Some(LightType::Spot));
    }

    proptest! {
        #[test]
        fn drag_sequences_keep_sliders_in_sync(
            deltas in proptest::collection::vec((-2000.0f32..2000.0, -2000.0f32..2000.0), 1..40),
            invert in any::<bool>(),
        ) {
            let mut cam = CameraState { invert_drag: invert, ..CameraState::default() };
            for (dx, dy) in deltas {
                cam.drag(dx, dy);
                let (rot_x, rot_y) = cam.rotation();
                prop_assert!(cam.yaw() > -180.0 && cam.yaw() <= 180.0);
                prop_assert!((-90.0..=90.0).contains(&rot_x));
                prop_assert_eq!(cam.pitch(), -rot_x);
                prop_assert_eq!(cam.yaw(), normalize_yaw(rot_y));

                // Writing the slider value back lands on the same direction band.
                let mut synced = cam.clone();
                synced.set_yaw(cam.yaw());
                prop_assert_eq!(synced.yaw(), cam.yaw());
                prop_assert_eq!(synced.horizontal(), cam.horizontal());
                synced.set_pitch(cam.pitch());
                prop_assert_eq!(synced.rotation().0, rot_x);
                prop_assert_eq!(synced.vertical(), cam.vertical());
            }
        }

        #[test]
        fn normalized_yaw_is_in_range_and_equivalent(deg in -100_000.0f32..100_000.0) {
            let n = normalize_yaw(deg);
            prop_assert!(n > -180.0 && n <= 180.0);
            let diff = (n as f64 - deg as f64).rem_euclid(360.0);
            prop_assert!(diff < 0.05 || diff > 359.95);
        }
    }
}
