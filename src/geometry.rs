//! Display ↔ native coordinate mapping.
//!
//! Every pointer event arrives in display space (the on-screen rectangle the
//! image is painted into). Rasters live in native space (their real pixel
//! dimensions). A [`CoordinateMapper`] is built fresh for every event because
//! the display rectangle changes whenever the window is resized.

use egui::{Pos2, Rect, Vec2, pos2, vec2};

/// Converts pointer positions between display space and native pixel space.
#[derive(Clone, Copy, Debug)]
pub struct CoordinateMapper {
    display: Rect,
    native: Vec2,
}

impl CoordinateMapper {
    pub fn new(display: Rect, native_width: u32, native_height: u32) -> Self {
        Self {
            display,
            native: vec2(native_width as f32, native_height as f32),
        }
    }

    pub fn display_rect(&self) -> Rect {
        self.display
    }

    /// `(N/D)` per axis, or `None` for a degenerate display size.
    pub fn scale(&self) -> Option<Vec2> {
        let size = self.display.size();
        if size.x <= 0.0 || size.y <= 0.0 {
            return None;
        }
        Some(self.native / size)
    }

    pub fn to_native(&self, display: Pos2) -> Option<Pos2> {
        let s = self.scale()?;
        Some(((display - self.display.min) * s).to_pos2())
    }

    pub fn to_display(&self, native: Pos2) -> Option<Pos2> {
        let s = self.scale()?;
        if s.x <= 0.0 || s.y <= 0.0 {
            return None;
        }
        Some(self.display.min + native.to_vec2() / s)
    }

    /// Scales a length measured in display pixels (a brush width) to native pixels.
    pub fn len_to_native(&self, len: f32) -> Option<f32> {
        self.scale().map(|s| len * s.x)
    }
}

/// Fits `native_width × native_height` into `area` preserving aspect ratio,
/// centred, never upscaling past `max_zoom`.
pub fn fit_into(area: Rect, native_width: u32, native_height: u32, max_zoom: f32) -> Rect {
    if native_width == 0 || native_height == 0 || !area.is_positive() {
        return Rect::from_min_size(area.min, Vec2::ZERO);
    }
    let zoom = (area.width() / native_width as f32)
        .min(area.height() / native_height as f32)
        .min(max_zoom);
    Rect::from_center_size(
        area.center(),
        vec2(native_width as f32 * zoom, native_height as f32 * zoom),
    )
}

/// `(x, y, width, height)` shorthand used throughout the editing code.
pub fn rect_xywh(x: f32, y: f32, width: f32, height: f32) -> Rect {
    Rect::from_min_size(pos2(x, y), vec2(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_pointer_offset_by_native_over_display() {
        let m = CoordinateMapper::new(rect_xywh(100.0, 50.0, 500.0, 250.0), 2000, 1000);
        let p = m.to_native(pos2(350.0, 175.0)).unwrap();
        assert_eq!(p, pos2(1000.0, 500.0));
        let back = m.to_display(p).unwrap();
        assert_eq!(back, pos2(350.0, 175.0));
    }

    #[test]
    fn zero_display_size_is_skipped() {
        let m = CoordinateMapper::new(rect_xywh(0.0, 0.0, 0.0, 300.0), 800, 600);
        assert!(m.scale().is_none());
        assert!(m.to_native(pos2(10.0, 10.0)).is_none());
        assert!(m.len_to_native(20.0).is_none());
    }

    #[test]
    fn brush_width_scales_with_resolution() {
        let m = CoordinateMapper::new(rect_xywh(0.0, 0.0, 400.0, 300.0), 1600, 1200);
        assert_eq!(m.len_to_native(20.0), Some(80.0));
    }

    #[test]
    fn fit_into_centres_and_preserves_aspect() {
        let r = fit_into(rect_xywh(0.0, 0.0, 1000.0, 500.0), 400, 400, 10.0);
        assert_eq!(r, rect_xywh(250.0, 0.0, 500.0, 500.0));
        let small = fit_into(rect_xywh(0.0, 0.0, 1000.0, 500.0), 100, 100, 1.0);
        assert_eq!(small.width(), 100.0);
        assert!(!fit_into(rect_xywh(5.0, 5.0, 0.0, 10.0), 10, 10, 1.0).is_positive());
    }
}
