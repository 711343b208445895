// ============================================================================
// STROKE PAINTER - round-capped, midpoint-smoothed freehand strokes
// ============================================================================
//
// Shared by the mask editor and the annotation canvas. Points arrive in
// native pixel space. Each move draws a quadratic segment from the previous
// midpoint, through the previous point as control, to the new midpoint, so
// sampled pointer positions never show as polygon corners.
//
// Every pixel is blended at most once per stroke. Overlapping segments of the
// same stroke therefore never build up opacity, and erasing along an
// identical path removes exactly what painting along it added.

use egui::{Pos2, pos2};
use image::{Rgba, RgbaImage};

use crate::components::tools::CompositeMode;

/// A one-pixel-wide stroke still covers the pixel centre it passes through.
const MIN_RADIUS: f32 = 0.71;
/// Guard against runaway subdivision on absurd inputs.
const MAX_SEGMENT_STEPS: usize = 4096;

/// "Already blended during this stroke" flags, kept only over the box the
/// stroke has touched so far. The box grows as the stroke reaches new pixels.
#[derive(Default)]
struct Coverage {
    x0: u32,
    y0: u32,
    w: u32,
    h: u32,
    flags: Vec<bool>,
}

impl Coverage {
    /// Makes sure the inclusive pixel box `x0..=x1, y0..=y1` is tracked.
    /// Growth adds a quarter of the new extent on each side, clipped to `limit`.
    fn include(&mut self, (x0, y0, x1, y1): (u32, u32, u32, u32), limit: (u32, u32)) {
        let (ex, ey) = (x1 + 1, y1 + 1);
        if self.w > 0 && x0 >= self.x0 && y0 >= self.y0 && ex <= self.x0 + self.w && ey <= self.y0 + self.h {
            return;
        }
        let (mut nx0, mut ny0, mut nx1, mut ny1) = if self.w == 0 {
            (x0, y0, ex, ey)
        } else {
            (
                self.x0.min(x0),
                self.y0.min(y0),
                (self.x0 + self.w).max(ex),
                (self.y0 + self.h).max(ey),
            )
        };
        let (pad_x, pad_y) = ((nx1 - nx0) / 4, (ny1 - ny0) / 4);
        nx0 = nx0.saturating_sub(pad_x);
        ny0 = ny0.saturating_sub(pad_y);
        nx1 = (nx1 + pad_x).min(limit.0);
        ny1 = (ny1 + pad_y).min(limit.1);

        let (nw, nh) = (nx1 - nx0, ny1 - ny0);
        let mut flags = vec![false; nw as usize * nh as usize];
        for row in 0..self.h {
            let src = (row * self.w) as usize;
            let dst = ((self.y0 + row - ny0) * nw + (self.x0 - nx0)) as usize;
            flags[dst..dst + self.w as usize].copy_from_slice(&self.flags[src..src + self.w as usize]);
        }
        *self = Coverage {
            x0: nx0,
            y0: ny0,
            w: nw,
            h: nh,
            flags,
        };
    }

    /// Marks `(x, y)`; `false` when it was already marked. The pixel must lie
    /// inside a box passed to [`include`](Self::include).
    fn mark(&mut self, x: u32, y: u32) -> bool {
        let idx = ((y - self.y0) * self.w + (x - self.x0)) as usize;
        !std::mem::replace(&mut self.flags[idx], true)
    }
}

struct ActiveStroke {
    mode: CompositeMode,
    color: [u8; 4],
    radius: f32,
    last: Pos2,
    last_mid: Pos2,
    moved: bool,
    covered: Coverage,
    width: u32,
    height: u32,
}

/// Stroke state machine: idle until [`begin`](Self::begin), drawing until
/// [`finish`](Self::finish) or [`cancel`](Self::cancel).
#[derive(Default)]
pub struct StrokePainter {
    active: Option<ActiveStroke>,
}

impl StrokePainter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_drawing(&self) -> bool {
        self.active.is_some()
    }

    /// Starts a stroke at `at`. `width` is the stroke diameter in native pixels.
    pub fn begin(
        &mut self,
        canvas: &RgbaImage,
        at: Pos2,
        mode: CompositeMode,
        color: [u8; 4],
        width: f32,
    ) {
        let (w, h) = canvas.dimensions();
        self.active = Some(ActiveStroke {
            mode,
            color,
            radius: (width * 0.5).max(MIN_RADIUS),
            last: at,
            last_mid: at,
            moved: false,
            covered: Coverage::default(),
            width: w,
            height: h,
        });
    }

    /// Extends the stroke to `to` and rasterises the new smoothed segment.
    pub fn extend(&mut self, canvas: &mut RgbaImage, to: Pos2) {
        let Some(stroke) = self.active.as_mut() else {
            return;
        };
        if canvas.dimensions() != (stroke.width, stroke.height) {
            log::warn!("stroke canvas changed size mid-stroke, dropping stroke");
            self.active = None;
            return;
        }
        let mid = stroke.last.lerp(to, 0.5);
        let (from, control) = (stroke.last_mid, stroke.last);
        stroke.quad(canvas, from, control, mid);
        stroke.last_mid = mid;
        stroke.last = to;
        stroke.moved = true;
    }

    /// Closes the path. Returns `true` if a stroke was in progress.
    pub fn finish(&mut self, canvas: &mut RgbaImage) -> bool {
        let Some(mut stroke) = self.active.take() else {
            return false;
        };
        if canvas.dimensions() != (stroke.width, stroke.height) {
            return true;
        }
        let (from, to) = if stroke.moved {
            (stroke.last_mid, stroke.last)
        } else {
            (stroke.last, stroke.last)
        };
        stroke.segment(canvas, from, to);
        true
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }
}

impl ActiveStroke {
    fn quad(&mut self, canvas: &mut RgbaImage, p0: Pos2, c: Pos2, p1: Pos2) {
        let approx_len = p0.distance(c) + c.distance(p1);
        let step = (self.radius * 0.5).max(0.5);
        let steps = ((approx_len / step).ceil() as usize).clamp(1, MAX_SEGMENT_STEPS);
        let mut prev = p0;
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            // De Casteljau: lerp of the two control-leg lerps.
            let pt = p0.lerp(c, t).lerp(c.lerp(p1, t), t);
            self.segment(canvas, prev, pt);
            prev = pt;
        }
    }

    /// Capsule from `a` to `b` with the stroke radius (round caps).
    fn segment(&mut self, canvas: &mut RgbaImage, a: Pos2, b: Pos2) {
        let r = self.radius;
        let x0 = (a.x.min(b.x) - r).floor().max(0.0) as i64;
        let y0 = (a.y.min(b.y) - r).floor().max(0.0) as i64;
        let x1 = ((a.x.max(b.x) + r).ceil() as i64).min(self.width as i64 - 1);
        let y1 = ((a.y.max(b.y) + r).ceil() as i64).min(self.height as i64 - 1);
        if x1 < x0 || y1 < y0 {
            return;
        }
        self.covered.include(
            (x0 as u32, y0 as u32, x1 as u32, y1 as u32),
            (self.width, self.height),
        );
        for y in y0..=y1 {
            for x in x0..=x1 {
                let centre = pos2(x as f32 + 0.5, y as f32 + 0.5);
                if distance_to_segment(centre, a, b) > r {
                    continue;
                }
                let (px, py) = (x as u32, y as u32);
                if !self.covered.mark(px, py) {
                    continue;
                }
                let dst = *canvas.get_pixel(px, py);
                let out = match self.mode {
                    CompositeMode::SourceOver => source_over(dst, Rgba(self.color)),
                    CompositeMode::DestinationOut => destination_out(dst, self.color[3]),
                };
                canvas.put_pixel(px, py, out);
            }
        }
    }
}

fn distance_to_segment(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len2 = ab.length_sq();
    if len2 <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Non-premultiplied `src` over `dst`.
pub fn source_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 || dst[3] == 0 {
        return src;
    }
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }
    let inv = 1.0 / out_a;
    let ch = |i: usize| {
        ((src[i] as f32 * sa + dst[i] as f32 * da * (1.0 - sa)) * inv)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    Rgba([ch(0), ch(1), ch(2), (out_a * 255.0).round().clamp(0.0, 255.0) as u8])
}

/// `dst` alpha scaled by `1 - src_alpha`; fully cleared pixels become transparent black.
pub fn destination_out(dst: Rgba<u8>, src_alpha: u8) -> Rgba<u8> {
    let keep = 1.0 - src_alpha as f32 / 255.0;
    let a = (dst[3] as f32 * keep).round().clamp(0.0, 255.0) as u8;
    if a == 0 {
        Rgba([0, 0, 0, 0])
    } else {
        Rgba([dst[0], dst[1], dst[2], a])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAINT: [u8; 4] = [255, 235, 59, 179];

    fn draw(canvas: &mut RgbaImage, path: &[Pos2], mode: CompositeMode, color: [u8; 4], width: f32) {
        let mut p = StrokePainter::new();
        p.begin(canvas, path[0], mode, color, width);
        for &pt in &path[1..] {
            p.extend(canvas, pt);
        }
        assert!(p.finish(canvas));
    }

    #[test]
    fn click_stamps_a_round_dot() {
        let mut c = RgbaImage::new(40, 40);
        draw(&mut c, &[pos2(20.0, 20.0)], CompositeMode::SourceOver, PAINT, 10.0);
        assert_eq!(c.get_pixel(20, 20).0, PAINT);
        assert_eq!(c.get_pixel(24, 20).0, PAINT);
        assert_eq!(c.get_pixel(26, 20)[3], 0);
        // Corner of the bounding square stays clear.
        assert_eq!(c.get_pixel(24, 24)[3], 0);
    }

    #[test]
    fn self_overlapping_stroke_does_not_accumulate() {
        let mut c = RgbaImage::new(64, 64);
        let path = [
            pos2(10.0, 32.0),
            pos2(50.0, 32.0),
            pos2(30.0, 10.0),
            pos2(30.0, 54.0),
            pos2(10.0, 32.0),
        ];
        draw(&mut c, &path, CompositeMode::SourceOver, PAINT, 8.0);
        for px in c.pixels() {
            assert!(px[3] == 0 || px.0 == PAINT, "unexpected pixel {:?}", px);
        }
        assert!(c.pixels().any(|p| p[3] > 0));
    }

    #[test]
    fn erase_along_same_path_round_trips() {
        let mut c = RgbaImage::new(80, 60);
        let path = [
            pos2(5.0, 5.0),
            pos2(30.0, 40.0),
            pos2(33.5, 41.2),
            pos2(75.0, 10.0),
        ];
        draw(&mut c, &path, CompositeMode::SourceOver, PAINT, 12.0);
        assert!(c.pixels().any(|p| p[3] > 0));
        draw(&mut c, &path, CompositeMode::DestinationOut, [0, 0, 0, 255], 12.0);
        assert!(c.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn coverage_tracks_only_the_touched_box() {
        let mut c = RgbaImage::new(4000, 3000);
        let mut p = StrokePainter::new();
        p.begin(&c, pos2(100.0, 100.0), CompositeMode::SourceOver, PAINT, 10.0);
        p.extend(&mut c, pos2(140.0, 110.0));
        let cov = &p.active.as_ref().unwrap().covered;
        assert!(cov.flags.len() < 200 * 200, "{} flags", cov.flags.len());
        assert!(p.finish(&mut c));
    }

    #[test]
    fn coverage_growth_keeps_earlier_marks() {
        let mut cov = Coverage::default();
        cov.include((10, 10, 12, 12), (100, 100));
        assert!(cov.mark(11, 11));
        cov.include((0, 0, 50, 40), (100, 100));
        assert!(!cov.mark(11, 11));
        assert!(cov.mark(50, 40));
        assert!(cov.x0 == 0 && cov.y0 == 0);
        assert!(cov.x0 + cov.w <= 100 && cov.y0 + cov.h <= 100);
    }

    #[test]
    fn blending_rules() {
        let base = Rgba([0, 0, 255, 255]);
        let over = source_over(base, Rgba([255, 0, 0, 128]));
        assert_eq!(over[3], 255);
        assert!(over[0] > 120 && over[2] < 135);
        assert_eq!(destination_out(base, 255), Rgba([0, 0, 0, 0]));
        assert_eq!(destination_out(base, 0), base);
    }

    #[test]
    fn strokes_outside_canvas_are_clipped() {
        let mut c = RgbaImage::new(10, 10);
        draw(
            &mut c,
            &[pos2(-50.0, -50.0), pos2(-40.0, -45.0)],
            CompositeMode::SourceOver,
            PAINT,
            4.0,
        );
        assert!(c.pixels().all(|p| p[3] == 0));
    }
}
