// ============================================================================
// CROP SOLVER - crop box geometry in display space
// ============================================================================
//
// The box lives in display coordinates (the same space as pointer events) and
// is constrained to the displayed image rectangle. Every mutation ends with
// the box inside the image, at least MIN_CROP_SIZE on both sides, and at the
// locked aspect ratio when one is set. Committing maps it back to native
// pixels for extraction.

use egui::{Pos2, Rect, Vec2, pos2, vec2};
use image::{RgbaImage, imageops};

use crate::geometry::CoordinateMapper;

pub const MIN_CROP_SIZE: f32 = 20.0;
/// Preset boxes fill this fraction of the limiting image dimension.
pub const PRESET_FILL: f32 = 0.95;
/// Pointer distance at which a corner or edge counts as grabbed.
pub const HANDLE_TOLERANCE: f32 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CropHandle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl CropHandle {
    pub const ALL: [CropHandle; 8] = [
        CropHandle::TopLeft,
        CropHandle::Top,
        CropHandle::TopRight,
        CropHandle::Right,
        CropHandle::BottomRight,
        CropHandle::Bottom,
        CropHandle::BottomLeft,
        CropHandle::Left,
    ];

    pub fn moves_left(self) -> bool {
        matches!(self, CropHandle::TopLeft | CropHandle::Left | CropHandle::BottomLeft)
    }

    pub fn moves_right(self) -> bool {
        matches!(self, CropHandle::TopRight | CropHandle::Right | CropHandle::BottomRight)
    }

    pub fn moves_top(self) -> bool {
        matches!(self, CropHandle::TopLeft | CropHandle::Top | CropHandle::TopRight)
    }

    pub fn moves_bottom(self) -> bool {
        matches!(self, CropHandle::BottomLeft | CropHandle::Bottom | CropHandle::BottomRight)
    }

    pub fn is_corner(self) -> bool {
        (self.moves_left() || self.moves_right()) && (self.moves_top() || self.moves_bottom())
    }

    /// Where this handle sits on `rect`.
    pub fn position(self, rect: &Rect) -> Pos2 {
        let x = if self.moves_left() {
            rect.left()
        } else if self.moves_right() {
            rect.right()
        } else {
            rect.center().x
        };
        let y = if self.moves_top() {
            rect.top()
        } else if self.moves_bottom() {
            rect.bottom()
        } else {
            rect.center().y
        };
        pos2(x, y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragKind {
    Move,
    Resize(CropHandle),
}

/// Captured at gesture start, discarded on release.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragState {
    pub kind: DragKind,
    pub start_pointer: Pos2,
    pub start_rect: Rect,
}

/// A locked `w:h` ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AspectRatio {
    pub w: u32,
    pub h: u32,
}

impl AspectRatio {
    pub const SQUARE: AspectRatio = AspectRatio::new(1, 1);
    pub const WIDE: AspectRatio = AspectRatio::new(16, 9);

    pub const PRESETS: [AspectRatio; 7] = [
        AspectRatio::new(1, 1),
        AspectRatio::new(4, 3),
        AspectRatio::new(3, 4),
        AspectRatio::new(3, 2),
        AspectRatio::new(2, 3),
        AspectRatio::new(16, 9),
        AspectRatio::new(9, 16),
    ];

    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    pub fn value(&self) -> f32 {
        self.w as f32 / self.h as f32
    }

    /// Parses `"16:9"`. Zero components are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.trim().split_once(':')?;
        let w: u32 = w.trim().parse().ok()?;
        let h: u32 = h.trim().parse().ok()?;
        (w > 0 && h > 0).then_some(Self { w, h })
    }

    pub fn label(&self) -> String {
        format!("{}:{}", self.w, self.h)
    }
}

#[derive(Clone, Copy)]
enum Anchor {
    Start,
    Center,
    End,
}

fn anchored(start: f32, len: f32, new_len: f32, anchor: Anchor) -> f32 {
    match anchor {
        Anchor::Start => start,
        Anchor::Center => start + (len - new_len) * 0.5,
        Anchor::End => start + len - new_len,
    }
}

/// Crop box state for one crop session.
#[derive(Clone, Debug)]
pub struct CropSolver {
    bounds: Rect,
    rect: Rect,
    aspect: Option<AspectRatio>,
    drag: Option<DragState>,
}

impl CropSolver {
    /// Starts a session over the displayed image `bounds`. With a ratio the
    /// preset box is placed; without one the box covers the whole image.
    pub fn new(bounds: Rect, aspect: Option<AspectRatio>) -> Self {
        let mut solver = Self {
            bounds,
            rect: bounds,
            aspect: None,
            drag: None,
        };
        solver.set_aspect(aspect);
        solver
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn aspect(&self) -> Option<AspectRatio> {
        self.aspect
    }

    pub fn drag_state(&self) -> Option<&DragState> {
        self.drag.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Locks (and recentres) or unlocks the ratio. Unlocking keeps the box.
    pub fn set_aspect(&mut self, aspect: Option<AspectRatio>) {
        self.aspect = aspect;
        if let Some(ratio) = aspect {
            self.rect = self.preset_rect(ratio.value());
        }
    }

    /// Picking the active ratio again unlocks it.
    pub fn toggle_aspect(&mut self, ratio: AspectRatio) {
        if self.aspect == Some(ratio) {
            self.aspect = None;
        } else {
            self.set_aspect(Some(ratio));
        }
    }

    /// The displayed image moved or changed size: rescale the box with it.
    pub fn set_bounds(&mut self, bounds: Rect) {
        let old = self.bounds;
        self.bounds = bounds;
        self.drag = None;
        if !old.is_positive() {
            self.rect = match self.aspect {
                Some(ratio) => self.preset_rect(ratio.value()),
                None => bounds,
            };
            return;
        }
        let s = bounds.size() / old.size();
        let mut size = self.rect.size() * s;
        if let Some(ratio) = self.aspect {
            size.y = size.x / ratio.value();
        }
        let min = bounds.min + (self.rect.min - old.min) * s;
        self.rect = self.settle(Rect::from_min_size(min, size));
    }

    /// Which gesture a pointer press at `p` starts, if any.
    pub fn hit_test(&self, p: Pos2) -> Option<DragKind> {
        let r = self.rect;
        for handle in [
            CropHandle::TopLeft,
            CropHandle::TopRight,
            CropHandle::BottomLeft,
            CropHandle::BottomRight,
        ] {
            if p.distance(handle.position(&r)) < HANDLE_TOLERANCE {
                return Some(DragKind::Resize(handle));
            }
        }
        let within_y = p.y > r.top() && p.y < r.bottom();
        let within_x = p.x > r.left() && p.x < r.right();
        if (p.x - r.left()).abs() < HANDLE_TOLERANCE && within_y {
            return Some(DragKind::Resize(CropHandle::Left));
        }
        if (p.x - r.right()).abs() < HANDLE_TOLERANCE && within_y {
            return Some(DragKind::Resize(CropHandle::Right));
        }
        if (p.y - r.top()).abs() < HANDLE_TOLERANCE && within_x {
            return Some(DragKind::Resize(CropHandle::Top));
        }
        if (p.y - r.bottom()).abs() < HANDLE_TOLERANCE && within_x {
            return Some(DragKind::Resize(CropHandle::Bottom));
        }
        r.contains(p).then_some(DragKind::Move)
    }

    pub fn begin_drag(&mut self, kind: DragKind, pointer: Pos2) {
        self.drag = Some(DragState {
            kind,
            start_pointer: pointer,
            start_rect: self.rect,
        });
    }

    /// Applies the gesture for the pointer now at `pointer`, measured from the start.
    pub fn drag_to(&mut self, pointer: Pos2) {
        let Some(drag) = self.drag else {
            return;
        };
        let delta = pointer - drag.start_pointer;
        let next = match drag.kind {
            DragKind::Move => self.moved(drag.start_rect, delta),
            DragKind::Resize(handle) => self.resized(drag.start_rect, handle, delta),
        };
        self.rect = self.settle(next);
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// The box in native pixels as `(x, y, width, height)`, or `None` when it
    /// maps to an empty region.
    pub fn native_region(&self, native_width: u32, native_height: u32) -> Option<(u32, u32, u32, u32)> {
        let mapper = CoordinateMapper::new(self.bounds, native_width, native_height);
        let tl = mapper.to_native(self.rect.left_top())?;
        let br = mapper.to_native(self.rect.right_bottom())?;
        let snap = |v: f32, max: u32| v.round().max(0.0).min(max as f32) as u32;
        let (x0, y0) = (snap(tl.x, native_width), snap(tl.y, native_height));
        let (x1, y1) = (snap(br.x, native_width), snap(br.y, native_height));
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }

    /// Copies the boxed region out of `image`.
    pub fn extract(&self, image: &RgbaImage) -> Option<RgbaImage> {
        let (x, y, w, h) = self.native_region(image.width(), image.height())?;
        Some(imageops::crop_imm(image, x, y, w, h).to_image())
    }

    // ------------------------------------------------------------------------

    fn ratio(&self) -> Option<f32> {
        self.aspect.map(|a| a.value())
    }

    /// Smallest allowed box: 20 on both sides, scaled up along one axis for a ratio.
    fn min_size(&self) -> Vec2 {
        self.min_size_for(self.ratio())
    }

    fn min_size_for(&self, ratio: Option<f32>) -> Vec2 {
        let b = self.bounds.size();
        match ratio {
            None => Vec2::splat(MIN_CROP_SIZE).min(b),
            Some(k) => {
                let h = MIN_CROP_SIZE.max(MIN_CROP_SIZE / k);
                let w = h * k;
                let s = (b.x / w).min(b.y / h).clamp(0.0, 1.0);
                vec2(w * s, h * s)
            }
        }
    }

    fn preset_rect(&self, k: f32) -> Rect {
        let b = self.bounds;
        if !b.is_positive() {
            return Rect::from_min_size(b.min, Vec2::ZERO);
        }
        let size = if k > b.aspect_ratio() {
            let w = b.width() * PRESET_FILL;
            vec2(w, w / k)
        } else {
            let h = b.height() * PRESET_FILL;
            vec2(h * k, h)
        };
        let min = self.min_size_for(Some(k));
        let size = if size.x < min.x || size.y < min.y { min } else { size };
        self.settle(Rect::from_center_size(b.center(), size))
    }

    fn moved(&self, start: Rect, delta: Vec2) -> Rect {
        let b = self.bounds;
        let r = start.translate(delta);
        // Pushing past an edge trims the box there instead of sliding it.
        let at_left = r.left() < b.left();
        let at_top = r.top() < b.top();
        let at_right = r.right() > b.right();
        let at_bottom = r.bottom() > b.bottom();
        let r = r.intersect(b);
        let room = r.size().max(Vec2::ZERO);

        let ax = match (at_left, at_right) {
            (true, false) => Anchor::Start,
            (false, true) => Anchor::End,
            _ => Anchor::Center,
        };
        let ay = match (at_top, at_bottom) {
            (true, false) => Anchor::Start,
            (false, true) => Anchor::End,
            _ => Anchor::Center,
        };

        let min = self.min_size();
        let size = match self.ratio() {
            Some(k) => {
                let h = room.y.min(room.x / k);
                if h * k < min.x || h < min.y { min } else { vec2(h * k, h) }
            }
            None => room.max(min),
        };
        Rect::from_min_size(
            pos2(
                anchored(r.left(), room.x, size.x, ax),
                anchored(r.top(), room.y, size.y, ay),
            ),
            size,
        )
    }

    fn resized(&self, start: Rect, handle: CropHandle, delta: Vec2) -> Rect {
        let b = self.bounds;
        let min = self.min_size();
        let Some(k) = self.ratio() else {
            let mut r = start;
            if handle.moves_left() {
                r.min.x = (r.min.x + delta.x).max(b.left()).min(r.max.x - min.x);
            }
            if handle.moves_right() {
                r.max.x = (r.max.x + delta.x).min(b.right()).max(r.min.x + min.x);
            }
            if handle.moves_top() {
                r.min.y = (r.min.y + delta.y).max(b.top()).min(r.max.y - min.y);
            }
            if handle.moves_bottom() {
                r.max.y = (r.max.y + delta.y).min(b.bottom()).max(r.min.y + min.y);
            }
            return r;
        };

        let raw_w = if handle.moves_left() {
            start.width() - delta.x
        } else if handle.moves_right() {
            start.width() + delta.x
        } else {
            start.width()
        };
        let raw_h = if handle.moves_top() {
            start.height() - delta.y
        } else if handle.moves_bottom() {
            start.height() + delta.y
        } else {
            start.height()
        };

        // Room between the fixed edge (or the centre line) and the image border.
        let c = start.center();
        let room_w = if handle.moves_left() {
            start.right() - b.left()
        } else if handle.moves_right() {
            b.right() - start.left()
        } else {
            2.0 * (c.x - b.left()).min(b.right() - c.x)
        };
        let room_h = if handle.moves_top() {
            start.bottom() - b.top()
        } else if handle.moves_bottom() {
            b.bottom() - start.top()
        } else {
            2.0 * (c.y - b.top()).min(b.bottom() - c.y)
        };

        let wanted_w = if handle.is_corner() {
            // Project the dragged corner onto the ratio diagonal.
            let lambda = (raw_w.max(0.0) * k + raw_h.max(0.0)) / (k * k + 1.0);
            lambda * k
        } else if handle.moves_left() || handle.moves_right() {
            raw_w
        } else {
            raw_h * k
        };
        let w = wanted_w.min(room_w).min(room_h * k).max(min.x);
        let h = w / k;

        let ax = if handle.moves_left() {
            Anchor::End
        } else if handle.moves_right() {
            Anchor::Start
        } else {
            Anchor::Center
        };
        let ay = if handle.moves_top() {
            Anchor::End
        } else if handle.moves_bottom() {
            Anchor::Start
        } else {
            Anchor::Center
        };
        Rect::from_min_size(
            pos2(
                anchored(start.left(), start.width(), w, ax),
                anchored(start.top(), start.height(), h, ay),
            ),
            vec2(w, h),
        )
    }

    /// Final guarantee: fits inside the bounds (uniform shrink when a ratio is
    /// locked), then translated inside.
    fn settle(&self, r: Rect) -> Rect {
        let b = self.bounds;
        let mut size = r.size();
        if size.x > b.width() || size.y > b.height() {
            size = match self.ratio() {
                Some(_) => size * (b.width() / size.x).min(b.height() / size.y),
                None => size.min(b.size()),
            };
        }
        let x = r.left().max(b.left()).min(b.right() - size.x);
        let y = r.top().max(b.top()).min(b.bottom() - size.y);
        Rect::from_min_size(pos2(x, y), size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::rect_xywh;
    use proptest::prelude::*;

    const EPS: f32 = 1e-3;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn wide_preset_on_square_image() {
        let c = CropSolver::new(rect_xywh(0.0, 0.0, 1000.0, 1000.0), Some(AspectRatio::WIDE));
        let r = c.rect();
        assert!(approx(r.width(), 950.0));
        assert!(approx(r.height(), 534.375));
        assert!(approx(r.center().x, 500.0) && approx(r.center().y, 500.0));
    }

    #[test]
    fn portrait_preset_limited_by_height() {
        let c = CropSolver::new(rect_xywh(10.0, 20.0, 1600.0, 900.0), Some(AspectRatio::new(9, 16)));
        let r = c.rect();
        assert!(approx(r.height(), 855.0));
        assert!(approx(r.width(), 855.0 * 9.0 / 16.0));
        assert!(approx(r.center().x, 810.0));
    }

    #[test]
    fn toggling_active_ratio_unlocks() {
        let mut c = CropSolver::new(rect_xywh(0.0, 0.0, 800.0, 600.0), Some(AspectRatio::WIDE));
        let before = c.rect();
        c.toggle_aspect(AspectRatio::WIDE);
        assert_eq!(c.aspect(), None);
        assert_eq!(c.rect(), before);
        c.toggle_aspect(AspectRatio::SQUARE);
        assert_eq!(c.aspect(), Some(AspectRatio::SQUARE));
        assert!(approx(c.rect().width(), 570.0));
    }

    #[test]
    fn free_right_handle_changes_width_only() {
        let mut c = CropSolver::new(rect_xywh(0.0, 0.0, 500.0, 400.0), None);
        c.begin_drag(DragKind::Resize(CropHandle::Right), pos2(500.0, 200.0));
        c.drag_to(pos2(400.0, 260.0));
        c.end_drag();
        assert_eq!(c.rect(), rect_xywh(0.0, 0.0, 400.0, 400.0));
    }

    #[test]
    fn free_top_left_moves_origin_and_shrinks() {
        let mut c = CropSolver::new(rect_xywh(0.0, 0.0, 500.0, 400.0), None);
        c.begin_drag(DragKind::Resize(CropHandle::TopLeft), pos2(0.0, 0.0));
        c.drag_to(pos2(50.0, 30.0));
        assert_eq!(c.rect(), rect_xywh(50.0, 30.0, 450.0, 370.0));
    }

    #[test]
    fn resize_cannot_collapse_below_minimum() {
        let mut c = CropSolver::new(rect_xywh(0.0, 0.0, 500.0, 400.0), None);
        c.begin_drag(DragKind::Resize(CropHandle::Right), pos2(500.0, 200.0));
        c.drag_to(pos2(-900.0, 200.0));
        assert_eq!(c.rect().width(), MIN_CROP_SIZE);
        assert_eq!(c.rect().left(), 0.0);
    }

    #[test]
    fn locked_edge_handle_stays_centred() {
        let mut c = CropSolver::new(rect_xywh(0.0, 0.0, 1000.0, 1000.0), Some(AspectRatio::SQUARE));
        let start = c.rect();
        c.begin_drag(DragKind::Resize(CropHandle::Right), pos2(start.right(), 500.0));
        c.drag_to(pos2(start.right() - 200.0, 500.0));
        let r = c.rect();
        assert!(approx(r.width(), 750.0) && approx(r.height(), 750.0));
        assert!(approx(r.left(), start.left()));
        assert!(approx(r.center().y, start.center().y));
    }

    #[test]
    fn locked_corner_anchors_opposite_corner() {
        let mut c = CropSolver::new(rect_xywh(0.0, 0.0, 1000.0, 1000.0), Some(AspectRatio::SQUARE));
        let start = c.rect();
        c.begin_drag(DragKind::Resize(CropHandle::TopLeft), start.left_top());
        c.drag_to(start.left_top() + vec2(100.0, 100.0));
        let r = c.rect();
        assert!(approx(r.right(), start.right()));
        assert!(approx(r.bottom(), start.bottom()));
        assert!(approx(r.width(), 850.0));
    }

    #[test]
    fn move_past_edge_trims_size() {
        let mut c = CropSolver::new(rect_xywh(0.0, 0.0, 500.0, 500.0), None);
        c.begin_drag(DragKind::Move, pos2(250.0, 250.0));
        c.drag_to(pos2(150.0, 250.0));
        let r = c.rect();
        assert_eq!(r.left(), 0.0);
        assert_eq!(r.width(), 400.0);
        assert_eq!(r.height(), 500.0);
    }

    #[test]
    fn hit_test_regions() {
        let c = CropSolver::new(rect_xywh(0.0, 0.0, 500.0, 500.0), Some(AspectRatio::SQUARE));
        let r = c.rect();
        assert_eq!(c.hit_test(r.left_top() + vec2(2.0, 2.0)), Some(DragKind::Resize(CropHandle::TopLeft)));
        assert_eq!(c.hit_test(pos2(r.right() - 3.0, r.center().y)), Some(DragKind::Resize(CropHandle::Right)));
        assert_eq!(c.hit_test(pos2(r.center().x, r.bottom() + 4.0)), Some(DragKind::Resize(CropHandle::Bottom)));
        assert_eq!(c.hit_test(r.center()), Some(DragKind::Move));
        assert_eq!(c.hit_test(r.left_top() - vec2(50.0, 50.0)), None);
    }

    #[test]
    fn native_region_maps_through_scale() {
        // 400×200 native displayed at 200×100, offset by (50, 30).
        let mut c = CropSolver::new(rect_xywh(50.0, 30.0, 200.0, 100.0), None);
        c.begin_drag(DragKind::Resize(CropHandle::TopLeft), pos2(50.0, 30.0));
        c.drag_to(pos2(100.0, 55.0));
        c.end_drag();
        assert_eq!(c.native_region(400, 200), Some((100, 50, 300, 150)));

        let img = RgbaImage::from_fn(400, 200, |x, y| image::Rgba([x as u8, y as u8, 0, 255]));
        let out = c.extract(&img).unwrap();
        assert_eq!(out.dimensions(), (300, 150));
        assert_eq!(out.get_pixel(0, 0).0, [100, 50, 0, 255]);
    }

    #[test]
    fn rescales_with_display() {
        let mut c = CropSolver::new(rect_xywh(0.0, 0.0, 1000.0, 1000.0), Some(AspectRatio::WIDE));
        c.set_bounds(rect_xywh(0.0, 0.0, 500.0, 500.0));
        assert!(approx(c.rect().width(), 475.0));
        assert!(approx(c.rect().aspect_ratio(), 16.0 / 9.0));
    }

    #[test]
    fn parse_ratio() {
        assert_eq!(AspectRatio::parse("16:9"), Some(AspectRatio::WIDE));
        assert_eq!(AspectRatio::parse(" 4 : 3 "), Some(AspectRatio::new(4, 3)));
        assert_eq!(AspectRatio::parse("0:3"), None);
        assert_eq!(AspectRatio::parse("wide"), None);
        assert_eq!(AspectRatio::WIDE.label(), "16:9");
    }

    fn drag_kind() -> impl Strategy<Value = DragKind> {
        prop_oneof![
            Just(DragKind::Move),
            (0usize..8).prop_map(|i| DragKind::Resize(CropHandle::ALL[i])),
        ]
    }

    fn ratio() -> impl Strategy<Value = Option<AspectRatio>> {
        prop_oneof![
            Just(None),
            (0usize..AspectRatio::PRESETS.len()).prop_map(|i| Some(AspectRatio::PRESETS[i])),
        ]
    }

    proptest! {
        #[test]
        fn drags_keep_box_valid(
            bw in 100f32..2000.0,
            bh in 100f32..2000.0,
            ox in -200f32..200.0,
            oy in -200f32..200.0,
            aspect in ratio(),
            gestures in proptest::collection::vec(
                (drag_kind(), proptest::collection::vec((-3000f32..3000.0, -3000f32..3000.0), 1..6)),
                1..8,
            ),
        ) {
            let bounds = rect_xywh(ox, oy, bw, bh);
            let mut c = CropSolver::new(bounds, aspect);
            for (kind, moves) in gestures {
                let start = c.rect().center();
                c.begin_drag(kind, start);
                for (dx, dy) in moves {
                    c.drag_to(start + vec2(dx, dy));
                    let r = c.rect();
                    prop_assert!(bounds.expand(1e-2).contains_rect(r), "{:?} outside {:?}", r, bounds);
                    prop_assert!(r.width() >= MIN_CROP_SIZE - 1e-3 && r.height() >= MIN_CROP_SIZE - 1e-3, "{:?} too small", r);
                    if let Some(a) = aspect {
                        prop_assert!((r.aspect_ratio() - a.value()).abs() < 1e-3, "{:?} off ratio {:?}", r, a);
                    }
                }
                c.end_drag();
            }
        }
    }
}
