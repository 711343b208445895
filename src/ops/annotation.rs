// ============================================================================
// ANNOTATION SESSION - strokes and text boxes over a background image
// ============================================================================
//
// Two layers sit over the base image: a stroke raster at native resolution
// (own undo history) and a list of text boxes positioned in display space,
// relative to the canvas's on-screen origin. Text boxes own no pixels until
// `flatten` burns them in using the display→native scale.

use egui::{Pos2, Rect, Vec2, pos2, vec2};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::components::history::HistoryStack;
use crate::components::tools::Tool;
use crate::geometry::CoordinateMapper;
use crate::ops::stroke::{StrokePainter, source_over};
use crate::ops::text::TextPainter;

pub const DEFAULT_ANNOTATION_COLOR: [u8; 4] = [255, 235, 59, 255];
pub const DEFAULT_ANNOTATION_BRUSH: f32 = 5.0;
pub const DEFAULT_TEXT_SIZE: f32 = 20.0;
pub const DEFAULT_TEXT_BOX_WIDTH: f32 = 150.0;
/// Resizes to this width or less are ignored.
pub const MIN_TEXT_BOX_WIDTH: f32 = 50.0;
/// Font sizes at or below this are not applied during a resize.
pub const MIN_FONT_SIZE: f32 = 8.0;
pub const LINE_HEIGHT: f32 = 1.2;
/// Side of the square grab area around a text box's bottom-right corner.
pub const RESIZE_HANDLE_SIZE: f32 = 10.0;
const VIEWPORT_FILL_W: f32 = 0.95;
const VIEWPORT_FILL_H: f32 = 0.9;

#[derive(Clone, Debug, PartialEq)]
pub struct TextBox {
    pub id: String,
    /// Left edge, display pixels from the canvas origin.
    pub x: f32,
    /// Top edge, display pixels from the canvas origin.
    pub y: f32,
    pub width: f32,
    pub font_size: f32,
    pub color: [u8; 4],
    pub content: String,
}

impl TextBox {
    pub fn line_count(&self) -> usize {
        self.content.split('\n').count().max(1)
    }

    pub fn height(&self) -> f32 {
        self.line_count() as f32 * self.font_size * LINE_HEIGHT
    }

    /// Box bounds in canvas-local display space.
    pub fn bounds(&self) -> Rect {
        Rect::from_min_size(pos2(self.x, self.y), vec2(self.width, self.height()))
    }

    /// Square grab area centred on the bottom-right corner.
    pub fn resize_handle(&self) -> Rect {
        Rect::from_center_size(self.bounds().right_bottom(), Vec2::splat(RESIZE_HANDLE_SIZE))
    }

    fn hit(&self, local: Pos2) -> Option<TextHit> {
        if self.resize_handle().contains(local) {
            return Some(TextHit::ResizeHandle);
        }
        self.bounds().contains(local).then_some(TextHit::Body)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextHit {
    Body,
    ResizeHandle,
}

#[derive(Clone, Debug, PartialEq)]
enum Gesture {
    Idle,
    Stroke,
    MoveBox {
        id: String,
        start: Pos2,
        origin: Pos2,
    },
    ResizeBox {
        id: String,
        start_x: f32,
        start_width: f32,
        start_font: f32,
    },
}

/// On-screen size for a `native_w × native_h` canvas inside the viewport.
pub fn display_size(native_w: u32, native_h: u32, viewport_w: f32, viewport_h: f32) -> Vec2 {
    if native_w == 0 || native_h == 0 {
        return Vec2::ZERO;
    }
    let max_w = viewport_w * VIEWPORT_FILL_W;
    let max_h = viewport_h * VIEWPORT_FILL_H;
    let aspect = native_w as f32 / native_h as f32;
    let (mut w, mut h) = (max_w, max_w / aspect);
    if h > max_h {
        h = max_h;
        w = max_h * aspect;
    }
    vec2(w, h)
}

pub struct AnnotationSession {
    base: RgbaImage,
    strokes: RgbaImage,
    history: HistoryStack<RgbaImage>,
    painter: StrokePainter,
    display: Rect,
    text_boxes: Vec<TextBox>,
    selected: Option<String>,
    next_id: u32,
    tool: Tool,
    color: [u8; 4],
    brush_size: f32,
    text_size: f32,
    gesture: Gesture,
    /// The last press only dismissed a selection; its click must not place a box.
    just_deselected: bool,
}

impl AnnotationSession {
    /// Opens a session on `background`, sized to fit the viewport, with the
    /// canvas's top-left at the viewport origin.
    pub fn open(background: RgbaImage, viewport_w: f32, viewport_h: f32) -> Self {
        let size = display_size(background.width(), background.height(), viewport_w, viewport_h);
        let strokes = RgbaImage::new(background.width(), background.height());
        let mut history = HistoryStack::new();
        history.push(strokes.clone());
        log::info!(
            "annotation session opened on {}x{} background",
            background.width(),
            background.height()
        );
        Self {
            base: background,
            strokes,
            history,
            painter: StrokePainter::new(),
            display: Rect::from_min_size(Pos2::ZERO, size),
            text_boxes: Vec::new(),
            selected: None,
            next_id: 0,
            tool: Tool::Brush,
            color: DEFAULT_ANNOTATION_COLOR,
            brush_size: DEFAULT_ANNOTATION_BRUSH,
            text_size: DEFAULT_TEXT_SIZE,
            gesture: Gesture::Idle,
            just_deselected: false,
        }
    }

    // --- accessors ---------------------------------------------------------

    pub fn base(&self) -> &RgbaImage {
        &self.base
    }

    pub fn strokes(&self) -> &RgbaImage {
        &self.strokes
    }

    pub fn history(&self) -> &HistoryStack<RgbaImage> {
        &self.history
    }

    pub fn display_rect(&self) -> Rect {
        self.display
    }

    /// Moves the on-screen canvas; text boxes keep their canvas-local positions.
    pub fn set_display_rect(&mut self, rect: Rect) {
        self.display = rect;
    }

    pub fn text_boxes(&self) -> &[TextBox] {
        &self.text_boxes
    }

    pub fn text_box(&self, id: &str) -> Option<&TextBox> {
        self.text_boxes.iter().find(|b| b.id == id)
    }

    pub fn selected(&self) -> Option<&TextBox> {
        self.selected.as_deref().and_then(|id| self.text_box(id))
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn color(&self) -> [u8; 4] {
        self.color
    }

    pub fn brush_size(&self) -> f32 {
        self.brush_size
    }

    pub fn text_size(&self) -> f32 {
        self.text_size
    }

    // --- toolbar -------------------------------------------------------------

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
        if tool != Tool::Text {
            self.deselect();
        }
    }

    /// Also recolours the selected text box.
    pub fn set_color(&mut self, color: [u8; 4]) {
        self.color = color;
        if let Some(b) = self.selected_mut() {
            b.color = color;
        }
    }

    pub fn set_brush_size(&mut self, size: f32) {
        self.brush_size = size.max(1.0);
    }

    /// Also resizes the selected text box's font.
    pub fn set_text_size(&mut self, size: f32) {
        self.text_size = size.max(1.0);
        let size = self.text_size;
        if let Some(b) = self.selected_mut() {
            b.font_size = size;
        }
    }

    // --- text boxes ----------------------------------------------------------

    /// Places a new empty box at a canvas-local position and selects it.
    pub fn add_text_box(&mut self, local: Pos2) -> String {
        self.deselect();
        let id = format!("text-{}", self.next_id);
        self.next_id += 1;
        self.text_boxes.push(TextBox {
            id: id.clone(),
            x: local.x,
            y: local.y,
            width: DEFAULT_TEXT_BOX_WIDTH,
            font_size: self.text_size,
            color: self.color,
            content: String::new(),
        });
        self.select(&id);
        id
    }

    pub fn remove_text_box(&mut self, id: &str) -> bool {
        let before = self.text_boxes.len();
        self.text_boxes.retain(|b| b.id != id);
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        self.text_boxes.len() != before
    }

    pub fn set_text(&mut self, id: &str, content: &str) -> bool {
        match self.text_boxes.iter_mut().find(|b| b.id == id) {
            Some(b) => {
                b.content = content.to_string();
                true
            }
            None => false,
        }
    }

    pub fn select(&mut self, id: &str) -> bool {
        if self.text_box(id).is_none() {
            return false;
        }
        self.selected = Some(id.to_string());
        self.just_deselected = false;
        true
    }

    pub fn deselect(&mut self) {
        if self.selected.take().is_some() {
            self.just_deselected = true;
        }
    }

    /// Delete/Backspace. Ignored while focus is inside the box's own text input.
    pub fn key_delete(&mut self, focus_in_text: bool) -> bool {
        if focus_in_text {
            return false;
        }
        match self.selected.clone() {
            Some(id) => self.remove_text_box(&id),
            None => false,
        }
    }

    /// Topmost text box under a screen point.
    pub fn hit_test(&self, screen: Pos2) -> Option<(String, TextHit)> {
        let local = self.to_local(screen);
        self.text_boxes
            .iter()
            .rev()
            .find_map(|b| b.hit(local).map(|h| (b.id.clone(), h)))
    }

    // --- pointer -------------------------------------------------------------

    pub fn pointer_down(&mut self, screen: Pos2) {
        if let Some((id, hit)) = self.hit_test(screen) {
            self.select(&id);
            let gesture = self.text_box(&id).map(|b| match hit {
                TextHit::Body => Gesture::MoveBox {
                    id: b.id.clone(),
                    start: screen,
                    origin: pos2(b.x, b.y),
                },
                TextHit::ResizeHandle => Gesture::ResizeBox {
                    id: b.id.clone(),
                    start_x: screen.x,
                    start_width: b.width,
                    start_font: b.font_size,
                },
            });
            self.gesture = gesture.unwrap_or(Gesture::Idle);
            return;
        }

        // Press on bare canvas.
        self.just_deselected = false;
        self.deselect();
        let Some(mode) = self.tool.composite_mode() else {
            return;
        };
        let mapper = self.mapper();
        let (Some(at), Some(width)) = (mapper.to_native(screen), mapper.len_to_native(self.brush_size)) else {
            return;
        };
        let color = match self.tool {
            Tool::Eraser => [0, 0, 0, 255],
            _ => self.color,
        };
        self.history.begin_mutation();
        self.painter.begin(&self.strokes, at, mode, color, width);
        self.gesture = Gesture::Stroke;
    }

    pub fn pointer_move(&mut self, screen: Pos2) {
        match self.gesture.clone() {
            Gesture::Idle => {}
            Gesture::Stroke => {
                if let Some(to) = self.mapper().to_native(screen) {
                    self.painter.extend(&mut self.strokes, to);
                }
            }
            Gesture::MoveBox { id, start, origin } => {
                if let Some(b) = self.text_boxes.iter_mut().find(|b| b.id == id) {
                    let at = origin + (screen - start);
                    b.x = at.x;
                    b.y = at.y;
                }
            }
            Gesture::ResizeBox {
                id,
                start_x,
                start_width,
                start_font,
            } => {
                let new_width = start_width + (screen.x - start_x);
                if new_width <= MIN_TEXT_BOX_WIDTH || start_width <= 0.0 {
                    return;
                }
                if let Some(b) = self.text_boxes.iter_mut().find(|b| b.id == id) {
                    b.width = new_width;
                    let font = start_font * new_width / start_width;
                    if font > MIN_FONT_SIZE {
                        b.font_size = font;
                    }
                }
            }
        }
    }

    /// Release or leaving the canvas. A finished stroke is recorded.
    pub fn pointer_up(&mut self) {
        if self.gesture == Gesture::Stroke {
            let painted = self.painter.finish(&mut self.strokes);
            self.history.end_mutation();
            if painted {
                self.history.push(self.strokes.clone());
            }
        }
        self.gesture = Gesture::Idle;
    }

    /// A completed click. With the text tool on bare canvas this places a box,
    /// unless the same press only dismissed the previous selection.
    pub fn click(&mut self, screen: Pos2) -> Option<String> {
        let dismissed = std::mem::take(&mut self.just_deselected);
        if self.tool != Tool::Text || dismissed || self.hit_test(screen).is_some() {
            return None;
        }
        if !self.display.is_positive() || !self.display.contains(screen) {
            return None;
        }
        Some(self.add_text_box(self.to_local(screen)))
    }

    // --- history -------------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        if self.gesture == Gesture::Stroke {
            return false;
        }
        match self.history.undo() {
            Some(prev) => {
                self.strokes = prev.clone();
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        if self.gesture == Gesture::Stroke {
            return false;
        }
        match self.history.redo() {
            Some(next) => {
                self.strokes = next.clone();
                true
            }
            None => false,
        }
    }

    /// Back to the opening state: first stroke snapshot restored and
    /// recorded, all text boxes removed.
    pub fn clear(&mut self) {
        self.painter.cancel();
        self.history.end_mutation();
        self.gesture = Gesture::Idle;
        if let Some(first) = self.history.first().cloned() {
            self.strokes = first;
            self.history.push(self.strokes.clone());
        }
        self.text_boxes.clear();
        self.selected = None;
    }

    // --- output --------------------------------------------------------------

    /// Base image with the stroke layer on top (text boxes excluded).
    pub fn composite(&self) -> RgbaImage {
        let mut out = self.base.clone();
        let strokes = self.strokes.as_raw();
        out.par_chunks_mut(4)
            .zip(strokes.par_chunks(4))
            .for_each(|(dst, src)| {
                if src[3] == 0 {
                    return;
                }
                let blended = source_over(
                    Rgba([dst[0], dst[1], dst[2], dst[3]]),
                    Rgba([src[0], src[1], src[2], src[3]]),
                );
                dst.copy_from_slice(&blended.0);
            });
        out
    }

    /// Burns every text box into the composite and ends the session.
    pub fn flatten(self, painter: &mut dyn TextPainter) -> RgbaImage {
        let mut out = self.composite();
        let scale = if self.display.width() > 0.0 {
            self.base.width() as f32 / self.display.width()
        } else {
            1.0
        };
        for b in &self.text_boxes {
            let font = b.font_size * scale;
            let lines: Vec<String> = b
                .content
                .split('\n')
                .flat_map(|para| wrap_paragraph(&*painter, para, font, b.width * scale))
                .collect();
            for (i, line) in lines.iter().enumerate() {
                let y = b.y * scale + i as f32 * font * LINE_HEIGHT;
                painter.draw_line(&mut out, line, b.x * scale, y, font, b.color);
            }
        }
        log::info!("annotation flattened with {} text box(es)", self.text_boxes.len());
        out
    }

    // ------------------------------------------------------------------------

    fn mapper(&self) -> CoordinateMapper {
        CoordinateMapper::new(self.display, self.base.width(), self.base.height())
    }

    fn to_local(&self, screen: Pos2) -> Pos2 {
        (screen - self.display.min).to_pos2()
    }

    fn selected_mut(&mut self) -> Option<&mut TextBox> {
        let id = self.selected.clone()?;
        self.text_boxes.iter_mut().find(|b| b.id == id)
    }
}

/// Greedy word wrap of one paragraph to `max_width`. A word wider than the
/// box gets a line of its own; an empty paragraph still takes a line.
fn wrap_paragraph(painter: &dyn TextPainter, para: &str, font_px: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in para.split(' ') {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if painter.measure(&candidate, font_px) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    lines.push(current);
    lines
}
