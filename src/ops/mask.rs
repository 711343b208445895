// ============================================================================
// MASK EDITOR - paint a selection over the current image for local edits
// ============================================================================

use egui::Pos2;
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::components::history::HistoryStack;
use crate::components::tools::Tool;
use crate::geometry::CoordinateMapper;
use crate::ops::stroke::{StrokePainter, source_over};

/// Semi-transparent yellow, the colour the edit model is told to look for.
pub const MASK_COLOR: [u8; 4] = [255, 235, 59, 179];
const ERASER_COLOR: [u8; 4] = [0, 0, 0, 255];
pub const DEFAULT_MASK_BRUSH: f32 = 20.0;

/// Mask layer at the image's native resolution, with its own undo history.
pub struct MaskEditor {
    layer: RgbaImage,
    history: HistoryStack<RgbaImage>,
    painter: StrokePainter,
    tool: Tool,
    /// Brush diameter in display pixels.
    brush_size: f32,
}

impl MaskEditor {
    pub fn new(width: u32, height: u32, brush_size: f32) -> Self {
        let layer = RgbaImage::new(width, height);
        let mut history = HistoryStack::new();
        history.push(layer.clone());
        Self {
            layer,
            history,
            painter: StrokePainter::new(),
            tool: Tool::Brush,
            brush_size,
        }
    }

    /// Drops all strokes and reallocates for a (possibly new) image size.
    pub fn reinit(&mut self, width: u32, height: u32) {
        self.painter.cancel();
        self.layer = RgbaImage::new(width, height);
        self.history.reset(self.layer.clone());
    }

    pub fn layer(&self) -> &RgbaImage {
        &self.layer
    }

    pub fn history(&self) -> &HistoryStack<RgbaImage> {
        &self.history
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Only brush and eraser apply here.
    pub fn set_tool(&mut self, tool: Tool) {
        if tool != Tool::Text {
            self.tool = tool;
        }
    }

    pub fn brush_size(&self) -> f32 {
        self.brush_size
    }

    pub fn set_brush_size(&mut self, size: f32) {
        self.brush_size = size.max(1.0);
    }

    pub fn is_drawing(&self) -> bool {
        self.painter.is_drawing()
    }

    pub fn pointer_down(&mut self, mapper: &CoordinateMapper, display: Pos2) {
        let Some(mode) = self.tool.composite_mode() else {
            return;
        };
        let (Some(at), Some(width)) = (
            mapper.to_native(display),
            mapper.len_to_native(self.brush_size),
        ) else {
            return;
        };
        let color = match self.tool {
            Tool::Eraser => ERASER_COLOR,
            _ => MASK_COLOR,
        };
        self.history.begin_mutation();
        self.painter.begin(&self.layer, at, mode, color, width);
    }

    pub fn pointer_move(&mut self, mapper: &CoordinateMapper, display: Pos2) {
        if !self.painter.is_drawing() {
            return;
        }
        if let Some(to) = mapper.to_native(display) {
            self.painter.extend(&mut self.layer, to);
        }
    }

    /// Pointer release or leaving the surface; records the stroke.
    pub fn pointer_up(&mut self) {
        let painted = self.painter.finish(&mut self.layer);
        self.history.end_mutation();
        if painted {
            self.history.push(self.layer.clone());
        }
    }

    pub fn undo(&mut self) -> bool {
        if self.painter.is_drawing() {
            return false;
        }
        match self.history.undo() {
            Some(prev) => {
                self.layer = prev.clone();
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        if self.painter.is_drawing() {
            return false;
        }
        match self.history.redo() {
            Some(next) => {
                self.layer = next.clone();
                true
            }
            None => false,
        }
    }

    /// Wipes the layer and records the blank state.
    pub fn clear(&mut self) {
        self.painter.cancel();
        self.history.end_mutation();
        let (w, h) = self.layer.dimensions();
        self.layer = RgbaImage::new(w, h);
        self.history.push(self.layer.clone());
    }

    /// Replaces the layer with a prepared mask (headless edits). Rejected
    /// when the size differs from the layer.
    pub fn load_layer(&mut self, mask: RgbaImage) -> bool {
        if mask.dimensions() != self.layer.dimensions() {
            return false;
        }
        self.painter.cancel();
        self.history.end_mutation();
        self.layer = mask;
        self.history.push(self.layer.clone());
        true
    }

    /// True when at least one pixel carries non-zero alpha.
    pub fn has_selection(&self) -> bool {
        self.layer.as_raw().par_chunks(4).any(|px| px[3] != 0)
    }

    /// The base image with the mask drawn on top, as sent to the edit model.
    pub fn composite_onto(&self, base: &RgbaImage) -> RgbaImage {
        let mut out = base.clone();
        if base.dimensions() != self.layer.dimensions() {
            log::warn!(
                "mask {:?} does not match image {:?}, sending image without mask",
                self.layer.dimensions(),
                base.dimensions()
            );
            return out;
        }
        let mask = self.layer.as_raw();
        out.par_chunks_mut(4)
            .zip(mask.par_chunks(4))
            .for_each(|(dst, src)| {
                let blended = source_over(
                    Rgba([dst[0], dst[1], dst[2], dst[3]]),
                    Rgba([src[0], src[1], src[2], src[3]]),
                );
                dst.copy_from_slice(&blended.0);
            });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::rect_xywh;
    use egui::pos2;

    fn mapper() -> CoordinateMapper {
        // 200×100 native shown at half size.
        CoordinateMapper::new(rect_xywh(10.0, 10.0, 100.0, 50.0), 200, 100)
    }

    #[test]
    fn fresh_mask_has_no_selection() {
        let m = MaskEditor::new(200, 100, DEFAULT_MASK_BRUSH);
        assert!(!m.has_selection());
        assert_eq!(m.history().len(), 1);
    }

    #[test]
    fn stroke_pushes_once_on_release() {
        let mut m = MaskEditor::new(200, 100, 10.0);
        let map = mapper();
        m.pointer_down(&map, pos2(20.0, 20.0));
        m.pointer_move(&map, pos2(40.0, 30.0));
        m.pointer_move(&map, pos2(60.0, 30.0));
        assert_eq!(m.history().len(), 1);
        m.pointer_up();
        assert_eq!(m.history().len(), 2);
        assert!(m.has_selection());
        // Display (20,20) maps to native (20,20); 10px display brush is 20px native.
        assert_eq!(m.layer().get_pixel(20, 20).0, MASK_COLOR);
        assert_eq!(m.layer().get_pixel(20, 29).0, MASK_COLOR);
    }

    #[test]
    fn undo_redo_restore_layer() {
        let mut m = MaskEditor::new(200, 100, 10.0);
        let map = mapper();
        m.pointer_down(&map, pos2(50.0, 30.0));
        m.pointer_up();
        assert!(m.has_selection());
        assert!(m.undo());
        assert!(!m.has_selection());
        assert!(!m.undo());
        assert!(m.redo());
        assert!(m.has_selection());
    }

    #[test]
    fn eraser_clears_and_clear_records() {
        let mut m = MaskEditor::new(200, 100, 10.0);
        let map = mapper();
        m.pointer_down(&map, pos2(50.0, 30.0));
        m.pointer_up();
        m.set_tool(Tool::Eraser);
        m.pointer_down(&map, pos2(50.0, 30.0));
        m.pointer_up();
        assert!(!m.has_selection());
        m.set_tool(Tool::Brush);
        m.pointer_down(&map, pos2(50.0, 30.0));
        m.pointer_up();
        let before = m.history().len();
        m.clear();
        assert!(!m.has_selection());
        assert_eq!(m.history().len(), before + 1);
    }

    #[test]
    fn degenerate_display_is_ignored() {
        let mut m = MaskEditor::new(200, 100, 10.0);
        let map = CoordinateMapper::new(rect_xywh(0.0, 0.0, 0.0, 0.0), 200, 100);
        m.pointer_down(&map, pos2(5.0, 5.0));
        assert!(!m.is_drawing());
        m.pointer_up();
        assert_eq!(m.history().len(), 1);
    }

    #[test]
    fn composite_embeds_mask_in_image() {
        let mut m = MaskEditor::new(200, 100, 10.0);
        let base = RgbaImage::from_pixel(200, 100, Rgba([0, 0, 0, 255]));
        m.pointer_down(&mapper(), pos2(50.0, 30.0));
        m.pointer_up();
        let out = m.composite_onto(&base);
        let px = out.get_pixel(80, 40);
        assert_eq!(px[3], 255);
        assert!(px[0] > 150 && px[2] < 60);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn reinit_resizes_and_forgets() {
        let mut m = MaskEditor::new(200, 100, 10.0);
        m.pointer_down(&mapper(), pos2(50.0, 30.0));
        m.pointer_up();
        m.reinit(64, 32);
        assert_eq!(m.layer().dimensions(), (64, 32));
        assert_eq!(m.history().len(), 1);
        assert!(!m.has_selection());
    }

    #[test]
    fn loaded_layer_must_match_size() {
        let mut m = MaskEditor::new(4, 4, 10.0);
        assert!(!m.load_layer(RgbaImage::new(2, 2)));
        let mut mask = RgbaImage::new(4, 4);
        mask.put_pixel(1, 1, Rgba(MASK_COLOR));
        assert!(m.load_layer(mask));
        assert!(m.has_selection());
        assert_eq!(m.history().len(), 2);
    }
}
