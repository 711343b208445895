use ab_glyph::{point, Font, FontArc, Glyph, OutlinedGlyph, ScaleFont};
use image::{Rgba, RgbaImage};
use std::path::Path;

use crate::error::{EditError, Result};
use crate::ops::stroke::source_over;

/// Measures and draws single lines of text onto a raster. The annotation
/// canvas flattens text boxes through this so tests can substitute a painter
/// without fonts.
pub trait TextPainter {
    /// Advance width of `line` at `font_px`.
    fn measure(&self, line: &str, font_px: f32) -> f32;

    /// Paints `line` with the top of its line box at `(x, y)`, `font_px` tall.
    fn draw_line(&mut self, canvas: &mut RgbaImage, line: &str, x: f32, y: f32, font_px: f32, color: [u8; 4]);
}

/// ab_glyph-backed painter. One font, any size.
pub struct FontPainter {
    font: FontArc,
}

impl FontPainter {
    pub fn new(font: FontArc) -> Self {
        Self { font }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        FontArc::try_from_vec(bytes)
            .map(Self::new)
            .map_err(|e| EditError::Font(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes)
    }

    /// The proportional UI font compiled into egui, used when no font file is configured.
    pub fn bundled() -> Result<Self> {
        let defs = egui::FontDefinitions::default();
        let data = defs
            .font_data
            .get("Ubuntu-Light")
            .or_else(|| defs.font_data.values().next())
            .ok_or_else(|| EditError::Font("no bundled font available".into()))?;
        Self::from_bytes(data.font.to_vec())
    }

    /// Glyphs of `line` on a baseline one ascent below `(x, y)`, plus the total advance.
    fn place(&self, line: &str, font_px: f32, x: f32, y: f32) -> (Vec<Glyph>, f32) {
        let scaled = self.font.as_scaled(font_px);
        let baseline = y + scaled.ascent();
        let mut caret = x;
        let mut prev = None;
        let glyphs = line
            .chars()
            .map(|ch| {
                let id = scaled.glyph_id(ch);
                if let Some(p) = prev {
                    caret += scaled.kern(p, id);
                }
                let glyph = id.with_scale_and_position(font_px, point(caret, baseline));
                caret += scaled.h_advance(id);
                prev = Some(id);
                glyph
            })
            .collect();
        (glyphs, caret - x)
    }
}

impl TextPainter for FontPainter {
    fn measure(&self, line: &str, font_px: f32) -> f32 {
        if font_px <= 0.0 {
            return 0.0;
        }
        self.place(line, font_px, 0.0, 0.0).1
    }

    fn draw_line(&mut self, canvas: &mut RgbaImage, line: &str, x: f32, y: f32, font_px: f32, color: [u8; 4]) {
        if line.is_empty() || font_px <= 0.0 {
            return;
        }
        let (glyphs, _) = self.place(line, font_px, x, y);
        let outlines: Vec<OutlinedGlyph> = glyphs.into_iter().filter_map(|g| self.font.outline_glyph(g)).collect();
        let Some(first) = outlines.first() else { return };

        // Coverage over the line's pixel box, max over overlapping glyphs so kerned pairs do not darken.
        let mut bounds = first.px_bounds();
        for o in &outlines[1..] {
            let b = o.px_bounds();
            bounds.min.x = bounds.min.x.min(b.min.x);
            bounds.min.y = bounds.min.y.min(b.min.y);
            bounds.max.x = bounds.max.x.max(b.max.x);
            bounds.max.y = bounds.max.y.max(b.max.y);
        }
        let (x0, y0) = (bounds.min.x as i64, bounds.min.y as i64);
        let w = (bounds.max.x as i64 - x0).max(0) as usize;
        let h = (bounds.max.y as i64 - y0).max(0) as usize;
        let mut coverage = vec![0.0f32; w * h];
        for o in &outlines {
            let b = o.px_bounds();
            let (ox, oy) = (b.min.x as i64 - x0, b.min.y as i64 - y0);
            o.draw(|px, py, cov| {
                let (cx, cy) = (ox + px as i64, oy + py as i64);
                if cx >= 0 && cy >= 0 && (cx as usize) < w && (cy as usize) < h {
                    let slot = &mut coverage[cy as usize * w + cx as usize];
                    *slot = slot.max(cov);
                }
            });
        }

        let (cw, ch) = canvas.dimensions();
        for (i, &cov) in coverage.iter().enumerate() {
            if cov <= 0.001 {
                continue;
            }
            let (px, py) = (x0 + (i % w) as i64, y0 + (i / w) as i64);
            if px < 0 || py < 0 || px >= cw as i64 || py >= ch as i64 {
                continue;
            }
            let a = (color[3] as f32 * cov.min(1.0)).round() as u8;
            let (px, py) = (px as u32, py as u32);
            let dst = *canvas.get_pixel(px, py);
            canvas.put_pixel(px, py, source_over(dst, Rgba([color[0], color[1], color[2], a])));
        }
    }
}
