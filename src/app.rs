use crate::components::history::HistoryStack;
use crate::components::tools::Tool;
use crate::editor::{EditorState, JobKind, JobRequest, ModeKind};
use crate::error::{EditError, Result};
use crate::geometry::fit_into;
use crate::io;
use crate::ops::ai::{GeminiService, TransformResponse, TransformService};
use crate::ops::annotation::LINE_HEIGHT;
use crate::ops::camera::{
    LightOverlay, LightPreset, LightType, MAX_LENS_MM, MAX_LIGHT_INTENSITY, MAX_LIGHT_TEMP_K, MIN_LENS_MM,
    MIN_LIGHT_TEMP_K,
};
use crate::ops::crop::{AspectRatio, CropHandle};
use crate::ops::text::FontPainter;
use crate::project::{SlotKind, SourceImage};
use crate::settings::Settings;
use eframe::egui;
use image::RgbaImage;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::mpsc;

const FULL_UV: egui::Rect = egui::Rect {
    min: egui::pos2(0.0, 0.0),
    max: egui::pos2(1.0, 1.0),
};
const NOTICE_SECONDS: f64 = 5.0;
const HANDLE_DRAW_SIZE: f32 = 8.0;
const ACCENT: egui::Color32 = egui::Color32::from_rgb(90, 170, 255);
/// Cells per side of the light preview grid.
const SHADE_CELLS: usize = 32;

// ============================================================================
// ASYNC TRANSFORM PIPELINE: one network job at a time on a worker thread
// ============================================================================

/// Result delivered from the transform worker thread.
struct JobResult {
    kind: JobKind,
    outcome: Result<TransformResponse>,
}

struct Notice {
    text: String,
    is_error: bool,
    /// `ctx.input(|i| i.time)` after which the notice is dropped.
    until: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SourceTab {
    Generate,
    Compose,
}

/// GPU textures keyed by name, re-uploaded only when the content key changes.
#[derive(Default)]
struct TextureCache {
    slots: HashMap<&'static str, (u64, egui::TextureHandle)>,
}

impl TextureCache {
    fn texture(&mut self, ctx: &egui::Context, name: &'static str, key: u64, image: &RgbaImage) -> egui::TextureId {
        if let Some((k, handle)) = self.slots.get_mut(name) {
            if *k != key {
                handle.set(color_image(image), egui::TextureOptions::LINEAR);
                *k = key;
            }
            return handle.id();
        }
        let handle = ctx.load_texture(name, color_image(image), egui::TextureOptions::LINEAR);
        let id = handle.id();
        self.slots.insert(name, (key, handle));
        id
    }

    fn forget(&mut self, name: &'static str) {
        self.slots.remove(name);
    }
}

fn color_image(image: &RgbaImage) -> egui::ColorImage {
    egui::ColorImage::from_rgba_unmultiplied([image.width() as usize, image.height() as usize], image.as_raw())
}

fn content_key(parts: impl Hash) -> u64 {
    let mut h = DefaultHasher::new();
    parts.hash(&mut h);
    h.finish()
}

/// Content key for a raster backed by a history stack. While a stroke is in
/// progress the raster changes every frame without touching the history.
fn layer_key<T>(generation: u128, history: &HistoryStack<T>, drawing: bool, frame: u64) -> u64 {
    content_key((generation, history.cursor(), history.len(), drawing.then_some(frame)))
}

fn rgba(c: [u8; 4]) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3])
}

/// Darkening at `(u, v)` (percent of the image) for the light preview: clear
/// inside the hard stop, ramping to `opacity` at the farthest corner.
pub fn shade_alpha(o: &LightOverlay, u: f32, v: f32) -> f32 {
    let fx = o.center_x_pct.max(100.0 - o.center_x_pct).max(1.0);
    let fy = o.center_y_pct.max(100.0 - o.center_y_pct).max(1.0);
    let dx = (u - o.center_x_pct) / fx;
    let dy = (v - o.center_y_pct) / fy;
    let d = (dx * dx + dy * dy).sqrt() / std::f32::consts::SQRT_2 * 100.0;
    if d <= o.hard_stop_pct {
        return 0.0;
    }
    let span = (100.0 - o.hard_stop_pct).max(1e-3);
    o.opacity * ((d - o.hard_stop_pct) / span).min(1.0)
}

pub struct CutMakerApp {
    editor: EditorState,
    settings: Settings,

    // Async transform pipeline
    job_sender: mpsc::Sender<JobResult>,
    job_receiver: mpsc::Receiver<JobResult>,
    /// Time the running job was started (for the elapsed time display).
    job_started: Option<f64>,
    /// Bumped on every finished job so comparison textures refresh.
    job_generation: u128,

    tab: SourceTab,
    generate_prompt: String,
    compose_prompt: String,
    edit_prompt: String,

    textures: TextureCache,
    notices: Vec<Notice>,
    now: f64,

    /// Some = the key dialog is open, holding the typed key.
    key_prompt: Option<String>,
    settings_open: bool,
    settings_draft: Settings,
    camera_open: bool,
    light_open: bool,
    comparison_open: bool,
    annotation_generation: u128,
    /// Text box that should grab keyboard focus on the next frame.
    focus_text_box: Option<String>,
}

impl CutMakerApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());
        let settings = Settings::load();
        let editor = EditorState::from_settings(&settings);
        let (job_sender, job_receiver) = mpsc::channel();
        let key_prompt = editor.credential().is_none().then(String::new);
        log::info!("Editor ready (api key configured: {})", key_prompt.is_none());
        Self {
            editor,
            settings_draft: settings.clone(),
            settings,
            job_sender,
            job_receiver,
            job_started: None,
            job_generation: 0,
            tab: SourceTab::Generate,
            generate_prompt: String::new(),
            compose_prompt: String::new(),
            edit_prompt: String::new(),
            textures: TextureCache::default(),
            notices: Vec::new(),
            now: 0.0,
            key_prompt,
            settings_open: false,
            camera_open: false,
            light_open: false,
            comparison_open: false,
            annotation_generation: 0,
            focus_text_box: None,
        }
    }

    // ------------------------------------------------------------------------
    // Notifications and errors
    // ------------------------------------------------------------------------

    fn notify(&mut self, text: impl Into<String>) {
        self.notices.push(Notice {
            text: text.into(),
            is_error: false,
            until: self.now + NOTICE_SECONDS,
        });
    }

    fn report(&mut self, e: EditError) {
        if !e.is_preflight() {
            log::warn!("{}: {}", e.category(), e);
        }
        if e.needs_credential() {
            if matches!(e, EditError::InvalidCredential(_)) && self.settings.has_api_key() {
                self.settings.api_key.clear();
                if let Err(err) = self.settings.save() {
                    log::error!("Could not save settings: {}", err);
                }
            }
            self.key_prompt = Some(String::new());
        }
        self.notices.push(Notice {
            text: e.to_string(),
            is_error: true,
            until: self.now + NOTICE_SECONDS,
        });
    }

    // ------------------------------------------------------------------------
    // Transform jobs
    // ------------------------------------------------------------------------

    fn start_job(&mut self, ctx: &egui::Context, job: JobRequest) {
        let pending = match self.editor.begin_job(&job) {
            Ok(p) => p,
            Err(e) => return self.report(e),
        };
        let mut config = self.settings.gemini_config();
        config.api_key = self.editor.credential().unwrap_or_default().to_string();
        let service = match GeminiService::new(config) {
            Ok(s) => s,
            Err(e) => {
                if let Err(e) = self.editor.finish_job(pending.kind, Err(e)) {
                    self.report(e);
                }
                return;
            }
        };
        self.job_started = Some(self.now);
        let sender = self.job_sender.clone();
        let ctx = ctx.clone();
        std::thread::spawn(move || {
            let outcome = service.transform(&pending.request);
            let _ = sender.send(JobResult {
                kind: pending.kind,
                outcome,
            });
            ctx.request_repaint();
        });
    }

    fn poll_jobs(&mut self) {
        while let Ok(result) = self.job_receiver.try_recv() {
            self.job_started = None;
            self.job_generation += 1;
            match self.editor.finish_job(result.kind, result.outcome) {
                Ok(()) if result.kind == JobKind::Upscale => self.comparison_open = true,
                Ok(()) => self.notify(format!("{} finished.", result.kind.label())),
                Err(e) => self.report(e),
            }
        }
    }

    // ------------------------------------------------------------------------
    // File actions
    // ------------------------------------------------------------------------

    fn open_main_image(&mut self) {
        let Some(path) = io::pick_image_file() else { return };
        match io::load_file(&path) {
            Ok(img) => {
                self.editor.set_image(img);
                log::info!("Opened {}", path.display());
            }
            Err(e) => self.report(e),
        }
    }

    fn add_to_slot(&mut self, kind: SlotKind) {
        if kind == SlotKind::Background {
            let Some(path) = io::pick_image_file() else { return };
            match SourceImage::from_path(&path) {
                Ok(Some(img)) => self.editor.sources.replace(kind, 0, img),
                Ok(None) => log::debug!("Ignoring non-image file {}", path.display()),
                Err(e) => self.report(e),
            }
            return;
        }
        for path in io::pick_image_files() {
            if let Err(e) = self.editor.sources.add_path(kind, &path) {
                self.report(e);
            }
        }
    }

    fn replace_in_slot(&mut self, kind: SlotKind, index: usize) {
        let Some(path) = io::pick_image_file() else { return };
        match SourceImage::from_path(&path) {
            Ok(Some(img)) => self.editor.sources.replace(kind, index, img),
            Ok(None) => log::debug!("Ignoring non-image file {}", path.display()),
            Err(e) => self.report(e),
        }
    }

    fn download(&mut self, comparison: bool) {
        let exported = if comparison {
            self.editor.export_comparison()
        } else {
            self.editor.export_current()
        };
        let (name, bytes) = match exported {
            Ok(x) => x,
            Err(e) => return self.report(e),
        };
        let Some(path) = io::pick_save_path(&name) else { return };
        match std::fs::write(&path, bytes) {
            Ok(()) => {
                log::info!("Saved {}", path.display());
                self.notify(format!("Saved {}", path.display()));
            }
            Err(e) => self.report(e.into()),
        }
    }

    fn text_painter(&self) -> Result<FontPainter> {
        match self.settings.font_path() {
            Some(path) => FontPainter::from_file(path),
            None => FontPainter::bundled(),
        }
    }

    fn toggle_mode(&mut self, kind: ModeKind) {
        if self.editor.mode_kind() == Some(kind) {
            self.editor.deactivate();
        } else if let Err(e) = self.editor.activate(kind) {
            self.report(e);
        }
    }

    fn open_annotation(&mut self, ctx: &egui::Context) {
        let screen = ctx.screen_rect();
        match self.editor.open_annotation(screen.width() * 0.8, screen.height() * 0.75) {
            Ok(()) => {
                self.annotation_generation += 1;
                if let Some(session) = self.editor.annotation_mut() {
                    session.set_brush_size(self.settings.annotation_brush_size);
                    session.set_text_size(self.settings.annotation_text_size);
                }
            }
            Err(e) => self.report(e),
        }
    }

    // ------------------------------------------------------------------------
    // Keyboard
    // ------------------------------------------------------------------------

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let text_focused = ctx.memory(|m| m.focus().is_some());
        let (undo, redo, delete) = ctx.input(|i| {
            let z = i.modifiers.command && i.key_pressed(egui::Key::Z);
            (
                z && !i.modifiers.shift,
                (z && i.modifiers.shift) || (i.modifiers.command && i.key_pressed(egui::Key::Y)),
                i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace),
            )
        });

        if let Some(session) = self.editor.annotation_mut() {
            if delete {
                session.key_delete(text_focused);
            }
            if text_focused {
                return;
            }
            if undo {
                session.undo();
            } else if redo {
                session.redo();
            }
            return;
        }
        if text_focused || self.editor.is_busy() {
            return;
        }
        if let Some(mask) = self.editor.mask_mut() {
            if undo {
                mask.undo();
            } else if redo {
                mask.redo();
            }
            return;
        }
        if undo {
            self.editor.undo();
        } else if redo {
            self.editor.redo();
        }
    }

    // ------------------------------------------------------------------------
    // Panels
    // ------------------------------------------------------------------------

    fn toolbar_ui(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let idle = !self.editor.is_busy();
        let has_image = self.editor.has_image();
        ui.horizontal_wrapped(|ui| {
            if ui.add_enabled(idle, egui::Button::new("Open")).clicked() {
                self.open_main_image();
            }
            ui.separator();
            let history = self.editor.history();
            let (can_undo, can_redo) = (history.can_undo(), history.can_redo());
            if ui.add_enabled(idle && can_undo, egui::Button::new("Undo")).clicked() {
                self.editor.undo();
            }
            if ui.add_enabled(idle && can_redo, egui::Button::new("Redo")).clicked() {
                self.editor.redo();
            }
            if ui.add_enabled(idle && can_undo, egui::Button::new("Reset")).clicked() {
                self.editor.reset();
            }
            if ui.add_enabled(idle && has_image, egui::Button::new("Delete")).clicked() {
                match self.editor.delete() {
                    Ok(()) => self.textures.forget("main"),
                    Err(e) => self.report(e),
                }
            }
            if ui.add_enabled(has_image, egui::Button::new("Download")).clicked() {
                self.download(false);
            }
            ui.separator();

            let mode = self.editor.mode_kind();
            let mask = ui.add_enabled(
                idle && has_image,
                egui::SelectableLabel::new(mode == Some(ModeKind::Mask), "Edit area"),
            );
            if mask.clicked() {
                self.toggle_mode(ModeKind::Mask);
            }
            let crop = ui.add_enabled(
                idle && has_image,
                egui::SelectableLabel::new(mode == Some(ModeKind::Crop), "Crop"),
            );
            if crop.clicked() {
                self.toggle_mode(ModeKind::Crop);
            }
            if ui.selectable_label(self.camera_open, "Camera").clicked() {
                self.camera_open = !self.camera_open;
            }
            if ui.selectable_label(self.light_open, "Light").clicked() {
                self.light_open = !self.light_open;
            }
            if ui.add_enabled(idle && has_image, egui::Button::new("Upscale")).clicked() {
                self.start_job(ctx, JobRequest::Upscale);
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Settings").clicked() {
                    self.settings_draft = self.settings.clone();
                    self.settings_open = true;
                }
                if let Some(started) = self.job_started {
                    ui.label(format!("{:.0}s", self.now - started));
                    ui.spinner();
                }
            });
        });
    }

    fn slot_ui(&mut self, ui: &mut egui::Ui, kind: SlotKind) {
        let idle = !self.editor.is_busy();
        let count = self.editor.sources.slot(kind).len();
        ui.horizontal(|ui| {
            ui.strong(kind.label());
            ui.label(format!("({})", count));
            if ui.add_enabled(idle, egui::Button::new("Add").small()).clicked() {
                self.add_to_slot(kind);
            }
            if count > 0 && ui.add_enabled(idle, egui::Button::new("Clear").small()).clicked() {
                self.editor.sources.clear(kind);
            }
        });

        let mut replace = None;
        let mut remove = None;
        for (i, src) in self.editor.sources.slot(kind).iter().enumerate() {
            ui.horizontal(|ui| {
                ui.label(&src.name);
                if ui.add_enabled(idle, egui::Button::new("Replace").small()).clicked() {
                    replace = Some(i);
                }
                if ui.add_enabled(idle, egui::Button::new("x").small()).clicked() {
                    remove = Some(i);
                }
            });
        }
        if let Some(i) = replace {
            self.replace_in_slot(kind, i);
        }
        if let Some(i) = remove {
            self.editor.sources.remove(kind, i);
        }
        ui.add_space(6.0);
    }

    fn sources_ui(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let idle = !self.editor.is_busy();
        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.tab, SourceTab::Generate, "Generate");
            ui.selectable_value(&mut self.tab, SourceTab::Compose, "Compose");
        });
        ui.separator();

        match self.tab {
            SourceTab::Generate => {
                for kind in [SlotKind::Subject, SlotKind::Scene, SlotKind::Style] {
                    self.slot_ui(ui, kind);
                }
                ui.add(
                    egui::TextEdit::multiline(&mut self.generate_prompt)
                        .hint_text("Optional: describe what should happen")
                        .desired_rows(3),
                );
                let ready = idle && self.editor.sources.can_generate();
                if ui.add_enabled(ready, egui::Button::new("Generate")).clicked() {
                    let prompt = self.generate_prompt.clone();
                    self.start_job(ctx, JobRequest::Generate { prompt });
                }
            }
            SourceTab::Compose => {
                self.slot_ui(ui, SlotKind::Character);
                self.slot_ui(ui, SlotKind::Background);
                let has_bg = !self.editor.sources.slot(SlotKind::Background).is_empty();
                if ui.add_enabled(idle && has_bg, egui::Button::new("Annotate background")).clicked() {
                    self.open_annotation(ctx);
                }
                ui.add(
                    egui::TextEdit::multiline(&mut self.compose_prompt)
                        .hint_text("Optional: additional instructions")
                        .desired_rows(3),
                );
                let ready = idle && self.editor.sources.can_compose();
                if ui.add_enabled(ready, egui::Button::new("Compose")).clicked() {
                    let prompt = self.compose_prompt.clone();
                    self.start_job(ctx, JobRequest::Compose { prompt });
                }
            }
        }

        ui.separator();
        match self.editor.mode_kind() {
            Some(ModeKind::Mask) => self.mask_tools_ui(ui, ctx),
            Some(ModeKind::Crop) => self.crop_tools_ui(ui),
            None => {}
        }
    }

    fn mask_tools_ui(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let idle = !self.editor.is_busy();
        ui.strong("Edit area");
        if let Some(mask) = self.editor.mask_mut() {
            ui.horizontal(|ui| {
                for tool in [Tool::Brush, Tool::Eraser] {
                    if ui.selectable_label(mask.tool() == tool, tool.label()).clicked() {
                        mask.set_tool(tool);
                    }
                }
            });
            let mut size = mask.brush_size();
            if ui.add(egui::Slider::new(&mut size, 1.0..=100.0).text("Brush")).changed() {
                mask.set_brush_size(size);
            }
            ui.horizontal(|ui| {
                if ui.add_enabled(mask.history().can_undo(), egui::Button::new("Undo")).clicked() {
                    mask.undo();
                }
                if ui.add_enabled(mask.history().can_redo(), egui::Button::new("Redo")).clicked() {
                    mask.redo();
                }
                if ui.button("Clear").clicked() {
                    mask.clear();
                }
            });
        }
        ui.add(
            egui::TextEdit::multiline(&mut self.edit_prompt)
                .hint_text("Describe the change for the painted area")
                .desired_rows(2),
        );
        ui.horizontal(|ui| {
            if ui.add_enabled(idle, egui::Button::new("Apply edit")).clicked() {
                let prompt = self.edit_prompt.clone();
                self.start_job(ctx, JobRequest::MaskEdit { prompt });
            }
            if ui.button("Cancel").clicked() {
                self.editor.deactivate();
            }
        });
    }

    fn crop_tools_ui(&mut self, ui: &mut egui::Ui) {
        ui.strong("Crop");
        let mut apply = false;
        let mut cancel = false;
        if let Some(crop) = self.editor.crop_mut() {
            ui.horizontal_wrapped(|ui| {
                if ui.selectable_label(crop.aspect().is_none(), "Free").clicked() {
                    crop.set_aspect(None);
                }
                for ratio in AspectRatio::PRESETS {
                    if ui.selectable_label(crop.aspect() == Some(ratio), ratio.label()).clicked() {
                        crop.toggle_aspect(ratio);
                    }
                }
            });
            ui.horizontal(|ui| {
                apply = ui.button("Apply crop").clicked();
                cancel = ui.button("Cancel").clicked();
            });
        }
        if apply {
            match self.editor.perform_crop() {
                Ok(true) => {}
                Ok(false) => self.notify("The crop box is empty."),
                Err(e) => self.report(e),
            }
        }
        if cancel {
            self.editor.deactivate();
        }
    }

    // ------------------------------------------------------------------------
    // Central image
    // ------------------------------------------------------------------------

    fn canvas_ui(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let area = ui.available_rect_before_wrap();
        let Some((id, w, h)) = self.editor.current().map(|v| (v.id, v.width(), v.height())) else {
            ui.centered_and_justified(|ui| {
                ui.label("Open an image or generate one from the side panel.");
            });
            return;
        };
        let rect = fit_into(area, w, h, 1.0);
        self.editor.set_display_rect(rect);
        let response = ui.allocate_rect(rect, egui::Sense::click_and_drag());

        if let Some(image) = self.editor.current_image() {
            let tex = self.textures.texture(ctx, "main", content_key(id), image);
            ui.painter().image(tex, rect, FULL_UV, egui::Color32::WHITE);
        }

        if !self.editor.is_busy() {
            match self.editor.mode_kind() {
                Some(ModeKind::Mask) => self.mask_canvas(ui, ctx, &response, rect, id.as_u128()),
                Some(ModeKind::Crop) => self.crop_canvas(ui, ctx, &response, rect),
                None => {}
            }
        }
        if self.light_open {
            paint_light_overlay(ui.painter(), rect, &self.editor.light.overlay());
        }
        if let Some(started) = self.job_started {
            ui.painter()
                .rect_filled(rect, 0.0, egui::Color32::from_black_alpha(140));
            let label = match self.editor.busy_job() {
                Some(kind) => format!("{}... {:.0}s", kind.label(), self.now - started),
                None => String::new(),
            };
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                label,
                egui::FontId::proportional(20.0),
                egui::Color32::WHITE,
            );
        }
    }

    fn mask_canvas(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, response: &egui::Response, rect: egui::Rect, version: u128) {
        if response.drag_started()
            && let Some(p) = ctx.input(|i| i.pointer.press_origin())
        {
            self.editor.mask_pointer_down(p);
        }
        if response.dragged()
            && let Some(p) = response.interact_pointer_pos()
        {
            self.editor.mask_pointer_move(p);
        }
        if response.drag_released() {
            self.editor.mask_pointer_up();
        }

        let frame = ctx.frame_nr();
        if let Some(mask) = self.editor.mask() {
            let key = layer_key(version, mask.history(), mask.is_drawing(), frame);
            let tex = self.textures.texture(ctx, "mask", key, mask.layer());
            ui.painter().image(tex, rect, FULL_UV, egui::Color32::WHITE);
            if let Some(hover) = response.hover_pos() {
                ui.painter().circle_stroke(
                    hover,
                    mask.brush_size() / 2.0,
                    egui::Stroke::new(1.0, egui::Color32::WHITE),
                );
            }
        }
    }

    fn crop_canvas(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, response: &egui::Response, rect: egui::Rect) {
        let Some(crop) = self.editor.crop_mut() else { return };
        if response.drag_started()
            && let Some(p) = ctx.input(|i| i.pointer.press_origin())
            && let Some(kind) = crop.hit_test(p)
        {
            crop.begin_drag(kind, p);
        }
        if response.dragged()
            && let Some(p) = response.interact_pointer_pos()
        {
            crop.drag_to(p);
        }
        if response.drag_released() {
            crop.end_drag();
        }

        let boxed = crop.rect();
        let shade = egui::Color32::from_black_alpha(150);
        let painter = ui.painter();
        painter.rect_filled(egui::Rect::from_min_max(rect.min, egui::pos2(rect.max.x, boxed.min.y)), 0.0, shade);
        painter.rect_filled(egui::Rect::from_min_max(egui::pos2(rect.min.x, boxed.max.y), rect.max), 0.0, shade);
        painter.rect_filled(
            egui::Rect::from_min_max(egui::pos2(rect.min.x, boxed.min.y), egui::pos2(boxed.min.x, boxed.max.y)),
            0.0,
            shade,
        );
        painter.rect_filled(
            egui::Rect::from_min_max(egui::pos2(boxed.max.x, boxed.min.y), egui::pos2(rect.max.x, boxed.max.y)),
            0.0,
            shade,
        );
        painter.rect_stroke(boxed, 0.0, egui::Stroke::new(1.5, egui::Color32::WHITE));
        for handle in CropHandle::ALL {
            let c = handle.position(&boxed);
            let r = egui::Rect::from_center_size(c, egui::vec2(HANDLE_DRAW_SIZE, HANDLE_DRAW_SIZE));
            painter.rect_filled(r, 1.0, egui::Color32::WHITE);
            painter.rect_stroke(r, 1.0, egui::Stroke::new(1.0, ACCENT));
        }
    }

    // ------------------------------------------------------------------------
    // Floating windows
    // ------------------------------------------------------------------------

    fn camera_window(&mut self, ctx: &egui::Context) {
        let mut open = self.camera_open;
        let mut apply = false;
        let idle = !self.editor.is_busy();
        egui::Window::new("Camera")
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                let camera = &mut self.editor.camera;
                let (pad, response) = ui.allocate_exact_size(egui::vec2(180.0, 140.0), egui::Sense::drag());
                if response.dragged() {
                    let d = response.drag_delta();
                    camera.drag(d.x, d.y);
                }
                let painter = ui.painter();
                painter.rect_filled(pad, 4.0, egui::Color32::from_gray(30));
                let (rot_x, rot_y) = camera.rotation();
                // Subject marker orbits with yaw, rises and falls with pitch.
                let angle = rot_y.to_radians();
                let marker = pad.center()
                    + egui::vec2(angle.sin() * pad.width() * 0.35, rot_x / 90.0 * pad.height() * 0.4);
                painter.circle_filled(pad.center(), 4.0, egui::Color32::GRAY);
                painter.circle_filled(marker, 7.0, ACCENT);
                painter.text(
                    pad.left_bottom() + egui::vec2(6.0, -6.0),
                    egui::Align2::LEFT_BOTTOM,
                    "drag to orbit",
                    egui::FontId::proportional(11.0),
                    egui::Color32::GRAY,
                );

                let mut pitch = camera.pitch();
                if ui.add(egui::Slider::new(&mut pitch, -90.0..=90.0).text("Pitch")).changed() {
                    camera.set_pitch(pitch);
                }
                let mut yaw = camera.yaw();
                if ui.add(egui::Slider::new(&mut yaw, -180.0..=180.0).text("Yaw")).changed() {
                    camera.set_yaw(yaw);
                }
                let mut lens = camera.lens_mm();
                if ui.add(egui::Slider::new(&mut lens, MIN_LENS_MM..=MAX_LENS_MM).text("Lens (mm)")).changed() {
                    camera.set_lens_mm(lens);
                }
                ui.checkbox(&mut camera.invert_drag, "Invert drag");
                ui.label(format!(
                    "{} · {} · {}",
                    camera.vertical().label(),
                    camera.horizontal().label(),
                    camera.lens_label()
                ));
                ui.horizontal(|ui| {
                    if ui.button("Reset").clicked() {
                        camera.reset();
                    }
                    apply = ui.add_enabled(idle, egui::Button::new("Apply")).clicked();
                });
            });
        self.camera_open = open;
        if apply {
            self.start_job(ctx, JobRequest::Camera);
        }
    }

    fn light_window(&mut self, ctx: &egui::Context) {
        let mut open = self.light_open;
        let mut apply = false;
        let idle = !self.editor.is_busy();
        egui::Window::new("Light")
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                let light = &mut self.editor.light;
                let (pad, response) = ui.allocate_exact_size(egui::vec2(160.0, 160.0), egui::Sense::click_and_drag());
                if let Some(p) = response.interact_pointer_pos()
                    && (response.dragged() || response.clicked())
                {
                    light.set_handle_position(pad, p);
                }
                let painter = ui.painter();
                painter.rect_filled(pad, 4.0, egui::Color32::from_gray(30));
                painter.circle_stroke(pad.center(), pad.width() * 0.25, egui::Stroke::new(1.0, egui::Color32::GRAY));
                painter.circle_filled(light.handle_position(pad), 8.0, rgba(light.color));

                egui::ComboBox::from_id_source("light_type")
                    .selected_text(light.kind.label())
                    .show_ui(ui, |ui| {
                        for kind in LightType::ALL {
                            ui.selectable_value(&mut light.kind, kind, kind.label());
                        }
                    });
                ui.add(egui::Slider::new(&mut light.intensity, 0..=MAX_LIGHT_INTENSITY).text("Intensity %"));
                ui.add(egui::Slider::new(&mut light.temperature_k, MIN_LIGHT_TEMP_K..=MAX_LIGHT_TEMP_K).text("Temperature K"));
                ui.add(egui::Slider::new(&mut light.hardness, 0..=100).text("Hardness %"));
                ui.horizontal(|ui| {
                    ui.label("Color");
                    ui.color_edit_button_srgba_unmultiplied(&mut light.color);
                });
                ui.horizontal_wrapped(|ui| {
                    for preset in LightPreset::ALL {
                        if ui.selectable_label(light.preset == Some(preset), preset.label()).clicked() {
                            light.apply_preset(preset);
                        }
                    }
                });
                ui.horizontal(|ui| {
                    if ui.button("Reset").clicked() {
                        light.reset();
                    }
                    apply = ui.add_enabled(idle, egui::Button::new("Apply")).clicked();
                });
            });
        self.light_open = open;
        if apply {
            self.start_job(ctx, JobRequest::Relight);
        }
    }

    fn comparison_window(&mut self, ctx: &egui::Context) {
        if self.editor.comparison().is_none() {
            self.comparison_open = false;
            return;
        }
        if !self.comparison_open {
            return;
        }
        let mut accept = false;
        let mut discard = false;
        let mut save = false;
        let key = content_key(self.job_generation);
        let screen = ctx.screen_rect();
        egui::Window::new("Upscale result")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                let Some(c) = self.editor.comparison() else { return };
                let cell = egui::Rect::from_min_size(egui::Pos2::ZERO, screen.size() * egui::vec2(0.35, 0.6));
                ui.horizontal(|ui| {
                    for (name, label, img) in [("before", "Before", &c.before), ("after", "After", &c.after)] {
                        ui.vertical(|ui| {
                            ui.label(format!("{} ({}x{})", label, img.width(), img.height()));
                            let fit = fit_into(cell, img.width(), img.height(), 1.0);
                            let tex = self.textures.texture(ctx, name, key, img);
                            ui.add(egui::Image::new(egui::load::SizedTexture::new(tex, fit.size())));
                        });
                    }
                });
                ui.horizontal(|ui| {
                    accept = ui.button("Use upscaled").clicked();
                    save = ui.button("Download").clicked();
                    discard = ui.button("Discard").clicked();
                });
            });
        if save {
            self.download(true);
        }
        if accept {
            self.editor.accept_comparison();
            self.comparison_open = false;
        }
        if discard {
            self.editor.discard_comparison();
            self.comparison_open = false;
        }
    }

    fn annotation_window(&mut self, ctx: &egui::Context) {
        if self.editor.annotation().is_none() {
            return;
        }
        let mut apply = false;
        let mut cancel = false;
        let generation = self.annotation_generation;
        let frame = ctx.frame_nr();
        let mut focus = self.focus_text_box.take();
        egui::Window::new("Annotate background")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                let Some(session) = self.editor.annotation_mut() else { return };
                ui.horizontal(|ui| {
                    for tool in [Tool::Brush, Tool::Eraser, Tool::Text] {
                        if ui.selectable_label(session.tool() == tool, tool.label()).clicked() {
                            session.set_tool(tool);
                        }
                    }
                    ui.separator();
                    let mut color = session.color();
                    if ui.color_edit_button_srgba_unmultiplied(&mut color).changed() {
                        session.set_color(color);
                    }
                    let mut size = session.brush_size();
                    if ui.add(egui::Slider::new(&mut size, 1.0..=50.0).text("Brush")).changed() {
                        session.set_brush_size(size);
                    }
                    let mut text_size = session.text_size();
                    if ui.add(egui::Slider::new(&mut text_size, 8.0..=96.0).text("Text")).changed() {
                        session.set_text_size(text_size);
                    }
                    ui.separator();
                    if ui.add_enabled(session.history().can_undo(), egui::Button::new("Undo")).clicked() {
                        session.undo();
                    }
                    if ui.add_enabled(session.history().can_redo(), egui::Button::new("Redo")).clicked() {
                        session.redo();
                    }
                    if ui.button("Clear").clicked() {
                        session.clear();
                    }
                });

                let size = session.display_rect().size();
                let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click_and_drag());
                session.set_display_rect(rect);

                if response.drag_started()
                    && let Some(p) = ctx.input(|i| i.pointer.press_origin())
                {
                    session.pointer_down(p);
                }
                if response.dragged()
                    && let Some(p) = response.interact_pointer_pos()
                {
                    session.pointer_move(p);
                }
                if response.drag_released() {
                    session.pointer_up();
                }
                if response.clicked()
                    && let Some(p) = response.interact_pointer_pos()
                    && let Some(id) = session.click(p)
                {
                    focus = Some(id);
                }

                let base = self.textures.texture(ctx, "annotation_base", content_key(generation), session.base());
                ui.painter().image(base, rect, FULL_UV, egui::Color32::WHITE);
                let key = layer_key(generation, session.history(), response.dragged(), frame);
                let strokes = self.textures.texture(ctx, "annotation_strokes", key, session.strokes());
                ui.painter().image(strokes, rect, FULL_UV, egui::Color32::WHITE);

                let selected = session.selected().map(|b| b.id.clone());
                for b in session.text_boxes().to_vec() {
                    let r = b.bounds().translate(rect.min.to_vec2());
                    let color = rgba(b.color);
                    if selected.as_deref() == Some(b.id.as_str()) {
                        let mut text = b.content.clone();
                        let edit = egui::TextEdit::multiline(&mut text)
                            .font(egui::FontId::proportional(b.font_size))
                            .text_color(color)
                            .frame(false)
                            .desired_width(b.width);
                        let resp = ui.put(r, edit);
                        if focus.as_deref() == Some(b.id.as_str()) {
                            resp.request_focus();
                        }
                        if resp.changed() {
                            session.set_text(&b.id, &text);
                        }
                        ui.painter().rect_stroke(r.expand(2.0), 0.0, egui::Stroke::new(1.0, ACCENT));
                        let handle = egui::Rect::from_center_size(r.max, egui::vec2(HANDLE_DRAW_SIZE, HANDLE_DRAW_SIZE));
                        ui.painter().rect_filled(handle, 1.0, ACCENT);
                    } else {
                        for (i, line) in b.content.split('\n').enumerate() {
                            ui.painter().text(
                                r.min + egui::vec2(0.0, i as f32 * b.font_size * LINE_HEIGHT),
                                egui::Align2::LEFT_TOP,
                                line,
                                egui::FontId::proportional(b.font_size),
                                color,
                            );
                        }
                        ui.painter()
                            .rect_stroke(r, 0.0, egui::Stroke::new(1.0, egui::Color32::from_white_alpha(40)));
                    }
                }

                ui.horizontal(|ui| {
                    apply = ui.button("Apply").clicked();
                    cancel = ui.button("Cancel").clicked();
                });
            });
        self.focus_text_box = focus.filter(|_| !apply && !cancel);

        if apply {
            let applied = self
                .text_painter()
                .and_then(|mut painter| self.editor.apply_annotation(&mut painter));
            match applied {
                Ok(_) => {
                    self.textures.forget("annotation_base");
                    self.textures.forget("annotation_strokes");
                    self.notify("Background updated.");
                }
                Err(e) => self.report(e),
            }
        } else if cancel {
            self.editor.close_annotation();
        }
    }

    fn key_window(&mut self, ctx: &egui::Context) {
        let Some(mut key) = self.key_prompt.take() else { return };
        let mut save = false;
        let mut cancel = false;
        egui::Window::new("API key")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Enter your Gemini API key to generate and edit images.");
                let resp = ui.add(egui::TextEdit::singleline(&mut key).password(true).hint_text("API key"));
                let entered = resp.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                ui.horizontal(|ui| {
                    save = ui.add_enabled(!key.trim().is_empty(), egui::Button::new("Save")).clicked()
                        || (entered && !key.trim().is_empty());
                    cancel = ui.button("Later").clicked();
                });
            });
        if save {
            self.editor.set_credential(&key);
            self.settings.api_key = key.trim().to_string();
            self.settings_draft.api_key = self.settings.api_key.clone();
            match self.settings.save() {
                Ok(()) => self.notify("API key saved."),
                Err(e) => self.report(e),
            }
        } else if !cancel {
            self.key_prompt = Some(key);
        }
    }

    fn settings_window(&mut self, ctx: &egui::Context) {
        if !self.settings_open {
            return;
        }
        let mut open = true;
        let mut save = false;
        egui::Window::new("Settings")
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                let d = &mut self.settings_draft;
                egui::Grid::new("settings_grid").num_columns(2).show(ui, |ui| {
                    ui.label("API key");
                    ui.add(egui::TextEdit::singleline(&mut d.api_key).password(true));
                    ui.end_row();
                    ui.label("Model");
                    ui.text_edit_singleline(&mut d.model);
                    ui.end_row();
                    ui.label("Endpoint");
                    ui.text_edit_singleline(&mut d.endpoint);
                    ui.end_row();
                    ui.label("Timeout (s)");
                    ui.add(egui::DragValue::new(&mut d.request_timeout_secs).clamp_range(1..=600));
                    ui.end_row();
                    ui.label("Mask brush");
                    ui.add(egui::Slider::new(&mut d.mask_brush_size, 1.0..=100.0));
                    ui.end_row();
                    ui.label("Annotation brush");
                    ui.add(egui::Slider::new(&mut d.annotation_brush_size, 1.0..=50.0));
                    ui.end_row();
                    ui.label("Annotation text");
                    ui.add(egui::Slider::new(&mut d.annotation_text_size, 8.0..=96.0));
                    ui.end_row();
                    ui.label("Undo steps (0 = unlimited)");
                    ui.add(egui::DragValue::new(&mut d.max_undo_steps).clamp_range(0..=500));
                    ui.end_row();
                    ui.label("Annotation font");
                    ui.text_edit_singleline(&mut d.font_path);
                    ui.end_row();
                });
                save = ui.button("Save").clicked();
            });
        if save {
            self.settings = self.settings_draft.clone();
            self.editor.set_credential(&self.settings.api_key);
            match self.settings.save() {
                Ok(()) => self.notify("Settings saved. Undo depth applies to new sessions."),
                Err(e) => self.report(e),
            }
        }
        self.settings_open = open && !save;
    }

    fn notices_ui(&mut self, ctx: &egui::Context) {
        let now = self.now;
        self.notices.retain(|n| n.until > now);
        if self.notices.is_empty() {
            return;
        }
        egui::Area::new("notices")
            .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-12.0, -12.0))
            .show(ctx, |ui| {
                for n in &self.notices {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        let color = if n.is_error {
                            egui::Color32::from_rgb(255, 120, 110)
                        } else {
                            ui.visuals().text_color()
                        };
                        ui.colored_label(color, &n.text);
                    });
                }
            });
        ctx.request_repaint_after(std::time::Duration::from_millis(250));
    }
}

fn paint_light_overlay(painter: &egui::Painter, rect: egui::Rect, overlay: &LightOverlay) {
    let cw = rect.width() / SHADE_CELLS as f32;
    let ch = rect.height() / SHADE_CELLS as f32;
    for row in 0..SHADE_CELLS {
        for col in 0..SHADE_CELLS {
            let u = (col as f32 + 0.5) / SHADE_CELLS as f32 * 100.0;
            let v = (row as f32 + 0.5) / SHADE_CELLS as f32 * 100.0;
            let a = shade_alpha(overlay, u, v);
            if a <= 0.0 {
                continue;
            }
            let cell = egui::Rect::from_min_size(
                rect.min + egui::vec2(col as f32 * cw, row as f32 * ch),
                egui::vec2(cw + 0.5, ch + 0.5),
            );
            painter.rect_filled(cell, 0.0, egui::Color32::from_black_alpha((a.min(1.0) * 255.0) as u8));
        }
    }
}

impl eframe::App for CutMakerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.now = ctx.input(|i| i.time);

        // --- Poll the transform worker ---
        self.poll_jobs();
        if self.editor.is_busy() {
            ctx.request_repaint_after(std::time::Duration::from_millis(200));
        }

        self.handle_shortcuts(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.toolbar_ui(ui, ctx);
        });
        egui::SidePanel::left("sources")
            .default_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.sources_ui(ui, ctx);
                });
            });
        egui::CentralPanel::default().show(ctx, |ui| {
            self.canvas_ui(ui, ctx);
        });

        if self.camera_open {
            self.camera_window(ctx);
        }
        if self.light_open {
            self.light_window(ctx);
        }
        self.comparison_window(ctx);
        self.annotation_window(ctx);
        self.settings_window(ctx);
        self.key_window(ctx);
        self.notices_ui(ctx);
    }
}
