// ============================================================================
// EDITOR STATE - image version history, edit modes and transform jobs
// ============================================================================
//
// `EditorState` is owned by the front end (desktop app or CLI) and mutated
// from one thread. A transform job is split in two halves so the desktop app
// can run the network call on a worker thread:
//
//   begin_job()  -> validates, builds the request, marks the editor busy
//   (service call happens elsewhere)
//   finish_job() -> clears busy, commits the result or reports the failure
//
// `run_job()` chains both halves synchronously for headless use.

use egui::{Pos2, Rect, vec2};
use image::RgbaImage;

use crate::components::history::HistoryStack;
use crate::error::{EditError, Result};
use crate::geometry::CoordinateMapper;
use crate::io;
use crate::ops::ai::{InlineImage, TransformRequest, TransformResponse, TransformService};
use crate::ops::annotation::AnnotationSession;
use crate::ops::camera::{CameraState, LightState};
use crate::ops::crop::{AspectRatio, CropSolver};
use crate::ops::mask::{DEFAULT_MASK_BRUSH, MaskEditor};
use crate::ops::prompts;
use crate::ops::text::TextPainter;
use crate::project::{ImageVersion, SlotKind, SourceImage, SourceImages};
use crate::settings::Settings;

const NO_IMAGE: &str = "Upload or generate an image first.";

/// Interactive surface laid over the main image. At most one is active.
pub enum EditMode {
    Mask(MaskEditor),
    Crop(CropSolver),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeKind {
    Mask,
    Crop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    Generate,
    Compose,
    MaskEdit,
    Upscale,
    Camera,
    Relight,
}

impl JobKind {
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::Generate => "Generate",
            JobKind::Compose => "Compose",
            JobKind::MaskEdit => "Edit",
            JobKind::Upscale => "Upscale",
            JobKind::Camera => "Camera",
            JobKind::Relight => "Relight",
        }
    }
}

/// A transform action with its free-text input, if it takes one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobRequest {
    Generate { prompt: String },
    Compose { prompt: String },
    MaskEdit { prompt: String },
    Upscale,
    Camera,
    Relight,
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            JobRequest::Generate { .. } => JobKind::Generate,
            JobRequest::Compose { .. } => JobKind::Compose,
            JobRequest::MaskEdit { .. } => JobKind::MaskEdit,
            JobRequest::Upscale => JobKind::Upscale,
            JobRequest::Camera => JobKind::Camera,
            JobRequest::Relight => JobKind::Relight,
        }
    }
}

/// Validated request, ready to hand to a service.
#[derive(Clone, Debug)]
pub struct PendingJob {
    pub kind: JobKind,
    pub request: TransformRequest,
}

/// Upscale result waiting for the user to accept or discard it.
#[derive(Clone, Debug)]
pub struct Comparison {
    pub before: RgbaImage,
    pub after: RgbaImage,
}

pub struct EditorState {
    history: HistoryStack<ImageVersion>,
    mode: Option<EditMode>,
    /// Where the current image is drawn, in screen coordinates. Headless
    /// callers leave it unset and work at native scale.
    display: Option<Rect>,
    pub sources: SourceImages,
    pub camera: CameraState,
    pub light: LightState,
    comparison: Option<Comparison>,
    annotation: Option<AnnotationSession>,
    busy: Option<JobKind>,
    credential: Option<String>,
    mask_brush_size: f32,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(Some(50), DEFAULT_MASK_BRUSH)
    }
}

impl EditorState {
    pub fn new(max_versions: Option<usize>, mask_brush_size: f32) -> Self {
        let history = match max_versions {
            Some(limit) => HistoryStack::with_limit(limit),
            None => HistoryStack::new(),
        };
        Self {
            history,
            mode: None,
            display: None,
            sources: SourceImages::new(),
            camera: CameraState::new(),
            light: LightState::default(),
            comparison: None,
            annotation: None,
            busy: None,
            credential: None,
            mask_brush_size,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mut state = Self::new(settings.max_undo(), settings.mask_brush_size);
        if settings.has_api_key() {
            state.set_credential(settings.api_key.trim());
        }
        state
    }

    // --- credential ---------------------------------------------------------

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn set_credential(&mut self, key: &str) {
        let key = key.trim();
        self.credential = (!key.is_empty()).then(|| key.to_string());
    }

    pub fn clear_credential(&mut self) {
        self.credential = None;
    }

    // --- image history ------------------------------------------------------

    pub fn history(&self) -> &HistoryStack<ImageVersion> {
        &self.history
    }

    pub fn current(&self) -> Option<&ImageVersion> {
        self.history.current()
    }

    pub fn current_image(&self) -> Option<&RgbaImage> {
        self.current().map(|v| &v.image)
    }

    pub fn has_image(&self) -> bool {
        self.history.current().is_some()
    }

    /// Commits a new version, pruning any redo branch.
    pub fn set_image(&mut self, image: RgbaImage) {
        let version = ImageVersion::new(image);
        log::info!(
            "New image version {} ({}x{})",
            version.id,
            version.width(),
            version.height()
        );
        self.history.push(version);
        self.reinit_mode();
    }

    pub fn undo(&mut self) -> bool {
        let moved = self.history.undo().is_some();
        if moved {
            self.reinit_mode();
        }
        moved
    }

    pub fn redo(&mut self) -> bool {
        let moved = self.history.redo().is_some();
        if moved {
            self.reinit_mode();
        }
        moved
    }

    /// Back to the first version; everything after it is dropped.
    pub fn reset(&mut self) -> bool {
        let reset = self.history.truncate_to_first().is_some();
        if reset {
            self.reinit_mode();
        }
        reset
    }

    /// Forgets every version and leaves all modes. Refused while a job is
    /// running, since its result would land in the emptied history.
    pub fn delete(&mut self) -> Result<()> {
        if self.busy.is_some() {
            return Err(EditError::Busy);
        }
        self.mode = None;
        self.comparison = None;
        self.history.clear();
        log::info!("Image deleted");
        Ok(())
    }

    // --- display geometry ---------------------------------------------------

    /// The on-screen rectangle of the current image. The crop box follows it.
    pub fn set_display_rect(&mut self, rect: Rect) {
        if self.display == Some(rect) {
            return;
        }
        self.display = Some(rect);
        if let Some(EditMode::Crop(solver)) = &mut self.mode {
            solver.set_bounds(rect);
        }
    }

    pub fn display_rect(&self) -> Rect {
        match (self.display, self.current()) {
            (Some(r), _) => r,
            (None, Some(v)) => Rect::from_min_size(Pos2::ZERO, vec2(v.width() as f32, v.height() as f32)),
            (None, None) => Rect::ZERO,
        }
    }

    fn mapper(&self) -> Option<CoordinateMapper> {
        let v = self.current()?;
        Some(CoordinateMapper::new(self.display_rect(), v.width(), v.height()))
    }

    // --- modes --------------------------------------------------------------

    pub fn mode_kind(&self) -> Option<ModeKind> {
        match self.mode {
            Some(EditMode::Mask(_)) => Some(ModeKind::Mask),
            Some(EditMode::Crop(_)) => Some(ModeKind::Crop),
            None => None,
        }
    }

    /// Switches modes; the previous one is always left first.
    pub fn activate(&mut self, kind: ModeKind) -> Result<()> {
        self.deactivate();
        let Some(v) = self.current() else {
            return Err(EditError::MissingInput(NO_IMAGE.into()));
        };
        self.mode = Some(match kind {
            ModeKind::Mask => EditMode::Mask(MaskEditor::new(v.width(), v.height(), self.mask_brush_size)),
            ModeKind::Crop => EditMode::Crop(CropSolver::new(self.display_rect(), Some(AspectRatio::WIDE))),
        });
        log::debug!("{:?} mode active", kind);
        Ok(())
    }

    pub fn deactivate(&mut self) {
        if let Some(kind) = self.mode_kind() {
            log::debug!("{:?} mode closed", kind);
        }
        self.mode = None;
    }

    /// Active mode against the current image, as after a version change.
    fn reinit_mode(&mut self) {
        let Some((w, h)) = self.current().map(|v| (v.width(), v.height())) else {
            self.mode = None;
            return;
        };
        let bounds = self.display_rect();
        match &mut self.mode {
            Some(EditMode::Mask(m)) => m.reinit(w, h),
            Some(EditMode::Crop(c)) => *c = CropSolver::new(bounds, Some(AspectRatio::WIDE)),
            None => {}
        }
    }

    pub fn mask(&self) -> Option<&MaskEditor> {
        match &self.mode {
            Some(EditMode::Mask(m)) => Some(m),
            _ => None,
        }
    }

    pub fn mask_mut(&mut self) -> Option<&mut MaskEditor> {
        match &mut self.mode {
            Some(EditMode::Mask(m)) => Some(m),
            _ => None,
        }
    }

    pub fn crop(&self) -> Option<&CropSolver> {
        match &self.mode {
            Some(EditMode::Crop(c)) => Some(c),
            _ => None,
        }
    }

    pub fn crop_mut(&mut self) -> Option<&mut CropSolver> {
        match &mut self.mode {
            Some(EditMode::Crop(c)) => Some(c),
            _ => None,
        }
    }

    pub fn mask_pointer_down(&mut self, screen: Pos2) {
        let Some(mapper) = self.mapper() else { return };
        if let Some(m) = self.mask_mut() {
            m.pointer_down(&mapper, screen);
        }
    }

    pub fn mask_pointer_move(&mut self, screen: Pos2) {
        let Some(mapper) = self.mapper() else { return };
        if let Some(m) = self.mask_mut() {
            m.pointer_move(&mapper, screen);
        }
    }

    pub fn mask_pointer_up(&mut self) {
        if let Some(m) = self.mask_mut() {
            m.pointer_up();
        }
    }

    /// Commits the crop box as a new version and leaves crop mode. Returns
    /// false when the box maps to no pixels.
    pub fn perform_crop(&mut self) -> Result<bool> {
        let Some(image) = self.current_image() else {
            return Err(EditError::MissingInput(NO_IMAGE.into()));
        };
        let Some(solver) = self.crop() else {
            return Ok(false);
        };
        let Some(cropped) = solver.extract(image) else {
            return Ok(false);
        };
        log::info!("Cropped to {}x{}", cropped.width(), cropped.height());
        self.mode = None;
        self.set_image(cropped);
        Ok(true)
    }

    /// Crop in native pixels, without a crop session.
    pub fn crop_region(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<bool> {
        let Some(image) = self.current_image() else {
            return Err(EditError::MissingInput(NO_IMAGE.into()));
        };
        let x = x.min(image.width());
        let y = y.min(image.height());
        let w = width.min(image.width() - x);
        let h = height.min(image.height() - y);
        if w == 0 || h == 0 {
            return Ok(false);
        }
        let cropped = image::imageops::crop_imm(image, x, y, w, h).to_image();
        self.set_image(cropped);
        Ok(true)
    }

    // --- transform jobs -----------------------------------------------------

    pub fn is_busy(&self) -> bool {
        self.busy.is_some()
    }

    pub fn busy_job(&self) -> Option<JobKind> {
        self.busy
    }

    /// Pre-flight checks and request construction. Nothing is sent and no
    /// state changes when this fails.
    pub fn begin_job(&mut self, job: &JobRequest) -> Result<PendingJob> {
        if self.busy.is_some() {
            return Err(EditError::Busy);
        }
        if self.credential.is_none() {
            return Err(EditError::MissingCredential);
        }
        let kind = job.kind();
        let parts = match job {
            JobRequest::Generate { prompt } => prompts::generate(
                &self.sources.payloads(SlotKind::Subject),
                &self.sources.payloads(SlotKind::Scene),
                &self.sources.payloads(SlotKind::Style),
                prompt,
            )?,
            JobRequest::Compose { prompt } => prompts::compose(
                &self.sources.payloads(SlotKind::Character),
                &self.sources.payloads(SlotKind::Background),
                prompt,
            )?,
            JobRequest::MaskEdit { prompt } => {
                let Some(mask) = self.mask() else {
                    return Err(EditError::EmptySelection);
                };
                let image = self.current_image().ok_or_else(|| EditError::MissingInput(NO_IMAGE.into()))?;
                if prompt.trim().is_empty() {
                    return Err(EditError::MissingInput(
                        "Describe the edit to apply to the selected area.".into(),
                    ));
                }
                if !mask.has_selection() {
                    return Err(EditError::EmptySelection);
                }
                let composite = io::png_part(&mask.composite_onto(image))?;
                prompts::mask_edit(prompt, composite)?
            }
            JobRequest::Upscale => prompts::upscale(self.current_part()?),
            JobRequest::Camera => prompts::camera(&self.camera, self.current_part()?),
            JobRequest::Relight => prompts::relight(&self.light, self.current_part()?),
        };
        // The result replaces the version the mode was editing.
        self.deactivate();
        self.busy = Some(kind);
        log::info!("{} job started", kind.label());
        Ok(PendingJob {
            kind,
            request: TransformRequest::new(parts),
        })
    }

    fn current_part(&self) -> Result<InlineImage> {
        let image = self.current_image().ok_or_else(|| EditError::MissingInput(NO_IMAGE.into()))?;
        io::png_part(image)
    }

    /// Commits or rejects a finished job. Failures leave the history as it
    /// was; a rejected key is forgotten.
    pub fn finish_job(&mut self, kind: JobKind, outcome: Result<TransformResponse>) -> Result<()> {
        self.busy = None;
        let result = outcome.and_then(|resp| io::decode(&resp.image.data));
        let image = match result {
            Ok(img) => img,
            Err(e) => {
                log::error!("{} job failed ({}): {}", kind.label(), e.category(), e);
                if matches!(e, EditError::InvalidCredential(_)) {
                    self.clear_credential();
                }
                return Err(e);
            }
        };
        log::info!("{} job finished", kind.label());
        if kind == JobKind::Upscale
            && let Some(before) = self.current_image().cloned()
        {
            self.comparison = Some(Comparison { before, after: image });
            return Ok(());
        }
        self.set_image(image);
        Ok(())
    }

    /// `begin_job`, the service call and `finish_job` in one go.
    pub fn run_job(&mut self, service: &dyn TransformService, job: &JobRequest) -> Result<()> {
        let pending = self.begin_job(job)?;
        let outcome = service.transform(&pending.request);
        self.finish_job(pending.kind, outcome)
    }

    // --- upscale comparison -------------------------------------------------

    pub fn comparison(&self) -> Option<&Comparison> {
        self.comparison.as_ref()
    }

    pub fn accept_comparison(&mut self) -> bool {
        match self.comparison.take() {
            Some(c) => {
                self.set_image(c.after);
                true
            }
            None => false,
        }
    }

    pub fn discard_comparison(&mut self) {
        self.comparison = None;
    }

    // --- annotation ---------------------------------------------------------

    /// Opens the annotation canvas on the first background image.
    pub fn open_annotation(&mut self, viewport_w: f32, viewport_h: f32) -> Result<()> {
        let Some(bg) = self.sources.slot(SlotKind::Background).first() else {
            return Err(EditError::MissingInput("Add a background image to annotate.".into()));
        };
        let image = io::decode(&bg.image.data)?;
        self.annotation = Some(AnnotationSession::open(image, viewport_w, viewport_h));
        Ok(())
    }

    pub fn annotation(&self) -> Option<&AnnotationSession> {
        self.annotation.as_ref()
    }

    pub fn annotation_mut(&mut self) -> Option<&mut AnnotationSession> {
        self.annotation.as_mut()
    }

    pub fn close_annotation(&mut self) {
        self.annotation = None;
    }

    /// Flattens the session and replaces the first background with it.
    pub fn apply_annotation(&mut self, painter: &mut dyn TextPainter) -> Result<bool> {
        let Some(session) = self.annotation.take() else {
            return Ok(false);
        };
        let flattened = session.flatten(painter);
        let name = self
            .sources
            .slot(SlotKind::Background)
            .first()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| "background.png".into());
        let source = SourceImage::from_raster(name, &flattened)?;
        self.sources.replace(SlotKind::Background, 0, source);
        Ok(true)
    }

    // --- export -------------------------------------------------------------

    /// PNG bytes of the current version with its download name.
    pub fn export_current(&self) -> Result<(String, Vec<u8>)> {
        let image = self.current_image().ok_or_else(|| EditError::MissingInput(NO_IMAGE.into()))?;
        Ok((
            io::export_file_name(io::GENERATED_PREFIX, io::now_millis()),
            io::encode_png(image)?,
        ))
    }

    /// PNG bytes of the pending upscale result.
    pub fn export_comparison(&self) -> Result<(String, Vec<u8>)> {
        let c = self
            .comparison
            .as_ref()
            .ok_or_else(|| EditError::MissingInput("No upscale result to save.".into()))?;
        Ok((
            io::export_file_name(io::IMPROVED_PREFIX, io::now_millis()),
            io::encode_png(&c.after)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(w: u32, h: u32, v: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255]))
    }

    #[test]
    fn set_image_prunes_redo_branch() {
        let mut ed = EditorState::default();
        ed.set_image(solid(4, 4, 1));
        ed.set_image(solid(4, 4, 2));
        ed.set_image(solid(4, 4, 3));
        assert!(ed.undo());
        ed.set_image(solid(4, 4, 4));
        assert!(!ed.redo());
        assert_eq!(ed.history().len(), 3);
        assert_eq!(ed.current_image().unwrap().get_pixel(0, 0)[0], 4);
    }

    #[test]
    fn reset_and_delete() {
        let mut ed = EditorState::default();
        ed.set_image(solid(4, 4, 1));
        ed.set_image(solid(4, 4, 2));
        assert!(ed.reset());
        assert_eq!(ed.history().len(), 1);
        assert_eq!(ed.current_image().unwrap().get_pixel(0, 0)[0], 1);
        ed.activate(ModeKind::Mask).unwrap();
        ed.delete().unwrap();
        assert!(!ed.has_image());
        assert_eq!(ed.mode_kind(), None);
        assert!(!ed.reset());
    }

    #[test]
    fn delete_is_refused_while_a_job_runs() {
        let mut ed = EditorState::default();
        ed.set_credential("k");
        ed.set_image(solid(4, 4, 1));
        let pending = ed.begin_job(&JobRequest::Upscale).unwrap();
        assert!(matches!(ed.delete(), Err(EditError::Busy)));
        assert!(ed.has_image());

        let reply = io::encode_png(&solid(8, 8, 2)).map(|png| TransformResponse {
            image: InlineImage::png(png),
        });
        ed.finish_job(pending.kind, reply).unwrap();
        assert!(ed.comparison().is_some());
        ed.delete().unwrap();
        assert!(!ed.has_image());
        assert!(ed.comparison().is_none());
    }

    #[test]
    fn modes_need_an_image_and_are_exclusive() {
        let mut ed = EditorState::default();
        assert!(matches!(ed.activate(ModeKind::Crop), Err(EditError::MissingInput(_))));
        ed.set_image(solid(100, 100, 0));
        ed.activate(ModeKind::Crop).unwrap();
        assert_eq!(ed.crop().unwrap().aspect(), Some(AspectRatio::WIDE));
        ed.activate(ModeKind::Mask).unwrap();
        assert!(ed.crop().is_none());
        assert_eq!(ed.mask().unwrap().layer().dimensions(), (100, 100));
    }

    #[test]
    fn version_change_reinitialises_mask() {
        let mut ed = EditorState::default();
        ed.set_image(solid(40, 20, 0));
        ed.activate(ModeKind::Mask).unwrap();
        ed.mask_pointer_down(egui::pos2(10.0, 10.0));
        ed.mask_pointer_up();
        assert!(ed.mask().unwrap().has_selection());
        ed.set_image(solid(8, 8, 0));
        let mask = ed.mask().unwrap();
        assert!(!mask.has_selection());
        assert_eq!(mask.layer().dimensions(), (8, 8));
    }

    #[test]
    fn perform_crop_commits_and_leaves_mode() {
        let mut ed = EditorState::default();
        ed.set_image(solid(1000, 1000, 0));
        ed.activate(ModeKind::Crop).unwrap();
        assert!(ed.perform_crop().unwrap());
        assert_eq!(ed.current_image().unwrap().dimensions(), (950, 534));
        assert_eq!(ed.history().len(), 2);
        assert_eq!(ed.mode_kind(), None);
        assert!(!ed.perform_crop().unwrap());
    }

    #[test]
    fn crop_region_clamps() {
        let mut ed = EditorState::default();
        ed.set_image(solid(10, 10, 0));
        assert!(ed.crop_region(6, 6, 100, 100).unwrap());
        assert_eq!(ed.current_image().unwrap().dimensions(), (4, 4));
        assert!(!ed.crop_region(10, 0, 5, 5).unwrap());
    }

    #[test]
    fn jobs_need_a_credential_and_are_exclusive() {
        let mut ed = EditorState::default();
        ed.set_image(solid(4, 4, 0));
        assert!(matches!(ed.begin_job(&JobRequest::Upscale), Err(EditError::MissingCredential)));
        ed.set_credential("key");
        let pending = ed.begin_job(&JobRequest::Upscale).unwrap();
        assert_eq!(pending.kind, JobKind::Upscale);
        assert!(ed.is_busy());
        assert!(matches!(ed.begin_job(&JobRequest::Camera), Err(EditError::Busy)));
        let _ = ed.finish_job(pending.kind, Err(EditError::InvalidCredential("bad".into())));
        assert!(!ed.is_busy());
        assert_eq!(ed.credential(), None);
        assert_eq!(ed.history().len(), 1);
    }

    #[test]
    fn failed_decode_keeps_history() {
        let mut ed = EditorState::default();
        ed.set_credential("k");
        ed.set_image(solid(4, 4, 0));
        let pending = ed.begin_job(&JobRequest::Relight).unwrap();
        let garbage = TransformResponse { image: InlineImage::png(vec![0, 1, 2]) };
        assert!(matches!(ed.finish_job(pending.kind, Ok(garbage)), Err(EditError::Codec(_))));
        assert_eq!(ed.history().len(), 1);
        assert_eq!(ed.credential(), Some("k"));
    }

    #[test]
    fn upscale_goes_through_comparison() {
        let mut ed = EditorState::default();
        ed.set_credential("k");
        ed.set_image(solid(4, 4, 0));
        let pending = ed.begin_job(&JobRequest::Upscale).unwrap();
        let after = io::encode_png(&solid(8, 8, 9)).unwrap();
        ed.finish_job(pending.kind, Ok(TransformResponse { image: InlineImage::png(after) }))
            .unwrap();
        assert_eq!(ed.history().len(), 1);
        assert_eq!(ed.comparison().unwrap().after.dimensions(), (8, 8));
        let (name, _) = ed.export_comparison().unwrap();
        assert!(name.starts_with("improved-image-"));
        assert!(ed.accept_comparison());
        assert_eq!(ed.history().len(), 2);
        assert!(ed.comparison().is_none());
        assert!(!ed.accept_comparison());
    }

    #[test]
    fn mask_edit_preflight() {
        let mut ed = EditorState::default();
        ed.set_credential("k");
        ed.set_image(solid(20, 20, 0));
        let job = JobRequest::MaskEdit { prompt: "add a hat".into() };
        assert!(matches!(ed.begin_job(&job), Err(EditError::EmptySelection)));
        ed.activate(ModeKind::Mask).unwrap();
        assert!(matches!(
            ed.begin_job(&JobRequest::MaskEdit { prompt: " ".into() }),
            Err(EditError::MissingInput(_))
        ));
        assert!(matches!(ed.begin_job(&job), Err(EditError::EmptySelection)));
        assert!(!ed.is_busy());

        ed.mask_pointer_down(egui::pos2(10.0, 10.0));
        ed.mask_pointer_up();
        let pending = ed.begin_job(&job).unwrap();
        assert_eq!(pending.request.image_count(), 1);
        assert_eq!(ed.mode_kind(), None);
    }

    #[test]
    fn annotation_replaces_first_background() {
        struct NoText;
        impl TextPainter for NoText {
            fn measure(&self, _: &str, _: f32) -> f32 {
                0.0
            }
            fn draw_line(&mut self, _: &mut RgbaImage, _: &str, _: f32, _: f32, _: f32, _: [u8; 4]) {}
        }

        let mut ed = EditorState::default();
        assert!(ed.open_annotation(800.0, 600.0).is_err());
        let bg = SourceImage::from_raster("bg.png", &solid(40, 30, 0)).unwrap();
        ed.sources.add(SlotKind::Background, bg.clone());
        ed.open_annotation(800.0, 600.0).unwrap();
        let session = ed.annotation_mut().unwrap();
        let r = session.display_rect();
        session.pointer_down(r.min + egui::vec2(5.0, 5.0));
        session.pointer_up();
        assert!(ed.apply_annotation(&mut NoText).unwrap());
        assert!(ed.annotation().is_none());
        let replaced = &ed.sources.slot(SlotKind::Background)[0];
        assert_eq!(replaced.name, "bg.png");
        assert_ne!(replaced.image, bg.image);
        assert_eq!(ed.sources.slot(SlotKind::Background).len(), 1);
    }
}
