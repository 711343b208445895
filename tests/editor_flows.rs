//! End-to-end editing flows against an in-memory transform service.

use std::sync::Mutex;

use cutmaker::editor::{EditorState, JobKind, JobRequest, ModeKind};
use cutmaker::error::{EditError, Result};
use cutmaker::geometry::rect_xywh;
use cutmaker::io;
use cutmaker::ops::ai::{InlineImage, InstructionPart, TransformRequest, TransformResponse, TransformService};
use cutmaker::project::{SlotKind, SourceImage};
use egui::pos2;
use image::{Rgba, RgbaImage};

type Reply = Box<dyn Fn() -> Result<TransformResponse> + Send + Sync>;

/// Records every request and answers with a fixed reply.
struct MockService {
    requests: Mutex<Vec<TransformRequest>>,
    reply: Reply,
}

impl MockService {
    fn returning(image: RgbaImage) -> Self {
        let bytes = io::encode_png(&image).unwrap();
        Self::with(Box::new(move || {
            Ok(TransformResponse {
                image: InlineImage::png(bytes.clone()),
            })
        }))
    }

    fn with(reply: Reply) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            reply,
        }
    }

    fn requests(&self) -> Vec<TransformRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl TransformService for MockService {
    fn transform(&self, request: &TransformRequest) -> Result<TransformResponse> {
        self.requests.lock().unwrap().push(request.clone());
        (self.reply)()
    }
}

fn solid(w: u32, h: u32, v: u8) -> RgbaImage {
    RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255]))
}

fn source(name: &str, v: u8) -> SourceImage {
    SourceImage::from_raster(name, &solid(2, 2, v)).unwrap()
}

fn editor() -> EditorState {
    let mut ed = EditorState::default();
    ed.set_credential("test-key");
    ed
}

#[test]
fn generate_with_empty_prompt_commits_a_new_version() {
    let mut ed = editor();
    ed.set_image(solid(8, 8, 0));
    let x = source("x.png", 10);
    let y = source("y.png", 20);
    ed.sources.add(SlotKind::Subject, x.clone());
    ed.sources.add(SlotKind::Scene, y.clone());

    let service = MockService::returning(solid(16, 9, 200));
    ed.run_job(&service, &JobRequest::Generate { prompt: String::new() })
        .unwrap();

    let sent = service.requests();
    assert_eq!(sent.len(), 1);
    let images: Vec<&InlineImage> = sent[0]
        .parts
        .iter()
        .filter_map(|p| match p {
            InstructionPart::Image(img) => Some(img),
            InstructionPart::Text(_) => None,
        })
        .collect();
    assert_eq!(images, vec![&x.image, &y.image]);
    assert!(!sent[0].joined_text().contains("USER'S PROMPT"));

    assert_eq!(ed.history().len(), 2);
    assert_eq!(ed.history().cursor(), Some(1));
    assert_eq!(ed.current_image().unwrap().dimensions(), (16, 9));
    assert!(!ed.is_busy());
}

#[test]
fn mask_edit_without_strokes_sends_nothing() {
    let mut ed = editor();
    ed.set_image(solid(32, 32, 0));
    ed.activate(ModeKind::Mask).unwrap();
    let service = MockService::returning(solid(1, 1, 0));

    let err = ed
        .run_job(&service, &JobRequest::MaskEdit { prompt: "make it blue".into() })
        .unwrap_err();

    assert!(matches!(err, EditError::EmptySelection));
    assert!(service.requests().is_empty());
    assert_eq!(ed.history().len(), 1);
    assert_eq!(ed.mode_kind(), Some(ModeKind::Mask));
}

#[test]
fn mask_edit_sends_the_composite_and_commits() {
    let mut ed = editor();
    ed.set_image(solid(32, 32, 0));
    ed.set_display_rect(rect_xywh(0.0, 0.0, 64.0, 64.0));
    ed.activate(ModeKind::Mask).unwrap();
    ed.mask_pointer_down(pos2(32.0, 32.0));
    ed.mask_pointer_move(pos2(40.0, 32.0));
    ed.mask_pointer_up();

    let service = MockService::returning(solid(32, 32, 99));
    ed.run_job(&service, &JobRequest::MaskEdit { prompt: "make it blue".into() })
        .unwrap();

    let sent = service.requests();
    assert_eq!(sent[0].image_count(), 1);
    assert!(sent[0].joined_text().contains("\"make it blue\""));
    let InstructionPart::Image(composite) = sent[0].parts.last().unwrap() else {
        panic!("composite image expected last");
    };
    let composite = io::decode(&composite.data).unwrap();
    // Painted pixels carry the yellow mask over the black image.
    let px = composite.get_pixel(16, 16);
    assert!(px[0] > 150 && px[2] < 60);
    assert_eq!(composite.get_pixel(0, 0).0, [0, 0, 0, 255]);

    assert_eq!(ed.history().len(), 2);
    assert_eq!(ed.mode_kind(), None);
}

#[test]
fn wide_crop_on_a_square_image() {
    let mut ed = editor();
    ed.set_image(solid(1000, 1000, 0));
    ed.activate(ModeKind::Crop).unwrap();

    let r = ed.crop().unwrap().rect();
    assert!((r.width() - 950.0).abs() < 1e-3);
    assert!((r.height() - 534.375).abs() < 1e-3);
    assert!((r.left() - 25.0).abs() < 1e-3);
    assert!((r.center().y - 500.0).abs() < 1e-3);

    assert!(ed.perform_crop().unwrap());
    assert_eq!(ed.current_image().unwrap().dimensions(), (950, 534));
}

#[test]
fn second_job_is_rejected_while_one_is_running() {
    let mut ed = editor();
    ed.set_image(solid(4, 4, 0));
    let pending = ed.begin_job(&JobRequest::Camera).unwrap();
    assert_eq!(pending.kind, JobKind::Camera);
    assert!(pending.request.joined_text().contains("50mm"));

    let service = MockService::returning(solid(4, 4, 1));
    assert!(matches!(
        ed.run_job(&service, &JobRequest::Relight),
        Err(EditError::Busy)
    ));
    assert!(service.requests().is_empty());

    let reply = service.transform(&pending.request);
    ed.finish_job(pending.kind, reply).unwrap();
    assert!(!ed.is_busy());
    assert_eq!(ed.history().len(), 2);
}

#[test]
fn rejected_key_is_forgotten_and_history_kept() {
    let mut ed = editor();
    ed.set_image(solid(4, 4, 0));
    let service = MockService::with(Box::new(|| {
        Err(EditError::InvalidCredential("API key not valid. Please pass a valid API key.".into()))
    }));

    let err = ed.run_job(&service, &JobRequest::Upscale).unwrap_err();
    assert!(err.needs_credential());
    assert_eq!(ed.credential(), None);
    assert_eq!(ed.history().len(), 1);

    let err = ed.run_job(&service, &JobRequest::Upscale).unwrap_err();
    assert!(matches!(err, EditError::MissingCredential));
    assert_eq!(service.requests().len(), 1);
}

#[test]
fn upscale_result_waits_for_acceptance() {
    let mut ed = editor();
    ed.set_image(solid(4, 4, 0));
    let service = MockService::returning(solid(16, 16, 50));

    ed.run_job(&service, &JobRequest::Upscale).unwrap();
    assert_eq!(ed.history().len(), 1);
    let c = ed.comparison().unwrap();
    assert_eq!(c.before.dimensions(), (4, 4));
    assert_eq!(c.after.dimensions(), (16, 16));

    ed.discard_comparison();
    assert_eq!(ed.history().len(), 1);

    ed.run_job(&service, &JobRequest::Upscale).unwrap();
    assert!(ed.accept_comparison());
    assert_eq!(ed.history().len(), 2);
    assert_eq!(ed.current_image().unwrap().dimensions(), (16, 16));
}

#[test]
fn compose_needs_characters_and_background() {
    let mut ed = editor();
    let service = MockService::returning(solid(4, 4, 0));
    ed.sources.add(SlotKind::Character, source("hero.png", 1));
    assert!(matches!(
        ed.run_job(&service, &JobRequest::Compose { prompt: String::new() }),
        Err(EditError::MissingInput(_))
    ));
    assert!(!ed.is_busy());

    ed.sources.add(SlotKind::Background, source("street.png", 2));
    ed.run_job(&service, &JobRequest::Compose { prompt: "at night".into() })
        .unwrap();
    let sent = service.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].image_count(), 2);
    assert!(sent[0].joined_text().contains("This is Character #1."));
    assert!(sent[0].joined_text().contains("at night"));
    assert_eq!(ed.history().len(), 1);
}

#[test]
fn service_jobs_leave_the_active_mode() {
    let jobs = [
        JobRequest::Upscale,
        JobRequest::Camera,
        JobRequest::Relight,
        JobRequest::Generate { prompt: String::new() },
        JobRequest::Compose { prompt: String::new() },
    ];
    for job in jobs {
        for mode in [ModeKind::Crop, ModeKind::Mask] {
            let mut ed = editor();
            ed.set_image(solid(40, 40, 0));
            ed.sources.add(SlotKind::Subject, source("x.png", 10));
            ed.sources.add(SlotKind::Scene, source("y.png", 20));
            ed.sources.add(SlotKind::Character, source("c.png", 30));
            ed.sources.add(SlotKind::Background, source("bg.png", 40));
            ed.activate(mode).unwrap();

            let service = MockService::returning(solid(40, 40, 7));
            ed.run_job(&service, &job).unwrap();
            assert_eq!(ed.mode_kind(), None, "{:?} left {:?} active", job.kind(), mode);
        }
    }
}

#[test]
fn failed_preflight_keeps_the_mode() {
    let mut ed = EditorState::default();
    ed.set_image(solid(40, 40, 0));
    ed.activate(ModeKind::Crop).unwrap();
    let service = MockService::returning(solid(1, 1, 0));
    assert!(matches!(
        ed.run_job(&service, &JobRequest::Camera),
        Err(EditError::MissingCredential)
    ));
    assert_eq!(ed.mode_kind(), Some(ModeKind::Crop));
}
