// ============================================================================
// CutMaker CLI: headless transforms via subcommands
// ============================================================================
//
// Usage examples:
//   cutmaker generate --subject cat.png --scene beach.jpg --prompt "at sunset"
//   cutmaker compose --character "chars/*.png" --background street.jpg -o scene.png
//   cutmaker edit photo.png --mask mask.png --prompt "add a red scarf"
//   cutmaker crop photo.png --x 10 --y 10 --width 640 --height 360
//   cutmaker camera photo.png --pitch 30 --yaw -45 --lens 35
//   cutmaker relight photo.png --preset golden-hour
//   cutmaker set-key AIza...
//
// Without a subcommand the desktop editor opens. Every command runs on the
// current thread and writes one PNG.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::editor::{EditorState, JobRequest, ModeKind};
use crate::error::{EditError, Result};
use crate::io;
use crate::ops::ai::{GeminiService, TransformService};
use crate::ops::camera::{LightPreset, LightType, MAX_LIGHT_INTENSITY, MAX_LIGHT_TEMP_K, MIN_LIGHT_TEMP_K};
use crate::project::SlotKind;
use crate::settings::Settings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// CutMaker image editor.
///
/// Generate, compose and edit images with a hosted image model.
#[derive(Parser, Debug)]
#[command(
    name = "cutmaker",
    version,
    about = "AI image generation and editing",
    long_about = "Generate and compose images from reference pictures, edit masked\n\
                  regions, change camera angle or lighting, and upscale results.\n\
                  Run without a subcommand to open the desktop editor."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Echo warnings and errors to stderr and print timing information.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create an image from subject, scene and optional style references.
    Generate {
        /// Subject image(s). Glob patterns accepted.
        #[arg(long, required = true, num_args = 1..)]
        subject: Vec<String>,
        /// Scene composition image(s).
        #[arg(long, required = true, num_args = 1..)]
        scene: Vec<String>,
        /// Art style image(s).
        #[arg(long, num_args = 1..)]
        style: Vec<String>,
        #[arg(short, long, default_value = "")]
        prompt: String,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Place characters into a background.
    Compose {
        #[arg(long, required = true, num_args = 1..)]
        character: Vec<String>,
        #[arg(long, value_name = "FILE")]
        background: PathBuf,
        #[arg(short, long, default_value = "")]
        prompt: String,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Edit the region painted in a mask image.
    Edit {
        image: PathBuf,
        /// PNG with the same size as the image; any non-transparent pixel is selected.
        #[arg(long, value_name = "PNG")]
        mask: PathBuf,
        #[arg(short, long)]
        prompt: String,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Crop in native pixels. Runs locally.
    Crop {
        image: PathBuf,
        #[arg(long, default_value_t = 0)]
        x: u32,
        #[arg(long, default_value_t = 0)]
        y: u32,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Enhance resolution and detail.
    Upscale {
        image: PathBuf,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Re-render from another camera angle.
    Camera {
        image: PathBuf,
        /// Degrees; positive looks down on the subject.
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        pitch: f32,
        /// Degrees; 0 is the front, positive turns to the subject's right.
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        yaw: f32,
        /// Focal length in millimetres.
        #[arg(long)]
        lens: Option<u32>,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Re-light the image. A preset is applied first, explicit values override it.
    Relight {
        image: PathBuf,
        #[arg(long, value_parser = parse_preset)]
        preset: Option<LightPreset>,
        /// Horizontal light position, -1 (left) to 1 (right).
        #[arg(long, allow_negative_numbers = true)]
        x: Option<f32>,
        /// Vertical light position, -1 (top) to 1 (bottom).
        #[arg(long, allow_negative_numbers = true)]
        y: Option<f32>,
        /// Percent, 0-200.
        #[arg(long)]
        intensity: Option<u32>,
        /// Colour temperature in Kelvin.
        #[arg(long)]
        temp: Option<u32>,
        /// Percent; 0 is fully diffused.
        #[arg(long)]
        hardness: Option<u32>,
        /// Hex colour, e.g. "#ffd7a9".
        #[arg(long)]
        color: Option<String>,
        #[arg(long = "light-type", value_parser = parse_light_type)]
        light_type: Option<LightType>,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Store the API key in the settings file.
    SetKey { key: String },
}

impl Command {
    /// Commands that call the transform service.
    pub fn needs_service(&self) -> bool {
        !matches!(self, Command::Crop { .. } | Command::SetKey { .. })
    }

    fn output(&self) -> Option<&Path> {
        match self {
            Command::Generate { output, .. }
            | Command::Compose { output, .. }
            | Command::Edit { output, .. }
            | Command::Crop { output, .. }
            | Command::Upscale { output, .. }
            | Command::Camera { output, .. }
            | Command::Relight { output, .. } => output.as_deref(),
            Command::SetKey { .. } => None,
        }
    }
}

fn parse_preset(s: &str) -> std::result::Result<LightPreset, String> {
    LightPreset::parse(s).ok_or_else(|| {
        let names: Vec<_> = LightPreset::ALL.iter().map(|p| p.name()).collect();
        format!("unknown preset '{}', expected one of: {}", s, names.join(", "))
    })
}

fn parse_light_type(s: &str) -> std::result::Result<LightType, String> {
    LightType::parse(s).ok_or_else(|| format!("unknown light type '{}'", s))
}

// ============================================================================
// Public entry point
// ============================================================================

/// Runs one subcommand and returns the process exit code.
pub fn run(command: Command, verbose: bool) -> ExitCode {
    let start = Instant::now();
    let result = match &command {
        Command::SetKey { key } => store_key(key, &Settings::settings_path()).map(|()| None),
        _ => run_command(&command).map(Some),
    };
    match result {
        Ok(Some(path)) => {
            log::info!("Wrote {}", path.display());
            println!("{}", path.display());
            if verbose {
                println!("  ({:.0}ms)", start.elapsed().as_secs_f64() * 1000.0);
            }
            ExitCode::SUCCESS
        }
        Ok(None) => {
            println!("API key saved to {}", Settings::settings_path().display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Command failed ({}): {}", e.category(), e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_command(command: &Command) -> Result<PathBuf> {
    let settings = Settings::load();
    if command.needs_service() {
        let service = GeminiService::new(settings.gemini_config())?;
        execute(command, &settings, Some(&service))
    } else {
        execute(command, &settings, None)
    }
}

/// Runs an image command and writes its PNG. Returns the written path.
pub fn execute(command: &Command, settings: &Settings, service: Option<&dyn TransformService>) -> Result<PathBuf> {
    let mut editor = EditorState::from_settings(settings);
    let job = match command {
        Command::Generate {
            subject,
            scene,
            style,
            prompt,
            ..
        } => {
            add_sources(&mut editor, SlotKind::Subject, subject, true)?;
            add_sources(&mut editor, SlotKind::Scene, scene, true)?;
            add_sources(&mut editor, SlotKind::Style, style, false)?;
            JobRequest::Generate { prompt: prompt.clone() }
        }
        Command::Compose {
            character,
            background,
            prompt,
            ..
        } => {
            add_sources(&mut editor, SlotKind::Character, character, true)?;
            if !editor.sources.add_path(SlotKind::Background, background)? {
                return Err(EditError::MissingInput(format!(
                    "'{}' is not an image.",
                    background.display()
                )));
            }
            JobRequest::Compose { prompt: prompt.clone() }
        }
        Command::Edit { image, mask, prompt, .. } => {
            editor.set_image(io::load_file(image)?);
            editor.activate(ModeKind::Mask)?;
            let layer = io::load_file(mask)?;
            let loaded = editor.mask_mut().is_some_and(|m| m.load_layer(layer));
            if !loaded {
                return Err(EditError::MissingInput(
                    "The mask must have the same size as the image.".into(),
                ));
            }
            JobRequest::MaskEdit { prompt: prompt.clone() }
        }
        Command::Crop {
            image,
            x,
            y,
            width,
            height,
            ..
        } => {
            editor.set_image(io::load_file(image)?);
            if !editor.crop_region(*x, *y, *width, *height)? {
                return Err(EditError::MissingInput("The crop region is empty.".into()));
            }
            return write_result(&editor, command.output(), io::GENERATED_PREFIX);
        }
        Command::Upscale { image, .. } => {
            editor.set_image(io::load_file(image)?);
            JobRequest::Upscale
        }
        Command::Camera {
            image, pitch, yaw, lens, ..
        } => {
            editor.set_image(io::load_file(image)?);
            editor.camera.set_pitch(*pitch);
            editor.camera.set_yaw(*yaw);
            if let Some(lens) = lens {
                editor.camera.set_lens_mm(*lens);
            }
            JobRequest::Camera
        }
        Command::Relight {
            image,
            preset,
            x,
            y,
            intensity,
            temp,
            hardness,
            color,
            light_type,
            ..
        } => {
            editor.set_image(io::load_file(image)?);
            let light = &mut editor.light;
            if let Some(p) = preset {
                light.apply_preset(*p);
            }
            if let Some(x) = x {
                light.x = x.clamp(-1.0, 1.0);
            }
            if let Some(y) = y {
                light.y = y.clamp(-1.0, 1.0);
            }
            if let Some(i) = intensity {
                light.intensity = (*i).min(MAX_LIGHT_INTENSITY);
            }
            if let Some(t) = temp {
                light.temperature_k = (*t).clamp(MIN_LIGHT_TEMP_K, MAX_LIGHT_TEMP_K);
            }
            if let Some(h) = hardness {
                light.hardness = (*h).min(100);
            }
            if let Some(c) = color
                && !light.set_color_hex(c)
            {
                return Err(EditError::MissingInput(format!("'{}' is not a hex colour.", c)));
            }
            if let Some(t) = light_type {
                light.kind = *t;
            }
            JobRequest::Relight
        }
        Command::SetKey { .. } => {
            return Err(EditError::MissingInput("set-key does not produce an image.".into()));
        }
    };

    let service = service.ok_or(EditError::MissingCredential)?;
    let upscale = job == JobRequest::Upscale;
    editor.run_job(service, &job)?;
    if upscale {
        editor.accept_comparison();
    }
    let prefix = if upscale { io::IMPROVED_PREFIX } else { io::GENERATED_PREFIX };
    write_result(&editor, command.output(), prefix)
}

// ============================================================================
// Helpers
// ============================================================================

fn write_result(editor: &EditorState, output: Option<&Path>, prefix: &str) -> Result<PathBuf> {
    let image = editor
        .current_image()
        .ok_or_else(|| EditError::TransformFailure("No image to write.".into()))?;
    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(io::export_file_name(prefix, io::now_millis())));
    io::save_png(image, &path)?;
    Ok(path)
}

/// Loads every file the patterns resolve to into `kind`. A `required` slot
/// that ends up empty is an error naming the patterns that produced nothing.
fn add_sources(editor: &mut EditorState, kind: SlotKind, patterns: &[String], required: bool) -> Result<()> {
    for path in resolve_inputs(patterns)? {
        if !editor.sources.add_path(kind, &path)? {
            log::warn!("Skipping non-image file {}", path.display());
        }
    }
    if required && editor.sources.slot(kind).is_empty() {
        return Err(EditError::MissingInput(format!(
            "No {} image found for {}.",
            kind.label().to_lowercase(),
            patterns.join(", ")
        )));
    }
    Ok(())
}

/// Literal paths and glob matches in argument order, each file once.
/// A pattern that matches nothing is logged and contributes no paths.
pub fn resolve_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut found: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        let literal = Path::new(pattern);
        if literal.is_file() {
            if !found.iter().any(|p| p == literal) {
                found.push(literal.to_path_buf());
            }
            continue;
        }
        let entries = glob::glob(pattern)
            .map_err(|e| EditError::MissingInput(format!("Invalid pattern '{}': {}", pattern, e.msg)))?;
        let before = found.len();
        for entry in entries.flatten().filter(|p| p.is_file()) {
            if !found.contains(&entry) {
                found.push(entry);
            }
        }
        if found.len() == before {
            log::warn!("Pattern '{}' matched no files", pattern);
        }
    }
    Ok(found)
}

/// Saves `key` into the settings file at `path`, keeping its other values.
pub fn store_key(key: &str, path: &Path) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        return Err(EditError::MissingCredential);
    }
    let mut settings = Settings::load_from(path);
    settings.api_key = key.to_string();
    settings.save_to(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn parses_subcommands() {
        let args = CliArgs::try_parse_from([
            "cutmaker", "camera", "in.png", "--pitch", "-30", "--yaw", "-45", "--lens", "35",
        ])
        .unwrap();
        match args.command {
            Some(Command::Camera { pitch, yaw, lens, .. }) => {
                assert_eq!(pitch, -30.0);
                assert_eq!(yaw, -45.0);
                assert_eq!(lens, Some(35));
            }
            other => panic!("unexpected {:?}", other),
        }

        let args = CliArgs::try_parse_from(["cutmaker"]).unwrap();
        assert!(args.command.is_none());

        let args = CliArgs::try_parse_from(["cutmaker", "relight", "a.png", "--preset", "Golden-Hour"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Command::Relight { preset: Some(LightPreset::GoldenHour), .. })
        ));
        assert!(CliArgs::try_parse_from(["cutmaker", "relight", "a.png", "--preset", "disco"]).is_err());
        assert!(CliArgs::try_parse_from(["cutmaker", "generate", "--subject", "a.png"]).is_err());
    }

    #[test]
    fn resolves_globs_in_order_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "c.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let a = dir.path().join("a.png").to_string_lossy().to_string();
        let glob = dir.path().join("*.png").to_string_lossy().to_string();
        let found = resolve_inputs(&[a.clone(), glob]).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], PathBuf::from(&a));
        assert!(found[1].ends_with("b.png"));
    }

    #[test]
    fn glob_matching_nothing_resolves_empty() {
        let dir = tempfile::tempdir().unwrap();
        let none = dir.path().join("*.webp").to_string_lossy().to_string();
        assert!(resolve_inputs(&[none]).unwrap().is_empty());
        assert!(matches!(resolve_inputs(&["[unclosed".to_string()]), Err(EditError::MissingInput(_))));
    }

    #[test]
    fn required_slot_with_no_matches_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let scene = dir.path().join("scene.png");
        io::save_png(&RgbaImage::new(4, 4), &scene).unwrap();
        let cmd = Command::Generate {
            subject: vec![dir.path().join("*.jpg").to_string_lossy().to_string()],
            scene: vec![scene.to_string_lossy().to_string()],
            style: vec![dir.path().join("style-*.png").to_string_lossy().to_string()],
            prompt: String::new(),
            output: None,
        };
        let settings = Settings { api_key: "k".into(), ..Default::default() };
        match execute(&cmd, &settings, None) {
            Err(EditError::MissingInput(msg)) => assert!(msg.contains("*.jpg"), "{msg}"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn crop_runs_without_a_service() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        io::save_png(&RgbaImage::from_pixel(20, 10, Rgba([1, 2, 3, 255])), &input).unwrap();
        let out = dir.path().join("out.png");
        let cmd = Command::Crop {
            image: input,
            x: 5,
            y: 0,
            width: 10,
            height: 100,
            output: Some(out.clone()),
        };
        assert!(!cmd.needs_service());
        let written = execute(&cmd, &Settings::default(), None).unwrap();
        assert_eq!(written, out);
        assert_eq!(io::load_file(&out).unwrap().dimensions(), (10, 10));
    }

    #[test]
    fn transform_without_service_needs_a_key() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        io::save_png(&RgbaImage::new(4, 4), &input).unwrap();
        let cmd = Command::Upscale { image: input, output: None };
        let settings = Settings { api_key: "k".into(), ..Default::default() };
        assert!(matches!(execute(&cmd, &settings, None), Err(EditError::MissingCredential)));
    }

    #[test]
    fn set_key_keeps_other_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.cfg");
        Settings { max_undo_steps: 7, ..Default::default() }.save_to(&path).unwrap();
        store_key("  new-key ", &path).unwrap();
        let s = Settings::load_from(&path);
        assert_eq!(s.api_key, "new-key");
        assert_eq!(s.max_undo_steps, 7);
        assert!(matches!(store_key(" ", &path), Err(EditError::MissingCredential)));
    }
}
