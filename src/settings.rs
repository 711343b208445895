use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::logger::app_data_dir;
use crate::ops::ai::{DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS, GeminiConfig};
use crate::ops::annotation::{DEFAULT_ANNOTATION_BRUSH, DEFAULT_TEXT_SIZE};
use crate::ops::mask::DEFAULT_MASK_BRUSH;

pub const SETTINGS_FILE_NAME: &str = "settings.cfg";
/// Overrides the stored key when set and non-empty.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Persistent user settings.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Empty = not configured.
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub request_timeout_secs: u64,
    pub mask_brush_size: f32,
    pub annotation_brush_size: f32,
    pub annotation_text_size: f32,
    /// Main image history depth. 0 = unlimited.
    pub max_undo_steps: usize,
    /// TTF/OTF used to flatten annotation text. Empty = bundled UI font.
    pub font_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            mask_brush_size: DEFAULT_MASK_BRUSH,
            annotation_brush_size: DEFAULT_ANNOTATION_BRUSH,
            annotation_text_size: DEFAULT_TEXT_SIZE,
            max_undo_steps: 50,
            font_path: String::new(),
        }
    }
}

impl Settings {
    /// `<data dir>/CutMaker/settings.cfg`
    pub fn settings_path() -> PathBuf {
        app_data_dir().join(SETTINGS_FILE_NAME)
    }

    /// Loads from the default location, falling back to defaults when the
    /// file is missing, then applies the environment key override.
    pub fn load() -> Self {
        let mut s = Self::load_from(&Self::settings_path());
        if let Ok(key) = std::env::var(API_KEY_ENV)
            && !key.trim().is_empty()
        {
            s.api_key = key.trim().to_string();
        }
        s
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Unknown keys are ignored; malformed values keep their default.
    pub fn parse(content: &str) -> Self {
        let d = Self::default();
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "api_key" => s.api_key = val.to_string(),
                "model" => {
                    if !val.is_empty() {
                        s.model = val.to_string();
                    }
                }
                "endpoint" => {
                    if !val.is_empty() {
                        s.endpoint = val.to_string();
                    }
                }
                "request_timeout_secs" => {
                    s.request_timeout_secs = val.parse().ok().filter(|&t| t > 0).unwrap_or(d.request_timeout_secs);
                }
                "mask_brush_size" => {
                    s.mask_brush_size = parse_size(val).unwrap_or(d.mask_brush_size);
                }
                "annotation_brush_size" => {
                    s.annotation_brush_size = parse_size(val).unwrap_or(d.annotation_brush_size);
                }
                "annotation_text_size" => {
                    s.annotation_text_size = parse_size(val).unwrap_or(d.annotation_text_size);
                }
                "max_undo_steps" => {
                    s.max_undo_steps = val.parse().unwrap_or(d.max_undo_steps);
                }
                "font_path" => s.font_path = val.to_string(),
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "api_key={}\n\
             model={}\n\
             endpoint={}\n\
             request_timeout_secs={}\n\
             mask_brush_size={}\n\
             annotation_brush_size={}\n\
             annotation_text_size={}\n\
             max_undo_steps={}\n\
             font_path={}\n",
            self.api_key,
            self.model,
            self.endpoint,
            self.request_timeout_secs,
            self.mask_brush_size,
            self.annotation_brush_size,
            self.annotation_text_size,
            self.max_undo_steps,
            self.font_path,
        )
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn max_undo(&self) -> Option<usize> {
        (self.max_undo_steps > 0).then_some(self.max_undo_steps)
    }

    pub fn gemini_config(&self) -> GeminiConfig {
        GeminiConfig {
            api_key: self.api_key.trim().to_string(),
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn font_path(&self) -> Option<&Path> {
        let p = self.font_path.trim();
        (!p.is_empty()).then(|| Path::new(p))
    }
}

fn parse_size(val: &str) -> Option<f32> {
    val.parse::<f32>().ok().filter(|v| v.is_finite() && *v >= 1.0)
}
