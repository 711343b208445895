use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageFormat, RgbaImage};
use rfd::FileDialog;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;
use crate::ops::ai::InlineImage;

/// Extensions offered in the open dialog.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "gif"];

/// Prefix for results of generate, compose, edit, camera and relight.
pub const GENERATED_PREFIX: &str = "generated-image";
/// Prefix for accepted upscale results.
pub const IMPROVED_PREFIX: &str = "improved-image";

pub fn decode(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

pub fn load_file(path: &Path) -> Result<RgbaImage> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut Cursor::new(&mut buffer)).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(buffer)
}

pub fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    let bytes = encode_png(image)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// The raster as a PNG request part.
pub fn png_part(image: &RgbaImage) -> Result<InlineImage> {
    Ok(InlineImage::png(encode_png(image)?))
}

/// MIME type sniffed from the content's magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    let mime = match image::guess_format(bytes).ok()? {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Ico => "image/x-icon",
        ImageFormat::Tga => "image/x-tga",
        ImageFormat::Avif => "image/avif",
        _ => return None,
    };
    Some(mime)
}

pub fn is_image_mime(mime: &str) -> bool {
    mime.starts_with("image/")
}

/// Reads a file as a request part. Non-image content yields `Ok(None)`.
pub fn read_image_file(path: &Path) -> Result<Option<InlineImage>> {
    let bytes = std::fs::read(path)?;
    Ok(sniff_mime(&bytes)
        .filter(|m| is_image_mime(m))
        .map(|m| InlineImage::new(m, bytes)))
}

pub fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// `<prefix>-<millis>.png`
pub fn export_file_name(prefix: &str, millis: u128) -> String {
    format!("{}-{}.png", prefix, millis)
}

// ============================================================================
// NATIVE DIALOGS
// ============================================================================

pub fn pick_image_files() -> Vec<PathBuf> {
    FileDialog::new()
        .add_filter("Images", IMAGE_EXTENSIONS)
        .add_filter("All Files", &["*"])
        .pick_files()
        .unwrap_or_default()
}

pub fn pick_image_file() -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("Images", IMAGE_EXTENSIONS)
        .add_filter("All Files", &["*"])
        .pick_file()
}

pub fn pick_save_path(default_name: &str) -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("PNG", &["png"])
        .set_file_name(default_name)
        .save_file()
}
