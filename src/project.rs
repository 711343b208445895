use image::RgbaImage;
use std::path::Path;
use uuid::Uuid;

use crate::error::Result;
use crate::io;
use crate::ops::ai::InlineImage;

/// One committed state of the main image.
#[derive(Clone, Debug)]
pub struct ImageVersion {
    pub id: Uuid,
    pub image: RgbaImage,
}

impl ImageVersion {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            id: Uuid::new_v4(),
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// An uploaded reference image, kept in its original encoding so it is sent
/// to the service byte-for-byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceImage {
    pub id: Uuid,
    /// File name shown in the slot.
    pub name: String,
    pub image: InlineImage,
}

impl SourceImage {
    /// `None` when the bytes are not an image.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Option<Self> {
        let mime = io::sniff_mime(&bytes).filter(|m| io::is_image_mime(m))?;
        Some(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            image: InlineImage::new(mime, bytes),
        })
    }

    pub fn from_path(path: &Path) -> Result<Option<Self>> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self::from_bytes(name, bytes))
    }

    pub fn from_raster(name: impl Into<String>, image: &RgbaImage) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            image: io::png_part(image)?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Subject,
    Scene,
    Style,
    Character,
    Background,
}

impl SlotKind {
    pub const ALL: [SlotKind; 5] = [
        SlotKind::Subject,
        SlotKind::Scene,
        SlotKind::Style,
        SlotKind::Character,
        SlotKind::Background,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SlotKind::Subject => "Subject",
            SlotKind::Scene => "Scene",
            SlotKind::Style => "Style",
            SlotKind::Character => "Characters",
            SlotKind::Background => "Background",
        }
    }
}

/// Reference images for generate (subject/scene/style) and compose
/// (characters/background).
#[derive(Clone, Debug, Default)]
pub struct SourceImages {
    subject: Vec<SourceImage>,
    scene: Vec<SourceImage>,
    style: Vec<SourceImage>,
    characters: Vec<SourceImage>,
    background: Vec<SourceImage>,
}

impl SourceImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, kind: SlotKind) -> &[SourceImage] {
        match kind {
            SlotKind::Subject => &self.subject,
            SlotKind::Scene => &self.scene,
            SlotKind::Style => &self.style,
            SlotKind::Character => &self.characters,
            SlotKind::Background => &self.background,
        }
    }

    fn slot_mut(&mut self, kind: SlotKind) -> &mut Vec<SourceImage> {
        match kind {
            SlotKind::Subject => &mut self.subject,
            SlotKind::Scene => &mut self.scene,
            SlotKind::Style => &mut self.style,
            SlotKind::Character => &mut self.characters,
            SlotKind::Background => &mut self.background,
        }
    }

    pub fn add(&mut self, kind: SlotKind, image: SourceImage) {
        log::debug!("Added {} to {} slot", image.name, kind.label());
        self.slot_mut(kind).push(image);
    }

    /// Reads a file into a slot. Returns false for non-image content, which
    /// is silently skipped.
    pub fn add_path(&mut self, kind: SlotKind, path: &Path) -> Result<bool> {
        match SourceImage::from_path(path)? {
            Some(img) => {
                self.add(kind, img);
                Ok(true)
            }
            None => {
                log::debug!("Ignoring non-image file {}", path.display());
                Ok(false)
            }
        }
    }

    /// Out-of-range indices append.
    pub fn replace(&mut self, kind: SlotKind, index: usize, image: SourceImage) {
        let slot = self.slot_mut(kind);
        match slot.get_mut(index) {
            Some(existing) => *existing = image,
            None => slot.push(image),
        }
    }

    pub fn remove(&mut self, kind: SlotKind, index: usize) -> Option<SourceImage> {
        let slot = self.slot_mut(kind);
        (index < slot.len()).then(|| slot.remove(index))
    }

    pub fn clear(&mut self, kind: SlotKind) {
        self.slot_mut(kind).clear();
    }

    pub fn clear_all(&mut self) {
        for kind in SlotKind::ALL {
            self.clear(kind);
        }
    }

    /// Encoded payloads of one slot, in order.
    pub fn payloads(&self, kind: SlotKind) -> Vec<InlineImage> {
        self.slot(kind).iter().map(|s| s.image.clone()).collect()
    }

    pub fn can_generate(&self) -> bool {
        !self.subject.is_empty() && !self.scene.is_empty()
    }

    pub fn can_compose(&self) -> bool {
        !self.characters.is_empty() && !self.background.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(w: u32) -> SourceImage {
        SourceImage::from_raster(format!("{}.png", w), &RgbaImage::new(w, 1)).unwrap()
    }

    #[test]
    fn non_image_bytes_are_rejected() {
        assert!(SourceImage::from_bytes("a.txt", b"hello".to_vec()).is_none());
        assert_eq!(png(1).image.mime_type, "image/png");
    }

    #[test]
    fn slot_editing() {
        let mut s = SourceImages::new();
        assert!(!s.can_generate());
        s.add(SlotKind::Subject, png(1));
        s.add(SlotKind::Subject, png(2));
        s.add(SlotKind::Scene, png(3));
        assert!(s.can_generate());
        assert!(!s.can_compose());

        let replacement = png(4);
        s.replace(SlotKind::Subject, 0, replacement.clone());
        assert_eq!(s.slot(SlotKind::Subject)[0], replacement);
        s.replace(SlotKind::Subject, 9, png(5));
        assert_eq!(s.slot(SlotKind::Subject).len(), 3);

        assert!(s.remove(SlotKind::Subject, 7).is_none());
        assert_eq!(s.remove(SlotKind::Subject, 0), Some(replacement));
        assert_eq!(s.payloads(SlotKind::Subject).len(), 2);

        s.clear_all();
        assert!(SlotKind::ALL.iter().all(|&k| s.slot(k).is_empty()));
    }

    #[test]
    fn add_path_skips_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("x.jpg");
        std::fs::write(&bad, b"nope").unwrap();
        let mut s = SourceImages::new();
        assert!(!s.add_path(SlotKind::Style, &bad).unwrap());
        assert!(s.slot(SlotKind::Style).is_empty());
    }
}
