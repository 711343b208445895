// ============================================================================
// PROMPT BUILDERS - instruction-part sequences for each generative action
// ============================================================================
//
// Each builder validates its inputs first and returns `MissingInput` before
// anything is assembled, so a rejected action never reaches the service.

use crate::error::{EditError, Result};
use crate::ops::ai::{InlineImage, InstructionPart};
use crate::ops::camera::{CameraState, LightState, VerticalAngle};

const NO_TEXT_RULE: &str = "CRITICAL: The final image must not contain any text, subtitles, captions, logos, or watermarks of any kind. This is a strict requirement.";
const NO_TEXT_RULE_SHORT: &str = "CRITICAL: The final image must not contain any text, subtitles, captions, logos, or watermarks of any kind.";

pub const UPSCALE_INSTRUCTION: &str = "Task: Upscale and enhance the provided image. Instructions: 1. Significantly increase the resolution and detail. Aim for the longest side to be approximately 3840 pixels. 2. Improve sharpness, clarity, and remove any compression artifacts. 3. Do NOT change the content, composition, or aspect ratio of the image. The goal is a higher-quality version of the exact same image.";

const MASK_EDIT_FRAMING: &str = "You are an expert image editor. The user has provided an image with a semi-transparent colored mask drawn on it. You must edit ONLY the area indicated by the mask according to the user's text prompt. Preserve the rest of the image perfectly.";

fn text(s: impl Into<String>) -> InstructionPart {
    InstructionPart::text(s)
}

fn images(list: &[InlineImage]) -> impl Iterator<Item = InstructionPart> + '_ {
    list.iter().cloned().map(InstructionPart::Image)
}

/// New illustration from subject, scene and optional style references.
pub fn generate(
    subjects: &[InlineImage],
    scenes: &[InlineImage],
    styles: &[InlineImage],
    prompt: &str,
) -> Result<Vec<InstructionPart>> {
    if subjects.is_empty() || scenes.is_empty() {
        return Err(EditError::MissingInput(
            "Add at least one subject image and one scene image.".into(),
        ));
    }

    let mut parts = vec![
        text("Generate a new, complete illustration based on the following elements."),
        text(NO_TEXT_RULE),
    ];

    parts.push(text("\n---SUBJECT---"));
    if subjects.len() > 1 {
        parts.push(text("CRITICAL INSTRUCTION FOR SUBJECT: Multiple subject images are provided. You must synthesize them as follows:"));
        parts.push(text("1. POSE REFERENCE: Identify the image(s) that define the subject's POSE (e.g., a 3D model)."));
        parts.push(text("2. CHARACTER REFERENCE: Identify the image(s) that define the CHARACTER's appearance (e.g., an anime character). This is the primary reference for the final subject's look, clothing, and style."));
        parts.push(text("TASK: Draw the CHARACTER from the character reference(s), but put them in the POSE from the pose reference(s). The final result must be the specified CHARACTER performing the specified POSE."));
    } else {
        parts.push(text("The main subject of the image should be based on this subject image. Pay attention to the pose, character design, and objects."));
    }
    parts.extend(images(subjects));

    parts.push(text("\n---SCENE COMPOSITION---"));
    parts.push(text("IMPORTANT: Use the following scene image(s) ONLY as a reference for the background layout, object placement, and overall mood. DO NOT use the photo directly. You MUST redraw the entire scene from scratch in the specified art style."));
    parts.extend(images(scenes));

    parts.push(text("\n---ART STYLE---"));
    if styles.is_empty() {
        parts.push(text("CRITICAL: No specific style image was provided. Therefore, you must derive the art style from the provided SUBJECT image(s). If both pose and character references are given for the subject, the CHARACTER reference is the definitive art style. Apply this style to the entire final image, including the redrawn background."));
    } else {
        parts.push(text("CRITICAL: The final image's art style (line work, coloring, texture, etc.) MUST strictly match the style of this/these reference image(s). This is the most important instruction."));
        parts.extend(images(styles));
    }

    let prompt = prompt.trim();
    if !prompt.is_empty() {
        parts.push(text("\n---USER'S PROMPT---"));
        parts.push(text(format!(
            "Based on all the provided image references, create an image that also incorporates the following request: \"{}\"",
            prompt
        )));
    }
    Ok(parts)
}

/// Numbered characters placed onto an annotated background.
pub fn compose(
    characters: &[InlineImage],
    backgrounds: &[InlineImage],
    prompt: &str,
) -> Result<Vec<InstructionPart>> {
    if characters.is_empty() || backgrounds.is_empty() {
        return Err(EditError::MissingInput(
            "Add at least one character image and a background image.".into(),
        ));
    }

    let mut parts = vec![
        text("You are a scene composition expert. Your task is to composite characters into a background scene based on user-provided images and annotations."),
        text(NO_TEXT_RULE_SHORT),
    ];

    parts.push(text("\n---CHARACTERS---"));
    parts.push(text("This section defines the characters to be placed in the scene. Each character is individually numbered."));
    for (i, img) in characters.iter().enumerate() {
        parts.push(text(format!("This is Character #{}.", i + 1)));
        parts.push(InstructionPart::Image(img.clone()));
    }

    parts.push(text("\n---BACKGROUND & COMPOSITION GUIDE---"));
    parts.push(text("This is the background image. It contains numbered annotations (e.g., text that says '1', '2') indicating where each character should be placed."));
    parts.extend(images(backgrounds));

    parts.push(text("\n---ABSOLUTELY CRITICAL COMPOSITION RULE---"));
    parts.push(text("You MUST place each numbered character from the 'CHARACTERS' section into the corresponding numbered location on the 'BACKGROUND' image. For example, 'Character #1' goes to the location marked '1'. 'Character #2' goes to the location marked '2', and so on. This character order is ABSOLUTE and MUST NOT be changed, swapped, or ignored under any circumstances, even if the user provides new text prompts later. Adhere to the annotations precisely for placement and integrate the characters naturally."));

    let prompt = prompt.trim();
    if !prompt.is_empty() {
        parts.push(text("\n---ADDITIONAL INSTRUCTIONS---"));
        parts.push(text(format!(
            "In addition to the visual guide, follow this instruction: \"{}\"",
            prompt
        )));
    }
    Ok(parts)
}

/// `composite` is the base image with the mask drawn over it.
pub fn mask_edit(prompt: &str, composite: InlineImage) -> Result<Vec<InstructionPart>> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(EditError::MissingInput("Describe the edit to apply to the selected area.".into()));
    }
    Ok(vec![
        text(MASK_EDIT_FRAMING),
        text(format!("User's edit instruction: \"{}\"", prompt)),
        InstructionPart::Image(composite),
    ])
}

pub fn upscale(image: InlineImage) -> Vec<InstructionPart> {
    vec![text(UPSCALE_INSTRUCTION), InstructionPart::Image(image)]
}

/// Camera re-render instruction for the current view.
pub fn camera_instruction(camera: &CameraState) -> String {
    if camera.vertical() == VerticalAngle::LowAngle {
        return format!(
            "Task: Re-render the provided image from a dramatic, extreme low-angle perspective.\n\
\n\
CRITICAL INSTRUCTIONS:\n\
1.  This is a complete re-generation. You MUST redraw the entire subject and scene to fit the new perspective. Do not simply skew or distort the original image.\n\
2.  Adhere EXACTLY to the following cinematic shot description: \"{}\".\n\
3.  Maintain the original subject's identity, clothing, and the general environment style, but adapt them to the new, dramatic perspective.\n\
4.  ABSOLUTELY CRITICAL RULE: If the subject is a human, their feet MUST be firmly planted on the ground. DO NOT show the soles of their feet or shoes. The perspective should be looking UP at the subject from near the ground level.\n\
5.  The final image must not contain any text, subtitles, captions, logos, or watermarks.",
            VerticalAngle::LowAngle.instruction()
        );
    }

    format!(
        "Task: Re-render the provided image with new camera settings, applying artistic perspective distortion.\n\
Instructions:\n\
1.  Identify the main subject in the image.\n\
2.  Redraw the entire subject and scene from the new perspective defined by the camera parameters below.\n\
3.  Maintain the original character design, clothing, art style, and overall mood.\n\
4.  This is NOT a simple crop, skew, or lens distortion. It is a complete re-generation applying the principles of perspective drawing (e.g., 3-point perspective for dramatic angles).\n\
5.  CRITICAL: The final image must not contain any text, subtitles, captions, logos, or watermarks of any kind.\n\
\n\
--- Camera Settings ---\n\
Vertical Angle Instruction: {}\n\
Horizontal Direction Instruction: {}\n\
Lens Focal Length: {}",
        camera.vertical().instruction(),
        camera.horizontal().instruction(),
        camera.lens_label()
    )
}

pub fn camera(camera_state: &CameraState, image: InlineImage) -> Vec<InstructionPart> {
    vec![text(camera_instruction(camera_state)), InstructionPart::Image(image)]
}

pub fn relight_instruction(light: &LightState) -> String {
    format!(
        "Task: Re-light the provided image according to the lighting setup below.\n\
Instructions:\n\
1.  Keep the subject, composition, pose, camera angle, and art style exactly as they are.\n\
2.  Change ONLY the lighting: light direction, shadows, highlights, and the color cast they produce.\n\
3.  Shadows must fall consistently away from the light direction.\n\
4.  CRITICAL: The final image must not contain any text, subtitles, captions, logos, or watermarks of any kind.\n\
\n\
--- Lighting Setup ---\n\
{}",
        light.describe()
    )
}

pub fn relight(light: &LightState, image: InlineImage) -> Vec<InstructionPart> {
    vec![text(relight_instruction(light)), InstructionPart::Image(image)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(tag: u8) -> InlineImage {
        InlineImage::png(vec![tag])
    }

    fn texts(parts: &[InstructionPart]) -> Vec<&str> {
        parts.iter().filter_map(InstructionPart::as_text).collect()
    }

    #[test]
    fn generate_requires_subject_and_scene() {
        assert!(matches!(generate(&[], &[img(1)], &[], ""), Err(EditError::MissingInput(_))));
        assert!(matches!(generate(&[img(1)], &[], &[], ""), Err(EditError::MissingInput(_))));
    }

    #[test]
    fn generate_without_prompt_has_no_user_section() {
        let parts = generate(&[img(1)], &[img(2)], &[], "   ").unwrap();
        let t = texts(&parts);
        assert!(!t.iter().any(|s| s.contains("USER'S PROMPT")));
        assert!(t.iter().any(|s| s.contains("No specific style image was provided")));
        let imgs: Vec<_> = parts.iter().filter(|p| p.is_image()).collect();
        assert_eq!(imgs.len(), 2);
        assert_eq!(imgs[0], &InstructionPart::Image(img(1)));
        assert_eq!(imgs[1], &InstructionPart::Image(img(2)));
    }

    #[test]
    fn generate_multi_subject_and_prompt() {
        let parts = generate(&[img(1), img(2)], &[img(3)], &[img(4)], "at night").unwrap();
        let t = texts(&parts);
        assert!(t.iter().any(|s| s.starts_with("CRITICAL INSTRUCTION FOR SUBJECT")));
        assert!(t.iter().any(|s| s.contains("\"at night\"")));
        assert!(!t.iter().any(|s| s.contains("No specific style")));
        assert_eq!(parts.iter().filter(|p| p.is_image()).count(), 4);
    }

    #[test]
    fn compose_numbers_characters() {
        let parts = compose(&[img(1), img(2)], &[img(9)], "").unwrap();
        let t = texts(&parts);
        assert!(t.contains(&"This is Character #1."));
        assert!(t.contains(&"This is Character #2."));
        assert!(!t.iter().any(|s| s.contains("ADDITIONAL INSTRUCTIONS")));
        let pos = parts.iter().position(|p| p.as_text() == Some("This is Character #2.")).unwrap();
        assert_eq!(parts[pos + 1], InstructionPart::Image(img(2)));
        assert!(matches!(compose(&[img(1)], &[], ""), Err(EditError::MissingInput(_))));
    }

    #[test]
    fn mask_edit_requires_prompt() {
        assert!(matches!(mask_edit(" ", img(1)), Err(EditError::MissingInput(_))));
        let parts = mask_edit("make it red", img(1)).unwrap();
        assert_eq!(parts[1].as_text(), Some("User's edit instruction: \"make it red\""));
        assert!(parts[2].is_image());
    }

    #[test]
    fn camera_templates() {
        let mut cam = CameraState::new();
        cam.set_yaw(90.0);
        let general = camera_instruction(&cam);
        assert!(general.contains("Vertical Angle Instruction: Eye-Level"));
        assert!(general.contains("perfect side view"));
        assert!(general.contains("Lens Focal Length: 50mm"));

        cam.set_pitch(-75.0);
        let low = camera_instruction(&cam);
        assert!(low.contains("extreme low-angle perspective"));
        assert!(!low.contains("Lens Focal Length"));
        assert!(low.contains(&format!("\"{}\"", VerticalAngle::LowAngle.instruction())));
        assert!(low.contains("camera placed near the floor"));
    }

    #[test]
    fn relight_embeds_description() {
        let light = LightState::default();
        let parts = relight(&light, img(1));
        let t = parts[0].as_text().unwrap();
        assert!(t.contains("--- Lighting Setup ---"));
        assert!(t.contains("directly above"));
        assert!(parts[1].is_image());
        assert_eq!(upscale(img(1)).len(), 2);
    }
}
