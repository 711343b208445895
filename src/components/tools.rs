/// Tools shared by the mask editor and the annotation canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
    /// Annotation only: click to place a text box.
    Text,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Brush => "Brush",
            Tool::Eraser => "Eraser",
            Tool::Text => "Text",
        }
    }

    /// Composite mode for raster tools; `None` for tools that do not paint.
    pub fn composite_mode(&self) -> Option<CompositeMode> {
        match self {
            Tool::Brush => Some(CompositeMode::SourceOver),
            Tool::Eraser => Some(CompositeMode::DestinationOut),
            Tool::Text => None,
        }
    }
}

/// How stroke pixels combine with the layer underneath.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeMode {
    /// Paint: colour blended over the destination.
    SourceOver,
    /// Erase: destination alpha reduced by the stroke's coverage.
    DestinationOut,
}

/// Parses `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
pub fn parse_hex_color(s: &str) -> Option<[u8; 4]> {
    let hex = s.trim().trim_start_matches('#');
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        3 => {
            let mut out = [0, 0, 0, 255];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(out)
        }
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
        8 => Some([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
        _ => None,
    }
}

pub fn to_hex_color(c: [u8; 4]) -> String {
    format!("#{:02X}{:02X}{:02X}", c[0], c[1], c[2])
}
