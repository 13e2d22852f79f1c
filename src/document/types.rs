//! Core document types
//!
//! Geometry, text-layer and render types shared by the extraction,
//! overlay and synthesis stages. All coordinates are in content units
//! (PDF points) with a top-left origin unless stated otherwise.

use serde::{Deserialize, Serialize};

/// Document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
}

impl DocumentFormat {
    /// Detect format from MIME type
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence {
            "application/pdf" | "application/x-pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Detect format from magic bytes
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // Some generators emit a few junk bytes before the header; the
        // PDF reference allows the header anywhere in the first 1024 bytes.
        let window = &bytes[..bytes.len().min(1024)];
        if window.windows(4).any(|w| w == b"%PDF") {
            return Some(Self::Pdf);
        }

        None
    }

    /// MIME type for this format
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
        }
    }
}

/// Page dimensions in content units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Axis-aligned rectangle, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// A contiguous piece of text as the text layer reports it
///
/// A run is the smallest unit the extractor sees. Text extractors are free
/// to split one logical token across several runs, so nothing downstream
/// may assume a token lives inside a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRun {
    /// Run text
    pub text: String,
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Advance width of the whole run
    pub width: f32,
    /// Glyph box height
    pub height: f32,
    /// Font size the run was set in
    pub font_size: f32,
    /// Left edge of every glyph, when the extractor knows them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub glyph_x: Vec<f32>,
}

impl TextRun {
    /// Create a run without per-glyph positions
    pub fn new(text: impl Into<String>, x: f32, y: f32, width: f32, font_size: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            height: font_size,
            font_size,
            glyph_x: Vec::new(),
        }
    }

    /// Number of characters in the run
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Right edge
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// X position of the character at `char_index`
    ///
    /// Uses the recorded glyph positions when available, otherwise
    /// interpolates linearly across the run. An index at or past the end
    /// yields the run's right edge.
    pub fn x_at(&self, char_index: usize) -> f32 {
        let count = self.char_count();
        if count == 0 || char_index >= count {
            return self.right();
        }
        if self.glyph_x.len() == count {
            return self.glyph_x[char_index];
        }
        self.x + self.width * (char_index as f32 / count as f32)
    }
}

/// Text layer of one page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageText {
    /// Page index (0-based)
    pub page: usize,
    /// Page width
    pub width: f32,
    /// Page height
    pub height: f32,
    /// Text runs in extractor order
    pub runs: Vec<TextRun>,
}

impl PageText {
    pub fn size(&self) -> PageSize {
        PageSize {
            width: self.width,
            height: self.height,
        }
    }

    /// All run text concatenated, used for coarse pattern tests
    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// Image output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// Page raster request
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Page index (0-based)
    pub page: usize,
    /// Zoom factor, 1.0 = one pixel per content unit
    pub zoom: f32,
    /// Output format
    pub format: ImageFormat,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            page: 0,
            zoom: 1.0,
            format: ImageFormat::Png,
        }
    }
}

/// Encoded page raster
#[derive(Debug, Clone)]
pub struct RenderResult {
    /// Encoded image bytes
    pub data: Vec<u8>,
    /// Image format
    pub format: ImageFormat,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_bytes() {
        assert_eq!(
            DocumentFormat::from_magic_bytes(b"%PDF-1.7\n"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            DocumentFormat::from_magic_bytes(b"\x00\x00%PDF-1.4"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(DocumentFormat::from_magic_bytes(b"<html>"), None);
        assert_eq!(DocumentFormat::from_magic_bytes(b"%P"), None);
    }

    #[test]
    fn test_from_mime() {
        assert_eq!(
            DocumentFormat::from_mime("application/pdf; charset=binary"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(DocumentFormat::from_mime("text/html"), None);
    }

    #[test]
    fn test_run_x_at_interpolates() {
        let run = TextRun::new("abcd", 100.0, 50.0, 40.0, 10.0);
        assert_eq!(run.x_at(0), 100.0);
        assert_eq!(run.x_at(2), 120.0);
        assert_eq!(run.x_at(4), 140.0);
        assert_eq!(run.x_at(99), 140.0);
    }

    #[test]
    fn test_run_x_at_uses_glyphs() {
        let mut run = TextRun::new("ab", 10.0, 0.0, 20.0, 10.0);
        run.glyph_x = vec![10.0, 18.5];
        assert_eq!(run.x_at(1), 18.5);
    }
}
