//! Structured Text Helpers
//!
//! Turns MuPDF structured text into positioned text runs.

use mupdf::{Page, TextPageOptions};

use crate::document::{FillResult, PageText, TextRun};

/// Options for structured text extraction
#[derive(Debug, Clone, Default)]
pub struct StextOptions {
    /// Preserve whitespace
    pub preserve_whitespace: bool,
    /// Inhibit spaces between characters
    pub inhibit_spaces: bool,
}

impl StextOptions {
    /// Convert to MuPDF TextPageOptions
    pub fn to_mupdf_options(&self) -> TextPageOptions {
        let mut opts = TextPageOptions::empty();

        if self.preserve_whitespace {
            opts |= TextPageOptions::PRESERVE_WHITESPACE;
        }
        if self.inhibit_spaces {
            opts |= TextPageOptions::INHIBIT_SPACES;
        }

        opts
    }
}

/// Glyph box taken from a MuPDF character quad
#[derive(Debug, Clone, Copy)]
struct Glyph {
    c: char,
    x: f32,
    y: f32,
    right: f32,
    bottom: f32,
    size: f32,
}

/// Accumulates glyphs into one run
struct RunBuilder {
    text: String,
    x: f32,
    top: f32,
    right: f32,
    bottom: f32,
    font_size: f32,
    glyph_x: Vec<f32>,
}

impl RunBuilder {
    fn start(glyph: Glyph) -> Self {
        let mut text = String::new();
        text.push(glyph.c);
        Self {
            text,
            x: glyph.x,
            top: glyph.y,
            right: glyph.right,
            bottom: glyph.bottom,
            font_size: glyph.size,
            glyph_x: vec![glyph.x],
        }
    }

    /// Same font size and no gap wider than one em
    fn accepts(&self, glyph: &Glyph) -> bool {
        (glyph.size - self.font_size).abs() < 0.5 && glyph.x - self.right <= self.font_size
    }

    fn push(&mut self, glyph: Glyph) {
        self.text.push(glyph.c);
        self.glyph_x.push(glyph.x);
        self.top = self.top.min(glyph.y);
        self.right = self.right.max(glyph.right);
        self.bottom = self.bottom.max(glyph.bottom);
    }

    fn finish(self) -> Option<TextRun> {
        if self.text.trim().is_empty() {
            return None;
        }
        Some(TextRun {
            text: self.text,
            x: self.x,
            y: self.top,
            width: (self.right - self.x).max(0.0),
            height: (self.bottom - self.top).max(0.0),
            font_size: self.font_size,
            glyph_x: self.glyph_x,
        })
    }
}

/// Group a sequence of glyphs from one MuPDF line into runs
fn glyphs_to_runs(glyphs: impl IntoIterator<Item = Glyph>) -> Vec<TextRun> {
    let mut runs = Vec::new();
    let mut current: Option<RunBuilder> = None;

    for glyph in glyphs {
        current = match current.take() {
            Some(mut builder) if builder.accepts(&glyph) => {
                builder.push(glyph);
                Some(builder)
            }
            Some(builder) => {
                runs.extend(builder.finish());
                Some(RunBuilder::start(glyph))
            }
            None => Some(RunBuilder::start(glyph)),
        };
    }

    if let Some(builder) = current {
        runs.extend(builder.finish());
    }

    runs
}

/// Extract positioned text runs from a page
pub fn extract_text_runs(page: &Page, page_index: usize, options: &StextOptions) -> FillResult<PageText> {
    let text_page = page.to_text_page(options.to_mupdf_options())?;
    let bounds = page.bounds()?;

    let mut runs = Vec::new();

    for block in text_page.blocks() {
        for line in block.lines() {
            let glyphs = line.chars().filter_map(|ch| {
                let c = ch.char()?;
                let quad = ch.quad();
                let x = quad.ul.x.min(quad.ll.x);
                let y = quad.ul.y.min(quad.ur.y);
                Some(Glyph {
                    c,
                    x,
                    y,
                    right: quad.ur.x.max(quad.lr.x),
                    bottom: quad.ll.y.max(quad.lr.y),
                    size: ch.size(),
                })
            });
            runs.extend(glyphs_to_runs(glyphs));
        }
    }

    Ok(PageText {
        page: page_index,
        width: bounds.x1 - bounds.x0,
        height: bounds.y1 - bounds.y0,
        runs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(c: char, x: f32, advance: f32) -> Glyph {
        Glyph {
            c,
            x,
            y: 100.0,
            right: x + advance,
            bottom: 112.0,
            size: 12.0,
        }
    }

    #[test]
    fn test_stext_options_default() {
        let opts = StextOptions::default();
        assert!(opts.to_mupdf_options().is_empty());
    }

    #[test]
    fn test_stext_options_preserve_whitespace() {
        let opts = StextOptions {
            preserve_whitespace: true,
            ..Default::default()
        };
        assert!(opts
            .to_mupdf_options()
            .contains(TextPageOptions::PRESERVE_WHITESPACE));
    }

    #[test]
    fn test_adjacent_glyphs_form_one_run() {
        let runs = glyphs_to_runs(vec![glyph('a', 10.0, 6.0), glyph('b', 16.0, 6.0)]);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "ab");
        assert_eq!(runs[0].glyph_x, vec![10.0, 16.0]);
        assert_eq!(runs[0].width, 12.0);
    }

    #[test]
    fn test_wide_gap_splits_runs() {
        let runs = glyphs_to_runs(vec![
            glyph('a', 10.0, 6.0),
            glyph('b', 100.0, 6.0),
        ]);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].x, 100.0);
    }

    #[test]
    fn test_font_size_change_splits_runs() {
        let mut big = glyph('B', 16.0, 8.0);
        big.size = 18.0;
        let runs = glyphs_to_runs(vec![glyph('a', 10.0, 6.0), big]);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].font_size, 18.0);
    }

    #[test]
    fn test_whitespace_only_runs_dropped() {
        let runs = glyphs_to_runs(vec![glyph(' ', 10.0, 3.0)]);
        assert!(runs.is_empty());
    }
}
