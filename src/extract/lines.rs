//! Visual line grouping
//!
//! Runs whose tops differ by less than the line tolerance form one line.
//! A line keeps, for every byte of its concatenated text, which run the
//! byte came from, so a regex match on the line maps back to positions.

use std::cmp::Ordering;

use crate::document::{PageText, Rect, TextRun};

/// Runs of one visual line, left to right
#[derive(Debug, Clone)]
pub struct TextLine<'a> {
    pub page: usize,
    /// Top of the first run that opened the line
    pub y: f32,
    /// Run text concatenated without separators
    pub text: String,
    runs: Vec<&'a TextRun>,
    /// Byte offset in `text` where each run starts
    starts: Vec<usize>,
}

impl<'a> TextLine<'a> {
    fn new(page: usize, y: f32, mut runs: Vec<&'a TextRun>) -> Self {
        runs.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));

        let mut text = String::new();
        let mut starts = Vec::with_capacity(runs.len());
        for run in &runs {
            starts.push(text.len());
            text.push_str(&run.text);
        }

        Self {
            page,
            y,
            text,
            runs,
            starts,
        }
    }

    pub fn runs(&self) -> &[&'a TextRun] {
        &self.runs
    }

    /// Run holding the byte at `offset`, with the char index inside it
    fn locate(&self, offset: usize) -> Option<(&'a TextRun, usize)> {
        let idx = self.starts.partition_point(|&s| s <= offset).checked_sub(1)?;
        let run = self.runs[idx];
        let start = self.starts[idx];
        let within = offset - start;
        let char_index = run.text.get(..within)?.chars().count();
        Some((run, char_index))
    }

    /// X of the character starting at byte `offset`
    pub fn x_at(&self, offset: usize) -> f32 {
        match self.locate(offset) {
            Some((run, index)) => run.x_at(index),
            None => self.runs.last().map(|r| r.right()).unwrap_or(0.0),
        }
    }

    /// Run containing the byte at `offset`
    pub fn run_at(&self, offset: usize) -> Option<&'a TextRun> {
        self.locate(offset).map(|(run, _)| run)
    }

    /// Glyph box covering bytes `start..end`, which may span runs
    pub fn span(&self, start: usize, end: usize) -> Rect {
        let left = self.x_at(start);
        let right = match end.checked_sub(1).and_then(|last| {
            // Right edge of the last character of the span
            let (run, index) = self.locate(last)?;
            Some(run.x_at(index + 1))
        }) {
            Some(right) => right,
            None => left,
        };

        let touched: Vec<&TextRun> = self
            .runs
            .iter()
            .zip(&self.starts)
            .filter(|(run, &s)| s < end && s + run.text.len() > start)
            .map(|(run, _)| *run)
            .collect();
        let top = touched
            .iter()
            .map(|r| r.y)
            .fold(f32::INFINITY, f32::min);
        let bottom = touched
            .iter()
            .map(|r| r.y + r.height)
            .fold(f32::NEG_INFINITY, f32::max);

        if touched.is_empty() {
            return Rect::new(left, self.y, (right - left).max(0.0), 0.0);
        }
        Rect::new(left, top, (right - left).max(0.0), bottom - top)
    }
}

/// Group a page's runs into visual lines, top to bottom
pub fn group_lines(page: &PageText, tolerance: f32) -> Vec<TextLine<'_>> {
    let mut runs: Vec<&TextRun> = page.runs.iter().filter(|r| !r.text.is_empty()).collect();
    runs.sort_by(|a, b| {
        a.y.partial_cmp(&b.y)
            .unwrap_or(Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
    });

    let mut lines = Vec::new();
    let mut current: Vec<&TextRun> = Vec::new();
    let mut line_y = 0.0;

    for run in runs {
        if !current.is_empty() && (run.y - line_y).abs() >= tolerance {
            lines.push(TextLine::new(page.page, line_y, std::mem::take(&mut current)));
        }
        if current.is_empty() {
            line_y = run.y;
        }
        current.push(run);
    }
    if !current.is_empty() {
        lines.push(TextLine::new(page.page, line_y, current));
    }

    lines
}
