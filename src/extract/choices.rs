//! Choice token extraction
//!
//! Choice tokens (`{radio_<group>_<option>}`) are often fragmented by the
//! text extractor, so three independent passes feed one set keyed by
//! `(group, option)`:
//!
//! * line pass: the full token on a line's concatenated text
//! * run pass: a looser pattern inside each single run
//! * proximity pass: a run holding only the `{radio` prefix paired with
//!   the nearest run holding an `_id<number>` suffix
//!
//! The first pass to find a token decides its position.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::{PageText, Rect, TextRun};
use crate::profile::ExtractionSettings;
use crate::record::SourceRecord;
use crate::resolver::FieldResolver;

use super::lines::group_lines;
use super::types::{ChoiceGroup, ChoiceOption};

static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\{\s*radio_([a-z]+)_(\d+)\s*\}?").expect("valid line regex")
});

/// Numbered tokens only; `radio` needs a brace before it or an underscore
/// after it, so plain words such as "Radiology 5" never match
static RUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\{\s*radio\s*_?|\bradio\s*_)\s*id\s*_?\s*(\d+)\s*\}?")
        .expect("valid run regex")
});

static PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:\{\s*radio\s*_?|radio\s*_)\s*$").expect("valid prefix regex")
});

static SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*_?\s*id\s*_?\s*(\d+)\s*\}?").expect("valid suffix regex")
});

/// Which pass found a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionPass {
    Line,
    Run,
    Proximity,
}

/// A choice token before grouping
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceHit {
    pub page: usize,
    /// Literal group label from the token (`id` for numbered tokens)
    pub label: String,
    pub option: u32,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub extent: Rect,
    pub pass: DetectionPass,
}

/// Line pass
pub fn scan_lines(page: &PageText, settings: &ExtractionSettings) -> Vec<ChoiceHit> {
    let mut hits = Vec::new();
    for line in group_lines(page, settings.line_tolerance) {
        for caps in LINE_RE.captures_iter(&line.text) {
            let (Some(whole), Some(label), Some(number)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let (Ok(option), Some(run)) = (number.as_str().parse(), line.run_at(whole.start()))
            else {
                continue;
            };
            hits.push(ChoiceHit {
                page: page.page,
                label: label.as_str().to_ascii_lowercase(),
                option,
                x: line.x_at(whole.start()),
                y: run.y,
                font_size: run.font_size,
                extent: line.span(whole.start(), whole.end()),
                pass: DetectionPass::Line,
            });
        }
    }
    hits
}

/// Run pass
pub fn scan_runs(page: &PageText) -> Vec<ChoiceHit> {
    let mut hits = Vec::new();
    for run in &page.runs {
        for caps in RUN_RE.captures_iter(&run.text) {
            let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Ok(option) = number.as_str().parse() else {
                continue;
            };
            let (start, end) = char_range(&run.text, whole.start(), whole.end());
            let x = run.x_at(start);
            hits.push(ChoiceHit {
                page: page.page,
                label: "id".to_string(),
                option,
                x,
                y: run.y,
                font_size: run.font_size,
                extent: Rect::new(x, run.y, (run.x_at(end) - x).max(0.0), run.height),
                pass: DetectionPass::Run,
            });
        }
    }
    hits
}

/// Proximity pass
pub fn scan_fragments(page: &PageText, settings: &ExtractionSettings) -> Vec<ChoiceHit> {
    let prefixes: Vec<&TextRun> = page
        .runs
        .iter()
        .filter(|r| PREFIX_RE.is_match(&r.text))
        .collect();
    let suffixes: Vec<(&TextRun, u32)> = page
        .runs
        .iter()
        .filter_map(|r| {
            let caps = SUFFIX_RE.captures(&r.text)?;
            let option = caps.get(1)?.as_str().parse().ok()?;
            Some((r, option))
        })
        .collect();

    let mut used = HashSet::new();
    let mut hits = Vec::new();

    for prefix in prefixes {
        let nearest = suffixes
            .iter()
            .enumerate()
            .filter(|(i, _)| !used.contains(i))
            .filter_map(|(i, (suffix, option))| {
                let dx = suffix.x - prefix.right();
                let dy = suffix.y - prefix.y;
                let close = dx.abs() <= settings.pair_max_dx && dy.abs() <= settings.pair_max_dy;
                close.then_some((i, *suffix, *option, dx * dx + dy * dy))
            })
            .min_by(|a, b| a.3.partial_cmp(&b.3).unwrap_or(Ordering::Equal));

        let Some((index, suffix, option, _)) = nearest else {
            continue;
        };
        used.insert(index);

        let left = prefix.x.min(suffix.x);
        let top = prefix.y.min(suffix.y);
        let right = prefix.right().max(suffix.right());
        let bottom = (prefix.y + prefix.height).max(suffix.y + suffix.height);
        hits.push(ChoiceHit {
            page: page.page,
            label: "id".to_string(),
            option,
            x: prefix.x,
            y: prefix.y,
            font_size: prefix.font_size,
            extent: Rect::new(left, top, right - left, bottom - top),
            pass: DetectionPass::Proximity,
        });
    }

    hits
}

/// Byte range to char range within `text`
fn char_range(text: &str, start: usize, end: usize) -> (usize, usize) {
    let start_chars = text.get(..start).map(|s| s.chars().count()).unwrap_or(0);
    let span_chars = text.get(start..end).map(|s| s.chars().count()).unwrap_or(0);
    (start_chars, start_chars + span_chars)
}

/// Choice groups of a placeholder template
#[derive(Debug, Clone)]
pub struct ChoiceExtractor {
    resolver: FieldResolver,
}

impl ChoiceExtractor {
    pub fn new(resolver: FieldResolver) -> Self {
        Self { resolver }
    }

    /// Run all passes, dedupe, group and sort
    pub fn extract(&self, pages: &[PageText]) -> Vec<ChoiceGroup> {
        let settings = &self.resolver.profile().extraction;
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut groups: Vec<ChoiceGroup> = Vec::new();
        let mut index_of: HashMap<String, usize> = HashMap::new();

        for page in pages {
            let line_hits = scan_lines(page, settings);
            let run_hits = scan_runs(page);
            let fragment_hits = scan_fragments(page, settings);
            tracing::debug!(
                page = page.page,
                line = line_hits.len(),
                run = run_hits.len(),
                proximity = fragment_hits.len(),
                "Choice token passes"
            );

            for hit in line_hits.into_iter().chain(run_hits).chain(fragment_hits) {
                let group_key = self.resolver.group_for_option(&hit.label, hit.option);
                let option_token = hit.option.to_string();
                if !seen.insert((group_key.clone(), option_token.clone())) {
                    continue;
                }

                let slot = *index_of.entry(group_key.clone()).or_insert_with(|| {
                    groups.push(ChoiceGroup::new(group_key.clone()));
                    groups.len() - 1
                });
                groups[slot].options.push(ChoiceOption {
                    id: format!("{}:{}", group_key, option_token),
                    group_key,
                    option_token,
                    page: hit.page,
                    x: hit.x,
                    y: hit.y,
                    font_size: hit.font_size,
                    extent: hit.extent,
                    selected: false,
                });
            }
        }

        for group in &mut groups {
            group.options.sort_by(|a, b| position_order(a, b));
        }
        groups.sort_by(|a, b| match (a.options.first(), b.options.first()) {
            (Some(a), Some(b)) => position_order(a, b),
            _ => Ordering::Equal,
        });
        groups
    }

    /// Auto-select every configured group from the record
    pub fn autofill(&self, groups: &mut [ChoiceGroup], record: &SourceRecord) {
        for group in groups.iter_mut() {
            let Some(rule) = self.resolver.rule(&group.key) else {
                continue;
            };
            let Some(option) = self.resolver.autoselect_option(rule, record) else {
                continue;
            };
            if !group.select(&option) {
                tracing::warn!(
                    group = %group.key,
                    option = %option,
                    "Auto-fill option not present in template"
                );
            }
        }
    }
}

fn position_order(a: &ChoiceOption, b: &ChoiceOption) -> Ordering {
    a.page
        .cmp(&b.page)
        .then(a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
        .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
}
