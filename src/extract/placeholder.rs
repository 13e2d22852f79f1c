//! Placeholder token extraction
//!
//! Two sequential stages over an intermediate list:
//!
//! 1. [`scan_tokens`] walks every line of every page and records a
//!    [`PendingField`] per bracket token, position only.
//! 2. [`assign_widths`] runs once the whole inventory is known and gives
//!    each field the room up to the next token on its line, or up to the
//!    page margin.

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::{PageText, Rect};
use crate::profile::ExtractionSettings;
use crate::record::SourceRecord;
use crate::resolver::FieldResolver;

use super::lines::group_lines;
use super::types::{FieldDescriptor, FieldOrigin};

/// `{name}` with the closing brace optional
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\s*([A-Za-z][A-Za-z0-9_]*)\s*\}?").expect("valid token regex")
});

/// Choice tokens are handled by the choice extractor
pub(crate) fn is_choice_token(name: &str) -> bool {
    name.len() >= 5 && name[..5].eq_ignore_ascii_case("radio")
}

/// A token with its position but no width yet
#[derive(Debug, Clone, PartialEq)]
pub struct PendingField {
    pub page: usize,
    pub token: String,
    pub anchor_x: f32,
    pub anchor_y: f32,
    pub line_y: f32,
    pub font_size: f32,
    pub extent: Rect,
}

/// A pending field after the width pass
#[derive(Debug, Clone, PartialEq)]
pub struct SizedField {
    pub pending: PendingField,
    pub width: f32,
}

/// First stage: every non-choice token on every page
pub fn scan_tokens(pages: &[PageText], settings: &ExtractionSettings) -> Vec<PendingField> {
    let mut pending = Vec::new();

    for page in pages {
        let before = pending.len();
        for line in group_lines(page, settings.line_tolerance) {
            for caps in TOKEN_RE.captures_iter(&line.text) {
                let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                if is_choice_token(name.as_str()) {
                    continue;
                }

                let Some(run) = line.run_at(whole.start()) else {
                    continue;
                };
                pending.push(PendingField {
                    page: page.page,
                    token: name.as_str().to_string(),
                    anchor_x: line.x_at(whole.start()),
                    anchor_y: run.y,
                    line_y: line.y,
                    font_size: run.font_size,
                    extent: line.span(whole.start(), whole.end()),
                });
            }
        }
        tracing::debug!(
            page = page.page,
            tokens = pending.len() - before,
            "Scanned page for placeholder tokens"
        );
    }

    pending
}

/// Second stage: widths from the complete inventory
///
/// `page_width` gives the width of a page by index.
pub fn assign_widths<F>(
    pending: Vec<PendingField>,
    page_width: F,
    settings: &ExtractionSettings,
) -> Vec<SizedField>
where
    F: Fn(usize) -> f32,
{
    let floor = settings.min_field_width;

    pending
        .iter()
        .map(|field| {
            let next_x = pending
                .iter()
                .filter(|other| {
                    other.page == field.page
                        && (other.line_y - field.line_y).abs() < settings.line_tolerance
                        && other.anchor_x > field.anchor_x
                })
                .map(|other| other.anchor_x)
                .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

            let width = match next_x {
                // Never reach into the next field, even when the floor
                // asks for more room than there is
                Some(next_x) => {
                    let gap = next_x - field.anchor_x;
                    (gap - settings.field_padding).max(floor).min(gap)
                }
                None => (page_width(field.page) - field.anchor_x - settings.page_margin).max(floor),
            };

            SizedField {
                pending: field.clone(),
                width,
            }
        })
        .collect()
}

/// Token fields of a placeholder template
#[derive(Debug, Clone)]
pub struct PlaceholderExtractor {
    resolver: FieldResolver,
}

impl PlaceholderExtractor {
    pub fn new(resolver: FieldResolver) -> Self {
        Self { resolver }
    }

    /// Detect, size, bind and pre-fill every token field
    pub fn extract(&self, pages: &[PageText], record: &SourceRecord) -> Vec<FieldDescriptor> {
        let settings = &self.resolver.profile().extraction;
        let pending = scan_tokens(pages, settings);

        let page_width = |index: usize| {
            pages
                .iter()
                .find(|p| p.page == index)
                .map(|p| p.width)
                .unwrap_or(0.0)
        };
        let mut sized = assign_widths(pending, page_width, settings);
        sized.sort_by(|a, b| {
            let (a, b) = (&a.pending, &b.pending);
            a.page
                .cmp(&b.page)
                .then(a.line_y.partial_cmp(&b.line_y).unwrap_or(Ordering::Equal))
                .then(a.anchor_x.partial_cmp(&b.anchor_x).unwrap_or(Ordering::Equal))
        });

        sized
            .into_iter()
            .enumerate()
            .map(|(index, SizedField { pending, width })| {
                let binding = self.resolver.resolve_token(&pending.token);
                let current_value = self.resolver.value_for(binding.as_ref(), record);
                FieldDescriptor {
                    id: format!("field_{}", index),
                    page: pending.page,
                    origin: FieldOrigin::Token {
                        text: pending.token,
                    },
                    anchor_x: pending.anchor_x,
                    anchor_y: pending.anchor_y,
                    line_y: pending.line_y,
                    width,
                    height: pending.font_size * 1.2,
                    font_size_hint: pending.font_size,
                    extent: pending.extent,
                    source_binding: binding,
                    current_value,
                }
            })
            .collect()
    }
}
