//! Extraction results
//!
//! Fields and choice groups as the extractors produce them and the
//! session later mutates them.

use serde::{Deserialize, Serialize};

use crate::document::Rect;
use crate::record::SourceBinding;

/// Fill strategy, decided once per template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    Placeholder,
    Acroform,
}

impl FillMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Placeholder => "placeholder",
            Self::Acroform => "acroform",
        }
    }
}

/// Where a field was found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldOrigin {
    /// Bracket token in the text layer, `text` without braces
    Token { text: String },
    /// Interactive form field, fully qualified name
    Interactive { name: String },
}

/// One fillable location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub id: String,
    /// Page index (0-based)
    pub page: usize,
    pub origin: FieldOrigin,
    pub anchor_x: f32,
    pub anchor_y: f32,
    /// Y of the visual line the field sits on
    pub line_y: f32,
    pub width: f32,
    pub height: f32,
    pub font_size_hint: f32,
    /// Area the template itself occupies (token glyphs or widget rect)
    pub extent: Rect,
    pub source_binding: Option<SourceBinding>,
    pub current_value: String,
}

impl FieldDescriptor {
    pub fn token(&self) -> Option<&str> {
        match &self.origin {
            FieldOrigin::Token { text } => Some(text),
            FieldOrigin::Interactive { .. } => None,
        }
    }

    pub fn interactive_name(&self) -> Option<&str> {
        match &self.origin {
            FieldOrigin::Interactive { name } => Some(name),
            FieldOrigin::Token { .. } => None,
        }
    }

    pub fn has_value(&self) -> bool {
        !self.current_value.trim().is_empty()
    }
}

/// One selectable option of a choice group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceOption {
    pub id: String,
    pub group_key: String,
    pub option_token: String,
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    /// Glyph area of the token, possibly spanning several runs
    pub extent: Rect,
    pub selected: bool,
}

/// Mutually exclusive options sharing a group key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceGroup {
    pub key: String,
    pub options: Vec<ChoiceOption>,
}

impl ChoiceGroup {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            options: Vec::new(),
        }
    }

    /// Select `option_token`, clearing every sibling
    ///
    /// Returns false and leaves the group untouched when no option matches.
    pub fn select(&mut self, option_token: &str) -> bool {
        if !self.options.iter().any(|o| o.option_token == option_token) {
            return false;
        }
        for option in &mut self.options {
            option.selected = option.option_token == option_token;
        }
        true
    }

    pub fn clear(&mut self) {
        for option in &mut self.options {
            option.selected = false;
        }
    }

    pub fn selected(&self) -> Option<&ChoiceOption> {
        self.options.iter().find(|o| o.selected)
    }
}
