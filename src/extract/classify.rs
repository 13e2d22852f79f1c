//! Fill-mode classification
//!
//! Token text wins over interactive fields: the interactive-field list is
//! only consulted when no page contains a known token.

use regex::Regex;

use crate::document::{FillError, FillResult, PageText};
use crate::resolver::FieldResolver;

use super::types::FillMode;

/// Decides [`FillMode`] for a template
#[derive(Debug, Clone)]
pub struct ModeClassifier {
    resolver: FieldResolver,
    pattern: Regex,
}

impl ModeClassifier {
    pub fn new(resolver: FieldResolver) -> FillResult<Self> {
        let pattern = known_token_pattern(resolver.known_tokens())?;
        Ok(Self { resolver, pattern })
    }

    /// Whether any page mentions a known token
    pub fn has_known_tokens(&self, pages: &[PageText]) -> bool {
        pages
            .iter()
            .any(|page| self.pattern.is_match(&page.plain_text()))
    }

    /// Classify a template
    ///
    /// `interactive_names` is only called when no token is found.
    pub fn classify<F>(&self, pages: &[PageText], interactive_names: F) -> FillResult<FillMode>
    where
        F: FnOnce() -> FillResult<Vec<String>>,
    {
        if self.has_known_tokens(pages) {
            tracing::info!(mode = "placeholder", "Known tokens found in text layer");
            return Ok(FillMode::Placeholder);
        }

        let names = interactive_names()?;
        if let Some(name) = names.iter().find(|n| self.resolver.is_known_field_name(n)) {
            tracing::info!(mode = "acroform", field = %name, "Bound interactive field found");
            return Ok(FillMode::Acroform);
        }

        tracing::info!(
            mode = "placeholder",
            interactive_fields = names.len(),
            "No tokens or bound fields, defaulting"
        );
        Ok(FillMode::Placeholder)
    }
}

/// `{name` for every known name plus the choice prefix, closing brace optional
fn known_token_pattern<'a>(names: impl Iterator<Item = &'a str>) -> FillResult<Regex> {
    let mut names: Vec<&str> = names.filter(|n| !n.is_empty()).collect();
    // Longest first so a name never shadows a longer one sharing its prefix
    names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

    let mut pattern = String::from(r"\{\s*(?:(?i:radio)");
    if !names.is_empty() {
        let alternatives: Vec<String> = names.iter().map(|n| regex::escape(n)).collect();
        pattern.push_str(&format!(r"|(?:{})(?:\s*\}}|\b)", alternatives.join("|")));
    }
    pattern.push(')');

    Regex::new(&pattern).map_err(|e| FillError::Extract(format!("token pattern: {}", e)))
}
