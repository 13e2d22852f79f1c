//! Output synthesis
//!
//! Rebuilds a document from the current field and choice state. Each call
//! starts from a fresh duplicate of the template bytes, so a failed or
//! repeated synthesis never disturbs the session.

mod acroform;
mod content;
mod filename;
mod placeholder;
mod strip;

pub use acroform::{flatten_form, preview_acroform, synthesize_acroform, PreviewOutput};
pub use filename::{output_filename, output_filename_today, sanitize_filename};
pub use placeholder::synthesize_placeholder;

use crate::document::{FillError, FillResult};
use crate::extract::{ChoiceGroup, FieldDescriptor, FillMode};
use crate::template::TemplateBytes;

/// Produce the final, flattened output for a mode
pub fn synthesize(
    template: &TemplateBytes,
    mode: FillMode,
    fields: &[FieldDescriptor],
    groups: &[ChoiceGroup],
) -> FillResult<Vec<u8>> {
    let result = match mode {
        FillMode::Placeholder => synthesize_placeholder(template, fields, groups),
        FillMode::Acroform => synthesize_acroform(template, fields, true),
    };
    result.map_err(|e| match e {
        FillError::Synthesis(_) => e,
        other => FillError::Synthesis(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_template_is_synthesis_error() {
        let template = TemplateBytes::new(b"%PDF-1.7\nnot really a pdf".to_vec());
        let result = synthesize(&template, FillMode::Placeholder, &[], &[]);
        assert!(matches!(result, Err(FillError::Synthesis(_))));
    }
}
