//! Field and choice extraction
//!
//! Everything here works on [`PageText`](crate::document::PageText) values,
//! not on the PDF engine, so each stage is a plain function over data:
//!
//! - [`ModeClassifier`]: placeholder vs. AcroForm decision
//! - [`PlaceholderExtractor`]: token fields, positioned then sized
//! - [`ChoiceExtractor`]: choice groups from three detection passes

mod choices;
mod classify;
mod lines;
mod placeholder;
mod types;

pub use choices::{scan_fragments, scan_lines, scan_runs, ChoiceExtractor, ChoiceHit, DetectionPass};
pub use classify::ModeClassifier;
pub use lines::{group_lines, TextLine};
pub use placeholder::{assign_widths, scan_tokens, PendingField, PlaceholderExtractor, SizedField};
pub use types::{ChoiceGroup, ChoiceOption, FieldDescriptor, FieldOrigin, FillMode};
