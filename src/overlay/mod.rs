//! Interactive overlay
//!
//! Page bitmaps with editable controls laid on top, positioned from the
//! extracted field and choice geometry.

mod layout;
mod renderer;

pub use layout::{effective_zoom, layout_page, ChoiceMarker, PageOverlay, TextControl};
pub use renderer::{OverlayRenderer, PageFrame, RetryPolicy, Surface};
