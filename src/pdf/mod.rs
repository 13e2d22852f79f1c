//! PDF template implementation
//!
//! This module provides `TextLayer` and `PageRasterizer` implementations
//! for PDF templates using MuPDF.
//!
//! Both use [`SafeDocument`](crate::mupdf::SafeDocument) for thread-safe
//! access.

mod rasterizer;
mod template;

pub use rasterizer::{MAX_ZOOM, MIN_ZOOM};
pub use template::PdfTemplate;
