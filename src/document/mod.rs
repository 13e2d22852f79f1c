//! Document abstraction
//!
//! Engine-agnostic types and traits for reading a template's text layer
//! and rasterizing its pages.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              extract / overlay / synth                  │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                 ┌──────────┴──────────┐
//!                 ▼                     ▼
//!         ┌──────────────┐      ┌────────────────┐
//!         │  TextLayer   │      │ PageRasterizer │
//!         └──────────────┘      └────────────────┘
//!                 │                     │
//!                 └──────────┬──────────┘
//!                            ▼
//!   ┌─────────────────────────────────────────────────────┐
//!   │          PdfTemplate (MuPDF, SafeDocument)          │
//!   └─────────────────────────────────────────────────────┘
//! ```

mod error;
mod traits;
mod types;

pub use error::{FillError, FillResult};
pub use traits::{PageRasterizer, RenderCacheKey, TextLayer};
pub use types::{
    DocumentFormat, ImageFormat, PageSize, PageText, Rect, RenderRequest, RenderResult, TextRun,
};
