//! Low-level MuPDF Wrapper
//!
//! This module provides a safe, thread-aware wrapper around the MuPDF library.
//!
//! # Thread Safety
//!
//! MuPDF's `fz_context` is **NOT thread-safe**. [`SafeDocument`] opens a
//! fresh document per operation and serializes operations behind a mutex.
//!
//! # Usage
//!
//! ```rust,ignore
//! let doc = SafeDocument::open(template_bytes, "session-123".into())?;
//!
//! let page_text = doc.with_doc(|d| {
//!     let page = d.load_page(0)?;
//!     stext::extract_text_runs(&page, 0, &StextOptions::default())
//! })?;
//! ```

mod safe;
mod stext;

pub use safe::SafeDocument;
pub use stext::{extract_text_runs, StextOptions};
