//! Thread-safe document wrapper for MuPDF
//!
//! Provides a safe abstraction over MuPDF documents that ensures
//! thread-safe access through serialization.
//!
//! # Design
//!
//! MuPDF documents are not thread-safe. This wrapper:
//!
//! 1. Stores the template bytes (shared, immutable)
//! 2. Opens a fresh document from a fresh duplicate for each operation
//! 3. Uses `parking_lot::Mutex` to serialize access

use mupdf::Document;
use parking_lot::Mutex;

use crate::document::{DocumentFormat, FillError, FillResult, PageSize};
use crate::template::TemplateBytes;

/// Thread-safe document wrapper
///
/// Serializes all access to MuPDF documents to ensure thread safety.
/// The document is opened fresh for each operation to avoid stale state.
pub struct SafeDocument {
    /// Template bytes, duplicated on every open
    bytes: TemplateBytes,
    /// Document identifier
    id: String,
    /// Page dimensions, captured at open
    page_sizes: Vec<PageSize>,
    /// Mutex for serializing access
    _lock: Mutex<()>,
}

// SAFETY: SafeDocument is Send + Sync because:
//
// 1. TemplateBytes is an Arc<[u8]> with no interior mutability.
// 2. String and Vec<PageSize> are owned plain data.
// 3. No mupdf::Document is stored. Every operation opens one inside
//    with_doc, under _lock, and drops it before returning, so no MuPDF
//    handle is ever shared between threads.
unsafe impl Send for SafeDocument {}
unsafe impl Sync for SafeDocument {}

impl SafeDocument {
    /// Open a template and capture its page geometry
    pub fn open(bytes: TemplateBytes, id: String) -> FillResult<Self> {
        if DocumentFormat::from_magic_bytes(bytes.header()) != Some(DocumentFormat::Pdf) {
            return Err(FillError::UnsupportedFormat("Missing %PDF header".into()));
        }

        let data = bytes.duplicate();
        let doc = Document::from_bytes(&data, DocumentFormat::Pdf.mime())?;
        let page_count = doc.page_count()?.max(0);

        let mut page_sizes = Vec::with_capacity(page_count as usize);
        for index in 0..page_count {
            let page = doc.load_page(index)?;
            let bounds = page.bounds()?;
            page_sizes.push(PageSize {
                width: bounds.x1 - bounds.x0,
                height: bounds.y1 - bounds.y0,
            });
        }

        Ok(Self {
            bytes,
            id,
            page_sizes,
            _lock: Mutex::new(()),
        })
    }

    /// Get the document ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of pages
    pub fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    /// Page dimensions
    pub fn page_size(&self, page: usize) -> FillResult<PageSize> {
        self.page_sizes
            .get(page)
            .copied()
            .ok_or(FillError::PageNotFound(page))
    }

    /// Execute a closure with access to the document
    ///
    /// This opens a fresh document from a fresh copy of the template,
    /// executes the closure, and drops both afterward. Access is
    /// serialized via mutex.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let bounds = safe_doc.with_doc(|doc| {
    ///     let page = doc.load_page(0)?;
    ///     Ok(page.bounds()?)
    /// })?;
    /// ```
    pub fn with_doc<F, R>(&self, f: F) -> FillResult<R>
    where
        F: FnOnce(&Document) -> FillResult<R>,
    {
        let _guard = self._lock.lock();

        let data = self.bytes.duplicate();
        let doc = Document::from_bytes(&data, DocumentFormat::Pdf.mime())?;

        f(&doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::PdfBuilder;

    #[test]
    fn test_open_captures_page_sizes() {
        let pdf = PdfBuilder::new()
            .page(612.0, 792.0)
            .page(595.0, 842.0)
            .build();

        let doc = SafeDocument::open(TemplateBytes::new(pdf), "doc-1".into()).unwrap();
        assert_eq!(doc.id(), "doc-1");
        assert_eq!(doc.page_count(), 2);

        let second = doc.page_size(1).unwrap();
        assert!((second.width - 595.0).abs() < 0.5);
        assert!((second.height - 842.0).abs() < 0.5);
        assert!(matches!(doc.page_size(2), Err(FillError::PageNotFound(2))));
    }

    #[test]
    fn test_open_rejects_non_pdf() {
        let result = SafeDocument::open(TemplateBytes::new(b"hello".to_vec()), "x".into());
        assert!(matches!(result, Err(FillError::UnsupportedFormat(_))));
    }
}
