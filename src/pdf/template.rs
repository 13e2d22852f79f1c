//! PDF TextLayer implementation
//!
//! Implements the `TextLayer` trait for PDF templates.
//! Uses MuPDF via `SafeDocument` for thread-safe access.

use std::sync::Arc;

use async_trait::async_trait;

use crate::document::{FillError, FillResult, PageSize, PageText, TextLayer};
use crate::mupdf::{extract_text_runs, SafeDocument, StextOptions};
use crate::template::TemplateBytes;

/// An opened PDF template
///
/// Implements both [`TextLayer`] and
/// [`PageRasterizer`](crate::document::PageRasterizer), so a single handle
/// serves extraction and the overlay preview.
#[derive(Clone)]
pub struct PdfTemplate {
    /// Thread-safe MuPDF document wrapper
    pub(super) doc: Arc<SafeDocument>,
    options: StextOptions,
}

impl PdfTemplate {
    /// Open a template, off the async runtime
    pub async fn open(bytes: TemplateBytes, id: String) -> FillResult<Self> {
        tokio::task::spawn_blocking(move || Self::open_blocking(bytes, id))
            .await
            .map_err(|e| FillError::Parse(format!("Task join error: {}", e)))?
    }

    /// Open a template on the current thread
    pub fn open_blocking(bytes: TemplateBytes, id: String) -> FillResult<Self> {
        let doc = SafeDocument::open(bytes, id)?;
        Ok(Self {
            doc: Arc::new(doc),
            options: StextOptions::default(),
        })
    }

    /// Get the underlying SafeDocument
    pub fn document(&self) -> &Arc<SafeDocument> {
        &self.doc
    }

    pub(super) fn validate_page(&self, page: usize) -> FillResult<()> {
        if page >= self.doc.page_count() {
            return Err(FillError::PageNotFound(page));
        }
        Ok(())
    }
}

#[async_trait]
impl TextLayer for PdfTemplate {
    fn page_count(&self) -> usize {
        self.doc.page_count()
    }

    fn page_size(&self, page: usize) -> FillResult<PageSize> {
        self.doc.page_size(page)
    }

    async fn page_text(&self, page: usize) -> FillResult<PageText> {
        self.validate_page(page)?;
        let doc = self.doc.clone();
        let options = self.options.clone();

        tokio::task::spawn_blocking(move || {
            doc.with_doc(|mupdf_doc| {
                let mupdf_page = mupdf_doc.load_page(page as i32)?;
                extract_text_runs(&mupdf_page, page, &options)
            })
        })
        .await
        .map_err(|e| FillError::Extract(format!("Task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::PdfBuilder;

    #[tokio::test]
    async fn test_page_text_positions() {
        let pdf = PdfBuilder::new()
            .page(612.0, 792.0)
            .text(100.0, 100.0, 12.0, "{firstName}")
            .text(300.0, 100.0, 12.0, "{lastName}")
            .build();

        let template = PdfTemplate::open(TemplateBytes::new(pdf), "t".into())
            .await
            .unwrap();
        assert_eq!(template.page_count(), 1);

        let text = template.page_text(0).await.unwrap();
        let first = text
            .runs
            .iter()
            .find(|r| r.text.contains("{firstName}"))
            .expect("first token run");
        assert!((first.x - 100.0).abs() < 2.0);
        assert!((first.y - 100.0).abs() < 4.0);
        assert!(text.plain_text().contains("{lastName}"));
    }

    #[tokio::test]
    async fn test_page_out_of_range() {
        let pdf = PdfBuilder::new().page(612.0, 792.0).build();
        let template = PdfTemplate::open(TemplateBytes::new(pdf), "t".into())
            .await
            .unwrap();

        assert!(matches!(
            template.page_text(3).await,
            Err(FillError::PageNotFound(3))
        ));
    }
}
