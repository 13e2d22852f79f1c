//! Document traits
//!
//! Seams between the fill pipeline and the PDF engine that backs it.

use async_trait::async_trait;

use super::error::FillResult;
use super::types::{PageSize, PageText, RenderRequest, RenderResult};

/// Read access to a template's text layer
#[async_trait]
pub trait TextLayer: Send + Sync {
    /// Number of pages
    fn page_count(&self) -> usize;

    /// Page dimensions in content units
    fn page_size(&self, page: usize) -> FillResult<PageSize>;

    /// Text runs of one page with positions
    async fn page_text(&self, page: usize) -> FillResult<PageText>;

    /// Text runs of every page, in page order
    async fn all_pages(&self) -> FillResult<Vec<PageText>> {
        let mut pages = Vec::with_capacity(self.page_count());
        for page in 0..self.page_count() {
            pages.push(self.page_text(page).await?);
        }
        Ok(pages)
    }
}

/// Page rasterizer
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Render one page to an encoded bitmap
    async fn render_page(&self, request: &RenderRequest) -> FillResult<RenderResult>;
}

/// Cache key for rendered rasters
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct RenderCacheKey {
    pub session_id: String,
    pub page: usize,
    pub zoom: u32, // zoom * 100 to avoid float hashing
}

impl RenderCacheKey {
    pub fn new(session_id: &str, page: usize, zoom: f32) -> Self {
        Self {
            session_id: session_id.to_string(),
            page,
            zoom: (zoom * 100.0).round() as u32,
        }
    }
}
