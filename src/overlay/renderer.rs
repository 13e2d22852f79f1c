//! Overlay renderer
//!
//! Produces [`PageFrame`]s: a rendered page bitmap plus the controls laid
//! over it. Rasters are cached with LRU eviction, keyed by session, page
//! and zoom.
//!
//! A frame can be requested before the session's drawing surface (the
//! opened template) exists. [`OverlayRenderer::acquire`] polls for it a
//! bounded number of times before giving up.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::{sleep, timeout, Duration};

use crate::document::{
    FillError, FillResult, ImageFormat, PageRasterizer, RenderCacheKey, RenderRequest,
    RenderResult,
};

use super::layout::{effective_zoom, PageOverlay};

/// Timeout for a single page render
const RENDER_TIMEOUT_SECS: u64 = 30;

/// State of a drawing surface when polled
pub enum Surface<T> {
    /// Ready to draw on
    Ready(T),
    /// Not there yet, worth asking again
    Pending,
    /// Will never become available
    Failed(String),
}

/// Bounded polling policy for [`Surface::Pending`]
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(100),
        }
    }
}

/// Rendered page plus overlay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFrame {
    pub page: usize,
    pub zoom: f32,
    pub mime_type: String,
    /// Base64-encoded bitmap
    pub image: String,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub overlay: PageOverlay,
}

/// Renders frames with a shared raster cache
#[derive(Clone)]
pub struct OverlayRenderer {
    cache: Arc<RwLock<LruCache<RenderCacheKey, Arc<RenderResult>>>>,
    retry: RetryPolicy,
}

impl OverlayRenderer {
    pub fn new(cache_entries: usize, retry: RetryPolicy) -> Self {
        let size = NonZeroUsize::new(cache_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(RwLock::new(LruCache::new(size))),
            retry,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Call `check` until the surface is ready
    pub async fn acquire<T, F, Fut>(&self, mut check: F) -> FillResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Surface<T>>,
    {
        let attempts = self.retry.attempts.max(1);
        for attempt in 1..=attempts {
            match check().await {
                Surface::Ready(surface) => return Ok(surface),
                Surface::Failed(reason) => return Err(FillError::Load(reason)),
                Surface::Pending => {
                    tracing::debug!(attempt, attempts, "Drawing surface not ready");
                    if attempt < attempts {
                        sleep(self.retry.delay).await;
                    }
                }
            }
        }
        Err(FillError::SurfaceUnavailable { attempts })
    }

    /// Render one page, through the cache
    pub async fn render<R>(
        &self,
        session_id: &str,
        rasterizer: &R,
        page: usize,
        zoom: f32,
    ) -> FillResult<Arc<RenderResult>>
    where
        R: PageRasterizer + ?Sized,
    {
        let zoom = effective_zoom(zoom);
        let key = RenderCacheKey::new(session_id, page, zoom);

        {
            let mut cache = self.cache.write().await;
            if let Some(hit) = cache.get(&key) {
                return Ok(hit.clone());
            }
        }

        let request = RenderRequest {
            page,
            zoom,
            format: ImageFormat::Png,
        };
        let result = timeout(
            Duration::from_secs(RENDER_TIMEOUT_SECS),
            rasterizer.render_page(&request),
        )
        .await
        .map_err(|_| FillError::Timeout(RENDER_TIMEOUT_SECS))??;

        let result = Arc::new(result);
        {
            let mut cache = self.cache.write().await;
            cache.put(key, result.clone());
        }
        Ok(result)
    }

    /// Render and combine with an overlay laid out at the same zoom
    pub async fn frame<R>(
        &self,
        session_id: &str,
        rasterizer: &R,
        overlay: PageOverlay,
    ) -> FillResult<PageFrame>
    where
        R: PageRasterizer + ?Sized,
    {
        let raster = self
            .render(session_id, rasterizer, overlay.page, overlay.zoom)
            .await?;
        Ok(PageFrame {
            page: overlay.page,
            zoom: overlay.zoom,
            mime_type: raster.format.mime_type().to_string(),
            image: BASE64.encode(&raster.data),
            pixel_width: raster.width,
            pixel_height: raster.height,
            overlay,
        })
    }

    /// Drop every cached raster of a session
    pub async fn invalidate(&self, session_id: &str) {
        let mut cache = self.cache.write().await;
        let stale: Vec<RenderCacheKey> = cache
            .iter()
            .filter(|(key, _)| key.session_id == session_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }

    /// Number of cached rasters
    pub async fn cached(&self) -> usize {
        self.cache.read().await.len()
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(200, RetryPolicy::default())
    }
}
