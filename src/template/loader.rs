//! Template loader
//!
//! Fetches template bytes through a transport and validates them before
//! any session state is built on top.

use std::sync::Arc;

use crate::document::{DocumentFormat, FillError, FillResult};

use super::bytes::TemplateBytes;
use super::transport::TemplateTransport;

/// Default upper bound on template size: 50MB
pub const DEFAULT_MAX_TEMPLATE_BYTES: usize = 50 * 1024 * 1024;

/// Fetches and validates templates
#[derive(Clone)]
pub struct TemplateLoader {
    transport: Arc<dyn TemplateTransport>,
    max_bytes: usize,
}

impl TemplateLoader {
    pub fn new(transport: Arc<dyn TemplateTransport>) -> Self {
        Self {
            transport,
            max_bytes: DEFAULT_MAX_TEMPLATE_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Fetch `url` and return its bytes if they are a PDF
    pub async fn load(&self, url: &str) -> FillResult<TemplateBytes> {
        let fetched = self
            .transport
            .fetch(url)
            .await
            .map_err(|e| FillError::Load(e.to_string()))?;

        if let Some(content_type) = fetched.content_type.as_deref() {
            if !accepts_content_type(content_type) {
                return Err(FillError::UnsupportedFormat(format!(
                    "Expected a PDF, got content type {}",
                    content_type
                )));
            }
        }

        if fetched.bytes.is_empty() {
            return Err(FillError::Load(format!("Template at {} is empty", url)));
        }

        if fetched.bytes.len() > self.max_bytes {
            return Err(FillError::Load(format!(
                "Template is {} bytes, limit is {}",
                fetched.bytes.len(),
                self.max_bytes
            )));
        }

        if DocumentFormat::from_magic_bytes(&fetched.bytes) != Some(DocumentFormat::Pdf) {
            return Err(FillError::UnsupportedFormat(
                "Missing %PDF header".to_string(),
            ));
        }

        tracing::debug!(url = %url, bytes = fetched.bytes.len(), "Template loaded");

        Ok(TemplateBytes::new(fetched.bytes))
    }
}

/// Relays and object stores often label PDFs as generic binary
fn accepts_content_type(content_type: &str) -> bool {
    if DocumentFormat::from_mime(content_type).is_some() {
        return true;
    }
    let essence = content_type.split(';').next().unwrap_or("").trim();
    matches!(essence, "application/octet-stream" | "binary/octet-stream" | "")
}
