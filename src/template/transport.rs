//! Template transports
//!
//! Defines the transport trait and the implementations used to fetch
//! template bytes.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::document::{FillError, FillResult};

/// Raw transport response
#[derive(Debug, Clone)]
pub struct FetchedTemplate {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Binary transport for template documents
#[async_trait]
pub trait TemplateTransport: Send + Sync {
    /// Fetch the resource at `url`
    async fn fetch(&self, url: &str) -> FillResult<FetchedTemplate>;
}

/// HTTP transport, optionally fronted by a same-origin relay
///
/// When a relay is configured the target URL is appended to the relay
/// prefix, URL-encoded, e.g. `https://app.local/proxy?url=` +
/// `https%3A%2F%2Fcdn.example%2Fform.pdf`.
pub struct HttpTransport {
    client: reqwest::Client,
    relay_url: Option<String>,
}

impl HttpTransport {
    pub fn new(relay_url: Option<String>, timeout: Duration) -> FillResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FillError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, relay_url })
    }

    /// URL actually requested for `url`
    pub fn request_url(&self, url: &str) -> String {
        match &self.relay_url {
            Some(relay) => format!("{}{}", relay, urlencoding::encode(url)),
            None => url.to_string(),
        }
    }
}

#[async_trait]
impl TemplateTransport for HttpTransport {
    async fn fetch(&self, url: &str) -> FillResult<FetchedTemplate> {
        let target = self.request_url(url);

        let response = self
            .client
            .get(&target)
            .send()
            .await
            .map_err(|e| FillError::Transport(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(FillError::Transport(format!(
                "Template host returned {} for {}",
                response.status(),
                url
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FillError::Transport(format!("Failed to read body of {}: {}", url, e)))?;

        Ok(FetchedTemplate {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

/// In-memory transport keyed by URL
#[derive(Default)]
pub struct StaticTransport {
    templates: RwLock<HashMap<String, FetchedTemplate>>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a PDF under `url`
    pub fn insert(&self, url: impl Into<String>, bytes: Vec<u8>) {
        self.templates.write().insert(
            url.into(),
            FetchedTemplate {
                bytes,
                content_type: Some("application/pdf".to_string()),
            },
        );
    }

    /// Register a response with an explicit content type
    pub fn insert_with_type(&self, url: impl Into<String>, bytes: Vec<u8>, content_type: &str) {
        self.templates.write().insert(
            url.into(),
            FetchedTemplate {
                bytes,
                content_type: Some(content_type.to_string()),
            },
        );
    }
}

#[async_trait]
impl TemplateTransport for StaticTransport {
    async fn fetch(&self, url: &str) -> FillResult<FetchedTemplate> {
        self.templates
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| FillError::Transport(format!("No template at {}", url)))
    }
}
