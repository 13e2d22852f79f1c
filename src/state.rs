//! Application state management

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::document::FillError;
use crate::overlay::{OverlayRenderer, RetryPolicy};
use crate::profile::{FillProfile, ProfileError};
use crate::session::{FillEngine, SessionManager};
use crate::template::{HttpTransport, TemplateLoader, TemplateTransport};

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to load fill profile: {0}")]
    Profile(#[from] ProfileError),

    #[error("Failed to initialize fill engine: {0}")]
    Engine(#[from] FillError),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    engine: FillEngine,
}

impl AppState {
    pub fn new(config: Config, engine: FillEngine) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, engine }),
        }
    }

    /// Build the engine stack described by `config`, fetching over HTTP
    pub fn from_config(config: Config) -> Result<Self, StateError> {
        let transport = HttpTransport::new(
            config.template.relay_url.clone(),
            Duration::from_secs(config.template.fetch_timeout_secs),
        )?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build the engine stack on top of a given transport
    pub fn with_transport(
        config: Config,
        transport: Arc<dyn TemplateTransport>,
    ) -> Result<Self, StateError> {
        let profile = match &config.profile_path {
            Some(path) => {
                let profile = FillProfile::from_path(path)?;
                tracing::info!(profile = %profile.name, path = %path, "Loaded fill profile");
                profile
            }
            None => FillProfile::default(),
        };

        let loader = TemplateLoader::new(transport).with_max_bytes(config.template.max_bytes);
        let sessions = SessionManager::with_limits(
            config.sessions.max_sessions,
            config.sessions.expiry_hours,
        );
        let renderer = OverlayRenderer::new(
            config.render.cache_entries,
            RetryPolicy {
                attempts: config.render.retry_attempts,
                delay: Duration::from_millis(config.render.retry_delay_ms),
            },
        );
        let engine = FillEngine::new(sessions, loader, Arc::new(profile), renderer)?;

        Ok(Self::new(config, engine))
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the fill engine
    pub fn engine(&self) -> &FillEngine {
        &self.inner.engine
    }
}
