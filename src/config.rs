//! Configuration management for the fill server

use std::env;
use std::str::FromStr;

use serde::Deserialize;

use crate::session::{MAX_SESSIONS, SESSION_EXPIRY_HOURS};
use crate::template::DEFAULT_MAX_TEMPLATE_BYTES;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub template: TemplateConfig,
    pub render: RenderConfig,
    pub sessions: SessionConfig,
    /// JSON fill profile; the built-in default when unset
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    /// Same-origin relay prefix; the template URL is appended encoded
    pub relay_url: Option<String>,
    pub fetch_timeout_secs: u64,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub cache_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub expiry_hours: i64,
    pub max_sessions: usize,
}

/// Malformed environment value
#[derive(Debug, thiserror::Error)]
#[error("Invalid value for {name}: {value:?}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            template: TemplateConfig {
                relay_url: None,
                fetch_timeout_secs: 30,
                max_bytes: DEFAULT_MAX_TEMPLATE_BYTES,
            },
            render: RenderConfig {
                retry_attempts: 10,
                retry_delay_ms: 100,
                cache_entries: 200,
            },
            sessions: SessionConfig {
                expiry_hours: SESSION_EXPIRY_HOURS,
                max_sessions: MAX_SESSIONS,
            },
            profile_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; unset names keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let text = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Config {
            server: ServerConfig {
                host: text("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse(&lookup, "SERVER_PORT", defaults.server.port)?,
            },
            template: TemplateConfig {
                relay_url: text("TEMPLATE_RELAY_URL").or(defaults.template.relay_url),
                fetch_timeout_secs: parse(
                    &lookup,
                    "TEMPLATE_FETCH_TIMEOUT_SECS",
                    defaults.template.fetch_timeout_secs,
                )?,
                max_bytes: parse(&lookup, "TEMPLATE_MAX_BYTES", defaults.template.max_bytes)?,
            },
            render: RenderConfig {
                retry_attempts: parse(
                    &lookup,
                    "RENDER_RETRY_ATTEMPTS",
                    defaults.render.retry_attempts,
                )?,
                retry_delay_ms: parse(
                    &lookup,
                    "RENDER_RETRY_DELAY_MS",
                    defaults.render.retry_delay_ms,
                )?,
                cache_entries: parse(
                    &lookup,
                    "RENDER_CACHE_ENTRIES",
                    defaults.render.cache_entries,
                )?,
            },
            sessions: SessionConfig {
                expiry_hours: parse(
                    &lookup,
                    "SESSION_EXPIRY_HOURS",
                    defaults.sessions.expiry_hours,
                )?,
                max_sessions: parse(&lookup, "MAX_SESSIONS", defaults.sessions.max_sessions)?,
            },
            profile_path: text("FILL_PROFILE_PATH").or(defaults.profile_path),
        })
    }
}

fn parse<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|_| ConfigError { name, value })
        }
        _ => Ok(default),
    }
}
