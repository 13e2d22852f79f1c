//! Source records
//!
//! The key/value data a session fills from, supplied whole by the caller
//! and read-only to the engine.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three fixed namespaces of a source record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Subject,
    Counterpart,
    Meta,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Counterpart => "counterpart",
            Self::Meta => "meta",
        }
    }
}

impl FromStr for Namespace {
    type Err = BindingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subject" => Ok(Self::Subject),
            "counterpart" => Ok(Self::Counterpart),
            "meta" => Ok(Self::Meta),
            other => Err(BindingParseError(format!("unknown namespace '{}'", other))),
        }
    }
}

/// Where a field's value comes from: `namespace.key`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceBinding {
    pub namespace: Namespace,
    pub key: String,
}

impl SourceBinding {
    pub fn new(namespace: Namespace, key: impl Into<String>) -> Self {
        Self {
            namespace,
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid source binding: {0}")]
pub struct BindingParseError(String);

impl FromStr for SourceBinding {
    type Err = BindingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, key) = s
            .split_once('.')
            .ok_or_else(|| BindingParseError(format!("'{}' is not namespace.key", s)))?;
        if key.is_empty() {
            return Err(BindingParseError(format!("'{}' has an empty key", s)));
        }
        Ok(Self {
            namespace: namespace.parse()?,
            key: key.to_string(),
        })
    }
}

impl TryFrom<String> for SourceBinding {
    type Error = BindingParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceBinding> for String {
    fn from(binding: SourceBinding) -> Self {
        binding.to_string()
    }
}

impl fmt::Display for SourceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace.as_str(), self.key)
    }
}

/// Flat key/value data for one fill session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(default)]
    pub subject: HashMap<String, String>,
    #[serde(default)]
    pub counterpart: HashMap<String, String>,
    #[serde(default)]
    pub meta: HashMap<String, String>,
}

impl SourceRecord {
    pub fn namespace(&self, namespace: Namespace) -> &HashMap<String, String> {
        match namespace {
            Namespace::Subject => &self.subject,
            Namespace::Counterpart => &self.counterpart,
            Namespace::Meta => &self.meta,
        }
    }

    /// Value for a binding, if present and non-blank
    pub fn get(&self, binding: &SourceBinding) -> Option<&str> {
        self.namespace(binding.namespace)
            .get(&binding.key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Builder-style setter, mostly for tests and fixtures
    pub fn with(mut self, namespace: Namespace, key: &str, value: &str) -> Self {
        let map = match namespace {
            Namespace::Subject => &mut self.subject,
            Namespace::Counterpart => &mut self.counterpart,
            Namespace::Meta => &mut self.meta,
        };
        map.insert(key.to_string(), value.to_string());
        self
    }
}
