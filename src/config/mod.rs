use crate::error::{Result, TrellisError};
use dashmap::DashMap;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

/// Key/value configuration, seeded from the process environment.
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    pub fn new() -> Self {
        let service = Self::empty();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    /// A service that ignores the environment.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(TrellisError::InvalidConfig {
                    key: key.to_string(),
                    value,
                }),
            },
        }
    }
}

/// Settings of a dispatcher.
///
/// | key | default |
/// |---|---|
/// | `TRELLIS_DEFAULT_URI` | `index` |
/// | `TRELLIS_DIAGNOSTIC` | `true` |
/// | `TRELLIS_TEMPLATE_ROOT` | `templates` |
/// | `TRELLIS_STATIC_ROOT` | unset, no static files |
/// | `TRELLIS_TASK_SUFFIX` | `Task` |
/// | `TRELLIS_STRICT_INJECTION` | `true` |
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where unknown URIs are redirected.
    pub default_uri: String,
    /// Show failure details in responses and re-read templates on every render.
    pub diagnostic: bool,
    pub template_root: PathBuf,
    pub static_root: Option<PathBuf>,
    pub task_suffix: String,
    /// Fail actions whose optional arguments cannot be resolved.
    pub strict_injection: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_uri: "index".to_string(),
            diagnostic: true,
            template_root: PathBuf::from("templates"),
            static_root: None,
            task_suffix: crate::task::DEFAULT_TASK_SUFFIX.to_string(),
            strict_injection: true,
        }
    }
}

impl AppConfig {
    pub fn from_config(config: &ConfigService) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            default_uri: config
                .get("TRELLIS_DEFAULT_URI")
                .unwrap_or(defaults.default_uri),
            diagnostic: config.get_bool("TRELLIS_DIAGNOSTIC", defaults.diagnostic)?,
            template_root: config
                .get("TRELLIS_TEMPLATE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.template_root),
            static_root: config.get("TRELLIS_STATIC_ROOT").map(PathBuf::from),
            task_suffix: config
                .get("TRELLIS_TASK_SUFFIX")
                .unwrap_or(defaults.task_suffix),
            strict_injection: config
                .get_bool("TRELLIS_STRICT_INJECTION", defaults.strict_injection)?,
        })
    }

    /// Production settings: no failure details, cached templates.
    pub fn production() -> Self {
        Self {
            diagnostic: false,
            ..Self::default()
        }
    }
}
