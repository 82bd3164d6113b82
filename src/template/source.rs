use crate::error::{Result, TrellisError};
use dashmap::DashMap;
use std::path::PathBuf;

/// Where template text comes from, by name (`pages/greeting`, `page`, ..).
pub trait TemplateSource: Send + Sync + 'static {
    fn load(&self, name: &str) -> Result<String>;
}

/// Templates held in memory, mostly for tests and small embedded apps.
#[derive(Debug, Default)]
pub struct MemoryTemplates {
    templates: DashMap<String, String>,
}

impl MemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }
}

impl TemplateSource for MemoryTemplates {
    fn load(&self, name: &str) -> Result<String> {
        self.templates
            .get(name)
            .map(|t| t.clone())
            .ok_or_else(|| TrellisError::TemplateNotFound {
                name: name.to_string(),
            })
    }
}

/// Templates stored as `<root>/<name>.html` files.
#[derive(Debug, Clone)]
pub struct DirTemplates {
    root: PathBuf,
}

impl DirTemplates {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> Option<PathBuf> {
        if name.split('/').any(|segment| segment.is_empty() || segment == "..") {
            return None;
        }
        Some(self.root.join(format!("{}.html", name)))
    }
}

impl TemplateSource for DirTemplates {
    fn load(&self, name: &str) -> Result<String> {
        let not_found = || TrellisError::TemplateNotFound {
            name: name.to_string(),
        };
        let path = self.path_for(name).ok_or_else(not_found)?;
        std::fs::read_to_string(&path).map_err(|e| {
            tracing::debug!("Cannot read template {}: {}", path.display(), e);
            not_found()
        })
    }
}
