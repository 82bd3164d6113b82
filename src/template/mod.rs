//! Template rendering
//!
//! The dispatcher talks to templates through [`TemplateRenderer`]. The crate
//! ships [`TemplateEngine`], a minijinja environment loading from a
//! [`TemplateSource`], with output formatting per [`ValueKind`].

mod engine;
mod format;
mod source;
mod value;

pub use engine::TemplateEngine;
pub use format::{Formatters, ValueKind};
pub use source::{DirTemplates, MemoryTemplates, TemplateSource};
pub use value::{escape_html, HtmlString, IntoValue, JsString, Value};

use crate::error::Result;
use std::collections::HashSet;

/// Attribute name to value, as seen by one template.
pub type Attributes = std::collections::HashMap<String, Value>;

/// State of one render call: which unbound attributes the template touched.
#[derive(Debug, Default)]
pub struct RenderContext {
    missing: Vec<String>,
    null_attrs: HashSet<String>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `name` as deliberately unset, so touching it is not an error.
    pub fn mark_null(&mut self, name: impl Into<String>) {
        self.null_attrs.insert(name.into());
    }

    /// Records a reference to an attribute that has no value.
    pub fn touch_unbound(&mut self, name: &str) {
        if !self.null_attrs.contains(name) && !self.missing.iter().any(|m| m == name) {
            self.missing.push(name.to_string());
        }
    }

    /// Unbound attributes touched so far, in the order they were first referenced.
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    pub fn take_missing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.missing)
    }
}

/// A template engine as consumed by the renderer.
///
/// Implementations report references to attributes missing from `attrs`
/// through [`RenderContext::touch_unbound`].
pub trait TemplateRenderer: Send + Sync + 'static {
    fn render_template(&self, name: &str, attrs: &Attributes, ctx: &mut RenderContext) -> Result<String>;

    fn render_inline(&self, source: &str, attrs: &Attributes, ctx: &mut RenderContext) -> Result<String>;
}
