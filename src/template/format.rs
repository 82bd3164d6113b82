use super::value::escape_html;
use std::fmt;
use std::sync::Arc;
use strum_macros::{Display, EnumIter};

/// The string-like value kinds whose output can be customised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    Text,
    Html,
    Script,
}

type FormatFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Per-kind output formatters. By default text is escaped for HTML while markup
/// and script literals pass through unchanged.
#[derive(Clone)]
pub struct Formatters {
    text: FormatFn,
    html: FormatFn,
    script: FormatFn,
}

impl Default for Formatters {
    fn default() -> Self {
        Self {
            text: Arc::new(escape_html),
            html: Arc::new(str::to_string),
            script: Arc::new(str::to_string),
        }
    }
}

impl Formatters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the formatter for `kind`.
    pub fn register<F>(&mut self, kind: ValueKind, formatter: F) -> &mut Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let formatter: FormatFn = Arc::new(formatter);
        match kind {
            ValueKind::Text => self.text = formatter,
            ValueKind::Html => self.html = formatter,
            ValueKind::Script => self.script = formatter,
        }
        self
    }

    pub fn format(&self, kind: ValueKind, raw: &str) -> String {
        match kind {
            ValueKind::Text => (self.text)(raw),
            ValueKind::Html => (self.html)(raw),
            ValueKind::Script => (self.script)(raw),
        }
    }
}

impl fmt::Debug for Formatters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatters").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_formatters() {
        let formatters = Formatters::new();
        assert_eq!(formatters.format(ValueKind::Text, "<b>"), "&lt;b&gt;");
        assert_eq!(formatters.format(ValueKind::Html, "<b>"), "<b>");
        assert_eq!(formatters.format(ValueKind::Script, "'a'"), "'a'");
    }

    #[test]
    fn test_register_replaces_one_kind() {
        let mut formatters = Formatters::new();
        formatters.register(ValueKind::Text, |raw| raw.to_uppercase());
        assert_eq!(formatters.format(ValueKind::Text, "ok"), "OK");
        assert_eq!(formatters.format(ValueKind::Html, "<i>"), "<i>");
        assert_eq!(ValueKind::Script.to_string(), "script");
    }
}
