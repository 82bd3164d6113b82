//! Templates rendered by minijinja
//!
//! Template text is loaded by name from a [`TemplateSource`], so
//! `{% include "header" %}` finds `header` the same way the renderer finds
//! `pages/greeting`. The usual Jinja syntax applies:
//!
//! | form | meaning |
//! |---|---|
//! | `{{ name }}`, `{{ a.b }}` | attribute, or a property of a map attribute |
//! | `{{ names \| join(", ") }}` | list attribute joined with a separator |
//! | `{% if name %} .. {% else %} .. {% endif %}` | conditional |
//! | `{% for it in items %} .. {% endfor %}` | one rendering of the body per element |
//! | `{% include "other" %}` | includes the template `other`, which sees the same attributes |
//! | `{{ cached("site.css") }}` | link to a static resource carrying its content hash |
//!
//! Every value is written through the engine's [`Formatters`].
//!
//! The attributes reach minijinja through a scope object. A lookup the scope
//! cannot answer is reported to the [`RenderContext`], from the template
//! itself as well as from the templates it includes. Lookups in branches that
//! are not taken never happen, so they are not reported.

use super::format::{Formatters, ValueKind};
use super::source::TemplateSource;
use super::value::Value;
use super::{Attributes, RenderContext, TemplateRenderer};
use crate::dispatch::StaticResources;
use crate::error::{Result, TrellisError};
use minijinja::value::{Enumerator, Object, ObjectRepr, ValueKind as JinjaKind};
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior};
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex};

type JinjaValue = minijinja::Value;

/// Global functions of the environment; looking them up is not an attribute reference.
const FUNCTIONS: &[&str] = &["cached", "range", "dict", "namespace", "debug"];

/// A script literal, written through the script formatter.
#[derive(Debug)]
struct ScriptLiteral(String);

impl Object for ScriptLiteral {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The root context of one render call.
#[derive(Debug)]
struct Scope {
    attrs: BTreeMap<String, JinjaValue>,
    unbound: Arc<Mutex<Vec<String>>>,
}

impl Object for Scope {
    fn get_value(self: &Arc<Self>, key: &JinjaValue) -> Option<JinjaValue> {
        let name = key.as_str()?;
        if let Some(value) = self.attrs.get(name) {
            return Some(value.clone());
        }
        if !FUNCTIONS.contains(&name) {
            if let Ok(mut unbound) = self.unbound.lock() {
                unbound.push(name.to_string());
            }
        }
        None
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Values(self.attrs.keys().map(|k| JinjaValue::from(k.as_str())).collect())
    }
}

fn to_jinja(value: &Value) -> JinjaValue {
    match value {
        Value::Null => JinjaValue::from(()),
        Value::Text(s) => JinjaValue::from(s.as_str()),
        Value::Html(s) => JinjaValue::from_safe_string(s.clone()),
        Value::Script(s) => JinjaValue::from_object(ScriptLiteral(s.clone())),
        Value::Bool(b) => JinjaValue::from(*b),
        Value::Int(i) => JinjaValue::from(*i),
        Value::Float(f) => JinjaValue::from(*f),
        Value::List(items) => JinjaValue::from(items.iter().map(to_jinja).collect::<Vec<_>>()),
        Value::Map(entries) => JinjaValue::from(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), to_jinja(v)))
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}

/// Writes `value` by kind. Null and undefined values write nothing; list elements are concatenated.
fn write_value(
    formatters: &Formatters,
    out: &mut minijinja::Output<'_>,
    value: &JinjaValue,
) -> std::result::Result<(), Error> {
    if value.is_undefined() || value.is_none() {
        return Ok(());
    }
    let text = if let Some(script) = value.downcast_object_ref::<ScriptLiteral>() {
        formatters.format(ValueKind::Script, &script.0)
    } else if let Some(s) = value.as_str() {
        let kind = if value.is_safe() {
            ValueKind::Html
        } else {
            ValueKind::Text
        };
        formatters.format(kind, s)
    } else if value.kind() == JinjaKind::Seq {
        for item in value.try_iter()? {
            write_value(formatters, out, &item)?;
        }
        return Ok(());
    } else {
        formatters.format(ValueKind::Text, &value.to_string())
    };
    out.write_str(&text)
        .map_err(|e| Error::new(ErrorKind::WriteFailure, e.to_string()))
}

fn template_error(name: &str, err: Error) -> TrellisError {
    match err.kind() {
        ErrorKind::TemplateNotFound => TrellisError::TemplateNotFound {
            name: err.detail().unwrap_or(name).to_string(),
        },
        ErrorKind::SyntaxError => TrellisError::TemplateSyntax {
            name: err.name().unwrap_or(name).to_string(),
            message: err.to_string(),
        },
        _ => TrellisError::TemplateRender {
            name: err.name().unwrap_or(name).to_string(),
            message: err.to_string(),
        },
    }
}

/// Renders templates from a [`TemplateSource`].
///
/// Compiled templates are kept by name unless caching is turned off, in which
/// case every render reads the source again.
pub struct TemplateEngine {
    source: Arc<dyn TemplateSource>,
    formatters: Arc<Formatters>,
    statics: Option<StaticResources>,
    caching: bool,
    env: Environment<'static>,
}

impl TemplateEngine {
    pub fn new(source: impl TemplateSource) -> Self {
        let mut engine = Self {
            source: Arc::new(source),
            formatters: Arc::new(Formatters::default()),
            statics: None,
            caching: true,
            env: Environment::new(),
        };
        engine.env = engine.environment();
        engine
    }

    pub fn with_formatters(mut self, formatters: Formatters) -> Self {
        self.formatters = Arc::new(formatters);
        self.env = self.environment();
        self
    }

    /// Registers the `cached` function, linking to `statics` by content hash.
    pub fn with_static_resources(mut self, statics: StaticResources) -> Self {
        self.statics = Some(statics);
        self.env = self.environment();
        self
    }

    pub fn caching(mut self, enabled: bool) -> Self {
        self.caching = enabled;
        self
    }

    pub fn formatters(&self) -> &Formatters {
        &self.formatters
    }

    fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);

        let source = self.source.clone();
        env.set_loader(move |name| match source.load(name) {
            Ok(text) => Ok(Some(text)),
            Err(TrellisError::TemplateNotFound { name }) => {
                Err(Error::new(ErrorKind::TemplateNotFound, name))
            }
            Err(err) => Err(Error::new(ErrorKind::InvalidOperation, err.to_string())),
        });

        let formatters = self.formatters.clone();
        env.set_formatter(move |out, _state, value| write_value(&formatters, out, value));

        if let Some(statics) = self.statics.clone() {
            env.add_function("cached", move |name: String| {
                statics
                    .cached_link(&name)
                    .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
            });
        }
        env
    }

    fn render_with<F>(&self, name: &str, attrs: &Attributes, ctx: &mut RenderContext, render: F) -> Result<String>
    where
        F: FnOnce(&Environment<'static>, JinjaValue) -> std::result::Result<String, Error>,
    {
        let unbound = Arc::new(Mutex::new(Vec::new()));
        let scope = Scope {
            attrs: attrs.iter().map(|(k, v)| (k.clone(), to_jinja(v))).collect(),
            unbound: unbound.clone(),
        };

        let fresh;
        let env = if self.caching {
            &self.env
        } else {
            fresh = self.environment();
            &fresh
        };
        let rendered = render(env, JinjaValue::from_object(scope));

        if let Ok(unbound) = unbound.lock() {
            for name in unbound.iter() {
                ctx.touch_unbound(name);
            }
        }
        rendered.map_err(|err| template_error(name, err))
    }
}

impl TemplateRenderer for TemplateEngine {
    fn render_template(&self, name: &str, attrs: &Attributes, ctx: &mut RenderContext) -> Result<String> {
        self.render_with(name, attrs, ctx, |env, scope| {
            env.get_template(name)?.render(scope)
        })
    }

    fn render_inline(&self, source: &str, attrs: &Attributes, ctx: &mut RenderContext) -> Result<String> {
        self.render_with("<inline>", attrs, ctx, |env, scope| env.render_str(source, scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{HtmlString, IntoValue, JsString, MemoryTemplates};

    fn engine() -> TemplateEngine {
        TemplateEngine::new(
            MemoryTemplates::new()
                .with("header", "<h1>{{ title }}</h1>")
                .with("page", "{% include \"header\" %}{{ body }}")
                .with("broken", "{% if %}"),
        )
    }

    fn attrs(pairs: Vec<(&str, Value)>) -> Attributes {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn render(source: &str, attrs: &Attributes) -> (String, Vec<String>) {
        let mut ctx = RenderContext::new();
        let out = engine().render_inline(source, attrs, &mut ctx).unwrap();
        (out, ctx.missing().to_vec())
    }

    #[test]
    fn test_attribute_and_escaping() {
        let attrs = attrs(vec![
            ("name", "<World>".into_value()),
            ("raw", HtmlString::raw_unsafe("<b>x</b>").into_value()),
            ("js", JsString::for_string("a'b").into_value()),
            ("n", 3i32.into_value()),
        ]);
        let (out, missing) = render("Hello, {{ name }} {{ raw }} {{ js }} ${{ n }}", &attrs);
        assert_eq!(out, "Hello, &lt;World&gt; <b>x</b> 'a\\047b' $3");
        assert!(missing.is_empty());
    }

    #[test]
    fn test_conditionals_touch_their_attribute() {
        let attrs = attrs(vec![("shown", true.into_value())]);
        let (out, missing) = render(
            "{% if shown %}yes{% else %}no{% endif %}/{% if not hidden %}none{% endif %}",
            &attrs,
        );
        assert_eq!(out, "yes/none");
        assert_eq!(missing, vec!["hidden".to_string()]);
    }

    #[test]
    fn test_untaken_branch_is_not_touched() {
        let attrs = attrs(vec![("flag", false.into_value())]);
        let (out, missing) = render("{% if flag %}{{ secret }}{% endif %}done", &attrs);
        assert_eq!(out, "done");
        assert!(missing.is_empty());
    }

    #[test]
    fn test_iteration_and_separator() {
        let attrs = attrs(vec![(
            "names",
            vec!["Ada", "Grace", "<Barbara>"].into_value(),
        )]);
        let (out, missing) = render("{% for n in names %}<li>{{ n }}</li>{% endfor %}", &attrs);
        assert_eq!(out, "<li>Ada</li><li>Grace</li><li>&lt;Barbara&gt;</li>");
        assert!(missing.is_empty());
        let (out, _) = render("{{ names | join(\", \") }}", &attrs);
        assert_eq!(out, "Ada, Grace, &lt;Barbara&gt;");
    }

    #[test]
    fn test_map_properties() {
        let option = Value::serialize(&serde_json::json!({"value": 7, "text": "Seven"})).unwrap();
        let attrs = attrs(vec![("opt", option)]);
        let (out, missing) = render("{{ opt.value }}={{ opt.text }}{{ opt.none }}", &attrs);
        assert_eq!(out, "7=Seven");
        assert!(missing.is_empty());
    }

    #[test]
    fn test_includes_share_attributes_and_detection() {
        let attrs = attrs(vec![("body", "text".into_value())]);
        let mut ctx = RenderContext::new();
        let out = engine().render_template("page", &attrs, &mut ctx).unwrap();
        assert_eq!(out, "<h1></h1>text");
        assert_eq!(ctx.missing(), ["title".to_string()]);
    }

    #[test]
    fn test_null_attributes_are_not_missing() {
        let mut ctx = RenderContext::new();
        ctx.mark_null("foo");
        let out = engine()
            .render_inline("[{{ foo }}][{{ bar }}][{{ bar }}]", &Attributes::new(), &mut ctx)
            .unwrap();
        assert_eq!(out, "[][][]");
        assert_eq!(ctx.missing(), ["bar".to_string()]);
    }

    #[test]
    fn test_custom_formatter() {
        let mut formatters = Formatters::new();
        formatters.register(ValueKind::Text, |raw| raw.to_uppercase());
        let engine = engine().with_formatters(formatters);
        let attrs = attrs(vec![
            ("name", "ada".into_value()),
            ("raw", HtmlString::raw_unsafe("<i>x</i>").into_value()),
        ]);
        let out = engine
            .render_inline("{{ name }} {{ raw }}", &attrs, &mut RenderContext::new())
            .unwrap();
        assert_eq!(out, "ADA <i>x</i>");
    }

    #[test]
    fn test_cached_links_static_resources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css/site.css"), "hello").unwrap();
        let engine = engine().with_static_resources(StaticResources::new(dir.path()));

        let mut ctx = RenderContext::new();
        let out = engine
            .render_inline("<link href=\"{{ cached(\"site.css\") }}\">", &Attributes::new(), &mut ctx)
            .unwrap();
        assert_eq!(out, "<link href=\"site.css?5d41402abc4b2a76b9719d911017c592\">");
        assert!(ctx.missing().is_empty());

        let err = engine
            .render_inline("{{ cached(\"gone.css\") }}", &Attributes::new(), &mut RenderContext::new())
            .unwrap_err();
        assert!(matches!(err, TrellisError::TemplateRender { .. }), "{:?}", err);
    }

    #[test]
    fn test_source_is_reread_without_caching() {
        let templates = Arc::new(MemoryTemplates::new().with("pages/note", "one"));
        let engine = TemplateEngine::new(SharedTemplates(templates.clone())).caching(false);
        let render = || {
            engine
                .render_template("pages/note", &Attributes::new(), &mut RenderContext::new())
                .unwrap()
        };
        assert_eq!(render(), "one");
        templates.insert("pages/note", "two");
        assert_eq!(render(), "two");
    }

    struct SharedTemplates(Arc<MemoryTemplates>);

    impl TemplateSource for SharedTemplates {
        fn load(&self, name: &str) -> Result<String> {
            self.0.load(name)
        }
    }

    #[test]
    fn test_errors() {
        let engine = engine();
        let err = engine
            .render_template("broken", &Attributes::new(), &mut RenderContext::new())
            .unwrap_err();
        assert!(matches!(err, TrellisError::TemplateSyntax { .. }), "{:?}", err);

        match engine.render_template("nope", &Attributes::new(), &mut RenderContext::new()) {
            Err(TrellisError::TemplateNotFound { name }) => assert_eq!(name, "nope"),
            other => panic!("unexpected {:?}", other),
        }
        let err = engine
            .render_inline("{% include \"gone\" %}", &Attributes::new(), &mut RenderContext::new())
            .unwrap_err();
        assert!(matches!(err, TrellisError::TemplateNotFound { .. }), "{:?}", err);
    }
}
