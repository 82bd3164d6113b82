//! The action-and-render protocol
//!
//! A task's action runs with the request input available for injection; its
//! [`PostAction`] then decides whether a template is rendered. Rendering binds
//! the task's declared outputs under their lower-cased names plus the content
//! of any embedded tasks, and fails with `MissingAttributes` when the template
//! referenced an output the task never set.

use crate::di::{LifecycleHandlers, MethodInvoker, ObjectProvider};
use crate::error::{Result, TrellisError};
use crate::input::DynamicInput;
use crate::task::{BinaryWriter, PostAction, Responder, TaskEntry, TaskObject};
use crate::template::{Attributes, RenderContext, TemplateRenderer, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Rendered content of an embedded task, bound into the templates of the tasks above it.
#[derive(Debug, Clone)]
pub struct EmbeddedContent {
    task: &'static str,
    attribute: &'static str,
    content: String,
}

impl EmbeddedContent {
    pub(crate) fn new(task: &'static str, attribute: &'static str, content: String) -> Self {
        Self {
            task,
            attribute,
            content,
        }
    }

    pub fn task(&self) -> &'static str {
        self.task
    }

    pub fn attribute(&self) -> &'static str {
        self.attribute
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Binds `embedded` as raw markup; the fragments were escaped when they were rendered.
pub(crate) fn bind_embedded(embedded: &[EmbeddedContent], attributes: &mut Attributes) {
    for e in embedded {
        attributes.insert(e.attribute.to_string(), Value::Html(e.content.clone()));
    }
}

/// What an action-and-render call produced.
pub enum Rendered {
    Content(String),
    Custom(Box<dyn Responder>),
    Binary {
        content_type: String,
        writer: BinaryWriter,
    },
}

impl Rendered {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Rendered::Content(_) => "content",
            Rendered::Custom(_) => "custom",
            Rendered::Binary { .. } => "binary",
        }
    }
}

impl fmt::Debug for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rendered::Content(content) => f.debug_tuple("Content").field(content).finish(),
            other => f.write_str(other.kind_name()),
        }
    }
}

/// Runs task actions and renders their templates.
#[derive(Clone)]
pub struct Renderer {
    engine: Arc<dyn TemplateRenderer>,
    strict: bool,
}

impl Renderer {
    pub fn new(engine: Arc<dyn TemplateRenderer>) -> Self {
        Self {
            engine,
            strict: true,
        }
    }

    /// When strict, actions fail on optional arguments nothing is registered for.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn engine(&self) -> &Arc<dyn TemplateRenderer> {
        &self.engine
    }

    pub(crate) fn action_and_render(
        &self,
        entry: &TaskEntry,
        task: &mut dyn TaskObject,
        provider: &ObjectProvider,
        handlers: &LifecycleHandlers,
        input: Arc<DynamicInput>,
        embedded: &[EmbeddedContent],
    ) -> anyhow::Result<Rendered> {
        let started = Instant::now();
        let mut provider = provider.copy_with_arc(input);
        if self.strict {
            provider = provider.error_on_unknown_type();
        }
        let invoker = MethodInvoker::new(&provider, handlers);

        let rendered = match task.run_action(&invoker)? {
            PostAction::Default => {
                Rendered::Content(self.render(entry.template(), &*task, embedded)?)
            }
            PostAction::Template(name) => {
                Rendered::Content(self.render(&entry.template_path(&name), &*task, embedded)?)
            }
            PostAction::Content(content) => Rendered::Content(content),
            PostAction::Custom(responder) => Rendered::Custom(responder),
            PostAction::Binary {
                content_type,
                writer,
            } => Rendered::Binary {
                content_type,
                writer,
            },
        };

        tracing::info!(
            "Rendered {} in {} ms",
            entry.name(),
            started.elapsed().as_millis()
        );
        Ok(rendered)
    }

    fn render(&self, template: &str, task: &dyn TaskObject, embedded: &[EmbeddedContent]) -> Result<String> {
        let mut attributes = Attributes::new();
        let mut ctx = RenderContext::new();
        task.attrs()
            .bind(task.declared_outputs(), &mut attributes, &mut ctx);
        bind_embedded(embedded, &mut attributes);

        let content = self.engine.render_template(template, &attributes, &mut ctx)?;
        let missing = ctx.take_missing();
        if !missing.is_empty() {
            return Err(TrellisError::MissingAttributes {
                template: template.to_string(),
                missing,
            });
        }
        Ok(content)
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}
