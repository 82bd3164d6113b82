use crate::di::{LifecycleHandlers, MethodInvoker, ObjectProvider};
use crate::error::TrellisError;
use crate::input::DynamicInput;
use crate::render::{bind_embedded, EmbeddedContent, Renderer, Rendered};
use crate::task::{Dependency, Responder, TaskEntry, TaskKind, TaskObject, TaskRegistry};
use crate::template::{Attributes, RenderContext, Value};
use std::sync::Arc;

/// Template wrapping the content of page tasks.
pub const PAGE_TEMPLATE: &str = "page";

/// How the response to a task is finished.
pub(crate) enum Finished {
    Respond(Box<dyn Responder>),
    Bytes { content_type: String, body: Vec<u8> },
    Html(String),
}

/// The synchronous part of one dispatch: build the task, render what it
/// embeds, run its action and assemble the content.
pub(crate) struct Pipeline<'a> {
    pub(crate) registry: &'a TaskRegistry,
    pub(crate) renderer: &'a Renderer,
    pub(crate) provider: ObjectProvider,
    pub(crate) handlers: LifecycleHandlers,
    pub(crate) input: Arc<DynamicInput>,
}

impl Pipeline<'_> {
    pub(crate) fn run(&self, entry: &TaskEntry) -> anyhow::Result<Finished> {
        let mut task = self.build(entry)?;

        let mut embedded = Vec::new();
        for dependency in task.depends_on().iter() {
            self.render_embedded(dependency, &mut embedded)?;
        }

        let rendered = self.action_and_render(entry, task.as_mut(), &embedded)?;
        match rendered {
            Rendered::Custom(responder) => Ok(Finished::Respond(responder)),
            Rendered::Binary {
                content_type,
                writer,
            } => {
                let mut body = Vec::new();
                let sink: &mut dyn std::io::Write = &mut body;
                writer(sink)?;
                Ok(Finished::Bytes { content_type, body })
            }
            Rendered::Content(content) => match entry.kind() {
                TaskKind::Ajax => Ok(Finished::Html(content)),
                TaskKind::Page => Ok(Finished::Html(self.wrap_page(&*task, content, &embedded)?)),
                TaskKind::Embedded => Err(TrellisError::UnknownTaskKind {
                    task: entry.name().to_string(),
                    kind: entry.kind().to_string(),
                }
                .into()),
            },
        }
    }

    /// Renders `dependency` after everything it depends on, appending each result to `out`.
    fn render_embedded(&self, dependency: &Dependency, out: &mut Vec<EmbeddedContent>) -> anyhow::Result<()> {
        let entry = self
            .registry
            .by_type(dependency.type_id, dependency.type_name)?;
        let attribute = match (entry.kind(), entry.attribute()) {
            (TaskKind::Embedded, Some(attribute)) => attribute,
            _ => {
                return Err(TrellisError::UnknownTaskKind {
                    task: entry.name().to_string(),
                    kind: entry.kind().to_string(),
                }
                .into());
            }
        };

        let mut task = self.build(&entry)?;
        let first = out.len();
        for nested in task.depends_on().iter() {
            self.render_embedded(nested, out)?;
        }

        match self.action_and_render(&entry, task.as_mut(), &out[first..])? {
            Rendered::Content(content) => {
                out.push(EmbeddedContent::new(entry.name(), attribute, content));
                Ok(())
            }
            other => Err(TrellisError::InvalidEmbeddedResult {
                task: entry.name().to_string(),
                kind: other.kind_name().to_string(),
            }
            .into()),
        }
    }

    fn build(&self, entry: &TaskEntry) -> anyhow::Result<Box<dyn TaskObject>> {
        let invoker = MethodInvoker::new(&self.provider, &self.handlers);
        entry.build(&invoker)
    }

    fn action_and_render(
        &self,
        entry: &TaskEntry,
        task: &mut dyn TaskObject,
        embedded: &[EmbeddedContent],
    ) -> anyhow::Result<Rendered> {
        self.renderer.action_and_render(
            entry,
            task,
            &self.provider,
            &self.handlers,
            self.input.clone(),
            embedded,
        )
    }

    fn wrap_page(&self, task: &dyn TaskObject, body: String, embedded: &[EmbeddedContent]) -> anyhow::Result<String> {
        let mut attributes = Attributes::new();
        attributes.insert("pagetitle".to_string(), Value::Text(task.page_title()));
        attributes.insert("body".to_string(), Value::Html(body));
        bind_embedded(embedded, &mut attributes);

        let mut ctx = RenderContext::new();
        let page = self
            .renderer
            .engine()
            .render_template(PAGE_TEMPLATE, &attributes, &mut ctx)?;
        Ok(page)
    }
}
