use super::{
    simple_type_name, upper_first, uri_name, Attrs, Dependencies, EmbeddedTask, Output, PostAction,
    Task, TaskKind, DEFAULT_TASK_SUFFIX,
};
use crate::di::{Action, Arguments, Constructor, MethodInvoker};
use crate::error::{Result, TrellisError};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A constructed task paired with its action, as driven by the dispatcher.
pub(crate) trait TaskObject: Send {
    fn depends_on(&self) -> Dependencies;

    fn page_title(&self) -> String;

    fn declared_outputs(&self) -> &'static [&'static str];

    fn attrs(&self) -> &Attrs;

    fn run_action(&mut self, invoker: &MethodInvoker<'_>) -> anyhow::Result<PostAction>;
}

struct Bound<T, A, Args, R> {
    task: T,
    action: Arc<A>,
    _call: PhantomData<fn() -> (Args, R)>,
}

impl<T, A, Args, R> TaskObject for Bound<T, A, Args, R>
where
    T: Task,
    A: Action<T, Args, R>,
    Args: Arguments + 'static,
    R: Into<PostAction> + 'static,
{
    fn depends_on(&self) -> Dependencies {
        self.task.depends_on()
    }

    fn page_title(&self) -> String {
        self.task.page_title()
    }

    fn declared_outputs(&self) -> &'static [&'static str] {
        <T::Output as Output>::TAGS
    }

    fn attrs(&self) -> &Attrs {
        self.task.attrs()
    }

    fn run_action(&mut self, invoker: &MethodInvoker<'_>) -> anyhow::Result<PostAction> {
        invoker.invoke(self.action.as_ref(), &mut self.task).map(Into::into)
    }
}

type BuildFn = Arc<dyn Fn(&MethodInvoker<'_>) -> anyhow::Result<Box<dyn TaskObject>> + Send + Sync>;

/// A registered task type.
#[derive(Clone)]
pub struct TaskEntry {
    name: &'static str,
    type_id: TypeId,
    kind: TaskKind,
    attribute: Option<&'static str>,
    template: String,
    build: BuildFn,
}

impl TaskEntry {
    /// Simple type name, e.g. `GreetingTask`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Attribute receiving the rendered content of an embedded task.
    pub fn attribute(&self) -> Option<&'static str> {
        self.attribute
    }

    /// Default template, including the template directory.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Resolves a template named by an action against this task's template directory.
    pub fn template_path(&self, name: &str) -> String {
        format!("{}{}", self.kind.template_dir(), name)
    }

    pub(crate) fn build(&self, invoker: &MethodInvoker<'_>) -> anyhow::Result<Box<dyn TaskObject>> {
        (self.build)(invoker)
    }
}

impl fmt::Debug for TaskEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("attribute", &self.attribute)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

/// The task types the dispatcher knows, keyed by name and by type.
///
/// Every task type name must end with the registry's suffix (`Task` by default);
/// the URI segment `userList` then maps to `UserListTask`.
#[derive(Clone)]
pub struct TaskRegistry {
    suffix: String,
    by_name: HashMap<String, Arc<TaskEntry>>,
    by_type: HashMap<TypeId, Arc<TaskEntry>>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::with_suffix(DEFAULT_TASK_SUFFIX)
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_suffix(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            by_name: HashMap::new(),
            by_type: HashMap::new(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// Registers a task whose content is wrapped in the `page` template.
    pub fn page<T, CArgs, C, AArgs, R, A>(&mut self, constructor: C, action: A) -> Result<&mut Self>
    where
        T: Task,
        CArgs: Arguments + 'static,
        C: Constructor<CArgs, T>,
        AArgs: Arguments + 'static,
        R: Into<PostAction> + 'static,
        A: Action<T, AArgs, R>,
    {
        self.insert(TaskKind::Page, None, constructor, action)
    }

    /// Registers a task whose content is sent as-is.
    pub fn ajax<T, CArgs, C, AArgs, R, A>(&mut self, constructor: C, action: A) -> Result<&mut Self>
    where
        T: Task,
        CArgs: Arguments + 'static,
        C: Constructor<CArgs, T>,
        AArgs: Arguments + 'static,
        R: Into<PostAction> + 'static,
        A: Action<T, AArgs, R>,
    {
        self.insert(TaskKind::Ajax, None, constructor, action)
    }

    /// Registers a task rendered into the [`EmbeddedTask::ATTRIBUTE`] of the tasks depending on it.
    pub fn embedded<T, CArgs, C, AArgs, R, A>(&mut self, constructor: C, action: A) -> Result<&mut Self>
    where
        T: EmbeddedTask,
        CArgs: Arguments + 'static,
        C: Constructor<CArgs, T>,
        AArgs: Arguments + 'static,
        R: Into<PostAction> + 'static,
        A: Action<T, AArgs, R>,
    {
        self.insert(TaskKind::Embedded, Some(T::ATTRIBUTE), constructor, action)
    }

    fn insert<T, CArgs, C, AArgs, R, A>(
        &mut self,
        kind: TaskKind,
        attribute: Option<&'static str>,
        constructor: C,
        action: A,
    ) -> Result<&mut Self>
    where
        T: Task,
        CArgs: Arguments + 'static,
        C: Constructor<CArgs, T>,
        AArgs: Arguments + 'static,
        R: Into<PostAction> + 'static,
        A: Action<T, AArgs, R>,
    {
        let name = simple_type_name::<T>();
        if name.len() <= self.suffix.len() || !name.ends_with(self.suffix.as_str()) {
            return Err(TrellisError::InvalidTaskName {
                type_name: std::any::type_name::<T>().to_string(),
                suffix: self.suffix.clone(),
            });
        }
        if let Some(existing) = self.by_name.get(name) {
            return Err(TrellisError::DuplicateTask {
                name: name.to_string(),
                first: existing.name.to_string(),
                second: std::any::type_name::<T>().to_string(),
            });
        }

        let template = T::TEMPLATE
            .map(str::to_string)
            .unwrap_or_else(|| uri_name(name, &self.suffix));
        let constructor = Arc::new(constructor);
        let action = Arc::new(action);
        let build: BuildFn = Arc::new(move |invoker: &MethodInvoker<'_>| -> anyhow::Result<Box<dyn TaskObject>> {
            let task: T = invoker.construct(constructor.as_ref())?;
            Ok(Box::new(Bound {
                task,
                action: action.clone(),
                _call: PhantomData::<fn() -> (AArgs, R)>,
            }) as Box<dyn TaskObject>)
        });

        let entry = Arc::new(TaskEntry {
            name,
            type_id: TypeId::of::<T>(),
            kind,
            attribute,
            template: format!("{}{}", kind.template_dir(), template),
            build,
        });
        tracing::debug!("Registered {} task {}", kind, name);
        self.by_name.insert(name.to_string(), entry.clone());
        self.by_type.insert(entry.type_id, entry);
        Ok(self)
    }

    /// Maps the last segment of `path` to a task: `/app/userList` finds `UserListTask`.
    pub fn resolve_uri(&self, path: &str) -> Option<Arc<TaskEntry>> {
        let segment = path.rsplit('/').next().unwrap_or(path);
        if segment.is_empty() {
            return None;
        }
        let name = format!("{}{}", upper_first(segment), self.suffix);
        self.by_name.get(&name).cloned()
    }

    pub fn get<T: Task>(&self) -> Option<Arc<TaskEntry>> {
        self.by_type.get(&TypeId::of::<T>()).cloned()
    }

    /// The URI name of `T` under this registry's suffix.
    pub fn uri_name<T: Task>(&self) -> String {
        uri_name(simple_type_name::<T>(), &self.suffix)
    }

    pub(crate) fn by_type(&self, type_id: TypeId, type_name: &str) -> Result<Arc<TaskEntry>> {
        self.by_type
            .get(&type_id)
            .cloned()
            .ok_or_else(|| TrellisError::UnresolvableTask {
                name: type_name.to_string(),
            })
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.by_name.keys().collect();
        names.sort();
        f.debug_struct("TaskRegistry")
            .field("suffix", &self.suffix)
            .field("tasks", &names)
            .finish()
    }
}
