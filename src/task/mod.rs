//! Tasks: the per-request handlers the dispatcher resolves URIs to
//!
//! A task is a plain struct built by an injected constructor function and run
//! by an injected action function. The action fills the task's [`Attrs`] and
//! returns a [`PostAction`] (or `()` for the default template).
//!
//! # Example
//!
//! ```rust,ignore
//! #[derive(Output)]
//! struct GreetingOutput {
//!     name: String,
//! }
//!
//! struct GreetingTask {
//!     attrs: Attrs,
//! }
//!
//! impl Task for GreetingTask {
//!     type Output = GreetingOutput;
//!     fn attrs(&self) -> &Attrs {
//!         &self.attrs
//!     }
//! }
//!
//! registry.page(
//!     || -> anyhow::Result<GreetingTask> { Ok(GreetingTask { attrs: Attrs::new() }) },
//!     |task: &mut GreetingTask| {
//!         task.attrs.set(GreetingOutput::NAME, "World".to_string());
//!         Ok(())
//!     },
//! )?;
//! ```

mod action;
mod output;
mod registry;

pub use action::{BinaryWriter, PostAction, Responder};
pub use output::{Attrs, Output, Tag};
pub use registry::{TaskEntry, TaskRegistry};

pub(crate) use action::found;
pub(crate) use registry::TaskObject;

use std::any::TypeId;
use strum_macros::Display;

/// Suffix every task type name carries unless the registry is configured otherwise.
pub const DEFAULT_TASK_SUFFIX: &str = "Task";

/// A request handler.
pub trait Task: Send + 'static {
    /// The output tags the task declares.
    type Output: Output;

    /// Template name relative to the task's template directory. Derived from the
    /// type name when `None`: `UserListTask` renders `userList`.
    const TEMPLATE: Option<&'static str> = None;

    fn attrs(&self) -> &Attrs;

    /// Embedded tasks rendered before this one, in order.
    fn depends_on(&self) -> Dependencies {
        Dependencies::none()
    }

    /// Title handed to the page wrapper.
    fn page_title(&self) -> String {
        String::new()
    }
}

/// A task rendered as a fragment of an enclosing page.
pub trait EmbeddedTask: Task {
    /// Attribute of the enclosing template that receives the rendered fragment.
    const ATTRIBUTE: &'static str;
}

/// How the dispatcher finishes a task's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TaskKind {
    /// Wrapped in the `page` template.
    Page,
    /// Written verbatim.
    Ajax,
    /// Only rendered as part of another task.
    Embedded,
}

impl TaskKind {
    /// Directory the task's templates are resolved in.
    pub fn template_dir(&self) -> &'static str {
        match self {
            TaskKind::Embedded => "embedded/",
            TaskKind::Page | TaskKind::Ajax => "pages/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Dependency {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
}

/// The embedded tasks a task depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    tasks: Vec<Dependency>,
}

impl Dependencies {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with<T: EmbeddedTask>(mut self) -> Self {
        self.tasks.push(Dependency {
            type_id: TypeId::of::<T>(),
            type_name: simple_type_name::<T>(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.tasks.iter()
    }
}

/// The URI name of a task with the default suffix, e.g. `greeting` for `GreetingTask`.
pub fn uri_name_for_task<T: Task>() -> String {
    uri_name(simple_type_name::<T>(), DEFAULT_TASK_SUFFIX)
}

pub(crate) fn uri_name(simple_name: &str, suffix: &str) -> String {
    lower_first(simple_name.strip_suffix(suffix).unwrap_or(simple_name))
}

/// The last path segment of a type name, without generic arguments.
pub(crate) fn simple_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

pub(crate) fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UserListTask {
        attrs: Attrs,
    }

    impl Task for UserListTask {
        type Output = ();
        fn attrs(&self) -> &Attrs {
            &self.attrs
        }
    }

    #[test]
    fn test_uri_names() {
        assert_eq!(simple_type_name::<UserListTask>(), "UserListTask");
        assert_eq!(uri_name_for_task::<UserListTask>(), "userList");
        assert_eq!(uri_name("GreetingPage", "Page"), "greeting");
        assert_eq!(upper_first("greeting"), "Greeting");
        assert_eq!(TaskKind::Embedded.to_string(), "embedded");
        assert_eq!(TaskKind::Ajax.template_dir(), "pages/");
    }
}
