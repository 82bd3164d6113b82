//! # Trellis
//!
//! A task-oriented MVC web framework on top of axum.
//!
//! Every URI names a *task*: `/app/userList` runs `UserListTask`. A task is a
//! plain struct built by a constructor function and run by an action function.
//! Both functions declare what they need as arguments and receive it from the
//! request's object provider. The action fills the task's output tags, which
//! are then rendered through a template.
//!
//! ## Features
//!
//! - **Argument injection**: constructors and actions take any registered object, the
//!   request, its cookies or typed input as arguments
//! - **Typed input**: `#[derive(Input)]` reads request parameters into a struct
//! - **Checked rendering**: a template referencing an output the action never set fails
//!   the request instead of rendering an empty hole
//! - **Embedded tasks**: headers, menus and sidebars render depth-first into the page
//! - **Lifecycle hooks**: observe and modify every injected argument
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trellis::prelude::*;
//!
//! #[derive(Output)]
//! pub struct GreetingOutput {
//!     name: String,
//! }
//!
//! #[derive(Input)]
//! pub struct GreetingInput {
//!     name: Option<String>,
//! }
//!
//! pub struct GreetingTask {
//!     attrs: Attrs,
//! }
//!
//! impl Task for GreetingTask {
//!     type Output = GreetingOutput;
//!
//!     fn attrs(&self) -> &Attrs {
//!         &self.attrs
//!     }
//! }
//!
//! fn new_greeting() -> anyhow::Result<GreetingTask> {
//!     Ok(GreetingTask { attrs: Attrs::new() })
//! }
//!
//! fn greeting(task: &mut GreetingTask, input: Input<GreetingInput>) -> anyhow::Result<()> {
//!     let name = input.name.clone().unwrap_or_else(|| "World".to_string());
//!     task.attrs.set(GreetingOutput::NAME, name);
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::from_config(&ConfigService::new())?;
//!
//!     let mut registry = TaskRegistry::with_suffix(config.task_suffix.as_str());
//!     registry.page(new_greeting, greeting)?;
//!
//!     let dispatcher = Dispatcher::builder(config).registry(registry).build();
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     Application::new(dispatcher).serve(listener).await?;
//!     Ok(())
//! }
//! ```

// Lets the derive macros name `::trellis` from inside this crate too.
extern crate self as trellis;

pub mod config;
pub mod di;
pub mod dispatch;
pub mod dropdown;
pub mod error;
pub mod exception;
pub mod input;
pub mod lifecycle;
pub mod render;
pub mod task;
pub mod template;
pub mod testing;

// Re-export core types
pub use config::{AppConfig, ConfigService};
pub use di::{LifecycleHandler, LifecycleHandlers, MethodInvoker, ObjectProvider, Qualified};
pub use dispatch::{Cookies, Dispatcher, DispatcherBuilder, WebRequest};
pub use error::{Result, TrellisError};
pub use input::{DynamicInput, FromInput, Input, InputEnum, InputParsers};
pub use task::{Attrs, EmbeddedTask, Output, PostAction, Task, TaskRegistry};

// Re-export macros; the derives share their names with the traits
pub use trellis_macro::{Input, InputEnum, Output};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use trellis::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{AppConfig, ConfigService};
    pub use crate::di::{
        ArgHandle, LifecycleHandler, LifecycleHandlers, ObjectProvider, Qualified, Qualifier,
    };
    pub use crate::dispatch::{Cookies, Dispatcher, RequestId, WebRequest};
    pub use crate::dropdown::{DropdownElement, DropdownOptGroup};
    pub use crate::error::{Result, TrellisError};
    pub use crate::exception::{DiagnosticFilter, ExceptionFilter, ProductionFilter};
    pub use crate::input::{DynamicInput, FromInput, InputParsers};
    pub use crate::lifecycle::{shutdown_signal, Application};
    pub use crate::task::{
        Attrs, Dependencies, EmbeddedTask, PostAction, Tag, Task, TaskRegistry,
    };
    pub use crate::template::{HtmlString, IntoValue, JsString, MemoryTemplates, TemplateEngine, Value};
    // Both the types and their derive macros
    pub use crate::{Input, InputEnum, Output};
    pub use async_trait::async_trait;
    pub use axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
        Router,
    };
    pub use std::sync::Arc;
}
