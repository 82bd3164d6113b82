//! Dependency injection
//!
//! An [`ObjectProvider`] holds the objects of one request (seeded from the
//! process-wide registrations), a [`MethodInvoker`] calls constructors and
//! actions with arguments resolved from it, and [`LifecycleHandlers`] observe
//! the injected arguments while those calls run.

mod invoker;
mod lifecycle;
mod param;
mod provider;

pub use invoker::{Action, Arguments, Constructor, MethodInvoker};
pub use lifecycle::{ArgHandle, LifecycleHandler, LifecycleHandlers};
pub use param::{Parameter, Qualified, Qualifier};
pub use provider::ObjectProvider;
