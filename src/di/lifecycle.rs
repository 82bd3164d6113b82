//! Lifecycle hooks for injected arguments
//!
//! A [`LifecycleHandler`] observes every injected argument of a matching type
//! while an injected call runs: `on_init` before the call, then `on_success` or
//! `on_error` once it is over. Typical users are unit-of-work objects such as a
//! database session that must be committed or rolled back with the request.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis::di::{LifecycleHandler, LifecycleHandlers};
//!
//! struct Session;
//! struct SessionHandler;
//!
//! impl LifecycleHandler<Session> for SessionHandler {
//!     fn on_success(&self, _session: &Session) -> anyhow::Result<()> {
//!         tracing::debug!("commit");
//!         Ok(())
//!     }
//!     fn on_error(&self, _session: &Session, error: &anyhow::Error) -> anyhow::Result<()> {
//!         tracing::debug!("rollback after {}", error);
//!         Ok(())
//!     }
//! }
//!
//! let mut handlers = LifecycleHandlers::new();
//! handlers.register::<Session, _>(SessionHandler);
//! assert_eq!(handlers.len(), 1);
//! ```

use super::provider::{ObjectProvider, Slot};
use std::any::TypeId;
use std::sync::Arc;

/// Callbacks bound to every injected argument of type `X`.
pub trait LifecycleHandler<X: ?Sized>: Send + Sync + 'static {
    /// Called before `value` is handed to the invoked function.
    fn on_init(&self, _value: &X) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when the invocation failed. A failure returned from here is logged and dropped.
    fn on_error(&self, _value: &X, _error: &anyhow::Error) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when the invocation returned successfully.
    fn on_success(&self, _value: &X) -> anyhow::Result<()> {
        Ok(())
    }
}

pub(crate) enum Phase<'a> {
    Init,
    Error(&'a anyhow::Error),
    Success,
}

type HookFn = Arc<dyn Fn(&Slot, Phase<'_>) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
struct HandlerEntry {
    key: TypeId,
    type_name: &'static str,
    hook: HookFn,
}

/// The lifecycle handlers of one request, consulted by every invocation in it.
#[derive(Clone, Default)]
pub struct LifecycleHandlers {
    entries: Vec<HandlerEntry>,
}

impl LifecycleHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for arguments of type `X` (or any type bound to `X`).
    pub fn register<X, H>(&mut self, handler: H) -> &mut Self
    where
        X: ?Sized + Send + Sync + 'static,
        H: LifecycleHandler<X>,
    {
        let hook: HookFn = Arc::new(move |slot: &Slot, phase: Phase<'_>| {
            let Some(value) = slot.downcast_ref::<Arc<X>>() else {
                return Ok(());
            };
            match phase {
                Phase::Init => handler.on_init(value),
                Phase::Error(error) => handler.on_error(value, error),
                Phase::Success => handler.on_success(value),
            }
        });
        let key = TypeId::of::<X>();
        self.entries.retain(|e| e.key != key);
        self.entries.push(HandlerEntry {
            key,
            type_name: std::any::type_name::<X>(),
            hook,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the first handler the argument is assignable to and binds the two together.
    pub(crate) fn bind(&self, arg: &ArgHandle, provider: &ObjectProvider) -> Option<BoundHook> {
        self.entries.iter().find_map(|entry| {
            if !provider.is_assignable(arg.key, entry.key) {
                return None;
            }
            let slot = provider.cast_slot(arg.key, entry.key, arg.slot.clone())?;
            Some(BoundHook {
                type_name: entry.type_name,
                slot,
                hook: entry.hook.clone(),
            })
        })
    }
}

/// An injected argument as seen by the lifecycle machinery.
pub struct ArgHandle {
    key: TypeId,
    slot: Slot,
}

impl ArgHandle {
    pub fn of<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            key: TypeId::of::<T>(),
            slot: Arc::new(value),
        }
    }
}

/// A handler paired with the argument it observes.
pub(crate) struct BoundHook {
    type_name: &'static str,
    slot: Slot,
    hook: HookFn,
}

impl BoundHook {
    pub(crate) fn on_init(&self) -> anyhow::Result<()> {
        (self.hook)(&self.slot, Phase::Init)
    }

    pub(crate) fn on_error(&self, error: &anyhow::Error) -> anyhow::Result<()> {
        (self.hook)(&self.slot, Phase::Error(error))
    }

    pub(crate) fn on_success(&self) -> anyhow::Result<()> {
        (self.hook)(&self.slot, Phase::Success)
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }
}
