//! Injected invocation of constructors and actions
//!
//! Constructors are plain functions `Fn(A, B, ..) -> anyhow::Result<T>` and actions
//! are `Fn(&mut S, A, B, ..) -> anyhow::Result<R>`, where every argument type
//! implements [`Parameter`]. The [`MethodInvoker`] resolves the arguments from its
//! [`ObjectProvider`], runs the lifecycle hooks bound to them and annotates
//! failures with a description of the call.

use super::lifecycle::{ArgHandle, BoundHook, LifecycleHandlers};
use super::param::{check_param, resolve_param, Parameter};
use super::provider::ObjectProvider;
use crate::error::Result;
use anyhow::Context;

/// A tuple of parameters resolved together for one call.
pub trait Arguments: Sized {
    /// Type names of the parameters, in declaration order.
    fn describe() -> Vec<&'static str>;

    fn resolve(provider: &ObjectProvider, target: &str) -> Result<Self>;

    fn handles(&self) -> Vec<ArgHandle>;
}

/// A function that builds a `T` from injected arguments.
pub trait Constructor<Args, T>: Send + Sync + 'static {
    fn construct(&self, args: Args) -> anyhow::Result<T>;
}

/// A function run against a receiver `S` with injected arguments.
pub trait Action<S, Args, R>: Send + Sync + 'static {
    fn run(&self, receiver: &mut S, args: Args) -> anyhow::Result<R>;
}

macro_rules! impl_arguments {
    ($($ty:ident),*) => {
        impl<$($ty: Parameter),*> Arguments for ($($ty,)*) {
            fn describe() -> Vec<&'static str> {
                vec![$($ty::type_name()),*]
            }

            #[allow(non_snake_case, unused_variables, unused_mut, unused_assignments)]
            fn resolve(provider: &ObjectProvider, target: &str) -> Result<Self> {
                let count = 0usize $(+ { let _ = stringify!($ty); 1 })*;
                let mut position = 0;
                $(
                    check_param::<$ty>(target, position)?;
                    position += 1;
                )*
                let mut position = 0;
                $(
                    let $ty = resolve_param::<$ty>(provider, target, position, count)?;
                    position += 1;
                )*
                Ok(($($ty,)*))
            }

            #[allow(non_snake_case, unused_mut)]
            fn handles(&self) -> Vec<ArgHandle> {
                let ($($ty,)*) = self;
                let mut handles = Vec::new();
                $( handles.extend($ty.handle()); )*
                handles
            }
        }

        impl<Func, T, $($ty),*> Constructor<($($ty,)*), T> for Func
        where
            Func: Fn($($ty),*) -> anyhow::Result<T> + Send + Sync + 'static,
        {
            #[allow(non_snake_case)]
            fn construct(&self, ($($ty,)*): ($($ty,)*)) -> anyhow::Result<T> {
                self($($ty),*)
            }
        }

        impl<Func, S, R, $($ty),*> Action<S, ($($ty,)*), R> for Func
        where
            Func: Fn(&mut S, $($ty),*) -> anyhow::Result<R> + Send + Sync + 'static,
        {
            #[allow(non_snake_case)]
            fn run(&self, receiver: &mut S, ($($ty,)*): ($($ty,)*)) -> anyhow::Result<R> {
                self(receiver, $($ty),*)
            }
        }
    };
}

impl_arguments!();
impl_arguments!(A1);
impl_arguments!(A1, A2);
impl_arguments!(A1, A2, A3);
impl_arguments!(A1, A2, A3, A4);
impl_arguments!(A1, A2, A3, A4, A5);
impl_arguments!(A1, A2, A3, A4, A5, A6);
impl_arguments!(A1, A2, A3, A4, A5, A6, A7);
impl_arguments!(A1, A2, A3, A4, A5, A6, A7, A8);

/// Invokes constructors and actions with arguments taken from an [`ObjectProvider`].
pub struct MethodInvoker<'a> {
    provider: &'a ObjectProvider,
    handlers: &'a LifecycleHandlers,
}

impl<'a> MethodInvoker<'a> {
    pub fn new(provider: &'a ObjectProvider, handlers: &'a LifecycleHandlers) -> Self {
        Self { provider, handlers }
    }

    /// Builds a `T` with `constructor`.
    ///
    /// Failures raised by the constructor keep their kind and gain a description of the call.
    pub fn construct<T, Args, C>(&self, constructor: &C) -> anyhow::Result<T>
    where
        Args: Arguments,
        C: Constructor<Args, T>,
    {
        let target = std::any::type_name::<T>();
        let args = Args::resolve(self.provider, target)?;
        let hooks = self.bind_hooks(&args);
        run_nested(&hooks, move || {
            constructor.construct(args).with_context(|| {
                format!(
                    "While invoking constructor of {} with [{}]",
                    target,
                    Args::describe().join(", ")
                )
            })
        })
    }

    /// Runs `action` against `receiver`.
    pub fn invoke<S, Args, R, M>(&self, action: &M, receiver: &mut S) -> anyhow::Result<R>
    where
        Args: Arguments,
        M: Action<S, Args, R>,
    {
        let target = std::any::type_name::<S>();
        let args = Args::resolve(self.provider, target)?;
        let hooks = self.bind_hooks(&args);
        run_nested(&hooks, move || {
            action.run(receiver, args).with_context(|| {
                format!(
                    "While invoking action of {} with [{}]",
                    target,
                    Args::describe().join(", ")
                )
            })
        })
    }

    fn bind_hooks<Args: Arguments>(&self, args: &Args) -> Vec<BoundHook> {
        if self.handlers.is_empty() {
            return Vec::new();
        }
        args.handles()
            .iter()
            .filter_map(|handle| self.handlers.bind(handle, self.provider))
            .collect()
    }
}

/// The first hook is outermost: it sees `on_init` first and `on_success`/`on_error` last.
fn run_nested<R>(hooks: &[BoundHook], call: impl FnOnce() -> anyhow::Result<R>) -> anyhow::Result<R> {
    let Some((hook, inner)) = hooks.split_first() else {
        return call();
    };
    hook.on_init()?;
    match run_nested(inner, call) {
        Ok(value) => {
            hook.on_success()?;
            Ok(value)
        }
        Err(error) => {
            if let Err(nested) = hook.on_error(&error) {
                tracing::warn!(
                    "Lifecycle handler for {} failed in on_error: {:#}",
                    hook.type_name(),
                    nested
                );
            }
            Err(error)
        }
    }
}
