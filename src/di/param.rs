use super::lifecycle::ArgHandle;
use super::provider::{ObjectProvider, Slot};
use crate::error::{Result, TrellisError};
use std::any::TypeId;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

/// Identifies a qualifier marker type at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qualifier {
    pub(crate) id: TypeId,
    pub(crate) name: &'static str,
}

impl Qualifier {
    pub fn of<Q: 'static>() -> Self {
        Self {
            id: TypeId::of::<Q>(),
            name: std::any::type_name::<Q>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// A value that can be resolved from an [`ObjectProvider`] as one argument of an injected call.
///
/// Parameters without a qualifier are resolved by type; a parameter carrying exactly one
/// qualifier (see [`Qualified`]) is resolved through the qualifier namespace.
pub trait Parameter: Sized {
    /// Qualifiers attached to this parameter, outermost first.
    fn qualifiers() -> Vec<Qualifier> {
        Vec::new()
    }

    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    fn resolve(provider: &ObjectProvider, qualifier: Option<Qualifier>) -> Result<Self>;

    /// Builds the parameter from a value supplied with [`ObjectProvider::copy_with_last`].
    fn from_last(_slot: &Slot) -> Option<Self> {
        None
    }

    /// Exposes the resolved value to lifecycle handlers.
    fn handle(&self) -> Option<ArgHandle> {
        None
    }
}

/// Required dependency: absence is an `UnresolvedDependency` failure.
impl<T: ?Sized + Send + Sync + 'static> Parameter for Arc<T> {
    fn type_name() -> &'static str {
        std::any::type_name::<T>()
    }

    fn resolve(provider: &ObjectProvider, qualifier: Option<Qualifier>) -> Result<Self> {
        match qualifier {
            Some(q) => provider.get_by_qualifier_id::<T>(q).ok_or_else(|| {
                TrellisError::UnresolvedDependency {
                    type_name: format!("{} qualified by {}", std::any::type_name::<T>(), q.name),
                }
            }),
            None => provider.require::<T>(),
        }
    }

    fn from_last(slot: &Slot) -> Option<Self> {
        slot.clone()
            .downcast::<Arc<T>>()
            .ok()
            .map(|value| value.as_ref().clone())
    }

    fn handle(&self) -> Option<ArgHandle> {
        Some(ArgHandle::of(self.clone()))
    }
}

/// Optional dependency: `None` when nothing is registered and the provider is lenient.
impl<T: ?Sized + Send + Sync + 'static> Parameter for Option<Arc<T>> {
    fn type_name() -> &'static str {
        std::any::type_name::<T>()
    }

    fn resolve(provider: &ObjectProvider, qualifier: Option<Qualifier>) -> Result<Self> {
        match qualifier {
            Some(q) => Ok(provider.get_by_qualifier_id::<T>(q)),
            None => provider.get::<T>(),
        }
    }

    fn from_last(slot: &Slot) -> Option<Self> {
        <Arc<T> as Parameter>::from_last(slot).map(Some)
    }

    fn handle(&self) -> Option<ArgHandle> {
        self.as_ref().map(|value| ArgHandle::of(value.clone()))
    }
}

/// A parameter looked up through the qualifier `Q` instead of by type.
///
/// ```rust
/// use std::sync::Arc;
/// use trellis::di::{ObjectProvider, Qualified};
///
/// struct ReadReplica;
///
/// fn report(db: Qualified<ReadReplica, Arc<String>>) -> anyhow::Result<String> {
///     Ok(db.as_str().to_uppercase())
/// }
///
/// let mut provider = ObjectProvider::new();
/// provider.register_qualified::<ReadReplica, _>(String::from("replica"));
/// ```
pub struct Qualified<Q, P> {
    value: P,
    _qualifier: PhantomData<fn() -> Q>,
}

impl<Q, P> Qualified<Q, P> {
    pub fn into_inner(self) -> P {
        self.value
    }
}

impl<Q, P> Deref for Qualified<Q, P> {
    type Target = P;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<Q: 'static, P: Parameter> Parameter for Qualified<Q, P> {
    fn qualifiers() -> Vec<Qualifier> {
        let mut qualifiers = vec![Qualifier::of::<Q>()];
        qualifiers.extend(P::qualifiers());
        qualifiers
    }

    fn type_name() -> &'static str {
        P::type_name()
    }

    fn resolve(provider: &ObjectProvider, qualifier: Option<Qualifier>) -> Result<Self> {
        P::resolve(provider, qualifier).map(|value| Qualified {
            value,
            _qualifier: PhantomData,
        })
    }

    fn from_last(slot: &Slot) -> Option<Self> {
        P::from_last(slot).map(|value| Qualified {
            value,
            _qualifier: PhantomData,
        })
    }

    fn handle(&self) -> Option<ArgHandle> {
        self.value.handle()
    }
}

/// Resolves the parameter at `position` of a call taking `count` arguments.
pub(crate) fn resolve_param<P: Parameter>(
    provider: &ObjectProvider,
    target: &str,
    position: usize,
    count: usize,
) -> Result<P> {
    if position + 1 == count {
        if let Some(slot) = provider.last_arg() {
            return P::from_last(slot).ok_or_else(|| TrellisError::LastArgumentMismatch {
                target: target.to_string(),
                type_name: P::type_name().to_string(),
            });
        }
    }
    match P::qualifiers().as_slice() {
        [] => P::resolve(provider, None),
        [qualifier] => P::resolve(provider, Some(*qualifier)),
        many => Err(TrellisError::InvalidParameterAnnotation {
            target: target.to_string(),
            position,
            count: many.len(),
        }),
    }
}

/// Rejects parameters carrying more than one qualifier before anything is resolved.
pub(crate) fn check_param<P: Parameter>(target: &str, position: usize) -> Result<()> {
    let count = P::qualifiers().len();
    if count > 1 {
        return Err(TrellisError::InvalidParameterAnnotation {
            target: target.to_string(),
            position,
            count,
        });
    }
    Ok(())
}
