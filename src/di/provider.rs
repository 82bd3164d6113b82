use super::param::Qualifier;
use crate::error::{Result, TrellisError};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type-erased storage for a registered value. The inner value is always an `Arc<T>`,
/// which lets unsized types such as `dyn Trait` share the same slot layout.
pub(crate) type Slot = Arc<dyn Any + Send + Sync>;

type FactoryFn = Arc<dyn Fn() -> Slot + Send + Sync>;

/// Type alias for a function that turns a slot holding `Arc<Impl>` into one holding `Arc<Trait>`.
type CasterFn = Arc<dyn Fn(Slot) -> Slot + Send + Sync>;

#[derive(Clone)]
enum Binding {
    Instance(Slot),
    Factory(FactoryFn),
}

#[derive(Clone)]
struct Registration {
    key: TypeId,
    type_name: &'static str,
    binding: Binding,
}

impl Registration {
    fn resolve(&self) -> Slot {
        match &self.binding {
            Binding::Instance(slot) => slot.clone(),
            Binding::Factory(factory) => factory(),
        }
    }
}

#[derive(Clone)]
struct Caster {
    from: TypeId,
    to: TypeId,
    cast: CasterFn,
}

#[derive(Clone)]
struct QualifiedEntry {
    qualifier: &'static str,
    slot: Slot,
}

/// Registry of the objects available for injection.
///
/// Each type maps to at most one registration. Lookups by type first try the exact
/// type and then fall back to the first registration (in registration order) that
/// is assignable to the requested type, where assignability is declared with
/// [`ObjectProvider::bind`]. Lookups by qualifier live in a separate namespace in
/// which the last registration for a qualifier wins.
///
/// A provider is cheap to copy; [`ObjectProvider::copy_with`] and friends return an
/// independent provider, so registrations made on a copy are never visible from
/// the provider it was copied from.
#[derive(Clone, Default)]
pub struct ObjectProvider {
    registrations: Vec<Registration>,
    qualified: HashMap<TypeId, QualifiedEntry>,
    casters: Vec<Caster>,
    last_arg: Option<Slot>,
    error_on_unknown_type: bool,
}

impl ObjectProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes [`ObjectProvider::get`] fail with `UnresolvedDependency` instead of
    /// returning `None` for types nothing is registered for.
    pub fn error_on_unknown_type(mut self) -> Self {
        self.error_on_unknown_type = true;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.error_on_unknown_type
    }

    /// Registers `value` under its concrete type.
    pub fn register<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.register_arc(Arc::new(value))
    }

    /// Registers a shared value under `T`, which may be a trait object.
    pub fn register_arc<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) -> &mut Self {
        self.insert(Registration {
            key: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            binding: Binding::Instance(Arc::new(value)),
        });
        self
    }

    /// Registers a producer that is called on every lookup of `T`.
    pub fn register_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        let factory: FactoryFn = Arc::new(move || Arc::new(factory()) as Slot);
        self.insert(Registration {
            key: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            binding: Binding::Factory(factory),
        });
        self
    }

    /// Registers `value` for the qualifier `Q` and also under its concrete type.
    pub fn register_qualified<Q: 'static, T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        let value = Arc::new(value);
        self.qualified.insert(
            TypeId::of::<Q>(),
            QualifiedEntry {
                qualifier: std::any::type_name::<Q>(),
                slot: Arc::new(value.clone()),
            },
        );
        self.register_arc(value)
    }

    /// Declares that values registered as `Impl` can be handed out where `Trait` is requested.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use trellis::di::ObjectProvider;
    ///
    /// trait Clock: Send + Sync { fn now(&self) -> u64; }
    /// struct FixedClock;
    /// impl Clock for FixedClock { fn now(&self) -> u64 { 7 } }
    ///
    /// let mut provider = ObjectProvider::new();
    /// provider.register(FixedClock);
    /// provider.bind::<dyn Clock, FixedClock, _>(|c| c as Arc<dyn Clock>);
    /// let clock = provider.get::<dyn Clock>().unwrap().unwrap();
    /// assert_eq!(clock.now(), 7);
    /// ```
    pub fn bind<Trait, Impl, F>(&mut self, caster_fn: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Send + Sync + 'static,
        F: Fn(Arc<Impl>) -> Arc<Trait> + Send + Sync + 'static,
    {
        let cast: CasterFn = Arc::new(move |slot: Slot| match slot.downcast::<Arc<Impl>>() {
            Ok(concrete) => Arc::new(caster_fn(concrete.as_ref().clone())) as Slot,
            // Unreachable: casters are only applied to registrations keyed by `Impl`.
            Err(original) => original,
        });
        let from = TypeId::of::<Impl>();
        let to = TypeId::of::<Trait>();
        self.casters.retain(|c| !(c.from == from && c.to == to));
        self.casters.push(Caster { from, to, cast });
        self
    }

    /// Returns the value registered for `T`.
    ///
    /// An exact registration always wins over an assignable one. When nothing
    /// matches, the result is `Ok(None)`, or `UnresolvedDependency` if
    /// [`ObjectProvider::error_on_unknown_type`] was set.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        match self.lookup(TypeId::of::<T>()) {
            Some(slot) => downcast::<T>(slot).map(Some),
            None => {
                let type_name = std::any::type_name::<T>();
                if self.error_on_unknown_type {
                    Err(TrellisError::UnresolvedDependency {
                        type_name: type_name.to_string(),
                    })
                } else {
                    tracing::info!("No object registered for {} in {:?}", type_name, self);
                    Ok(None)
                }
            }
        }
    }

    /// Like [`ObjectProvider::get`], but absence is always an error.
    pub fn require<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.get::<T>()?.ok_or_else(|| TrellisError::UnresolvedDependency {
            type_name: std::any::type_name::<T>().to_string(),
        })
    }

    /// Same matching rule as [`ObjectProvider::get`], without invoking factories.
    pub fn has<T: ?Sized + 'static>(&self) -> bool {
        let key = TypeId::of::<T>();
        self.registrations
            .iter()
            .any(|r| r.key == key || self.caster(r.key, key).is_some())
    }

    /// Returns the value registered for the qualifier `Q`.
    ///
    /// This lookup never fails: a missing or differently-typed value is logged
    /// and reported as `None`, even for strict providers.
    pub fn get_by_qualifier<Q: 'static, T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.get_by_qualifier_id::<T>(Qualifier::of::<Q>())
    }

    pub(crate) fn get_by_qualifier_id<T: ?Sized + Send + Sync + 'static>(
        &self,
        qualifier: Qualifier,
    ) -> Option<Arc<T>> {
        let Some(entry) = self.qualified.get(&qualifier.id) else {
            tracing::warn!("No object for qualifier {} in {:?}", qualifier.name, self);
            return None;
        };
        match entry.slot.clone().downcast::<Arc<T>>() {
            Ok(value) => Some(value.as_ref().clone()),
            Err(_) => {
                tracing::warn!(
                    "Object for qualifier {} is not a {}",
                    entry.qualifier,
                    std::any::type_name::<T>()
                );
                None
            }
        }
    }

    /// Returns an independent copy with `value` registered under its concrete type.
    pub fn copy_with<T: Send + Sync + 'static>(&self, value: T) -> Self {
        let mut copy = self.copy();
        copy.register(value);
        copy
    }

    /// Returns an independent copy with `value` registered under `T`.
    pub fn copy_with_arc<T: ?Sized + Send + Sync + 'static>(&self, value: Arc<T>) -> Self {
        let mut copy = self.copy();
        copy.register_arc(value);
        copy
    }

    /// Returns a copy whose next invocation receives `value` as its last argument,
    /// whatever that parameter declares.
    pub fn copy_with_last<T: Send + Sync + 'static>(&self, value: T) -> Self {
        let mut copy = self.copy();
        copy.last_arg = Some(Arc::new(Arc::new(value)));
        copy
    }

    pub(crate) fn last_arg(&self) -> Option<&Slot> {
        self.last_arg.as_ref()
    }

    /// Copies carry every registration but start out lenient again.
    fn copy(&self) -> Self {
        Self {
            registrations: self.registrations.clone(),
            qualified: self.qualified.clone(),
            casters: self.casters.clone(),
            last_arg: self.last_arg.clone(),
            error_on_unknown_type: false,
        }
    }

    /// Converts a slot holding `Arc<from>` into one holding `Arc<to>`, if `from` is assignable to `to`.
    pub(crate) fn cast_slot(&self, from: TypeId, to: TypeId, slot: Slot) -> Option<Slot> {
        if from == to {
            return Some(slot);
        }
        self.caster(from, to).map(|c| (c.cast)(slot))
    }

    pub(crate) fn is_assignable(&self, from: TypeId, to: TypeId) -> bool {
        from == to || self.caster(from, to).is_some()
    }

    fn insert(&mut self, registration: Registration) {
        match self
            .registrations
            .iter_mut()
            .find(|r| r.key == registration.key)
        {
            Some(existing) => *existing = registration,
            None => self.registrations.push(registration),
        }
    }

    fn lookup(&self, key: TypeId) -> Option<Slot> {
        if let Some(exact) = self.registrations.iter().find(|r| r.key == key) {
            return Some(exact.resolve());
        }
        self.registrations.iter().find_map(|r| {
            let caster = self.caster(r.key, key)?;
            tracing::debug!("Returning {} for an assignable lookup", r.type_name);
            Some((caster.cast)(r.resolve()))
        })
    }

    fn caster(&self, from: TypeId, to: TypeId) -> Option<&Caster> {
        self.casters.iter().find(|c| c.from == from && c.to == to)
    }
}

fn downcast<T: ?Sized + Send + Sync + 'static>(slot: Slot) -> Result<Arc<T>> {
    slot.downcast::<Arc<T>>()
        .map(|wrapper| wrapper.as_ref().clone())
        .map_err(|_| {
            TrellisError::Internal(format!(
                "registered value is not a {}",
                std::any::type_name::<T>()
            ))
        })
}

impl fmt::Debug for ObjectProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectProvider")
            .field(
                "types",
                &self.registrations.iter().map(|r| r.type_name).collect::<Vec<_>>(),
            )
            .field(
                "qualifiers",
                &self.qualified.values().map(|q| q.qualifier).collect::<Vec<_>>(),
            )
            .field("last_arg", &self.last_arg.is_some())
            .finish()
    }
}
