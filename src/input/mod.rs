//! Typed access to request parameters
//!
//! Raw parameters arrive as `name -> [values]`. [`DynamicInput`] parses them on
//! demand into any [`InputValue`]; tasks usually declare an input struct with
//! `#[derive(Input)]` and receive it as an [`Input<T>`] argument of their action.
//!
//! ```rust
//! use trellis::input::{DynamicInput, InputMeta, InputParsers};
//!
//! let input = DynamicInput::from_pairs(
//!     [("id", "3"), ("id", "5"), ("subscribe", "")],
//!     InputParsers::new(),
//! );
//!
//! let ids: Vec<i32> = input.require_with("id", &InputMeta::multi()).unwrap();
//! assert_eq!(ids, vec![3, 5]);
//! assert_eq!(input.get::<bool>("subscribe").unwrap(), Some(true));
//! assert_eq!(input.get::<bool>("unsubscribe").unwrap(), Some(false));
//! assert_eq!(input.get::<String>("name").unwrap(), None);
//! ```

mod value;

pub use value::{parse_enum, CustomInput, InputEnum, InputValue};

use crate::di::{ObjectProvider, Parameter, Qualifier};
use crate::error::{Result, TrellisError};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Modifiers attached to one declared input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputMeta {
    /// Collect every value sent under the name instead of the first one.
    pub multi_valued: bool,
    /// Split a single value on this literal separator.
    pub separator: Option<&'static str>,
}

impl InputMeta {
    pub const fn multi() -> Self {
        Self {
            multi_valued: true,
            separator: None,
        }
    }

    /// An empty separator counts as none, so parsing such a list fails with `MissingSeparator`.
    pub const fn list(separator: &'static str) -> Self {
        Self {
            multi_valued: false,
            separator: if separator.is_empty() {
                None
            } else {
                Some(separator)
            },
        }
    }
}

/// What a parser knows about the value it is parsing.
pub struct ParseContext<'a> {
    name: &'a str,
    meta: &'a InputMeta,
    parsers: &'a InputParsers,
}

impl<'a> ParseContext<'a> {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn meta(&self) -> &InputMeta {
        self.meta
    }

    pub fn parsers(&self) -> &InputParsers {
        self.parsers
    }
}

type ParserFn = Arc<dyn Fn(&str) -> anyhow::Result<Box<dyn Any + Send>> + Send + Sync>;

/// Parsers for application types, keyed by the exact type they produce.
#[derive(Clone, Default)]
pub struct InputParsers {
    parsers: HashMap<TypeId, ParserFn>,
}

impl InputParsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T, F>(&mut self, parser: F) -> &mut Self
    where
        T: CustomInput,
        F: Fn(&str) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let parser: ParserFn =
            Arc::new(move |raw: &str| parser(raw).map(|value| Box::new(value) as Box<dyn Any + Send>));
        self.parsers.insert(TypeId::of::<T>(), parser);
        self
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.parsers.contains_key(&TypeId::of::<T>())
    }

    pub(crate) fn parse<T: 'static>(&self, name: &str, raw: &str) -> Result<T> {
        let type_name = std::any::type_name::<T>();
        let parser = self
            .parsers
            .get(&TypeId::of::<T>())
            .ok_or_else(|| TrellisError::UnsupportedInputType {
                type_name: type_name.to_string(),
                value: raw.to_string(),
            })?;
        let parsed = parser(raw).map_err(|e| TrellisError::MalformedInput {
            name: name.to_string(),
            value: raw.to_string(),
            reason: format!("{:#}", e),
        })?;
        parsed
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| TrellisError::Internal(format!("parser registered for {} returned another type", type_name)))
    }
}

impl fmt::Debug for InputParsers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputParsers")
            .field("count", &self.parsers.len())
            .finish()
    }
}

/// The raw parameters of one request together with the parsers able to read them.
#[derive(Debug, Clone, Default)]
pub struct DynamicInput {
    params: HashMap<String, Vec<String>>,
    parsers: InputParsers,
}

impl DynamicInput {
    pub fn new(params: HashMap<String, Vec<String>>, parsers: InputParsers) -> Self {
        Self { params, parsers }
    }

    /// Groups repeated names, keeping the order in which their values were sent.
    pub fn from_pairs<I, K, V>(pairs: I, parsers: InputParsers) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in pairs {
            params.entry(name.into()).or_default().push(value.into());
        }
        Self { params, parsers }
    }

    /// Raw values sent under `name`.
    pub fn values(&self, name: &str) -> &[String] {
        self.params.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn get<T: InputValue>(&self, name: &str) -> Result<Option<T>> {
        self.get_with(name, &InputMeta::default())
    }

    /// Parses the parameter `name` as a `T`.
    ///
    /// Multi-valued lists are never absent. Types with presence semantics (`bool`)
    /// are never absent either. Everything else is `None` when nothing was sent.
    pub fn get_with<T: InputValue>(&self, name: &str, meta: &InputMeta) -> Result<Option<T>> {
        let ctx = ParseContext {
            name,
            meta,
            parsers: &self.parsers,
        };
        let raw = self.values(name);

        if meta.multi_valued {
            if let Some(parsed) = T::parse_all(raw, &ctx) {
                return parsed.map(Some);
            }
        }

        if raw.len() > 1 {
            tracing::warn!(
                "More than one value for request parameter {}: {:?}; using the first",
                name,
                raw
            );
        }
        let first = raw.first();

        if let Some(value) = T::from_presence(first.is_some()) {
            return Ok(Some(value));
        }

        match first {
            Some(value) => T::parse(value, &ctx).map(Some),
            None => Ok(None),
        }
    }

    pub fn require<T: InputValue>(&self, name: &str) -> Result<T> {
        self.require_with(name, &InputMeta::default())
    }

    /// Like [`DynamicInput::get_with`], but absence is a `MissingInput` failure.
    pub fn require_with<T: InputValue>(&self, name: &str, meta: &InputMeta) -> Result<T> {
        self.get_with(name, meta)?.ok_or_else(|| TrellisError::MissingInput {
            name: name.to_string(),
        })
    }
}

/// A struct whose fields are read from the request parameters.
///
/// Implemented by `#[derive(Input)]`.
pub trait FromInput: Sized + Send + 'static {
    fn from_input(input: &DynamicInput) -> Result<Self>;
}

/// Action argument carrying the parsed input struct `T`.
pub struct Input<T>(pub T);

impl<T> Input<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Input<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: FromInput> Parameter for Input<T> {
    fn type_name() -> &'static str {
        std::any::type_name::<T>()
    }

    fn resolve(provider: &ObjectProvider, _qualifier: Option<Qualifier>) -> Result<Self> {
        let input = provider.require::<DynamicInput>()?;
        T::from_input(&input).map(Input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(pairs: &[(&str, &str)]) -> DynamicInput {
        DynamicInput::from_pairs(pairs.iter().copied(), InputParsers::new())
    }

    #[test]
    fn test_boolean_is_presence() {
        let input = input(&[("empty", ""), ("no", "false")]);
        assert_eq!(input.get::<bool>("empty").unwrap(), Some(true));
        assert_eq!(input.get::<bool>("no").unwrap(), Some(true));
        assert_eq!(input.get::<bool>("absent").unwrap(), Some(false));
    }

    #[test]
    fn test_multi_valued_keeps_order_and_is_never_absent() {
        let input = input(&[("n", "1"), ("n", "2"), ("n", "3")]);
        let meta = InputMeta::multi();
        assert_eq!(
            input.get_with::<Vec<i32>>("n", &meta).unwrap(),
            Some(vec![1, 2, 3])
        );
        assert_eq!(
            input.get_with::<Vec<i32>>("missing", &meta).unwrap(),
            Some(Vec::new())
        );
    }

    #[test]
    fn test_single_value_takes_first() {
        let input = input(&[("name", " Ada "), ("name", "Grace")]);
        assert_eq!(input.get::<String>("name").unwrap().as_deref(), Some(" Ada "));
        assert_eq!(input.get::<i32>("missing").unwrap(), None);
    }

    #[test]
    fn test_require_reports_missing_name() {
        let input = input(&[]);
        let err = input.require::<String>("email").unwrap_err();
        assert!(matches!(err, TrellisError::MissingInput { ref name } if name == "email"));
    }

    struct Search {
        query: String,
        page: Option<i32>,
    }

    impl FromInput for Search {
        fn from_input(input: &DynamicInput) -> Result<Self> {
            Ok(Search {
                query: input.require("q")?,
                page: input.get("page")?,
            })
        }
    }

    #[test]
    fn test_input_parameter_reads_from_provider() {
        let provider = ObjectProvider::new().copy_with(input(&[("q", "rust")]));
        let search = <Input<Search> as Parameter>::resolve(&provider, None).unwrap();
        assert_eq!(search.query, "rust");
        assert_eq!(search.page, None);

        let empty = ObjectProvider::new();
        assert!(matches!(
            <Input<Search> as Parameter>::resolve(&empty, None),
            Err(TrellisError::UnresolvedDependency { .. })
        ));
    }
}
