use super::ParseContext;
use crate::error::{Result, TrellisError};

/// A type a raw request parameter can be parsed into.
///
/// The provided methods describe the special shapes: `parse_all` is used by
/// multi-valued parameters and `from_presence` by types whose value depends only
/// on whether the parameter was sent at all.
pub trait InputValue: Sized + 'static {
    fn parse(raw: &str, ctx: &ParseContext<'_>) -> Result<Self>;

    fn parse_all(_raw: &[String], _ctx: &ParseContext<'_>) -> Option<Result<Self>> {
        None
    }

    fn from_presence(_present: bool) -> Option<Self> {
        None
    }
}

impl InputValue for String {
    fn parse(raw: &str, _ctx: &ParseContext<'_>) -> Result<Self> {
        Ok(raw.to_string())
    }
}

/// Checkbox semantics: a sent parameter is `true` whatever its text, an absent one `false`.
impl InputValue for bool {
    fn parse(_raw: &str, _ctx: &ParseContext<'_>) -> Result<Self> {
        Ok(true)
    }

    fn from_presence(present: bool) -> Option<Self> {
        Some(present)
    }
}

macro_rules! impl_integer_input {
    ($($ty:ty),*) => {
        $(
            impl InputValue for $ty {
                fn parse(raw: &str, ctx: &ParseContext<'_>) -> Result<Self> {
                    raw.parse::<$ty>().map_err(|e| TrellisError::MalformedInput {
                        name: ctx.name().to_string(),
                        value: raw.to_string(),
                        reason: e.to_string(),
                    })
                }
            }
        )*
    };
}

impl_integer_input!(i32, i64, u32, u64, usize);

impl<T: InputValue> InputValue for Vec<T> {
    /// A single raw value is split on the declared separator, keeping empty segments.
    fn parse(raw: &str, ctx: &ParseContext<'_>) -> Result<Self> {
        let separator = ctx
            .meta()
            .separator
            .filter(|sep| !sep.is_empty())
            .ok_or_else(|| TrellisError::MissingSeparator {
                name: ctx.name().to_string(),
            })?;
        raw.split(separator).map(|piece| T::parse(piece, ctx)).collect()
    }

    fn parse_all(raw: &[String], ctx: &ParseContext<'_>) -> Option<Result<Self>> {
        Some(raw.iter().map(|value| T::parse(value, ctx)).collect())
    }
}

/// A fieldless enum known by the names of its variants as declared in code.
///
/// Implemented by `#[derive(InputEnum)]`, together with an [`InputValue`]
/// impl going through [`parse_enum`]. Display names (strum's `to_string`,
/// `serialize_all`, ..) play no part.
pub trait InputEnum: Sized + 'static {
    /// Declared variant names, in declaration order.
    const VARIANT_NAMES: &'static [&'static str];

    /// The variant declared exactly as `name`.
    fn from_variant_name(name: &str) -> Option<Self>;

    fn variant_name(&self) -> &'static str;
}

/// Matches `raw` against the declared variant names of `E`, ignoring case.
pub fn parse_enum<E: InputEnum>(raw: &str) -> Result<E> {
    E::VARIANT_NAMES
        .iter()
        .find(|name| name.eq_ignore_ascii_case(raw))
        .and_then(|name| E::from_variant_name(name))
        .ok_or_else(|| TrellisError::UnknownEnumConstant {
            type_name: std::any::type_name::<E>().to_string(),
            value: raw.to_string(),
        })
}

/// Marker for types parsed by a parser registered in [`super::InputParsers`].
///
/// ```rust
/// use trellis::input::{CustomInput, DynamicInput, InputParsers};
///
/// struct Cents(u64);
/// impl CustomInput for Cents {}
///
/// let mut parsers = InputParsers::new();
/// parsers.register::<Cents, _>(|raw| Ok(Cents(raw.replace('.', "").parse()?)));
///
/// let input = DynamicInput::from_pairs([("price", "12.50")], parsers);
/// let price: Cents = input.get("price").unwrap().unwrap();
/// assert_eq!(price.0, 1250);
/// ```
pub trait CustomInput: Send + Sync + 'static {}

impl<T: CustomInput> InputValue for T {
    fn parse(raw: &str, ctx: &ParseContext<'_>) -> Result<Self> {
        ctx.parsers().parse::<T>(ctx.name(), raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{DynamicInput, InputMeta, InputParsers};
    use strum_macros::{AsRefStr, Display};

    #[derive(Debug, Clone, Copy, PartialEq, crate::InputEnum)]
    enum Color {
        Red,
        Green,
    }

    #[derive(Debug, Clone, Copy, PartialEq, crate::InputEnum, AsRefStr, Display)]
    #[strum(serialize_all = "snake_case")]
    enum SortOrder {
        NewestFirst,
        #[strum(to_string = "Oldest first")]
        Oldest,
    }

    fn input(pairs: &[(&str, &str)]) -> DynamicInput {
        DynamicInput::from_pairs(pairs.iter().copied(), InputParsers::new())
    }

    #[test]
    fn test_enum_parse_ignores_case() {
        let input = input(&[("a", "RED"), ("b", "red"), ("c", "Red"), ("d", "purple")]);
        for name in ["a", "b", "c"] {
            assert_eq!(input.get::<Color>(name).unwrap(), Some(Color::Red));
        }
        let err = input.get::<Color>("d").unwrap_err();
        assert!(matches!(err, TrellisError::UnknownEnumConstant { .. }));
        assert_eq!(input.get::<Color>("e").unwrap(), None);
    }

    #[test]
    fn test_enum_parse_uses_declared_names() {
        assert_eq!(SortOrder::NewestFirst.as_ref(), "newest_first");
        assert_eq!(SortOrder::Oldest.to_string(), "Oldest first");

        let input = input(&[
            ("a", "NewestFirst"),
            ("b", "newestfirst"),
            ("c", "oldest"),
            ("d", "newest_first"),
            ("e", "Oldest first"),
        ]);
        assert_eq!(input.get::<SortOrder>("a").unwrap(), Some(SortOrder::NewestFirst));
        assert_eq!(input.get::<SortOrder>("b").unwrap(), Some(SortOrder::NewestFirst));
        assert_eq!(input.get::<SortOrder>("c").unwrap(), Some(SortOrder::Oldest));
        for name in ["d", "e"] {
            assert!(matches!(
                input.get::<SortOrder>(name),
                Err(TrellisError::UnknownEnumConstant { .. })
            ));
        }
        assert_eq!(SortOrder::Oldest.variant_name(), "Oldest");
        assert_eq!(SortOrder::VARIANT_NAMES, &["NewestFirst", "Oldest"]);
    }

    #[test]
    fn test_integer_parse_is_strict() {
        let input = input(&[("n", "42"), ("bad", "4x2"), ("blank", "")]);
        assert_eq!(input.get::<i32>("n").unwrap(), Some(42));
        assert!(matches!(
            input.get::<i32>("bad"),
            Err(TrellisError::MalformedInput { .. })
        ));
        assert!(matches!(
            input.get::<u64>("blank"),
            Err(TrellisError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_list_split_keeps_empty_segments() {
        let input = input(&[("ids", "1,2,,3,"), ("words", "a,b,")]);
        let meta = InputMeta::list(",");
        assert!(matches!(
            input.get_with::<Vec<i32>>("ids", &meta),
            Err(TrellisError::MalformedInput { .. })
        ));
        assert_eq!(
            input.get_with::<Vec<String>>("words", &meta).unwrap(),
            Some(vec!["a".to_string(), "b".to_string(), String::new()])
        );
    }

    #[test]
    fn test_list_without_separator() {
        let input = input(&[("ids", "1,2"), ("word", "ab")]);
        assert!(matches!(
            input.get::<Vec<i32>>("ids"),
            Err(TrellisError::MissingSeparator { .. })
        ));
        assert_eq!(InputMeta::list("").separator, None);
        let empty = InputMeta {
            multi_valued: false,
            separator: Some(""),
        };
        assert!(matches!(
            input.get_with::<Vec<String>>("word", &empty),
            Err(TrellisError::MissingSeparator { .. })
        ));
    }

    struct Percent(u8);
    impl CustomInput for Percent {}

    struct Unregistered;
    impl CustomInput for Unregistered {}

    #[test]
    fn test_custom_parsers() {
        let mut parsers = InputParsers::new();
        parsers.register::<Percent, _>(|raw| {
            let value: u8 = raw.trim_end_matches('%').parse()?;
            anyhow::ensure!(value <= 100, "{} is more than 100%", value);
            Ok(Percent(value))
        });
        let input = DynamicInput::from_pairs([("p", "42%"), ("q", "420%")], parsers);

        assert_eq!(input.get::<Percent>("p").unwrap().map(|p| p.0), Some(42));
        assert!(matches!(
            input.get::<Percent>("q"),
            Err(TrellisError::MalformedInput { .. })
        ));
        assert!(matches!(
            input.get::<Unregistered>("p"),
            Err(TrellisError::UnsupportedInputType { .. })
        ));
    }
}
