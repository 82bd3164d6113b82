use crate::template::{Attributes, IntoValue, RenderContext, Value};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// A typed output slot of a task.
///
/// The template sees the value under the lower-cased identifier: `NAME` is `{{ name }}`.
pub struct Tag<T> {
    ident: &'static str,
    _type: PhantomData<fn(T)>,
}

impl<T> Tag<T> {
    pub const fn new(ident: &'static str) -> Self {
        Self {
            ident,
            _type: PhantomData,
        }
    }

    pub fn ident(&self) -> &'static str {
        self.ident
    }

    pub fn attribute_name(&self) -> String {
        self.ident.to_lowercase()
    }
}

impl<T> Clone for Tag<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Tag<T> {}

impl<T> fmt::Debug for Tag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.ident)
    }
}

/// The declared outputs of a task. Implemented by `#[derive(Output)]`.
pub trait Output {
    /// Identifiers of every declared tag.
    const TAGS: &'static [&'static str];
}

impl Output for () {
    const TAGS: &'static [&'static str] = &[];
}

/// Values a task's action assigned to its output tags.
///
/// A tag set to `None` (or with [`Attrs::set_null`]) counts as deliberately
/// empty: templates may reference it without failing the render.
#[derive(Debug, Clone, Default)]
pub struct Attrs {
    values: HashMap<&'static str, Value>,
}

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: IntoValue>(&mut self, tag: Tag<T>, value: T) -> &mut Self {
        self.values.insert(tag.ident, value.into_value());
        self
    }

    pub fn set_null<T>(&mut self, tag: Tag<T>) -> &mut Self {
        self.values.insert(tag.ident, Value::Null);
        self
    }

    pub fn get<T>(&self, tag: Tag<T>) -> Option<&Value> {
        self.values.get(tag.ident)
    }

    /// True once the tag was assigned, even to null.
    pub fn has<T>(&self, tag: Tag<T>) -> bool {
        self.values.contains_key(tag.ident)
    }

    /// Binds the assigned values of the `declared` tags and marks the null ones.
    pub(crate) fn bind(
        &self,
        declared: &[&'static str],
        attributes: &mut Attributes,
        ctx: &mut RenderContext,
    ) {
        for ident in declared {
            let name = ident.to_lowercase();
            match self.values.get(ident) {
                Some(Value::Null) => ctx.mark_null(name),
                Some(value) => {
                    attributes.insert(name, value.clone());
                }
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: Tag<String> = Tag::new("NAME");
    const NICK: Tag<Option<String>> = Tag::new("NICK");
    const AGE: Tag<i32> = Tag::new("AGE");
    const SECRET: Tag<String> = Tag::new("SECRET");

    #[test]
    fn test_bind_declared_tags_only() {
        let mut attrs = Attrs::new();
        attrs
            .set(NAME, "Ada".to_string())
            .set(NICK, None)
            .set(SECRET, "hidden".to_string());

        let mut bound = Attributes::new();
        let mut ctx = RenderContext::new();
        attrs.bind(&["NAME", "NICK", "AGE"], &mut bound, &mut ctx);

        assert_eq!(bound.get("name"), Some(&Value::Text("Ada".into())));
        assert!(!bound.contains_key("nick"));
        assert!(!bound.contains_key("secret"));
        assert!(attrs.has(NICK));
        assert!(!attrs.has(AGE));

        ctx.touch_unbound("nick");
        ctx.touch_unbound("age");
        assert_eq!(ctx.missing(), ["age".to_string()]);
    }
}
