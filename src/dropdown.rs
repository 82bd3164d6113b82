//! Options of HTML `<select>` elements
//!
//! Bound into a template, an element exposes `value`, `text` and `selected`:
//!
//! ```text
//! {% for o in options %}<option value="{{ o.value }}"{% if o.selected %} selected{% endif %}>{{ o.text }}</option>{% endfor %}
//! ```

use crate::input::InputEnum;
use crate::template::{IntoValue, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use strum::IntoEnumIterator;

/// One `<option>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropdownElement {
    value: String,
    text: String,
    selected: bool,
}

impl DropdownElement {
    pub fn new(value: impl Into<String>, text: impl Into<String>, selected: bool) -> Self {
        Self {
            value: value.into(),
            text: text.into(),
            selected,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// One element per item; the one whose value equals `selected` is selected.
    pub fn from_list<X, V, T>(items: &[X], selected: Option<&str>, value_fn: V, text_fn: T) -> Vec<Self>
    where
        V: Fn(&X) -> String,
        T: Fn(&X) -> String,
    {
        items
            .iter()
            .map(|x| {
                let value = value_fn(x);
                let selected = selected == Some(value.as_str());
                Self::new(value, text_fn(x), selected)
            })
            .collect()
    }

    /// One element per variant: the declared variant name as value, so the
    /// submitted form parses back, and its display form as text.
    pub fn from_enum<E>(selected: Option<E>) -> Vec<Self>
    where
        E: IntoEnumIterator + InputEnum + fmt::Display + PartialEq,
    {
        E::iter()
            .map(|e| {
                let is_selected = selected.as_ref() == Some(&e);
                Self::new(e.variant_name(), e.to_string(), is_selected)
            })
            .collect()
    }
}

impl IntoValue for DropdownElement {
    fn into_value(self) -> Value {
        let mut entries = BTreeMap::new();
        entries.insert("value".to_string(), Value::Text(self.value));
        entries.insert("text".to_string(), Value::Text(self.text));
        entries.insert("selected".to_string(), Value::Bool(self.selected));
        Value::Map(entries)
    }
}

/// An `<optgroup>` and its options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropdownOptGroup {
    text: String,
    options: Vec<DropdownElement>,
}

impl DropdownOptGroup {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn options(&self) -> &[DropdownElement] {
        &self.options
    }

    /// One group per key, in iteration order. The option whose value equals the
    /// value of `selected` is selected.
    pub fn from_groups<'a, K, X, I, V, T>(groups: I, selected: Option<&X>, value_fn: V, text_fn: T) -> Vec<Self>
    where
        K: fmt::Display + 'a,
        X: 'a,
        I: IntoIterator<Item = (&'a K, &'a Vec<X>)>,
        V: Fn(&X) -> String,
        T: Fn(&X) -> String,
    {
        let selected = selected.map(&value_fn);
        groups
            .into_iter()
            .map(|(key, items)| Self {
                text: key.to_string(),
                options: DropdownElement::from_list(items, selected.as_deref(), &value_fn, &text_fn),
            })
            .collect()
    }
}

impl IntoValue for DropdownOptGroup {
    fn into_value(self) -> Value {
        let mut entries = BTreeMap::new();
        entries.insert("text".to_string(), Value::Text(self.text));
        entries.insert("options".to_string(), self.options.into_value());
        Value::Map(entries)
    }
}
