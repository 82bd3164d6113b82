use crate::error::{Result, TrellisError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A value bound to a template attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    /// Plain text, escaped for HTML on output.
    Text(String),
    /// Markup written as-is.
    Html(String),
    /// A JavaScript literal written as-is.
    Script(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Converts any serializable value, mapping JSON objects to [`Value::Map`].
    pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Value::from)
            .map_err(|e| TrellisError::Internal(format!("cannot bind value: {}", e)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The entry `name` of a map value.
    pub fn property(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.get(name),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(entries) => {
                Value::Map(entries.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Conversion into a template [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoValue for &String {
    fn into_value(self) -> Value {
        Value::Text(self.clone())
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

macro_rules! impl_int_value {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Int(self as i64)
                }
            }
        )*
    };
}

impl_int_value!(i32, i64, u32, u8, u16, i16);

impl IntoValue for u64 {
    fn into_value(self) -> Value {
        i64::try_from(self).map(Value::Int).unwrap_or(Value::Float(self as f64))
    }
}

impl IntoValue for usize {
    fn into_value(self) -> Value {
        (self as u64).into_value()
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map(IntoValue::into_value).unwrap_or(Value::Null)
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: IntoValue> IntoValue for BTreeMap<String, T> {
    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }
}

impl IntoValue for serde_json::Value {
    fn into_value(self) -> Value {
        Value::from(self)
    }
}

/// Markup that is written to the page without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HtmlString(String);

impl HtmlString {
    /// Escapes `text` so it displays literally.
    pub fn from_text(text: &str) -> Self {
        Self(escape_html(text))
    }

    /// Wraps markup that is already safe. The caller vouches for its content.
    pub fn raw_unsafe(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HtmlString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl IntoValue for HtmlString {
    fn into_value(self) -> Value {
        Value::Html(self.0)
    }
}

/// A JavaScript literal, escaped when it is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsString(String);

impl JsString {
    /// A quoted string literal.
    pub fn for_string(s: &str) -> Self {
        Self(quote_js(s))
    }

    pub fn for_number<N: fmt::Display>(n: N) -> Self {
        Self(n.to_string())
    }

    pub fn for_bool(b: bool) -> Self {
        Self(b.to_string())
    }

    /// An array or object literal mirroring the JSON form of `value`.
    pub fn for_json(value: &serde_json::Value) -> Self {
        Self(js_literal(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl IntoValue for JsString {
    fn into_value(self) -> Value {
        Value::Script(self.0)
    }
}

fn js_literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => quote_js(s),
        serde_json::Value::Array(items) => {
            let items: Vec<String> = items.iter().map(js_literal).collect();
            format!("[{}]", items.join(","))
        }
        serde_json::Value::Object(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}:{}", quote_js(k), js_literal(v)))
                .collect();
            format!("{{{}}}", entries.join(",\n"))
        }
    }
}

fn is_html_safe(c: char) -> bool {
    (' '..'~').contains(&c) && !"<>'\\\"&".contains(c)
}

/// Escapes everything outside printable ASCII along with the markup-significant characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if is_html_safe(c) {
            out.push(c);
            continue;
        }
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => {
                out.push_str("&#");
                out.push_str(&(c as u32).to_string());
                out.push(';');
            }
        }
    }
    out
}

fn quote_js(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if is_html_safe(c) {
            out.push(c);
        } else if (c as u32) < 256 {
            out.push_str(&format!("\\{:03o}", c as u32));
        } else if (c as u32) <= 0xFFFF {
            out.push_str(&format!("\\u{:04x}", c as u32));
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out.push('\'');
    out
}
