//! The typed tree produced by [`super::parse::decode`] (spec §4.6).
//!
//! Array-ness lives at the `Item` level (`arrflag` plus multiple `values`),
//! not in `Value` itself: a `Value` is only ever a scalar or a nested object.

use super::Object;

/// A single decoded value: a string scalar or a nested object. A scalar
/// carries `escaped`: `true` means `text` is the raw source bytes and may
/// still contain `\`-escapes; `false` means it has already been unescaped
/// (spec §3, §4.6.2 step 6 / the `strip` flag `decode` is called with).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar { text: String, escaped: bool },
    Object(Object),
}

impl Value {
    pub fn scalar(text: impl Into<String>, escaped: bool) -> Self {
        Value::Scalar { text: text.into(), escaped }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar { text, .. } => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn is_escaped(&self) -> bool {
        matches!(self, Value::Scalar { escaped: true, .. })
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }
}

/// Produces an already-unescaped scalar; use [`Value::scalar`] directly to
/// mark raw, still-escaped text.
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar { text: s, escaped: false }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar { text: s.to_string(), escaped: false }
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}
