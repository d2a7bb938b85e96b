//! Statically evaluated JavaScript values.
//!
//! The static evaluator produces these; they mirror what a JS engine would
//! compute for purely static expressions. Object keys are always strings
//! (as in JS); insertion order is preserved. `Lambda` carries the body
//! expression of a single-return-statement function so that calls to it
//! can be evaluated lazily.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;

use super::NodeId;

#[derive(Debug, Clone)]
pub enum JsVal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Array(Vec<JsVal>),
    Object(Vec<(String, JsVal)>),
    Lambda(NodeId),
}

impl JsVal {
    pub fn str(s: impl Into<String>) -> Self {
        JsVal::Str(s.into())
    }

    pub fn nan() -> Self {
        JsVal::Float(f64::NAN)
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, JsVal::Float(f) if f.is_nan())
    }

    /// JS truthiness. Note that `[]` and `{}` are truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            JsVal::Str(s) => !s.is_empty(),
            JsVal::Int(i) => *i != 0,
            JsVal::Float(f) => *f != 0.0 && !f.is_nan(),
            JsVal::Bool(b) => *b,
            JsVal::Null => false,
            JsVal::Array(_) | JsVal::Object(_) | JsVal::Lambda(_) => true,
        }
    }

    /// Numeric view for Int/Float/Bool. `None` for everything else.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            JsVal::Int(i) => Some(*i as f64),
            JsVal::Float(f) => Some(*f),
            JsVal::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Operand classification for the `+` operator: numbers, booleans and
    /// null add numerically (null counts as 0), everything else
    /// concatenates as strings.
    pub fn is_numeric_for_addition(&self) -> bool {
        matches!(
            self,
            JsVal::Int(_) | JsVal::Float(_) | JsVal::Bool(_) | JsVal::Null
        )
    }

    /// String coercion as performed by JS string concatenation:
    /// arrays join their elements with commas, objects become
    /// `[object Object]`, null becomes `"null"`.
    pub fn to_js_string(&self) -> String {
        match self {
            JsVal::Str(s) => s.clone(),
            JsVal::Int(i) => i.to_string(),
            JsVal::Float(f) => format_js_number(*f),
            JsVal::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            JsVal::Null => "null".to_string(),
            JsVal::Array(items) => items
                .iter()
                .map(|v| v.to_js_string())
                .collect::<Vec<_>>()
                .join(","),
            JsVal::Object(_) => "[object Object]".to_string(),
            JsVal::Lambda(_) => "<function>".to_string(),
        }
    }

    /// Canonical object-key form of this value (`{1: x}` and `{"1": x}`
    /// denote the same key).
    pub fn key_string(&self) -> String {
        self.to_js_string()
    }

    /// Numeric/string comparison for the relational operators.
    /// `None` when the operand types do not compare.
    pub fn compare(&self, other: &JsVal) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a.partial_cmp(&b);
        }
        if let (JsVal::Str(a), JsVal::Str(b)) = (self, other) {
            return Some(a.cmp(b));
        }
        None
    }

    pub fn object_get(&self, key: &str) -> Option<&JsVal> {
        match self {
            JsVal::Object(entries) => entries
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn object_set(&mut self, key: String, value: JsVal) {
        if let JsVal::Object(entries) = self {
            if let Some(entry) = entries.iter_mut().find(|(k, _)| *k == key) {
                entry.1 = value;
            } else {
                entries.push((key, value));
            }
        }
    }
}

/// Loose equality mirroring what the original analysis computed with
/// Python `==`: numbers, booleans and ints compare numerically
/// (`0 == false`), strings by content, containers recursively.
/// NaN is never equal to anything.
impl PartialEq for JsVal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JsVal::Null, JsVal::Null) => true,
            (JsVal::Str(a), JsVal::Str(b)) => a == b,
            (JsVal::Array(a), JsVal::Array(b)) => a == b,
            (JsVal::Object(a), JsVal::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.iter().any(|(k2, v2)| k == k2 && v == v2))
            }
            (JsVal::Lambda(a), JsVal::Lambda(b)) => a == b,
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

fn format_js_number(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        format!("{}", f)
    }
}

impl Serialize for JsVal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            JsVal::Str(s) => serializer.serialize_str(s),
            JsVal::Int(i) => serializer.serialize_i64(*i),
            JsVal::Float(f) => {
                if f.is_finite() {
                    serializer.serialize_f64(*f)
                } else {
                    serializer.serialize_str(&format_js_number(*f))
                }
            }
            JsVal::Bool(b) => serializer.serialize_bool(*b),
            JsVal::Null => serializer.serialize_none(),
            JsVal::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            JsVal::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            JsVal::Lambda(_) => serializer.serialize_str("<function>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!JsVal::str("").is_truthy());
        assert!(JsVal::str("x").is_truthy());
        assert!(!JsVal::Int(0).is_truthy());
        assert!(!JsVal::nan().is_truthy());
        assert!(!JsVal::Null.is_truthy());
        // [] and {} are truthy in JS
        assert!(JsVal::Array(vec![]).is_truthy());
        assert!(JsVal::Object(vec![]).is_truthy());
    }

    #[test]
    fn test_string_coercion() {
        assert_eq!(
            JsVal::Array(vec![JsVal::Int(1), JsVal::Int(2)]).to_js_string(),
            "1,2"
        );
        assert_eq!(JsVal::Object(vec![]).to_js_string(), "[object Object]");
        assert_eq!(JsVal::Null.to_js_string(), "null");
        assert_eq!(JsVal::Float(42.0).to_js_string(), "42");
        assert_eq!(JsVal::Float(f64::NAN).to_js_string(), "NaN");
    }

    #[test]
    fn test_loose_equality() {
        assert_eq!(JsVal::Int(0), JsVal::Bool(false));
        assert_eq!(JsVal::Int(1), JsVal::Float(1.0));
        assert_ne!(JsVal::str("1"), JsVal::Int(1));
        assert_ne!(JsVal::nan(), JsVal::nan());
    }
}
