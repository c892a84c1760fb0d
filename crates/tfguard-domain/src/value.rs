//! The decoded configuration value model.
//!
//! Every string coming out of a decoder is parsed once, here, into either a plain
//! scalar or a [`Template`] carrying its reference AST. Resolution then works on
//! these nodes by pattern matching; nothing is re-scanned from text.

use crate::functions::{Arithmetic, FunctionCall};
use crate::reference::{self, Template};
use indexmap::IndexMap;
use serde_json::{Number, Value as JsonValue};
use std::fmt;

pub type Mapping = IndexMap<String, ConfigValue>;

#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view used by arithmetic and `element`: numbers and numeric strings qualify.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => n.as_f64(),
            Scalar::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Text used when a scalar is spliced into a larger string or used as a map key.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Number(n) => n.to_string(),
            Scalar::String(s) => s.clone(),
        }
    }
}

/// A node of a decoded configuration tree.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigValue {
    Scalar(Scalar),
    Sequence(Vec<ConfigValue>),
    Mapping(Mapping),
    /// A string holding at least one interpolation or a bare reference.
    Reference(Template),
    FunctionCall(FunctionCall),
    Arithmetic(Box<Arithmetic>),
}

impl ConfigValue {
    pub fn null() -> Self {
        ConfigValue::Scalar(Scalar::Null)
    }

    pub fn string(s: impl Into<String>) -> Self {
        ConfigValue::Scalar(Scalar::String(s.into()))
    }

    pub fn number_f64(f: f64) -> Option<Self> {
        Number::from_f64(f).map(|n| ConfigValue::Scalar(Scalar::Number(n)))
    }

    /// Convert a decoder tree, parsing every string for references.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => ConfigValue::null(),
            JsonValue::Bool(b) => ConfigValue::Scalar(Scalar::Bool(b)),
            JsonValue::Number(n) => ConfigValue::Scalar(Scalar::Number(n)),
            JsonValue::String(s) => reference::parse_string(&s),
            JsonValue::Array(items) => {
                ConfigValue::Sequence(items.into_iter().map(ConfigValue::from_json).collect())
            }
            JsonValue::Object(map) => ConfigValue::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, ConfigValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert a decoder tree without reference parsing (override values are literal).
    pub fn literal_from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::String(s) => ConfigValue::string(s),
            JsonValue::Array(items) => ConfigValue::Sequence(
                items.into_iter().map(ConfigValue::literal_from_json).collect(),
            ),
            JsonValue::Object(map) => ConfigValue::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, ConfigValue::literal_from_json(v)))
                    .collect(),
            ),
            other => ConfigValue::from_json(other),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            ConfigValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            ConfigValue::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// True when no reference, call or arithmetic node remains anywhere in the tree.
    pub fn is_resolved(&self) -> bool {
        match self {
            ConfigValue::Scalar(_) => true,
            ConfigValue::Sequence(items) => items.iter().all(ConfigValue::is_resolved),
            ConfigValue::Mapping(map) => map.values().all(ConfigValue::is_resolved),
            ConfigValue::Reference(_)
            | ConfigValue::FunctionCall(_)
            | ConfigValue::Arithmetic(_) => false,
        }
    }

    /// True when every remaining reference has permanently failed, so another pass
    /// cannot change the value.
    pub fn is_settled(&self) -> bool {
        match self {
            ConfigValue::Scalar(_) => true,
            ConfigValue::Sequence(items) => items.iter().all(ConfigValue::is_settled),
            ConfigValue::Mapping(map) => map.values().all(ConfigValue::is_settled),
            ConfigValue::Reference(t) => t.is_settled(),
            ConfigValue::FunctionCall(call) => call.args.iter().all(ConfigValue::is_settled),
            ConfigValue::Arithmetic(a) => a.lhs.is_settled() && a.rhs.is_settled(),
        }
    }

    /// Truthiness used by `coalesce`: empty strings, zero, false, null and empty
    /// collections are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            ConfigValue::Scalar(Scalar::Null) => false,
            ConfigValue::Scalar(Scalar::Bool(b)) => *b,
            ConfigValue::Scalar(Scalar::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            ConfigValue::Scalar(Scalar::String(s)) => !s.is_empty(),
            ConfigValue::Sequence(items) => !items.is_empty(),
            ConfigValue::Mapping(map) => !map.is_empty(),
            ConfigValue::Reference(_)
            | ConfigValue::FunctionCall(_)
            | ConfigValue::Arithmetic(_) => true,
        }
    }

    /// Text spliced into a partially interpolated string.
    pub fn to_text(&self) -> String {
        match self {
            ConfigValue::Scalar(s) => s.to_text(),
            ConfigValue::Reference(t) => t.source_text(),
            ConfigValue::FunctionCall(call) => call.to_string(),
            ConfigValue::Arithmetic(a) => a.to_string(),
            ConfigValue::Sequence(_) | ConfigValue::Mapping(_) => self.to_json().to_string(),
        }
    }

    /// JSON view of the value; unresolved nodes appear as their source text.
    pub fn to_json(&self) -> JsonValue {
        match self {
            ConfigValue::Scalar(Scalar::Null) => JsonValue::Null,
            ConfigValue::Scalar(Scalar::Bool(b)) => JsonValue::Bool(*b),
            ConfigValue::Scalar(Scalar::Number(n)) => JsonValue::Number(n.clone()),
            ConfigValue::Scalar(Scalar::String(s)) => JsonValue::String(s.clone()),
            ConfigValue::Sequence(items) => {
                JsonValue::Array(items.iter().map(ConfigValue::to_json).collect())
            }
            ConfigValue::Mapping(map) => JsonValue::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            other => JsonValue::String(other.to_text()),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::string(s)
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::string(s)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Scalar(Scalar::Bool(b))
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        ConfigValue::Scalar(Scalar::Number(n.into()))
    }
}

impl From<i32> for ConfigValue {
    fn from(n: i32) -> Self {
        ConfigValue::Scalar(Scalar::Number(i64::from(n).into()))
    }
}

impl<T: Into<ConfigValue>> From<Vec<T>> for ConfigValue {
    fn from(items: Vec<T>) -> Self {
        ConfigValue::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl From<Mapping> for ConfigValue {
    fn from(map: Mapping) -> Self {
        ConfigValue::Mapping(map)
    }
}
