//! Attribute values.
//!
//! Wire formats carry loosely-typed values. Inside the model every value is one
//! variant of [`AttributeValue`], and every conversion (type check, text form,
//! JSON form) matches on it exhaustively.

use crate::attribute_set::AttributeSet;
use serde_json::{Map, Number, Value};

/// A concrete attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Plain string.
    String(String),
    /// Integer or float; the textual form is preserved.
    Number(Number),
    /// Boolean.
    Bool(bool),
    /// JSON array.
    Array(Vec<Value>),
    /// JSON object.
    Object(Map<String, Value>),
    /// Reference to another entity by location, with an optional kind hint.
    EntityRef {
        /// Location of the referenced entity.
        location: String,
        /// Kind identifier of the referenced entity, if known.
        kind: Option<String>,
    },
    /// Reference to a category by identifier.
    CategoryRef(String),
    /// A nested attribute set stored as a value.
    Nested(AttributeSet),
}

impl AttributeValue {
    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Bool(_) => "boolean",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::EntityRef { .. } => "entity reference",
            Self::CategoryRef(_) => "category reference",
            Self::Nested(_) => "attribute set",
        }
    }

    /// Build a number value from a float. Returns `None` for NaN/infinite.
    pub fn float(v: f64) -> Option<Self> {
        Number::from_f64(v).map(Self::Number)
    }

    /// Reference to an entity location without a kind hint.
    pub fn entity_ref(location: impl Into<String>) -> Self {
        Self::EntityRef {
            location: location.into(),
            kind: None,
        }
    }

    /// Whether the value renders as a string on the wire.
    pub fn is_string_like(&self) -> bool {
        matches!(
            self,
            Self::String(_) | Self::EntityRef { .. } | Self::CategoryRef(_)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::EntityRef { location, .. } => Some(location),
            Self::CategoryRef(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The flat string form of the value, as matched against patterns and
    /// written into text bodies. Nested sets have no flat form.
    pub fn string_form(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Number(n) => Some(n.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Array(items) => Some(Value::Array(items.clone()).to_string()),
            Self::Object(map) => Some(Value::Object(map.clone()).to_string()),
            Self::EntityRef { location, .. } => Some(location.clone()),
            Self::CategoryRef(id) => Some(id.clone()),
            Self::Nested(_) => None,
        }
    }

    /// Convert a JSON value. `null` means "no value".
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(b)),
            Value::Number(n) => Some(Self::Number(n)),
            Value::String(s) => Some(Self::String(s)),
            Value::Array(items) => Some(Self::Array(items)),
            Value::Object(map) => Some(Self::Object(map)),
        }
    }

    /// JSON form of the value. References collapse to their string form.
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Number(n) => Value::Number(n.clone()),
            Self::Bool(b) => Value::Bool(*b),
            Self::Array(items) => Value::Array(items.clone()),
            Self::Object(map) => Value::Object(map.clone()),
            Self::EntityRef { location, .. } => Value::String(location.clone()),
            Self::CategoryRef(id) => Value::String(id.clone()),
            Self::Nested(set) => set.to_json(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for AttributeValue {
    fn from(n: i32) -> Self {
        Self::Number(Number::from(n))
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        Self::Number(Number::from(n))
    }
}

impl From<u64> for AttributeValue {
    fn from(n: u64) -> Self {
        Self::Number(Number::from(n))
    }
}

impl From<Vec<Value>> for AttributeValue {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<Map<String, Value>> for AttributeValue {
    fn from(map: Map<String, Value>) -> Self {
        Self::Object(map)
    }
}

impl From<AttributeSet> for AttributeValue {
    fn from(set: AttributeSet) -> Self {
        Self::Nested(set)
    }
}
