//! Attribute definitions and single attributes.
//!
//! An [`AttributeDefinition`] is the schema of one attribute. Categories hold
//! them in [`AttributeDefinitions`], keyed by the full dotted attribute name,
//! and entities bind them to live [`Attribute`]s when their attribute set is
//! reset. Definitions are immutable once built and shared through `Arc`.

use crate::config::ValidationConfig;
use crate::error::{OcciError, OcciResult};
use crate::value::AttributeValue;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// Prefix reserved for bookkeeping keys; no attribute name segment may use it.
pub const RESERVED_PREFIX: char = '_';

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    /// URI reference (absolute or relative).
    Uri,
}

impl AttributeType {
    /// Whether a value of this runtime variant may be stored under this type.
    pub fn accepts(&self, value: &AttributeValue) -> bool {
        match (self, value) {
            (Self::String, v) => v.is_string_like(),
            (Self::Uri, AttributeValue::String(s)) => is_uri_reference(s),
            (Self::Uri, v) => v.is_string_like(),
            (Self::Number, AttributeValue::Number(_)) => true,
            (Self::Boolean, AttributeValue::Bool(_)) => true,
            (Self::Array, AttributeValue::Array(_)) => true,
            (Self::Object, AttributeValue::Object(_) | AttributeValue::Nested(_)) => true,
            _ => false,
        }
    }

    /// Whether values of this type are written without quotes in text bodies.
    pub fn is_bare(&self) -> bool {
        matches!(self, Self::Number | Self::Boolean)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
            Self::Array => write!(f, "array"),
            Self::Object => write!(f, "object"),
            Self::Uri => write!(f, "uri"),
        }
    }
}

impl FromStr for AttributeType {
    type Err = OcciError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            "array" => Ok(Self::Array),
            "object" => Ok(Self::Object),
            "uri" => Ok(Self::Uri),
            other => Err(OcciError::AttributePropertyType(format!(
                "unknown attribute type {other:?}"
            ))),
        }
    }
}

fn is_uri_reference(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    if url::Url::parse(s).is_ok() {
        return true;
    }
    url::Url::parse("http://localhost/")
        .map(|base| base.join(s).is_ok())
        .unwrap_or(false)
}

/// Check a single name segment or a full dotted name for the reserved prefix.
pub(crate) fn validate_name(name: &str) -> OcciResult<()> {
    if name.is_empty() || name.split('.').any(str::is_empty) {
        return Err(OcciError::AttributeNameInvalid(format!(
            "attribute name {name:?} has an empty segment"
        )));
    }
    if name.split('.').any(|s| s.starts_with(RESERVED_PREFIX)) {
        return Err(OcciError::AttributeNameInvalid(format!(
            "attribute names (as in {name:?}) must not begin with underscores"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct Pattern {
    source: String,
    regex: Regex,
}

/// Schema of one attribute.
#[derive(Debug, Clone)]
pub struct AttributeDefinition {
    attr_type: AttributeType,
    required: bool,
    mutable: bool,
    default: Option<AttributeValue>,
    pattern: Option<Pattern>,
    description: Option<String>,
}

impl PartialEq for AttributeDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.attr_type == other.attr_type
            && self.required == other.required
            && self.mutable == other.mutable
            && self.default == other.default
            && self.pattern() == other.pattern()
            && self.description == other.description
    }
}

impl AttributeDefinition {
    /// Optional, mutable definition of the given type.
    pub fn new(attr_type: AttributeType) -> Self {
        Self {
            attr_type,
            required: false,
            mutable: true,
            default: None,
            pattern: None,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.mutable = false;
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_mutable(mut self, mutable: bool) -> Self {
        self.mutable = mutable;
        self
    }

    /// Set the default value. It must satisfy the declared type.
    pub fn with_default(mut self, value: impl Into<AttributeValue>) -> OcciResult<Self> {
        let value = value.into();
        self.check_type(&value)?;
        self.default = Some(value);
        Ok(self)
    }

    /// Set the validation pattern. It is matched against the whole value.
    pub fn with_pattern(mut self, pattern: &str) -> OcciResult<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            OcciError::AttributeDefinition(format!("invalid pattern {pattern:?}: {e}"))
        })?;
        self.pattern = Some(Pattern {
            source: pattern.to_string(),
            regex,
        });
        Ok(self)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn attr_type(&self) -> AttributeType {
        self.attr_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn default_value(&self) -> Option<&AttributeValue> {
        self.default.as_ref()
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(|p| p.source.as_str())
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Fails `AttributeType` when the value variant is not accepted.
    pub fn check_type(&self, value: &AttributeValue) -> OcciResult<()> {
        if self.attr_type.accepts(value) {
            Ok(())
        } else {
            Err(OcciError::AttributeType(format!(
                "value of type {} assigned but attribute of type {} required",
                value.type_name(),
                self.attr_type
            )))
        }
    }

    /// Match the value against the pattern. Mismatches are errors only when
    /// the configuration enforces patterns, otherwise they are logged.
    pub fn check_pattern(&self, value: &AttributeValue, config: &ValidationConfig) -> OcciResult<()> {
        let Some(pattern) = &self.pattern else {
            return Ok(());
        };
        if !config.enforces_patterns() {
            warn!(
                pattern = %pattern.source,
                "Skipping pattern check on attribute, pattern verification is disabled"
            );
            return Ok(());
        }
        let text = value.string_form().ok_or_else(|| {
            OcciError::AttributeType(format!(
                "value of type {} cannot be matched against pattern {}",
                value.type_name(),
                pattern.source
            ))
        })?;
        if pattern.regex.is_match(&text) {
            Ok(())
        } else {
            Err(OcciError::AttributeType(format!(
                "value {text} does not match pattern {}",
                pattern.source
            )))
        }
    }
}

/// Attribute definitions of a category, keyed by full dotted name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeDefinitions {
    entries: BTreeMap<String, Arc<AttributeDefinition>>,
}

impl AttributeDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a definition.
    pub fn insert(
        &mut self,
        name: &str,
        definition: impl Into<Arc<AttributeDefinition>>,
    ) -> OcciResult<()> {
        validate_name(name)?;
        self.entries.insert(name.to_string(), definition.into());
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(
        mut self,
        name: &str,
        definition: impl Into<Arc<AttributeDefinition>>,
    ) -> OcciResult<Self> {
        self.insert(name, definition)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<AttributeDefinition>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<AttributeDefinition>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy every definition of `other` into `self`, replacing same-named ones.
    pub fn overlay(&mut self, other: &AttributeDefinitions) {
        for (name, def) in &other.entries {
            self.entries.insert(name.clone(), Arc::clone(def));
        }
    }

    /// Names defined in both sets.
    pub fn conflicts<'a>(&'a self, other: &'a AttributeDefinitions) -> Vec<&'a str> {
        self.entries
            .keys()
            .filter(|k| other.entries.contains_key(*k))
            .map(String::as_str)
            .collect()
    }

    /// Whether `name` is a proper prefix of some defined name, i.e. names a
    /// nested set rather than a leaf.
    pub fn is_group(&self, name: &str) -> bool {
        let prefix = format!("{name}.");
        self.entries.keys().any(|k| k.starts_with(&prefix))
    }
}

/// A live attribute: an optional value bound to an optional definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attribute {
    value: Option<AttributeValue>,
    definition: Option<Arc<AttributeDefinition>>,
}

impl Attribute {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unbound attribute holding a value.
    pub fn with_value(value: impl Into<AttributeValue>) -> Self {
        Self {
            value: Some(value.into()),
            definition: None,
        }
    }

    /// Empty attribute bound to a definition.
    pub fn with_definition(definition: Arc<AttributeDefinition>) -> Self {
        Self {
            value: None,
            definition: Some(definition),
        }
    }

    pub fn value(&self) -> Option<&AttributeValue> {
        self.value.as_ref()
    }

    pub fn definition(&self) -> Option<&Arc<AttributeDefinition>> {
        self.definition.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Store a value, type-checking it against the bound definition first.
    /// On failure the attribute is left untouched.
    pub fn set_value(&mut self, value: Option<AttributeValue>) -> OcciResult<()> {
        if let (Some(def), Some(v)) = (&self.definition, &value) {
            def.check_type(v)?;
        }
        self.value = value;
        Ok(())
    }

    pub fn take_value(&mut self) -> Option<AttributeValue> {
        self.value.take()
    }

    pub(crate) fn bind(&mut self, definition: Arc<AttributeDefinition>) {
        self.definition = Some(definition);
    }

    /// Fill the definition default when no value is present.
    pub fn default_value(&mut self) {
        if self.value.is_none() {
            self.force_default();
        }
    }

    /// Replace the value with the definition default (or nothing).
    pub fn force_default(&mut self) {
        self.value = self
            .definition
            .as_ref()
            .and_then(|d| d.default_value().cloned());
    }

    /// Check the value against the bound definition: required-ness, type and
    /// (depending on `config`) pattern.
    pub fn validate(&self, config: &ValidationConfig) -> OcciResult<()> {
        let def = self.definition.as_ref().ok_or_else(|| {
            OcciError::AttributeNotDefined("attribute has no definition".to_string())
        })?;
        match &self.value {
            None if def.is_required() => Err(OcciError::AttributeMissing(
                "required attribute has no value".to_string(),
            )),
            None => Ok(()),
            Some(value) => {
                def.check_type(value)?;
                def.check_pattern(value, config)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number_def() -> Arc<AttributeDefinition> {
        Arc::new(AttributeDefinition::new(AttributeType::Number).required())
    }

    #[test]
    fn test_type_table() {
        let s = AttributeValue::from("x");
        let n = AttributeValue::from(1);
        let b = AttributeValue::from(true);
        let e = AttributeValue::entity_ref("/compute/1");

        assert!(AttributeType::String.accepts(&s));
        assert!(AttributeType::String.accepts(&e));
        assert!(!AttributeType::String.accepts(&n));
        assert!(AttributeType::Number.accepts(&n));
        assert!(!AttributeType::Number.accepts(&s));
        assert!(AttributeType::Boolean.accepts(&b));
        assert!(!AttributeType::Boolean.accepts(&s));
        assert!(AttributeType::Uri.accepts(&e));
        assert!(AttributeType::Uri.accepts(&AttributeValue::from("/network/1")));
        assert!(AttributeType::Uri.accepts(&AttributeValue::from("http://a.b/c")));
        assert!(!AttributeType::Uri.accepts(&AttributeValue::from("not a uri")));
        assert!(AttributeType::Array.accepts(&AttributeValue::Array(vec![])));
        assert!(AttributeType::Object.accepts(&AttributeValue::Object(Default::default())));
    }

    #[test]
    fn test_type_parsing() {
        for attr_type in [
            AttributeType::String,
            AttributeType::Number,
            AttributeType::Boolean,
            AttributeType::Array,
            AttributeType::Object,
            AttributeType::Uri,
        ] {
            assert_eq!(attr_type.to_string().parse::<AttributeType>().unwrap(), attr_type);
        }
        for name in ["blob", "numeric", "integer", "float", "bool", "hash", "url", "Boolean", " string"] {
            assert!(
                matches!(name.parse::<AttributeType>(), Err(OcciError::AttributePropertyType(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_default_must_match_type() {
        let err = AttributeDefinition::new(AttributeType::Number)
            .with_default("two")
            .unwrap_err();
        assert!(matches!(err, OcciError::AttributeType(_)));

        let def = AttributeDefinition::new(AttributeType::String)
            .with_default("inactive")
            .unwrap();
        assert_eq!(def.default_value(), Some(&AttributeValue::from("inactive")));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = AttributeDefinition::new(AttributeType::String)
            .with_pattern("(unclosed")
            .unwrap_err();
        assert!(matches!(err, OcciError::AttributeDefinition(_)));
    }

    #[test]
    fn test_set_value_type_checks_without_mutation() {
        let mut attr = Attribute::with_definition(number_def());
        attr.set_value(Some(AttributeValue::from(2))).unwrap();
        let err = attr.set_value(Some(AttributeValue::from("two"))).unwrap_err();
        assert!(matches!(err, OcciError::AttributeType(_)));
        assert_eq!(attr.value(), Some(&AttributeValue::from(2)));
    }

    #[test]
    fn test_validate_required() {
        let attr = Attribute::with_definition(number_def());
        let err = attr.validate(&ValidationConfig::default()).unwrap_err();
        assert!(matches!(err, OcciError::AttributeMissing(_)));

        let unbound = Attribute::with_value(1);
        assert!(matches!(
            unbound.validate(&ValidationConfig::default()),
            Err(OcciError::AttributeNotDefined(_))
        ));
    }

    #[test]
    fn test_pattern_enforcement_follows_config() {
        let def = Arc::new(
            AttributeDefinition::new(AttributeType::String)
                .with_pattern("[a-z]+")
                .unwrap(),
        );
        let mut attr = Attribute::with_definition(def);
        attr.set_value(Some(AttributeValue::from("abc1"))).unwrap();

        let err = attr.validate(&ValidationConfig::default()).unwrap_err();
        assert!(matches!(err, OcciError::AttributeType(_)));
        assert!(attr.validate(&ValidationConfig::lenient()).is_ok());

        attr.set_value(Some(AttributeValue::from("abc"))).unwrap();
        assert!(attr.validate(&ValidationConfig::default()).is_ok());
    }

    #[test]
    fn test_defaults() {
        let def = Arc::new(
            AttributeDefinition::new(AttributeType::String)
                .with_default("inactive")
                .unwrap(),
        );
        let mut attr = Attribute::with_definition(def);
        attr.default_value();
        assert_eq!(attr.value(), Some(&AttributeValue::from("inactive")));

        attr.set_value(Some(AttributeValue::from("active"))).unwrap();
        attr.default_value();
        assert_eq!(attr.value(), Some(&AttributeValue::from("active")));
        attr.force_default();
        assert_eq!(attr.value(), Some(&AttributeValue::from("inactive")));
    }

    #[test]
    fn test_definitions_names_and_conflicts() {
        let a = AttributeDefinitions::new()
            .with("org.x.y", AttributeDefinition::new(AttributeType::String))
            .unwrap()
            .with("org.x.z", AttributeDefinition::new(AttributeType::Number))
            .unwrap();
        let b = AttributeDefinitions::new()
            .with("org.x.y", AttributeDefinition::new(AttributeType::String))
            .unwrap();
        assert_eq!(a.conflicts(&b), vec!["org.x.y"]);
        assert!(a.is_group("org.x"));
        assert!(!a.is_group("org.x.y"));

        let mut bad = AttributeDefinitions::new();
        assert!(matches!(
            bad.insert("org._x", AttributeDefinition::new(AttributeType::String)),
            Err(OcciError::AttributeNameInvalid(_))
        ));
    }
}
