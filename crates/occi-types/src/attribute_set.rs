//! Recursive attribute container with dotted-path access.
//!
//! `occi.core.id` is stored as key `id` inside the nested set `core` inside
//! the nested set `occi`. Paths are split on `.` and resolved one segment at a
//! time; writes create intermediate sets, reads through a missing one fail.

use crate::attribute::{validate_name, Attribute, AttributeDefinitions, AttributeType};
use crate::config::ValidationConfig;
use crate::error::{OcciError, OcciResult};
use crate::value::AttributeValue;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// One entry of an [`AttributeSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Value(Attribute),
    Set(AttributeSet),
}

impl Node {
    fn ensure_set(&mut self) -> &mut AttributeSet {
        if !matches!(self, Node::Set(_)) {
            *self = Node::Set(AttributeSet::new());
        }
        match self {
            Node::Set(set) => set,
            Node::Value(_) => unreachable!("node was converted to a set above"),
        }
    }

    fn ensure_value(&mut self) -> &mut Attribute {
        if !matches!(self, Node::Value(_)) {
            *self = Node::Value(Attribute::new());
        }
        match self {
            Node::Value(attr) => attr,
            Node::Set(_) => unreachable!("node was converted to a value above"),
        }
    }
}

/// Ordered map of attribute names to attributes or nested sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    entries: BTreeMap<String, Node>,
}

fn missing(key: &str) -> OcciError {
    OcciError::AttributeMissing(format!("attribute with key {key} not found"))
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a nested set from flat dotted-name pairs.
    pub fn split<I, K, V>(pairs: I) -> OcciResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<AttributeValue>,
    {
        let mut set = Self::new();
        for (name, value) in pairs {
            set.set(name.as_ref(), value)?;
        }
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Top-level entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entry at a dotted path. A missing intermediate set fails
    /// `AttributeMissing`; a missing final segment is `None`.
    pub fn node(&self, name: &str) -> OcciResult<Option<&Node>> {
        match name.split_once('.') {
            None => Ok(self.entries.get(name)),
            Some((head, rest)) => match self.entries.get(head) {
                Some(Node::Set(set)) => set.node(rest),
                _ => Err(missing(head)),
            },
        }
    }

    fn node_mut(&mut self, name: &str) -> OcciResult<Option<&mut Node>> {
        match name.split_once('.') {
            None => Ok(self.entries.get_mut(name)),
            Some((head, rest)) => match self.entries.get_mut(head) {
                Some(Node::Set(set)) => set.node_mut(rest),
                _ => Err(missing(head)),
            },
        }
    }

    /// The set owning the last segment of `name`, created along the way.
    fn owner_mut<'n>(&mut self, name: &'n str) -> (&mut AttributeSet, &'n str) {
        match name.split_once('.') {
            None => (self, name),
            Some((head, rest)) => self
                .entries
                .entry(head.to_string())
                .or_insert_with(|| Node::Set(AttributeSet::new()))
                .ensure_set()
                .owner_mut(rest),
        }
    }

    /// Leaf attribute at `name`, created (unbound and empty) if absent.
    fn attribute_entry(&mut self, name: &str) -> &mut Attribute {
        let (owner, key) = self.owner_mut(name);
        owner
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Node::Value(Attribute::new()))
            .ensure_value()
    }

    /// Attribute at a dotted path.
    pub fn get(&self, name: &str) -> OcciResult<Option<&Attribute>> {
        Ok(match self.node(name)? {
            Some(Node::Value(attr)) => Some(attr),
            _ => None,
        })
    }

    /// Value at a dotted path.
    pub fn value(&self, name: &str) -> OcciResult<Option<&AttributeValue>> {
        Ok(self.get(name)?.and_then(Attribute::value))
    }

    /// Whether a leaf attribute (with or without value) exists at `name`.
    pub fn contains(&self, name: &str) -> bool {
        matches!(self.node(name), Ok(Some(Node::Value(_))))
    }

    /// Store a value. If a definition is bound at `name` the value is
    /// type-checked first and nothing changes on mismatch.
    pub fn set(&mut self, name: &str, value: impl Into<AttributeValue>) -> OcciResult<()> {
        self.assign(name, Some(value.into()))
    }

    /// Clear the value at `name`, keeping any bound definition.
    pub fn unset(&mut self, name: &str) -> OcciResult<()> {
        self.assign(name, None)
    }

    /// Like [`set`](Self::set), but fails `AttributeNotDefined` unless a
    /// definition is already bound at `name`.
    pub fn set_defined(&mut self, name: &str, value: impl Into<AttributeValue>) -> OcciResult<()> {
        validate_name(name)?;
        let not_defined =
            || OcciError::AttributeNotDefined(format!("attribute {name} has no definition"));
        match self.node_mut(name).map_err(|_| not_defined())? {
            Some(Node::Value(attr)) if attr.definition().is_some() => {
                attr.set_value(Some(value.into()))
            }
            _ => Err(not_defined()),
        }
    }

    fn assign(&mut self, name: &str, value: Option<AttributeValue>) -> OcciResult<()> {
        validate_name(name)?;
        if let Ok(Some(Node::Value(attr))) = self.node_mut(name) {
            return attr.set_value(value);
        }
        let (owner, key) = self.owner_mut(name);
        let mut attr = Attribute::new();
        attr.set_value(value)?;
        owner.entries.insert(key.to_string(), Node::Value(attr));
        Ok(())
    }

    /// Remove the entry at `name` entirely.
    pub fn delete(&mut self, name: &str) -> Option<Node> {
        match name.split_once('.') {
            None => self.entries.remove(name),
            Some((head, rest)) => match self.entries.get_mut(head) {
                Some(Node::Set(set)) => set.delete(rest),
                _ => None,
            },
        }
    }

    /// Add entries of `other` that `self` does not have. Existing entries
    /// win; nested sets are merged recursively.
    pub fn merge(&mut self, other: &AttributeSet) {
        for (key, node) in &other.entries {
            match (self.entries.get_mut(key), node) {
                (None, _) => {
                    self.entries.insert(key.clone(), node.clone());
                }
                (Some(Node::Set(mine)), Node::Set(theirs)) => mine.merge(theirs),
                (Some(_), _) => {}
            }
        }
    }

    /// Remove every entry whose key appears in `other`, recursing where both
    /// sides hold nested sets.
    pub fn remove(&mut self, other: &AttributeSet) {
        for (key, node) in &other.entries {
            match (self.entries.get_mut(key), node) {
                (Some(Node::Set(mine)), Node::Set(theirs)) => mine.remove(theirs),
                (Some(_), _) => {
                    self.entries.remove(key);
                }
                (None, _) => {}
            }
        }
    }

    /// Flattened `full.dotted.name -> value` map. Empty attributes are skipped.
    pub fn names(&self) -> BTreeMap<String, AttributeValue> {
        self.attributes()
            .into_iter()
            .filter_map(|(name, attr)| attr.value().cloned().map(|v| (name, v)))
            .collect()
    }

    /// Every leaf attribute with its full dotted name, empty ones included.
    pub fn attributes(&self) -> Vec<(String, &Attribute)> {
        let mut out = Vec::new();
        self.collect_attributes("", &mut out);
        out
    }

    fn collect_attributes<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Attribute)>) {
        for (key, node) in &self.entries {
            let full = join(prefix, key);
            match node {
                Node::Value(attr) => out.push((full, attr)),
                Node::Set(set) => set.collect_attributes(&full, out),
            }
        }
    }

    /// Drop every value, keeping structure and bound definitions.
    pub fn clear_values(&mut self) {
        for node in self.entries.values_mut() {
            match node {
                Node::Value(attr) => {
                    attr.take_value();
                }
                Node::Set(set) => set.clear_values(),
            }
        }
    }

    /// JSON object form: nested sets become nested objects, empty attributes
    /// and empty sets are omitted.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (key, node) in &self.entries {
            match node {
                Node::Value(attr) => {
                    if let Some(v) = attr.value() {
                        map.insert(key.clone(), v.to_json());
                    }
                }
                Node::Set(set) => {
                    let nested = set.to_json();
                    if nested.as_object().is_some_and(|m| !m.is_empty()) {
                        map.insert(key.clone(), nested);
                    }
                }
            }
        }
        Value::Object(map)
    }

    /// Bind every definition to its attribute, creating missing ones. With
    /// `force` values are replaced by defaults, otherwise only empty
    /// attributes receive the default.
    pub fn reset(&mut self, definitions: &AttributeDefinitions, force: bool) {
        for (name, def) in definitions.iter() {
            let attr = self.attribute_entry(name);
            attr.bind(Arc::clone(def));
            if force {
                attr.force_default();
            } else {
                attr.default_value();
            }
        }
        debug!(count = definitions.len(), force, "Reset attribute bindings");
    }

    /// Drop attributes not named in `definitions`, and sets left empty.
    pub fn remove_undefined(&mut self, definitions: &AttributeDefinitions) {
        self.retain_defined("", definitions);
    }

    fn retain_defined(&mut self, prefix: &str, definitions: &AttributeDefinitions) {
        self.entries.retain(|key, node| {
            let full = join(prefix, key);
            match node {
                Node::Value(_) => definitions.contains(&full),
                Node::Set(set) => {
                    set.retain_defined(&full, definitions);
                    !set.is_empty()
                }
            }
        });
    }

    /// Reconciled copy of `self`; see [`check_mut`](Self::check_mut).
    pub fn check(
        &self,
        definitions: &AttributeDefinitions,
        set_defaults: bool,
        config: &ValidationConfig,
    ) -> OcciResult<AttributeSet> {
        let mut checked = self.clone();
        checked.check_mut(definitions, set_defaults, config)?;
        Ok(checked)
    }

    /// Reconcile the set against `definitions` in three passes:
    ///
    /// 1. add attributes that are defined but absent or empty, failing
    ///    `AttributeMissing` for required ones without default;
    /// 2. verify each present attribute is defined, bind its definition and
    ///    check its type and pattern;
    /// 3. delete attributes left without a value, then nested sets left
    ///    without entries.
    pub fn check_mut(
        &mut self,
        definitions: &AttributeDefinitions,
        set_defaults: bool,
        config: &ValidationConfig,
    ) -> OcciResult<()> {
        self.add_missing(definitions, set_defaults)?;
        self.check_defined("", definitions, set_defaults, config)?;
        self.delete_empty();
        Ok(())
    }

    fn add_missing(&mut self, definitions: &AttributeDefinitions, set_defaults: bool) -> OcciResult<()> {
        for (name, def) in definitions.iter() {
            let present = matches!(self.value(name), Ok(Some(_)));
            if present {
                continue;
            }
            match def.default_value() {
                None if def.is_required() => {
                    return Err(OcciError::AttributeMissing(format!(
                        "required attribute {name} not specified"
                    )));
                }
                None => {}
                Some(default) => {
                    if def.is_required() || set_defaults {
                        let attr = self.attribute_entry(name);
                        attr.bind(Arc::clone(def));
                        attr.set_value(Some(default.clone()))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn check_defined(
        &mut self,
        prefix: &str,
        definitions: &AttributeDefinitions,
        set_defaults: bool,
        config: &ValidationConfig,
    ) -> OcciResult<()> {
        for (key, node) in self.entries.iter_mut() {
            let full = join(prefix, key);
            let attr = match node {
                Node::Set(set) => {
                    set.check_defined(&full, definitions, set_defaults, config)?;
                    continue;
                }
                Node::Value(attr) => attr,
            };

            let def = definitions.get(&full).ok_or_else(|| {
                OcciError::AttributeNotDefined(format!("attribute {full} not found in definitions"))
            })?;
            attr.bind(Arc::clone(def));
            if set_defaults {
                attr.default_value();
            }
            let Some(value) = attr.value() else {
                continue;
            };

            let kind_ok = match def.attr_type() {
                AttributeType::Number => matches!(value, AttributeValue::Number(_)),
                AttributeType::Boolean => matches!(value, AttributeValue::Bool(_)),
                AttributeType::String | AttributeType::Uri => value.is_string_like(),
                other => {
                    return Err(OcciError::AttributePropertyType(format!(
                        "property type {other} of attribute {full} is not one of the allowed types number, boolean or string"
                    )));
                }
            };
            if !kind_ok {
                return Err(OcciError::AttributeType(format!(
                    "attribute {full} with value of type {} does not match attribute property type {}",
                    value.type_name(),
                    def.attr_type()
                )));
            }
            def.check_pattern(value, config)
                .map_err(|e| e.in_attribute(&full))?;
        }
        Ok(())
    }

    fn delete_empty(&mut self) {
        self.entries.retain(|_, node| match node {
            Node::Value(attr) => !attr.is_empty(),
            Node::Set(set) => {
                set.delete_empty();
                !set.is_empty()
            }
        });
    }
}
