//! Serde shapes of the OCCI JSON documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A resource or a link.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDocument {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mixins: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Outgoing links of a resource.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<EntityDocument>,
    /// Link endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Endpoint>,
}

/// A link endpoint with an optional kind hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionDocument {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<EntityDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<EntityDocument>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionInstanceDocument {
    pub action: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoriesDocument {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<CategoryDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mixins: Vec<CategoryDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<CategoryDocument>,
}

/// One kind, mixin or action. Fields that do not apply to a class are
/// left empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryDocument {
    pub term: String,
    pub scheme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
}

impl CategoryDocument {
    pub fn identifier(&self) -> String {
        format!("{}{}", self.scheme, self.term)
    }
}

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// An attribute definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDocument {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub attr_type: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub mutable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_document_defaults() {
        let doc: AttributeDocument = serde_json::from_str(r#"{"type": "number"}"#).unwrap();
        assert_eq!(doc.attr_type.as_deref(), Some("number"));
        assert!(!doc.required);
        assert!(doc.mutable);
        assert_eq!(serde_json::to_string(&doc).unwrap(), r#"{"type":"number"}"#);
    }

    #[test]
    fn test_entity_document_skips_empty() {
        let doc = EntityDocument {
            kind: "http://schemas.ogf.org/occi/infrastructure#compute".into(),
            id: Some("vm1".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_link_endpoints() {
        let doc: EntityDocument = serde_json::from_str(
            r#"{"kind": "k", "source": {"location": "/compute/1"}, "target": {"location": "/network/1", "kind": "n"}}"#,
        )
        .unwrap();
        assert_eq!(doc.source.unwrap().kind, None);
        assert_eq!(doc.target.unwrap().kind.as_deref(), Some("n"));
    }
}
