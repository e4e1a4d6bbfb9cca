//! Rendering into `application/json`.

use super::document::{
    ActionInstanceDocument, AttributeDocument, CategoriesDocument, CategoryDocument,
    CollectionDocument, Endpoint, EntityDocument,
};
use occi_types::action_instance::ActionInstance;
use occi_types::attribute::{AttributeDefinitions, AttributeType};
use occi_types::attribute_set::AttributeSet;
use occi_types::category::{AnyCategory, Categorized};
use occi_types::entity::{Entity, ATTR_ID, ATTR_TITLE};
use occi_types::error::{OcciError, OcciResult};
use occi_types::infrastructure::implied_source_kind;
use occi_types::model::Model;
use occi_types::resource::{AnyEntity, Link, Resource, ATTR_SOURCE, ATTR_SUMMARY, ATTR_TARGET};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Attributes rendered as top-level fields rather than under `attributes`.
const PROMOTED: [&str; 5] = [ATTR_ID, ATTR_TITLE, ATTR_SUMMARY, ATTR_SOURCE, ATTR_TARGET];

fn attribute_map(attributes: &AttributeSet, skip: &[&str]) -> Map<String, Value> {
    attributes
        .names()
        .into_iter()
        .filter(|(name, _)| !skip.contains(&name.as_str()))
        .map(|(name, value)| (name, value.to_json()))
        .collect()
}

/// JSON has no separate uri type; uri attributes travel as strings.
fn json_type_name(attr_type: AttributeType) -> String {
    match attr_type {
        AttributeType::Uri => AttributeType::String.to_string(),
        other => other.to_string(),
    }
}

fn attribute_documents(definitions: &AttributeDefinitions) -> BTreeMap<String, AttributeDocument> {
    definitions
        .iter()
        .map(|(name, def)| {
            let doc = AttributeDocument {
                attr_type: Some(json_type_name(def.attr_type())),
                required: def.is_required(),
                mutable: def.is_mutable(),
                default: def.default_value().map(|v| v.to_json()),
                pattern: def.pattern().map(str::to_string),
                description: def.description().map(str::to_string),
            };
            (name.to_string(), doc)
        })
        .collect()
}

fn category_document(category: &AnyCategory) -> CategoryDocument {
    let mut doc = CategoryDocument {
        term: category.term().to_string(),
        scheme: category.scheme().to_string(),
        title: category.title().map(str::to_string),
        attributes: attribute_documents(category.attributes()),
        ..Default::default()
    };
    match category {
        AnyCategory::Kind(kind) => {
            doc.parent = kind.parent().map(str::to_string);
            doc.location = Some(kind.location().to_string());
            doc.actions = kind.actions().iter().map(|a| a.identifier()).collect();
        }
        AnyCategory::Mixin(mixin) => {
            doc.depends = mixin.depends().to_vec();
            doc.applies = mixin.applies().to_vec();
            doc.location = Some(mixin.location().to_string());
            doc.actions = mixin.actions().iter().map(|a| a.identifier()).collect();
        }
        AnyCategory::Action(_) => {}
    }
    doc
}

fn link_document(link: &Link) -> OcciResult<EntityDocument> {
    let mut doc = base_document(link.entity())?;
    doc.source = link.source().map(|location| Endpoint {
        location: location.to_string(),
        kind: link
            .source_kind()
            .map(str::to_string)
            .or_else(|| implied_source_kind(link.entity().kind()).map(str::to_string)),
    });
    doc.target = link.target().map(|location| Endpoint {
        location: location.to_string(),
        kind: link.target_kind().map(str::to_string),
    });
    Ok(doc)
}

fn resource_document(resource: &Resource) -> OcciResult<EntityDocument> {
    let mut doc = base_document(resource.entity())?;
    doc.summary = resource.summary().map(str::to_string);
    doc.links = resource
        .links()
        .iter()
        .map(link_document)
        .collect::<OcciResult<_>>()?;
    Ok(doc)
}

fn base_document(entity: &Entity) -> OcciResult<EntityDocument> {
    Ok(EntityDocument {
        kind: entity.kind_identifier(),
        mixins: entity.mixins().iter().map(|m| m.identifier()).collect(),
        attributes: attribute_map(entity.attributes(), &PROMOTED),
        actions: entity.actions().iter().map(|a| a.identifier()).collect(),
        id: entity.id().map(str::to_string),
        title: entity.title().map(str::to_string),
        location: entity.location().ok(),
        ..Default::default()
    })
}

/// Renderer for `application/json`. Output is compact unless
/// [`pretty`](Self::pretty) is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer {
    pretty: bool,
}

impl JsonRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn write<T: Serialize>(&self, document: &T) -> OcciResult<String> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(document)
        } else {
            serde_json::to_string(document)
        };
        rendered.map_err(|e| OcciError::Rendering(format!("JSON rendering failed: {e}")))
    }

    pub fn entity_document(&self, entity: &AnyEntity) -> OcciResult<EntityDocument> {
        match entity {
            AnyEntity::Resource(resource) => resource_document(resource),
            AnyEntity::Link(link) => link_document(link),
        }
    }

    pub fn entity(&self, entity: &AnyEntity) -> OcciResult<String> {
        self.write(&self.entity_document(entity)?)
    }

    pub fn resource(&self, resource: &Resource) -> OcciResult<String> {
        self.write(&resource_document(resource)?)
    }

    pub fn link(&self, link: &Link) -> OcciResult<String> {
        self.write(&link_document(link)?)
    }

    /// `{resources, links}` collection.
    pub fn collection(&self, entities: &[AnyEntity]) -> OcciResult<String> {
        let mut collection = CollectionDocument::default();
        for entity in entities {
            match entity {
                AnyEntity::Resource(r) => collection.resources.push(resource_document(r)?),
                AnyEntity::Link(l) => collection.links.push(link_document(l)?),
            }
        }
        self.write(&collection)
    }

    pub fn action_instance(&self, instance: &ActionInstance) -> OcciResult<String> {
        self.write(&ActionInstanceDocument {
            action: instance.action().identifier(),
            attributes: attribute_map(instance.attributes(), &[]),
        })
    }

    /// `{kinds, mixins, actions}` with full definitions.
    pub fn model(&self, model: &Model) -> OcciResult<String> {
        let mut document = CategoriesDocument::default();
        for category in model.categories() {
            let doc = category_document(&category);
            match category {
                AnyCategory::Kind(_) => document.kinds.push(doc),
                AnyCategory::Mixin(_) => document.mixins.push(doc),
                AnyCategory::Action(_) => document.actions.push(doc),
            }
        }
        self.write(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::JsonParser;
    use occi_types::attribute::AttributeDefinition;
    use occi_types::category::{Category, Kind};
    use occi_types::infrastructure::{COMPUTE_KIND, CORE_SCHEME, INFRASTRUCTURE_SCHEME};
    use std::sync::Arc;

    fn kinds() -> (Arc<Kind>, Arc<Kind>, Arc<Kind>, Arc<Kind>) {
        let entity = Arc::new(Kind::new(
            Category::new("entity", CORE_SCHEME)
                .unwrap()
                .with_attribute(ATTR_ID, AttributeDefinition::new(AttributeType::String).immutable())
                .unwrap()
                .with_attribute(ATTR_TITLE, AttributeDefinition::new(AttributeType::String))
                .unwrap(),
            None,
        ));
        let link = Arc::new(Kind::new(
            Category::new("link", CORE_SCHEME)
                .unwrap()
                .with_attribute(ATTR_SOURCE, AttributeDefinition::new(AttributeType::Uri))
                .unwrap()
                .with_attribute(ATTR_TARGET, AttributeDefinition::new(AttributeType::Uri))
                .unwrap(),
            Some(&*entity),
        ));
        let compute = Arc::new(Kind::new(
            Category::new("compute", INFRASTRUCTURE_SCHEME)
                .unwrap()
                .with_attribute(
                    "occi.compute.cores",
                    AttributeDefinition::new(AttributeType::Number),
                )
                .unwrap(),
            Some(&*entity),
        ));
        let storagelink = Arc::new(Kind::new(
            Category::new("storagelink", INFRASTRUCTURE_SCHEME).unwrap(),
            Some(&*link),
        ));
        (entity, link, compute, storagelink)
    }

    #[test]
    fn test_render_link_implied_source_kind() {
        let (_, _, _, storagelink) = kinds();
        let mut link = Link::new(Entity::builder(storagelink).id("s1").build().unwrap());
        link.set_source("/compute/1").unwrap();
        link.set_target("/storage/1").unwrap();
        let value: Value = serde_json::from_str(&JsonRenderer::new().link(&link).unwrap()).unwrap();
        assert_eq!(value["source"]["kind"], COMPUTE_KIND);
        assert_eq!(value["target"]["location"], "/storage/1");
        assert!(value["target"].get("kind").is_none());
        assert_eq!(value["id"], "s1");
        assert!(value.get("attributes").is_none());
    }

    #[test]
    fn test_render_resource() {
        let (_, _, compute, _) = kinds();
        let vm = Resource::new(
            Entity::builder(compute)
                .id("vm1")
                .title("web")
                .attribute("occi.compute.cores", 2)
                .build()
                .unwrap(),
        );
        let value: Value =
            serde_json::from_str(&JsonRenderer::new().resource(&vm).unwrap()).unwrap();
        assert_eq!(value["kind"], COMPUTE_KIND);
        assert_eq!(value["id"], "vm1");
        assert_eq!(value["title"], "web");
        assert_eq!(value["location"], "/compute/vm1");
        assert_eq!(value["attributes"]["occi.compute.cores"], 2);
        assert!(value["attributes"].get(ATTR_ID).is_none());
    }

    #[test]
    fn test_model_round_trip() {
        let (entity, link, compute, storagelink) = kinds();
        let mut model = Model::new();
        model.register_kind(entity.as_ref().clone()).unwrap();
        model.register_kind(link.as_ref().clone()).unwrap();
        model.register_kind(compute.as_ref().clone()).unwrap();
        model.register_kind(storagelink.as_ref().clone()).unwrap();

        let rendered = JsonRenderer::new().pretty().model(&model).unwrap();
        let reparsed = JsonParser::parse_model(&rendered).unwrap();
        assert_eq!(reparsed.len(), model.len());
        let link = reparsed.find_kind("http://schemas.ogf.org/occi/core#link").unwrap();
        assert_eq!(link.attributes().get(ATTR_SOURCE).unwrap().attr_type(), AttributeType::Uri);
        let entity = reparsed.find_kind("http://schemas.ogf.org/occi/core#entity").unwrap();
        assert!(!entity.attributes().get(ATTR_ID).unwrap().is_mutable());
    }
}
