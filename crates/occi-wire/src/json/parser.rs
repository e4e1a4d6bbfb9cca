//! Parsing of `application/json` documents.

use super::document::{
    ActionInstanceDocument, AttributeDocument, CategoriesDocument, CategoryDocument,
    CollectionDocument, EntityDocument,
};
use crate::registry::{Drafts, KindDraft, MixinDraft};
use occi_types::action_instance::ActionInstance;
use occi_types::attribute::{AttributeDefinition, AttributeDefinitions, AttributeType};
use occi_types::category::{Action, AnyCategory, Categorized, Category, Kind, Mixin};
use occi_types::config::ValidationConfig;
use occi_types::entity::Entity;
use occi_types::error::{OcciError, OcciResult};
use occi_types::infrastructure::implied_source_kind;
use occi_types::model::Model;
use occi_types::resource::{AnyEntity, Link, Resource, ATTR_SOURCE, ATTR_SUMMARY, ATTR_TARGET};
use occi_types::value::AttributeValue;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

fn from_json<T: DeserializeOwned>(body: &str) -> OcciResult<T> {
    serde_json::from_str(body).map_err(|e| OcciError::Parsing(format!("JSON parsing failed: {e}")))
}

/// Flatten an attribute object into dotted names. An object value is
/// descended into when the definitions treat its name as a group, and kept
/// as an object value otherwise. `null` values are dropped.
fn flatten_attributes(
    prefix: &str,
    attributes: Map<String, Value>,
    definitions: &AttributeDefinitions,
    out: &mut Vec<(String, AttributeValue)>,
) {
    for (key, value) in attributes {
        let name = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) if definitions.is_group(&name) => {
                flatten_attributes(&name, inner, definitions, out)
            }
            other => {
                if let Some(value) = AttributeValue::from_json(other) {
                    out.push((name, value));
                }
            }
        }
    }
}

fn definition_from_document(name: &str, doc: &AttributeDocument) -> OcciResult<AttributeDefinition> {
    let type_name = doc
        .attr_type
        .as_deref()
        .ok_or_else(|| OcciError::Parsing(format!("Attribute {name:?} has no type")))?;
    let mut attr_type: AttributeType = type_name.parse().map_err(OcciError::into_parsing)?;
    if name == ATTR_SOURCE || name == ATTR_TARGET {
        debug!(attribute = name, from = %attr_type, "Forcing link endpoint type to uri");
        attr_type = AttributeType::Uri;
    }
    let mut definition = AttributeDefinition::new(attr_type)
        .with_required(doc.required)
        .with_mutable(doc.mutable);
    if let Some(default) = doc.default.clone().and_then(AttributeValue::from_json) {
        definition = definition
            .with_default(default)
            .map_err(|e| e.in_attribute(name).into_parsing())?;
    }
    if let Some(pattern) = &doc.pattern {
        definition = definition
            .with_pattern(pattern)
            .map_err(|e| e.in_attribute(name).into_parsing())?;
    }
    if let Some(description) = &doc.description {
        definition = definition.with_description(description.clone());
    }
    Ok(definition)
}

fn category_from_document(doc: &CategoryDocument) -> OcciResult<Category> {
    let mut definitions = AttributeDefinitions::new();
    for (name, attr) in &doc.attributes {
        definitions
            .insert(name, definition_from_document(name, attr)?)
            .map_err(OcciError::into_parsing)?;
    }
    let mut category = Category::new(doc.term.clone(), doc.scheme.clone())
        .map_err(OcciError::into_parsing)?
        .with_attributes(definitions);
    if let Some(title) = &doc.title {
        category = category.with_title(title.clone());
    }
    Ok(category)
}

fn drafts_from_document(doc: CategoriesDocument) -> OcciResult<Drafts> {
    let mut drafts = Drafts::new();
    for action in &doc.actions {
        drafts.actions.push(category_from_document(action)?);
    }
    for kind in doc.kinds {
        drafts.kinds.push(KindDraft {
            category: category_from_document(&kind)?,
            parent: kind.parent,
            actions: kind.actions,
            location: kind.location,
        });
    }
    for mixin in doc.mixins {
        drafts.mixins.push(MixinDraft {
            category: category_from_document(&mixin)?,
            depends: mixin.depends,
            applies: mixin.applies,
            actions: mixin.actions,
            location: mixin.location,
        });
    }
    Ok(drafts)
}

/// Parser for `application/json`, resolving categories against a [`Model`].
#[derive(Debug, Clone)]
pub struct JsonParser<'m> {
    model: &'m Model,
    validation: Option<ValidationConfig>,
}

impl<'m> JsonParser<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self {
            model,
            validation: None,
        }
    }

    /// Validate every parsed entity and action instance with `config`.
    pub fn with_validation(mut self, config: ValidationConfig) -> Self {
        self.validation = Some(config);
        self
    }

    pub fn model(&self) -> &Model {
        self.model
    }

    /// Parse a single entity document or a `{resources, links}` collection.
    pub fn entities(&self, body: &str) -> OcciResult<Vec<AnyEntity>> {
        let value: Value = from_json(body)?;
        let documents = if value.get("kind").is_some() {
            vec![from_value::<EntityDocument>(value)?]
        } else {
            let collection: CollectionDocument = from_value(value)?;
            collection.resources.into_iter().chain(collection.links).collect()
        };
        let mut entities = Vec::with_capacity(documents.len());
        for document in documents {
            let entity = self.entity(document)?;
            if let Some(config) = &self.validation {
                entity.validate(config)?;
            }
            entities.push(entity);
        }
        debug!(count = entities.len(), "Parsed JSON entities");
        Ok(entities)
    }

    /// Like [`entities`](Self::entities) but fails `Parsing` on links.
    pub fn resources(&self, body: &str) -> OcciResult<Vec<Resource>> {
        self.entities(body)?
            .into_iter()
            .map(|e| match e {
                AnyEntity::Resource(r) => Ok(r),
                AnyEntity::Link(l) => Err(OcciError::Parsing(format!(
                    "expected a resource, got link of kind {}",
                    l.entity().kind_identifier()
                ))),
            })
            .collect()
    }

    /// Like [`entities`](Self::entities) but fails `Parsing` on resources.
    pub fn links(&self, body: &str) -> OcciResult<Vec<Link>> {
        self.entities(body)?
            .into_iter()
            .map(|e| match e {
                AnyEntity::Link(l) => Ok(l),
                AnyEntity::Resource(r) => Err(OcciError::Parsing(format!(
                    "expected a link, got resource of kind {}",
                    r.entity().kind_identifier()
                ))),
            })
            .collect()
    }

    pub fn action_instances(&self, body: &str) -> OcciResult<Vec<ActionInstance>> {
        let document: ActionInstanceDocument = from_json(body)?;
        let action = self.model.find_action(&document.action).ok_or_else(|| {
            OcciError::Parsing(format!("{} is not a defined action", document.action))
        })?;
        let mut instance = ActionInstance::new(Arc::clone(action));
        let mut values = Vec::new();
        flatten_attributes("", document.attributes, action.attributes(), &mut values);
        for (name, value) in values {
            instance.set_attribute(&name, value)?;
        }
        if let Some(config) = &self.validation {
            instance.validate(config)?;
        }
        Ok(vec![instance])
    }

    /// Categories listed in a `{kinds, mixins, actions}` document, resolved
    /// in the model by identifier.
    pub fn categories(&self, body: &str) -> OcciResult<Vec<AnyCategory>> {
        let document: CategoriesDocument = from_json(body)?;
        document
            .kinds
            .iter()
            .chain(&document.mixins)
            .chain(&document.actions)
            .map(|c| {
                let identifier = c.identifier();
                self.model.find_by_identifier(&identifier).ok_or_else(|| {
                    OcciError::Parsing(format!("category {identifier} is not defined in the model"))
                })
            })
            .collect()
    }

    pub fn kinds(&self, body: &str) -> OcciResult<Vec<Arc<Kind>>> {
        Ok(self
            .categories(body)?
            .iter()
            .filter_map(|c| c.as_kind().cloned())
            .collect())
    }

    pub fn mixins(&self, body: &str) -> OcciResult<Vec<Arc<Mixin>>> {
        Ok(self
            .categories(body)?
            .iter()
            .filter_map(|c| c.as_mixin().cloned())
            .collect())
    }

    pub fn actions(&self, body: &str) -> OcciResult<Vec<Arc<Action>>> {
        Ok(self
            .categories(body)?
            .iter()
            .filter_map(|c| c.as_action().cloned())
            .collect())
    }

    /// Register the category definitions of a `{kinds, mixins, actions}`
    /// document into `model`. Categories already present are reused.
    pub fn extend_model(body: &str, model: &mut Model) -> OcciResult<()> {
        let document: CategoriesDocument = from_json(body)?;
        drafts_from_document(document)?.register_into(model)
    }

    /// Build a fresh model from category definitions.
    pub fn parse_model(body: &str) -> OcciResult<Model> {
        let mut model = Model::new();
        Self::extend_model(body, &mut model)?;
        Ok(model)
    }

    fn entity(&self, document: EntityDocument) -> OcciResult<AnyEntity> {
        let kind = self.model.find_kind(&document.kind).ok_or_else(|| {
            OcciError::Parsing(format!("kind {} is not defined in the model", document.kind))
        })?;
        let mut definitions = kind.attributes().clone();
        let mut builder = Entity::builder(Arc::clone(kind));
        for identifier in &document.mixins {
            let mixin = self.model.find_mixin(identifier).ok_or_else(|| {
                OcciError::Parsing(format!("mixin {identifier} is not defined in the model"))
            })?;
            definitions.overlay(mixin.attributes());
            builder = builder.mixin(Arc::clone(mixin));
        }
        for identifier in &document.actions {
            let action = self.model.find_action(identifier).ok_or_else(|| {
                OcciError::Parsing(format!("action {identifier} is not defined in the model"))
            })?;
            builder = builder.action(Arc::clone(action));
        }

        let mut values = Vec::new();
        flatten_attributes("", document.attributes, &definitions, &mut values);
        for (name, value) in values {
            builder = builder.attribute(name, value);
        }
        if let Some(id) = document.id {
            builder = builder.id(id);
        }
        if let Some(title) = document.title {
            builder = builder.title(title);
        }
        if let Some(summary) = document.summary {
            builder = builder.attribute(ATTR_SUMMARY, summary);
        }
        if let Some(location) = document.location {
            builder = builder.location(location);
        }

        match AnyEntity::from_entity(builder.build()?) {
            AnyEntity::Resource(mut resource) => {
                for link_document in document.links {
                    match self.entity(link_document)? {
                        AnyEntity::Link(link) => resource.add_link(link)?,
                        AnyEntity::Resource(r) => {
                            return Err(OcciError::Parsing(format!(
                                "resource of kind {} listed as a link",
                                r.entity().kind_identifier()
                            )))
                        }
                    }
                }
                Ok(AnyEntity::Resource(resource))
            }
            AnyEntity::Link(mut link) => {
                if !document.links.is_empty() {
                    return Err(OcciError::Parsing("a link cannot carry links".to_string()));
                }
                if let Some(source) = document.source {
                    link.set_source(source.location)?;
                    link.set_source_kind(source.kind);
                }
                if let Some(target) = document.target {
                    link.set_target(target.location)?;
                    link.set_target_kind(target.kind);
                }
                if link.source_kind().is_none() {
                    link.set_source_kind(
                        implied_source_kind(link.entity().kind()).map(str::to_string),
                    );
                }
                Ok(AnyEntity::Link(link))
            }
        }
    }
}

fn from_value<T: DeserializeOwned>(value: Value) -> OcciResult<T> {
    serde_json::from_value(value).map_err(|e| OcciError::Parsing(format!("JSON parsing failed: {e}")))
}
