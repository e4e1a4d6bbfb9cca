//! Parsing of OCCI text bodies and headers.

use super::grammar::{read_line, read_pair, split_outside_quotes, CategoryLine, LinkLine, RawValue};
use super::headers::{transform_body, transform_headers, Headers, KeyGroup};
use crate::media::MediaType;
use crate::registry::{Drafts, KindDraft, MixinDraft};
use occi_types::action_instance::ActionInstance;
use occi_types::attribute::{AttributeDefinition, AttributeDefinitions, AttributeType};
use occi_types::category::{AnyCategory, Action, Categorized, Category, Kind, Mixin};
use occi_types::config::ValidationConfig;
use occi_types::entity::{Entity, ATTR_ID};
use occi_types::error::{OcciError, OcciResult};
use occi_types::infrastructure::{implied_source_kind, LINK_KIND};
use occi_types::model::Model;
use occi_types::resource::{AnyEntity, Link, Resource, ATTR_SOURCE, ATTR_TARGET};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Lines of one text document, grouped by key.
#[derive(Debug, Default)]
struct Sections {
    categories: Vec<CategoryLine>,
    links: Vec<LinkLine>,
    attributes: Vec<(String, RawValue)>,
    locations: Vec<String>,
}

impl Sections {
    fn read(lines: &[String]) -> OcciResult<Self> {
        let mut sections = Sections::default();
        for line in lines {
            let Some((group, value)) = read_line(line)? else {
                debug!(line = %line, "Skipping non-OCCI line");
                continue;
            };
            for item in split_outside_quotes(value, ',')
                .into_iter()
                .map(str::trim)
                .filter(|v| !v.is_empty())
            {
                match group {
                    KeyGroup::Category => sections.categories.push(CategoryLine::parse(item)?),
                    KeyGroup::Link => sections.links.push(LinkLine::parse(item)?),
                    KeyGroup::Attribute => sections.attributes.push(read_pair(item)?),
                    KeyGroup::Location => sections.locations.push(parse_location(item)?),
                }
            }
        }
        Ok(sections)
    }
}

/// Check a location and return it unchanged. Relative references are
/// accepted.
fn parse_location(location: &str) -> OcciResult<String> {
    let invalid = || OcciError::Parsing(format!("{location:?} is not a valid location"));
    if location.is_empty() || location.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let base = Url::parse("http://localhost/").map_err(|_| invalid())?;
    base.join(location).map_err(|_| invalid())?;
    Ok(location.to_string())
}

/// Parser for `text/plain`, `text/occi+plain` and `text/occi` input,
/// resolving categories against a [`Model`].
#[derive(Debug, Clone)]
pub struct TextParser<'m> {
    model: &'m Model,
    media_type: MediaType,
    validation: Option<ValidationConfig>,
}

impl<'m> TextParser<'m> {
    /// Fails `Parsing` for media types that are not OCCI text.
    pub fn new(model: &'m Model, media_type: MediaType) -> OcciResult<Self> {
        if !media_type.is_occi_text() {
            return Err(OcciError::Parsing(format!(
                "{media_type} is not an OCCI text media type"
            )));
        }
        Ok(Self {
            model,
            media_type,
            validation: None,
        })
    }

    /// Validate every parsed entity and action instance with `config`.
    pub fn with_validation(mut self, config: ValidationConfig) -> Self {
        self.validation = Some(config);
        self
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn model(&self) -> &Model {
        self.model
    }

    fn lines(&self, body: &str, headers: &Headers) -> OcciResult<Vec<String>> {
        text_lines(self.media_type, body, headers)
    }

    /// Parse the single entity a text document describes.
    pub fn entities(&self, body: &str, headers: &Headers) -> OcciResult<Vec<AnyEntity>> {
        let sections = Sections::read(&self.lines(body, headers)?)?;
        let entity = self.entity(&sections)?;
        if let Some(config) = &self.validation {
            entity.validate(config)?;
        }
        Ok(vec![entity])
    }

    /// Like [`entities`](Self::entities) but fails `Parsing` on links.
    pub fn resources(&self, body: &str, headers: &Headers) -> OcciResult<Vec<Resource>> {
        self.entities(body, headers)?
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
    pub fn links(&self, body: &str, headers: &Headers) -> OcciResult<Vec<Link>> {
        self.entities(body, headers)?
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

    /// Parse an action invocation: exactly one action category plus its
    /// parameters.
    pub fn action_instances(&self, body: &str, headers: &Headers) -> OcciResult<Vec<ActionInstance>> {
        let sections = Sections::read(&self.lines(body, headers)?)?;
        let [category] = sections.categories.as_slice() else {
            return Err(OcciError::Parsing(format!(
                "action instance needs exactly one category, got {}",
                sections.categories.len()
            )));
        };
        let identifier = category.identifier();
        let action = self.model.find_action(&identifier).ok_or_else(|| {
            OcciError::Parsing(format!("{identifier} is not a defined action"))
        })?;
        let mut instance = ActionInstance::new(Arc::clone(action));
        for (name, raw) in &sections.attributes {
            let value = raw
                .clone()
                .coerce(action.attributes().get(name).map(Arc::as_ref))?;
            instance.set_attribute(name, value)?;
        }
        if let Some(config) = &self.validation {
            instance.validate(config)?;
        }
        Ok(vec![instance])
    }

    /// Categories named by `Category:` lines, resolved in the model.
    pub fn categories(&self, body: &str, headers: &Headers) -> OcciResult<Vec<AnyCategory>> {
        let sections = Sections::read(&self.lines(body, headers)?)?;
        sections
            .categories
            .iter()
            .map(|line| self.lookup(&line.identifier()))
            .collect()
    }

    pub fn kinds(&self, body: &str, headers: &Headers) -> OcciResult<Vec<Arc<Kind>>> {
        Ok(self
            .categories(body, headers)?
            .iter()
            .filter_map(|c| c.as_kind().cloned())
            .collect())
    }

    pub fn mixins(&self, body: &str, headers: &Headers) -> OcciResult<Vec<Arc<Mixin>>> {
        Ok(self
            .categories(body, headers)?
            .iter()
            .filter_map(|c| c.as_mixin().cloned())
            .collect())
    }

    pub fn actions(&self, body: &str, headers: &Headers) -> OcciResult<Vec<Arc<Action>>> {
        Ok(self
            .categories(body, headers)?
            .iter()
            .filter_map(|c| c.as_action().cloned())
            .collect())
    }

    /// Locations listed in a `text/uri-list` body or in `X-OCCI-Location`
    /// lines of OCCI text.
    pub fn locations(body: &str, headers: &Headers, media_type: MediaType) -> OcciResult<Vec<String>> {
        if media_type == MediaType::UriList {
            return body
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(parse_location)
                .collect();
        }
        Ok(Sections::read(&text_lines(media_type, body, headers)?)?.locations)
    }

    /// Build a fresh model from full category definitions, as returned by a
    /// query interface.
    pub fn parse_model(body: &str, headers: &Headers, media_type: MediaType) -> OcciResult<Model> {
        let sections = Sections::read(&text_lines(media_type, body, headers)?)?;
        let mut drafts = Drafts::new();
        for line in sections.categories {
            add_draft(&mut drafts, line)?;
        }
        drafts.into_model()
    }

    fn lookup(&self, identifier: &str) -> OcciResult<AnyCategory> {
        self.model.find_by_identifier(identifier).ok_or_else(|| {
            OcciError::Parsing(format!("category {identifier} is not defined in the model"))
        })
    }

    fn entity(&self, sections: &Sections) -> OcciResult<AnyEntity> {
        let (kind, mixins) = self.classify(&sections.categories)?;
        let mut builder = Entity::builder(Arc::clone(&kind));
        for mixin in &mixins {
            builder = builder.mixin(Arc::clone(mixin));
        }
        let definitions = combined_definitions(&kind, &mixins);
        for (name, raw) in &sections.attributes {
            let value = raw.clone().coerce(definitions.get(name).map(Arc::as_ref))?;
            builder = builder.attribute(name, value);
        }
        match sections.locations.as_slice() {
            [] => {}
            [location] => builder = builder.location(location),
            more => {
                return Err(OcciError::Parsing(format!(
                    "entity has {} locations",
                    more.len()
                )))
            }
        }

        match AnyEntity::from_entity(builder.build()?) {
            AnyEntity::Resource(mut resource) => {
                for line in &sections.links {
                    self.attach_link(&mut resource, line)?;
                }
                Ok(AnyEntity::Resource(resource))
            }
            AnyEntity::Link(mut link) => {
                if !sections.links.is_empty() {
                    return Err(OcciError::Parsing(
                        "a link cannot carry Link lines".to_string(),
                    ));
                }
                link.set_source_kind(implied_source_kind(&kind).map(str::to_string));
                Ok(AnyEntity::Link(link))
            }
        }
    }

    /// Split category lines into the single kind and the mixins.
    fn classify(&self, lines: &[CategoryLine]) -> OcciResult<(Arc<Kind>, Vec<Arc<Mixin>>)> {
        let mut kind = None;
        let mut mixins = Vec::new();
        for line in lines {
            let identifier = line.identifier();
            match self.lookup(&identifier)? {
                AnyCategory::Kind(k) => {
                    if kind.replace(k).is_some() {
                        return Err(OcciError::Parsing(format!(
                            "more than one kind given, including {identifier}"
                        )));
                    }
                }
                AnyCategory::Mixin(m) => mixins.push(m),
                AnyCategory::Action(_) => {
                    return Err(OcciError::Parsing(format!(
                        "action {identifier} cannot classify an entity"
                    )))
                }
            }
        }
        let kind = kind.ok_or_else(|| OcciError::Parsing("entity has no kind".to_string()))?;
        Ok((kind, mixins))
    }

    /// Handle one `Link:` line of a resource: either an action link that
    /// enables an action, or an outgoing link.
    fn attach_link(&self, resource: &mut Resource, line: &LinkLine) -> OcciResult<()> {
        let rel = line.rel.first().map(String::as_str).unwrap_or_default();
        if let Some(action) = self.model.find_action(rel) {
            return resource
                .entity_mut()
                .add_action(Arc::clone(action))
                .map_err(OcciError::into_parsing);
        }

        let (kind, mixins) = if line.categories.is_empty() {
            let link_kind = self.model.find_kind(LINK_KIND).ok_or_else(|| {
                OcciError::Parsing(format!("link to {} has no category", line.target))
            })?;
            (Arc::clone(link_kind), Vec::new())
        } else {
            let lines: Vec<CategoryLine> = line
                .categories
                .iter()
                .map(String::as_str)
                .map(category_line_for)
                .collect::<OcciResult<_>>()?;
            self.classify(&lines)?
        };
        if !kind.is_related_to(LINK_KIND) {
            return Err(OcciError::Parsing(format!(
                "{} is not a link kind",
                kind.identifier()
            )));
        }

        let definitions = combined_definitions(&kind, &mixins);
        let mut builder = Entity::builder(Arc::clone(&kind));
        for mixin in mixins {
            builder = builder.mixin(mixin);
        }
        for (name, raw) in &line.attributes {
            if name == ATTR_SOURCE || name == ATTR_TARGET {
                continue;
            }
            let value = raw.clone().coerce(definitions.get(name).map(Arc::as_ref))?;
            builder = builder.attribute(name, value);
        }
        if let Some(location) = &line.self_location {
            builder = builder.location(location);
            let has_id = line.attributes.iter().any(|(n, _)| n == ATTR_ID);
            if !has_id {
                if let Some(id) = last_segment(location) {
                    builder = builder.id(id);
                }
            }
        }

        let mut link = Link::new(builder.build()?);
        link.set_target(line.target.clone())?;
        link.set_target_kind(Some(rel.to_string()));
        resource.add_link(link)
    }
}

/// Lines for OCCI text input, from the body or from the headers.
fn text_lines(media_type: MediaType, body: &str, headers: &Headers) -> OcciResult<Vec<String>> {
    if media_type.is_plain_text() {
        Ok(transform_body(body))
    } else if media_type.is_header_text() {
        transform_headers(headers)
    } else {
        Err(OcciError::Parsing(format!(
            "{media_type} does not carry OCCI text"
        )))
    }
}

fn combined_definitions(kind: &Kind, mixins: &[Arc<Mixin>]) -> AttributeDefinitions {
    let mut definitions = kind.attributes().clone();
    for mixin in mixins {
        definitions.overlay(mixin.attributes());
    }
    definitions
}

/// A bare category line for an identifier such as `scheme#term`.
fn category_line_for(identifier: &str) -> OcciResult<CategoryLine> {
    let (scheme, term) = identifier
        .rsplit_once('#')
        .ok_or_else(|| OcciError::Parsing(format!("{identifier:?} is not a category identifier")))?;
    Ok(CategoryLine {
        term: term.to_string(),
        scheme: format!("{scheme}#"),
        ..Default::default()
    })
}

fn last_segment(location: &str) -> Option<&str> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

/// Attribute definitions from `name{required immutable}` specs. Text
/// carries no types: everything is a string except link endpoints.
fn definitions_from_specs(line: &CategoryLine) -> OcciResult<AttributeDefinitions> {
    let mut definitions = AttributeDefinitions::new();
    for spec in &line.attributes {
        let attr_type = if spec.name == ATTR_SOURCE || spec.name == ATTR_TARGET {
            AttributeType::Uri
        } else {
            AttributeType::String
        };
        let definition = AttributeDefinition::new(attr_type)
            .with_required(spec.required)
            .with_mutable(!spec.immutable);
        definitions
            .insert(&spec.name, definition)
            .map_err(OcciError::into_parsing)?;
    }
    Ok(definitions)
}

fn add_draft(drafts: &mut Drafts, line: CategoryLine) -> OcciResult<()> {
    let attributes = definitions_from_specs(&line)?;
    let mut category = Category::new(line.term.clone(), line.scheme.clone())
        .map_err(OcciError::into_parsing)?
        .with_attributes(attributes);
    if let Some(title) = line.title {
        category = category.with_title(title);
    }
    match line.class.as_deref() {
        Some("kind") => drafts.kinds.push(KindDraft {
            category,
            parent: line.rel.into_iter().next(),
            actions: line.actions,
            location: line.location,
        }),
        Some("mixin") => drafts.mixins.push(MixinDraft {
            category,
            depends: line.rel,
            applies: line.applies,
            actions: line.actions,
            location: line.location,
        }),
        Some("action") => drafts.actions.push(category),
        other => {
            return Err(OcciError::Parsing(format!(
                "category {}{} has unknown class {other:?}",
                line.scheme, line.term
            )))
        }
    }
    Ok(())
}
