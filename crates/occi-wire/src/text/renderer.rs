//! Rendering into OCCI text: a `text/plain` body, `text/occi` headers or a
//! `text/uri-list`.

use super::grammar::{quote, AttributeSpec, CategoryLine, LinkLine};
use super::headers::{Headers, KeyGroup};
use crate::media::MediaType;
use occi_types::action_instance::ActionInstance;
use occi_types::attribute::AttributeDefinitions;
use occi_types::attribute_set::AttributeSet;
use occi_types::category::{AnyCategory, Categorized};
use occi_types::error::{OcciError, OcciResult};
use occi_types::infrastructure::RESOURCE_KIND;
use occi_types::model::Model;
use occi_types::resource::{AnyEntity, Link, Resource, ATTR_SOURCE, ATTR_TARGET};
use occi_types::value::AttributeValue;

/// Output of a text rendering. Plain and uri-list formats fill `body`,
/// `text/occi` fills `headers`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub body: String,
    pub headers: Headers,
}

type Lines = Vec<(KeyGroup, String)>;

/// Render a value token: numbers and booleans bare, everything else quoted.
pub fn value_token(value: &AttributeValue) -> OcciResult<String> {
    match value {
        AttributeValue::Number(n) => Ok(n.to_string()),
        AttributeValue::Bool(b) => Ok(b.to_string()),
        other => other
            .string_form()
            .map(|s| quote(&s))
            .ok_or_else(|| {
                OcciError::Rendering(format!(
                    "{} values have no text form",
                    other.type_name()
                ))
            }),
    }
}

/// `name=value` tokens for every set attribute, skipping `skip`.
fn attribute_tokens(attributes: &AttributeSet, skip: &[&str]) -> OcciResult<Vec<String>> {
    attributes
        .names()
        .into_iter()
        .filter(|(name, _)| !skip.contains(&name.as_str()))
        .map(|(name, value)| {
            value_token(&value)
                .map(|token| format!("{name}={token}"))
                .map_err(|e| e.in_attribute(&name))
        })
        .collect()
}

fn specs(definitions: &AttributeDefinitions) -> Vec<AttributeSpec> {
    definitions
        .iter()
        .map(|(name, def)| AttributeSpec {
            name: name.to_string(),
            required: def.is_required(),
            immutable: !def.is_mutable(),
        })
        .collect()
}

/// `term;scheme;class` only.
fn short_category(category: &AnyCategory) -> CategoryLine {
    CategoryLine {
        term: category.term().to_string(),
        scheme: category.scheme().to_string(),
        class: Some(category.class_name().to_string()),
        ..Default::default()
    }
}

/// Every property of the category.
fn full_category(category: &AnyCategory) -> CategoryLine {
    let mut line = short_category(category);
    line.title = category.title().map(str::to_string);
    line.attributes = specs(category.attributes());
    match category {
        AnyCategory::Kind(kind) => {
            line.rel = kind.parent().map(str::to_string).into_iter().collect();
            line.location = Some(kind.location().to_string());
            line.actions = kind.actions().iter().map(|a| a.identifier()).collect();
        }
        AnyCategory::Mixin(mixin) => {
            line.rel = mixin.depends().to_vec();
            line.applies = mixin.applies().to_vec();
            line.location = Some(mixin.location().to_string());
            line.actions = mixin.actions().iter().map(|a| a.identifier()).collect();
        }
        AnyCategory::Action(_) => {}
    }
    line
}

fn link_line(link: &Link) -> OcciResult<String> {
    let entity = link.entity();
    let target = link.target().ok_or_else(|| {
        OcciError::Rendering(format!(
            "link {} has no target",
            link.id().unwrap_or_default()
        ))
    })?;
    let categories = std::iter::once(entity.kind_identifier())
        .chain(entity.mixins().iter().map(|m| m.identifier()))
        .collect();
    let line = LinkLine {
        target: target.to_string(),
        rel: vec![link.target_kind().unwrap_or(RESOURCE_KIND).to_string()],
        self_location: entity.location().ok(),
        categories,
        attributes: Vec::new(),
    };
    let attributes = attribute_tokens(entity.attributes(), &[ATTR_SOURCE, ATTR_TARGET])?;
    Ok(line.render(&attributes))
}

fn resource_lines(resource: &Resource, lines: &mut Lines) -> OcciResult<()> {
    for link in resource.links() {
        lines.push((KeyGroup::Link, link_line(link)?));
    }
    let actions = resource.entity().actions();
    if !actions.is_empty() {
        let location = resource.entity().location()?;
        for action in actions {
            let line = LinkLine {
                target: format!("{location}?action={}", action.term()),
                rel: vec![action.identifier()],
                ..Default::default()
            };
            lines.push((KeyGroup::Link, line.render(&[])));
        }
    }
    Ok(())
}

fn entity_lines(entity: &AnyEntity) -> OcciResult<Lines> {
    let base = entity.entity();
    let mut lines = vec![(
        KeyGroup::Category,
        short_category(&AnyCategory::Kind(base.kind().clone())).render(),
    )];
    for mixin in base.mixins() {
        lines.push((
            KeyGroup::Category,
            short_category(&AnyCategory::Mixin(mixin.clone())).render(),
        ));
    }
    if base.has_explicit_location() {
        lines.push((KeyGroup::Location, base.location()?));
    }
    if let AnyEntity::Resource(resource) = entity {
        resource_lines(resource, &mut lines)?;
    }
    for token in attribute_tokens(base.attributes(), &[])? {
        lines.push((KeyGroup::Attribute, token));
    }
    Ok(lines)
}

/// Renderer for one of the text media types.
#[derive(Debug, Clone, Copy)]
pub struct TextRenderer {
    media_type: MediaType,
}

impl TextRenderer {
    /// Fails `Rendering` for `application/json`.
    pub fn new(media_type: MediaType) -> OcciResult<Self> {
        if media_type.is_json() {
            return Err(OcciError::Rendering(format!(
                "{media_type} is not a text media type"
            )));
        }
        Ok(Self { media_type })
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    fn finish(&self, lines: Lines) -> OcciResult<Rendered> {
        if self.media_type.is_header_text() {
            let mut headers = Headers::new();
            for (group, value) in lines {
                headers
                    .entry(group.canonical().to_string())
                    .or_default()
                    .push(value);
            }
            return Ok(Rendered {
                body: String::new(),
                headers,
            });
        }
        if self.media_type == MediaType::UriList {
            return Err(OcciError::Rendering(
                "only locations can be rendered as text/uri-list".to_string(),
            ));
        }
        let mut body = String::new();
        for (group, value) in lines {
            body.push_str(group.canonical());
            body.push_str(": ");
            body.push_str(&value);
            body.push('\n');
        }
        Ok(Rendered {
            body,
            headers: Headers::new(),
        })
    }

    pub fn entity(&self, entity: &AnyEntity) -> OcciResult<Rendered> {
        self.finish(entity_lines(entity)?)
    }

    pub fn resource(&self, resource: &Resource) -> OcciResult<Rendered> {
        self.entity(&AnyEntity::Resource(resource.clone()))
    }

    pub fn link(&self, link: &Link) -> OcciResult<Rendered> {
        self.entity(&AnyEntity::Link(link.clone()))
    }

    /// Text carries one entity per document; collections render as the
    /// locations of their members.
    pub fn collection(&self, entities: &[AnyEntity]) -> OcciResult<Rendered> {
        let locations = entities
            .iter()
            .map(|e| e.entity().location())
            .collect::<OcciResult<Vec<_>>>()?;
        self.locations(&locations)
    }

    pub fn action_instance(&self, instance: &ActionInstance) -> OcciResult<Rendered> {
        let mut lines = vec![(
            KeyGroup::Category,
            short_category(&AnyCategory::Action(instance.action().clone())).render(),
        )];
        for token in attribute_tokens(instance.attributes(), &[])? {
            lines.push((KeyGroup::Attribute, token));
        }
        self.finish(lines)
    }

    /// Full definitions of every category in the model.
    pub fn model(&self, model: &Model) -> OcciResult<Rendered> {
        let lines = model
            .categories()
            .iter()
            .map(|c| (KeyGroup::Category, full_category(c).render()))
            .collect();
        self.finish(lines)
    }

    pub fn locations(&self, locations: &[String]) -> OcciResult<Rendered> {
        if self.media_type == MediaType::UriList {
            let mut body = String::new();
            for location in locations {
                body.push_str(location);
                body.push('\n');
            }
            return Ok(Rendered {
                body,
                headers: Headers::new(),
            });
        }
        self.finish(
            locations
                .iter()
                .map(|l| (KeyGroup::Location, l.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use occi_types::attribute::{AttributeDefinition, AttributeType};
    use occi_types::category::{Action, Category, Kind, Mixin};
    use occi_types::entity::Entity;
    use occi_types::infrastructure::{CORE_SCHEME, INFRASTRUCTURE_SCHEME};
    use std::sync::Arc;

    fn resource() -> Kind {
        Kind::new(
            Category::new("resource", CORE_SCHEME)
                .unwrap()
                .with_attribute(
                    "occi.core.id",
                    AttributeDefinition::new(AttributeType::String).immutable(),
                )
                .unwrap()
                .with_attribute("occi.core.title", AttributeDefinition::new(AttributeType::String))
                .unwrap(),
            None,
        )
    }

    fn compute() -> Arc<Kind> {
        let start = Arc::new(Action::new(
            Category::new("start", "http://schemas.ogf.org/occi/infrastructure/compute/action#")
                .unwrap(),
        ));
        Arc::new(
            Kind::new(
                Category::new("compute", INFRASTRUCTURE_SCHEME)
                    .unwrap()
                    .with_attribute(
                        "occi.compute.cores",
                        AttributeDefinition::new(AttributeType::Number).required(),
                    )
                    .unwrap(),
                Some(&resource()),
            )
            .with_action(start),
        )
    }

    fn vm() -> AnyEntity {
        let kind = compute();
        let start = kind.actions()[0].clone();
        let entity = Entity::builder(kind)
            .id("vm1")
            .title("say \"hi\"")
            .attribute("occi.compute.cores", 2)
            .action(start)
            .build()
            .unwrap();
        AnyEntity::from_entity(entity)
    }

    #[test]
    fn test_value_tokens() {
        assert_eq!(value_token(&AttributeValue::from(2)).unwrap(), "2");
        assert_eq!(value_token(&AttributeValue::from(false)).unwrap(), "false");
        assert_eq!(value_token(&AttributeValue::from("a\"b")).unwrap(), r#""a\"b""#);
        let nested = AttributeValue::Nested(AttributeSet::new());
        assert!(matches!(value_token(&nested), Err(OcciError::Rendering(_))));
    }

    #[test]
    fn test_render_plain() {
        let renderer = TextRenderer::new(MediaType::TextPlain).unwrap();
        let rendered = renderer.entity(&vm()).unwrap();
        let lines: Vec<&str> = rendered.body.lines().collect();
        assert_eq!(
            lines[0],
            r#"Category: compute;scheme="http://schemas.ogf.org/occi/infrastructure#";class="kind""#
        );
        assert!(lines.contains(
            &r#"Link: </compute/vm1?action=start>;rel="http://schemas.ogf.org/occi/infrastructure/compute/action#start""#
        ));
        assert!(lines.contains(&"X-OCCI-Attribute: occi.compute.cores=2"));
        assert!(lines.contains(&r#"X-OCCI-Attribute: occi.core.title="say \"hi\"""#));
        assert!(rendered.headers.is_empty());
    }

    #[test]
    fn test_render_headers() {
        let renderer = TextRenderer::new(MediaType::TextOcci).unwrap();
        let rendered = renderer.entity(&vm()).unwrap();
        assert!(rendered.body.is_empty());
        assert_eq!(rendered.headers["Category"].len(), 1);
        assert_eq!(rendered.headers["X-OCCI-Attribute"].len(), 3);
        assert_eq!(rendered.headers["Link"].len(), 1);
    }

    #[test]
    fn test_nested_value_fails() {
        let mut entity = vm();
        entity
            .entity_mut()
            .attributes_mut()
            .set("occi.compute.cores", AttributeValue::Nested(AttributeSet::new()))
            .unwrap_err();
        entity
            .entity_mut()
            .attributes_mut()
            .set("custom", AttributeValue::Nested(AttributeSet::new()))
            .unwrap();
        let renderer = TextRenderer::new(MediaType::TextPlain).unwrap();
        assert!(matches!(renderer.entity(&entity), Err(OcciError::Rendering(_))));
    }

    #[test]
    fn test_render_locations() {
        let locations = vec!["/compute/1".to_string(), "/compute/2".to_string()];
        let uri_list = TextRenderer::new(MediaType::UriList).unwrap();
        assert_eq!(uri_list.locations(&locations).unwrap().body, "/compute/1\n/compute/2\n");
        assert!(uri_list.entity(&vm()).is_err());

        let plain = TextRenderer::new(MediaType::TextPlain).unwrap();
        assert_eq!(
            plain.collection(&[vm()]).unwrap().body,
            "X-OCCI-Location: /compute/vm1\n"
        );
    }

    #[test]
    fn test_render_model() {
        let mut model = Model::new();
        let kind = compute();
        model.register_action((*kind.actions()[0]).clone()).unwrap();
        model.register_kind(resource()).unwrap();
        model.register_kind((*kind).clone()).unwrap();
        model
            .register_mixin(
                Mixin::new(Category::new("os_tpl", INFRASTRUCTURE_SCHEME).unwrap())
                    .with_applies([kind.identifier()]),
            )
            .unwrap();
        let rendered = TextRenderer::new(MediaType::TextPlain)
            .unwrap()
            .model(&model)
            .unwrap();
        assert!(rendered.body.contains(
            r#"rel="http://schemas.ogf.org/occi/core#resource";location="/compute/";attributes="occi.compute.cores{required} occi.core.id{immutable} occi.core.title""#
        ));
        assert!(rendered.body.contains(r#"class="mixin";applies="http://schemas.ogf.org/occi/infrastructure#compute";location="/mixin/os_tpl/""#));
        assert!(rendered.body.contains(r#"start;scheme="http://schemas.ogf.org/occi/infrastructure/compute/action#";class="action""#));
    }
}
