//! Resources, links and the entity sum type.

use crate::category::{Categorized, Kind};
use crate::config::ValidationConfig;
use crate::entity::Entity;
use crate::error::{OcciError, OcciResult};
use crate::infrastructure::LINK_KIND;
use crate::value::AttributeValue;
use tracing::warn;

/// `occi.core.summary`
pub const ATTR_SUMMARY: &str = "occi.core.summary";
/// `occi.core.source`
pub const ATTR_SOURCE: &str = "occi.core.source";
/// `occi.core.target`
pub const ATTR_TARGET: &str = "occi.core.target";

/// A link between two resources.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    entity: Entity,
    source_kind: Option<String>,
    target_kind: Option<String>,
}

impl Link {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            source_kind: None,
            target_kind: None,
        }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }

    pub fn into_entity(self) -> Entity {
        self.entity
    }

    pub fn id(&self) -> Option<&str> {
        self.entity.id()
    }

    pub fn source(&self) -> Option<&str> {
        self.entity.attribute(ATTR_SOURCE).and_then(AttributeValue::as_str)
    }

    pub fn set_source(&mut self, location: impl Into<String>) -> OcciResult<()> {
        self.entity.set_attribute(ATTR_SOURCE, location.into())
    }

    pub fn target(&self) -> Option<&str> {
        self.entity.attribute(ATTR_TARGET).and_then(AttributeValue::as_str)
    }

    pub fn set_target(&mut self, location: impl Into<String>) -> OcciResult<()> {
        self.entity.set_attribute(ATTR_TARGET, location.into())
    }

    /// Kind identifier of the source resource, if known.
    pub fn source_kind(&self) -> Option<&str> {
        self.source_kind.as_deref()
    }

    pub fn set_source_kind(&mut self, identifier: Option<String>) {
        self.source_kind = identifier;
    }

    /// Kind identifier of the target resource, if known.
    pub fn target_kind(&self) -> Option<&str> {
        self.target_kind.as_deref()
    }

    pub fn set_target_kind(&mut self, identifier: Option<String>) {
        self.target_kind = identifier;
    }

    pub fn validate(&self, config: &ValidationConfig) -> OcciResult<()> {
        self.entity.validate(config)
    }
}

/// A resource with its outgoing links.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    entity: Entity,
    links: Vec<Link>,
}

impl Resource {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            links: Vec::new(),
        }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }

    pub fn into_entity(self) -> Entity {
        self.entity
    }

    pub fn id(&self) -> Option<&str> {
        self.entity.id()
    }

    pub fn summary(&self) -> Option<&str> {
        self.entity.attribute(ATTR_SUMMARY).and_then(AttributeValue::as_str)
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) -> OcciResult<()> {
        self.entity.set_attribute(ATTR_SUMMARY, summary.into())
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Replace all links. `None` fails `InstanceValidation`.
    pub fn set_links(&mut self, links: Option<Vec<Link>>) -> OcciResult<()> {
        let links = links.ok_or_else(|| {
            OcciError::InstanceValidation("missing valid links".to_string())
        })?;
        self.links.clear();
        for link in links {
            self.add_link(link)?;
        }
        Ok(())
    }

    /// Attach a link: its source becomes this resource's location and its
    /// `source_kind` this resource's kind. A link with an id already
    /// attached is ignored.
    pub fn add_link(&mut self, mut link: Link) -> OcciResult<()> {
        let id = link.entity_mut().identify()?;
        if self.links.iter().any(|l| l.id() == Some(id.as_str())) {
            return Ok(());
        }
        link.set_source(self.entity.location()?)?;
        link.set_source_kind(Some(self.entity.kind_identifier()));
        self.links.push(link);
        Ok(())
    }

    /// Detach the link with the given id. Unknown ids are ignored.
    pub fn remove_link(&mut self, id: &str) -> Option<Link> {
        let pos = self.links.iter().position(|l| l.id() == Some(id))?;
        Some(self.links.remove(pos))
    }

    /// Links whose kind is exactly `kind`.
    pub fn links_by_kind(&self, kind: &Kind) -> Vec<&Link> {
        self.links_by_kind_identifier(&kind.identifier())
    }

    pub fn links_by_kind_identifier(&self, identifier: &str) -> Vec<&Link> {
        self.links
            .iter()
            .filter(|l| l.entity().kind_identifier() == identifier)
            .collect()
    }

    /// Links whose kind is `kind` or descends from it.
    pub fn links_by_related_kind(&self, kind: &Kind) -> Vec<&Link> {
        self.links_by_related_identifier(&kind.identifier())
    }

    pub fn links_by_related_identifier(&self, identifier: &str) -> Vec<&Link> {
        self.links
            .iter()
            .filter(|l| l.entity().kind().is_related_to(identifier))
            .collect()
    }

    /// Validate the resource and each of its links.
    pub fn validate(&self, config: &ValidationConfig) -> OcciResult<()> {
        self.entity.validate(config)?;
        for link in &self.links {
            link.validate(config).map_err(|e| match link.id() {
                Some(id) => e.in_attribute(&format!("link {id}")),
                None => e,
            })?;
        }
        Ok(())
    }

    pub fn is_valid(&self, config: &ValidationConfig) -> bool {
        match self.validate(config) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Resource invalid");
                false
            }
        }
    }
}

/// Either entity variant.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyEntity {
    Resource(Resource),
    Link(Link),
}

impl AnyEntity {
    /// Wrap an entity according to its kind: descendants of the core link
    /// kind become links, everything else a resource.
    pub fn from_entity(entity: Entity) -> Self {
        if entity.kind().is_related_to(LINK_KIND) {
            Self::Link(Link::new(entity))
        } else {
            Self::Resource(Resource::new(entity))
        }
    }

    pub fn entity(&self) -> &Entity {
        match self {
            Self::Resource(r) => r.entity(),
            Self::Link(l) => l.entity(),
        }
    }

    pub fn entity_mut(&mut self) -> &mut Entity {
        match self {
            Self::Resource(r) => r.entity_mut(),
            Self::Link(l) => l.entity_mut(),
        }
    }

    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Self::Resource(r) => Some(r),
            Self::Link(_) => None,
        }
    }

    pub fn as_link(&self) -> Option<&Link> {
        match self {
            Self::Link(l) => Some(l),
            Self::Resource(_) => None,
        }
    }

    pub fn into_resource(self) -> Option<Resource> {
        match self {
            Self::Resource(r) => Some(r),
            Self::Link(_) => None,
        }
    }

    pub fn into_link(self) -> Option<Link> {
        match self {
            Self::Link(l) => Some(l),
            Self::Resource(_) => None,
        }
    }

    pub fn validate(&self, config: &ValidationConfig) -> OcciResult<()> {
        match self {
            Self::Resource(r) => r.validate(config),
            Self::Link(l) => l.validate(config),
        }
    }
}
