//! Entity instances.
//!
//! An [`Entity`] is classified by one [`Kind`] and any number of [`Mixin`]s.
//! Its live [`AttributeSet`] is kept in step with the definitions those
//! categories contribute: assigning a kind force-resets everything, adding a
//! mixin binds only the new definitions and keeps existing values.

use crate::attribute::AttributeDefinitions;
use crate::attribute_set::AttributeSet;
use crate::category::{Action, Categorized, Kind, Mixin};
use crate::config::ValidationConfig;
use crate::error::{OcciError, OcciResult};
use crate::value::AttributeValue;
use std::sync::Arc;
use tracing::{debug, warn};

/// `occi.core.id`
pub const ATTR_ID: &str = "occi.core.id";
/// `occi.core.title`
pub const ATTR_TITLE: &str = "occi.core.title";

/// A typed instance: kind, mixins, enabled actions and live attributes.
///
/// While an entity has a resolvable location it is registered under that
/// location with every attached mixin (see [`Mixin::entities`]). The
/// registration follows the entity through clones, mixin changes, id and
/// location changes, and is withdrawn on drop.
#[derive(Debug, PartialEq)]
pub struct Entity {
    kind: Arc<Kind>,
    mixins: Vec<Arc<Mixin>>,
    actions: Vec<Arc<Action>>,
    attributes: AttributeSet,
    location: Option<String>,
    tracked: Option<String>,
}

impl Clone for Entity {
    fn clone(&self) -> Self {
        let copy = Self {
            kind: Arc::clone(&self.kind),
            mixins: self.mixins.clone(),
            actions: self.actions.clone(),
            attributes: self.attributes.clone(),
            location: self.location.clone(),
            tracked: self.tracked.clone(),
        };
        if let Some(key) = &copy.tracked {
            for mixin in &copy.mixins {
                mixin.attach_entity(key);
            }
        }
        copy
    }
}

impl Drop for Entity {
    fn drop(&mut self) {
        if let Some(key) = &self.tracked {
            for mixin in &self.mixins {
                mixin.detach_entity(key);
            }
        }
    }
}

/// Builder returned by [`Entity::builder`].
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    kind: Arc<Kind>,
    id: Option<String>,
    title: Option<String>,
    location: Option<String>,
    mixins: Vec<Arc<Mixin>>,
    actions: Vec<Arc<Action>>,
    attributes: Vec<(String, AttributeValue)>,
}

impl EntityBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn mixin(mut self, mixin: Arc<Mixin>) -> Self {
        self.mixins.push(mixin);
        self
    }

    pub fn action(mut self, action: Arc<Action>) -> Self {
        self.actions.push(action);
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Build the entity: bind kind and mixin definitions, enable actions,
    /// apply attribute values, and generate an id if the kind defines one.
    pub fn build(self) -> OcciResult<Entity> {
        let mut entity = Entity {
            kind: self.kind,
            mixins: Vec::new(),
            actions: Vec::new(),
            attributes: AttributeSet::new(),
            location: self.location,
            tracked: None,
        };
        entity.reset_attributes(true)?;
        for mixin in self.mixins {
            entity.add_mixin(mixin)?;
        }
        for action in self.actions {
            entity.add_action(action)?;
        }
        for (name, value) in self.attributes {
            entity.attributes.set(&name, value)?;
        }
        if let Some(id) = self.id {
            entity.set_id(id)?;
        }
        if let Some(title) = self.title {
            entity.set_title(title)?;
        }
        if entity.attributes.contains(ATTR_ID) {
            entity.identify()?;
        }
        entity.sync_mixin_entities();
        Ok(entity)
    }
}

impl Entity {
    pub fn builder(kind: Arc<Kind>) -> EntityBuilder {
        EntityBuilder {
            kind,
            id: None,
            title: None,
            location: None,
            mixins: Vec::new(),
            actions: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Entity of the given kind with default attributes.
    pub fn new(kind: Arc<Kind>) -> OcciResult<Self> {
        Self::builder(kind).build()
    }

    pub fn kind(&self) -> &Arc<Kind> {
        &self.kind
    }

    pub fn kind_identifier(&self) -> String {
        self.kind.identifier()
    }

    pub fn mixins(&self) -> &[Arc<Mixin>] {
        &self.mixins
    }

    pub fn actions(&self) -> &[Arc<Action>] {
        &self.actions
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeSet {
        &mut self.attributes
    }

    /// Value at `name`; unreachable paths read as `None`.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.value(name).ok().flatten()
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<AttributeValue>) -> OcciResult<()> {
        self.attributes.set(name, value)?;
        if name == ATTR_ID {
            self.sync_mixin_entities();
        }
        Ok(())
    }

    fn string_attribute(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(AttributeValue::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.string_attribute(ATTR_ID)
    }

    pub fn set_id(&mut self, id: impl Into<String>) -> OcciResult<()> {
        self.attributes.set(ATTR_ID, id.into())?;
        self.sync_mixin_entities();
        Ok(())
    }

    pub fn title(&self) -> Option<&str> {
        self.string_attribute(ATTR_TITLE)
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> OcciResult<()> {
        self.attributes.set(ATTR_TITLE, title.into())
    }

    /// Return the id, generating a random UUID first if none is set.
    pub fn identify(&mut self) -> OcciResult<String> {
        if let Some(id) = self.id() {
            if !id.is_empty() {
                return Ok(id.to_string());
            }
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.set_id(id.clone())?;
        Ok(id)
    }

    /// Explicit location, or `kind.location + id`.
    pub fn location(&self) -> OcciResult<String> {
        if let Some(location) = &self.location {
            return Ok(location.clone());
        }
        let id = self.id().filter(|id| !id.is_empty()).ok_or_else(|| {
            OcciError::MandatoryArgument(
                "cannot generate default location without an id".to_string(),
            )
        })?;
        let base = self.kind.location();
        if base.ends_with('/') {
            Ok(format!("{base}{id}"))
        } else {
            Ok(format!("{base}/{id}"))
        }
    }

    pub fn set_location(&mut self, location: Option<String>) {
        self.location = location;
        self.sync_mixin_entities();
    }

    /// Whether a location was set explicitly rather than derived.
    pub fn has_explicit_location(&self) -> bool {
        self.location.is_some()
    }

    /// Replace the kind. Every attribute is reset to the new definitions'
    /// defaults and attributes no longer defined are dropped.
    pub fn set_kind(&mut self, kind: Arc<Kind>) -> OcciResult<()> {
        self.kind = kind;
        self.reset_attributes(true)?;
        self.sync_mixin_entities();
        Ok(())
    }

    pub fn mixin_by_identifier(&self, identifier: &str) -> Option<&Arc<Mixin>> {
        self.mixins.iter().find(|m| m.identifier() == identifier)
    }

    pub fn has_mixin(&self, identifier: &str) -> bool {
        self.mixin_by_identifier(identifier).is_some()
    }

    /// Attach a mixin and bind its definitions without touching existing
    /// values. Adding an attached mixin again is a no-op. Fails
    /// `AttributeDefinition` (and changes nothing) when another attached
    /// mixin already defines one of its attributes.
    pub fn add_mixin(&mut self, mixin: Arc<Mixin>) -> OcciResult<()> {
        if self.has_mixin(&mixin.identifier()) {
            return Ok(());
        }
        let mut candidate = self.mixins.clone();
        candidate.push(Arc::clone(&mixin));
        ensure_no_conflicts(&candidate)?;
        self.mixins = candidate;
        if let Some(key) = &self.tracked {
            mixin.attach_entity(key);
        }
        self.reset_added_attributes(false)
    }

    /// Detach a mixin. Remaining definitions are re-bound and attributes no
    /// longer defined by the kind or another mixin are dropped.
    pub fn remove_mixin(&mut self, identifier: &str) -> OcciResult<Option<Arc<Mixin>>> {
        let Some(pos) = self.mixins.iter().position(|m| m.identifier() == identifier) else {
            return Ok(None);
        };
        let removed = self.mixins.remove(pos);
        if let Some(key) = &self.tracked {
            removed.detach_entity(key);
        }
        self.reset_attributes(false)?;
        Ok(Some(removed))
    }

    pub fn replace_mixin(&mut self, old_identifier: &str, new_mixin: Arc<Mixin>) -> OcciResult<()> {
        self.remove_mixin(old_identifier)?;
        self.add_mixin(new_mixin)
    }

    /// Replace all mixins. Mixin-contributed attributes are force-reset.
    pub fn set_mixins(&mut self, mixins: Vec<Arc<Mixin>>) -> OcciResult<()> {
        ensure_no_conflicts(&mixins)?;
        let previous = std::mem::replace(&mut self.mixins, mixins);
        if let Some(key) = &self.tracked {
            for mixin in &previous {
                mixin.detach_entity(key);
            }
            for mixin in &self.mixins {
                mixin.attach_entity(key);
            }
        }
        self.reset_added_attributes(true)?;
        let defined = self.defined_attributes();
        self.attributes.remove_undefined(&defined);
        Ok(())
    }

    /// Enable an action. It must be one of the kind's actions.
    pub fn add_action(&mut self, action: Arc<Action>) -> OcciResult<()> {
        if !self.kind.actions().contains(&action) {
            return Err(OcciError::MandatoryArgument(format!(
                "cannot add action {} not defined on kind {}",
                action.identifier(),
                self.kind.identifier()
            )));
        }
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
        Ok(())
    }

    pub fn remove_action(&mut self, identifier: &str) -> Option<Arc<Action>> {
        let pos = self.actions.iter().position(|a| a.identifier() == identifier)?;
        Some(self.actions.remove(pos))
    }

    /// Enable the kind action with the given term.
    pub fn enable_action(&mut self, term: &str) -> OcciResult<()> {
        let action = self.kind.action_by_term(term).cloned().ok_or_else(|| {
            OcciError::MandatoryArgument(format!(
                "action {term:?} is not defined on kind {}",
                self.kind.identifier()
            ))
        })?;
        self.add_action(action)
    }

    /// Disable the enabled action with the given term. Unknown terms are ignored.
    pub fn disable_action(&mut self, term: &str) {
        self.actions.retain(|a| a.term() != term);
    }

    /// Validate every attribute against its definition. The first failure is
    /// returned with the attribute name attached.
    pub fn validate(&self, config: &ValidationConfig) -> OcciResult<()> {
        if let Some(action) = self.actions.iter().find(|a| !self.kind.actions().contains(*a)) {
            return Err(OcciError::InstanceValidation(format!(
                "enabled action {} is not defined on kind {}",
                action.identifier(),
                self.kind.identifier()
            )));
        }
        for (name, attribute) in self.attributes.attributes() {
            attribute
                .validate(config)
                .map_err(|e| e.in_attribute(&name))?;
        }
        Ok(())
    }

    /// [`validate`](Self::validate) reduced to a bool; failures are logged.
    pub fn is_valid(&self, config: &ValidationConfig) -> bool {
        match self.validate(config) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, kind = %self.kind.identifier(), "Entity invalid");
                false
            }
        }
    }

    /// Every definition the kind and the attached mixins contribute.
    pub fn defined_attributes(&self) -> AttributeDefinitions {
        let mut defs = self.kind.attributes().clone();
        for mixin in &self.mixins {
            defs.overlay(mixin.attributes());
        }
        defs
    }

    /// Move the mixin registrations to the current location. An entity
    /// without a resolvable location is not registered anywhere.
    fn sync_mixin_entities(&mut self) {
        let current = self.location().ok();
        if current == self.tracked {
            return;
        }
        if let Some(old) = &self.tracked {
            for mixin in &self.mixins {
                mixin.detach_entity(old);
            }
        }
        if let Some(new) = &current {
            for mixin in &self.mixins {
                mixin.attach_entity(new);
            }
        }
        self.tracked = current;
    }

    fn reset_added_attributes(&mut self, force: bool) -> OcciResult<()> {
        ensure_no_conflicts(&self.mixins)?;
        for mixin in &self.mixins {
            self.attributes.reset(mixin.attributes(), force);
        }
        Ok(())
    }

    fn reset_attributes(&mut self, force: bool) -> OcciResult<()> {
        let base = self.kind.attributes().clone();
        self.attributes.reset(&base, force);
        self.reset_added_attributes(force)?;
        let defined = self.defined_attributes();
        self.attributes.remove_undefined(&defined);
        debug!(kind = %self.kind.identifier(), force, "Reset entity attributes");
        Ok(())
    }
}

fn ensure_no_conflicts(mixins: &[Arc<Mixin>]) -> OcciResult<()> {
    for (i, a) in mixins.iter().enumerate() {
        for b in &mixins[i + 1..] {
            if let Some(name) = a.attributes().conflicts(b.attributes()).first() {
                return Err(OcciError::AttributeDefinition(format!(
                    "attribute {name:?} already modified by another mixin ({} and {})",
                    a.identifier(),
                    b.identifier()
                )));
            }
        }
    }
    Ok(())
}
