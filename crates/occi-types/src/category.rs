//! Categories: the classification primitives of the model.
//!
//! A [`Category`] is identified by `scheme + term`. [`Kind`]s add single
//! inheritance, actions and a location; [`Mixin`]s add composition through
//! `depends`/`applies` identifier lists; [`Action`]s carry the definitions of
//! their invocation parameters.

use crate::attribute::{AttributeDefinition, AttributeDefinitions};
use crate::error::{OcciError, OcciResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Base classification primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    term: String,
    scheme: String,
    title: Option<String>,
    attributes: AttributeDefinitions,
}

fn validate_term(term: &str) -> OcciResult<()> {
    let mut chars = term.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if starts_ok && rest_ok {
        Ok(())
    } else {
        Err(OcciError::CategoryValidation(format!(
            "term {term:?} is not a valid category term"
        )))
    }
}

fn validate_scheme(scheme: &str) -> OcciResult<()> {
    if !scheme.ends_with('#') {
        return Err(OcciError::CategoryValidation(format!(
            "scheme {scheme:?} must end with '#'"
        )));
    }
    url::Url::parse(scheme).map_err(|e| {
        OcciError::CategoryValidation(format!("scheme {scheme:?} is not an absolute URI: {e}"))
    })?;
    Ok(())
}

impl Category {
    /// Validates both parts; invalid input fails `CategoryValidation`.
    pub fn new(term: impl Into<String>, scheme: impl Into<String>) -> OcciResult<Self> {
        let term = term.into();
        let scheme = scheme.into();
        validate_term(&term)?;
        validate_scheme(&scheme)?;
        Ok(Self {
            term,
            scheme,
            title: None,
            attributes: AttributeDefinitions::new(),
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_attributes(mut self, attributes: AttributeDefinitions) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_attribute(mut self, name: &str, definition: AttributeDefinition) -> OcciResult<Self> {
        self.attributes.insert(name, definition)?;
        Ok(self)
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn attributes(&self) -> &AttributeDefinitions {
        &self.attributes
    }

    /// `scheme + term`.
    pub fn identifier(&self) -> String {
        format!("{}{}", self.scheme, self.term)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.scheme, self.term)
    }
}

/// Shared accessors of everything built on a [`Category`].
pub trait Categorized {
    fn category(&self) -> &Category;

    fn term(&self) -> &str {
        self.category().term()
    }

    fn scheme(&self) -> &str {
        self.category().scheme()
    }

    fn title(&self) -> Option<&str> {
        self.category().title()
    }

    fn identifier(&self) -> String {
        self.category().identifier()
    }

    /// Effective attribute definitions.
    fn attributes(&self) -> &AttributeDefinitions {
        self.category().attributes()
    }
}

impl Categorized for Category {
    fn category(&self) -> &Category {
        self
    }
}

/// A named operation attachable to kinds and mixins.
#[derive(Debug, Clone)]
pub struct Action {
    category: Category,
}

impl Action {
    pub fn new(category: Category) -> Self {
        Self { category }
    }
}

impl Categorized for Action {
    fn category(&self) -> &Category {
        &self.category
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.category.identifier() == other.category.identifier()
    }
}

impl Eq for Action {}

/// Primary type of an entity. Single inheritance through `parent`.
///
/// The parent is held by identifier, not by pointer: a kind never keeps its
/// ancestors alive. The identifier chain is captured when the kind is built,
/// and the [`Model`](crate::model::Model) resolves it back to registered
/// kinds.
#[derive(Debug, Clone)]
pub struct Kind {
    category: Category,
    parent: Option<String>,
    ancestors: Vec<String>,
    actions: Vec<Arc<Action>>,
    location: String,
}

impl Kind {
    /// Build a kind. The parent's attribute definitions are copied into the
    /// child now; on a name clash the parent's definition is kept.
    pub fn new(category: Category, parent: Option<&Kind>) -> Self {
        let mut category = category;
        let mut ancestors = Vec::new();
        if let Some(parent) = parent {
            category.attributes.overlay(parent.attributes());
            ancestors.push(parent.identifier());
            ancestors.extend(parent.ancestors.iter().cloned());
        }
        let location = format!("/{}/", category.term);
        Self {
            category,
            parent: ancestors.first().cloned(),
            ancestors,
            actions: Vec::new(),
            location,
        }
    }

    pub fn with_actions(mut self, actions: Vec<Arc<Action>>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_action(mut self, action: Arc<Action>) -> Self {
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> OcciResult<Self> {
        self.location = validate_location(location.into())?;
        Ok(self)
    }

    /// Identifier of the immediate parent.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn actions(&self) -> &[Arc<Action>] {
        &self.actions
    }

    pub fn action_by_term(&self, term: &str) -> Option<&Arc<Action>> {
        self.actions.iter().find(|a| a.term() == term)
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn is_hierarchy_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Identifiers of the transitive parent chain, nearest first. Empty for a
    /// root kind.
    pub fn related(&self) -> &[String] {
        &self.ancestors
    }

    /// Identifier of the immediate parent, as a slice of zero or one.
    pub fn directly_related(&self) -> &[String] {
        &self.ancestors[..self.ancestors.len().min(1)]
    }

    /// True for `self` and every kind in the parent chain.
    pub fn is_related(&self, other: &Kind) -> bool {
        self.is_related_to(&other.identifier())
    }

    pub fn is_related_to(&self, identifier: &str) -> bool {
        self.identifier() == identifier || self.ancestors.iter().any(|a| a == identifier)
    }

    /// True for `self` and the immediate parent only.
    pub fn is_directly_related(&self, other: &Kind) -> bool {
        let id = other.identifier();
        self.identifier() == id || self.parent.as_deref() == Some(id.as_str())
    }
}

impl Categorized for Kind {
    fn category(&self) -> &Category {
        &self.category
    }
}

impl PartialEq for Kind {
    fn eq(&self, other: &Self) -> bool {
        self.category.identifier() == other.category.identifier()
    }
}

impl Eq for Kind {}

/// Optional composable category. `depends` names other mixins, `applies`
/// names kinds; both are identifiers resolved through the model.
///
/// A mixin also tracks which entities currently carry it, by entity
/// location. The entries are counts, not pointers: clones of one entity
/// share a location, and the entry goes away when the last of them detaches.
#[derive(Debug)]
pub struct Mixin {
    category: Category,
    depends: Vec<String>,
    applies: Vec<String>,
    actions: Vec<Arc<Action>>,
    location: String,
    entities: Mutex<BTreeMap<String, usize>>,
}

impl Clone for Mixin {
    fn clone(&self) -> Self {
        Self {
            category: self.category.clone(),
            depends: self.depends.clone(),
            applies: self.applies.clone(),
            actions: self.actions.clone(),
            location: self.location.clone(),
            entities: Mutex::new(self.carriers().clone()),
        }
    }
}

fn push_unique(list: &mut Vec<String>, identifier: String) {
    if !list.contains(&identifier) {
        list.push(identifier);
    }
}

impl Mixin {
    pub fn new(category: Category) -> Self {
        let location = format!("/mixin/{}/", category.term);
        Self {
            category,
            depends: Vec::new(),
            applies: Vec::new(),
            actions: Vec::new(),
            location,
            entities: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_depends<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in identifiers {
            push_unique(&mut self.depends, id.into());
        }
        self
    }

    pub fn with_applies<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in identifiers {
            push_unique(&mut self.applies, id.into());
        }
        self
    }

    pub fn with_actions(mut self, actions: Vec<Arc<Action>>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> OcciResult<Self> {
        self.location = validate_location(location.into())?;
        Ok(self)
    }

    pub fn depends(&self) -> &[String] {
        &self.depends
    }

    pub fn applies(&self) -> &[String] {
        &self.applies
    }

    pub fn actions(&self) -> &[Arc<Action>] {
        &self.actions
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// `depends ∪ applies`, deduplicated, in declaration order.
    pub fn related(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for id in self.depends.iter().chain(self.applies.iter()) {
            if !out.contains(&id.as_str()) {
                out.push(id);
            }
        }
        out
    }

    pub fn is_related_to(&self, identifier: &str) -> bool {
        self.identifier() == identifier || self.related().contains(&identifier)
    }

    fn carriers(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, usize>> {
        self.entities.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Locations of the entities currently carrying this mixin, sorted.
    pub fn entities(&self) -> Vec<String> {
        self.carriers().keys().cloned().collect()
    }

    /// Whether an entity at `location` currently carries this mixin.
    pub fn is_carried_by(&self, location: &str) -> bool {
        self.carriers().contains_key(location)
    }

    pub(crate) fn attach_entity(&self, location: &str) {
        *self.carriers().entry(location.to_string()).or_insert(0) += 1;
    }

    pub(crate) fn detach_entity(&self, location: &str) {
        let mut carriers = self.carriers();
        if let Some(count) = carriers.get_mut(location) {
            *count -= 1;
            if *count == 0 {
                carriers.remove(location);
            }
        }
    }
}

impl Categorized for Mixin {
    fn category(&self) -> &Category {
        &self.category
    }
}

impl PartialEq for Mixin {
    fn eq(&self, other: &Self) -> bool {
        self.category.identifier() == other.category.identifier()
    }
}

impl Eq for Mixin {}

fn validate_location(location: String) -> OcciResult<String> {
    if location.is_empty() || location.chars().any(char::is_whitespace) {
        return Err(OcciError::CategoryValidation(format!(
            "location {location:?} is not a valid path"
        )));
    }
    Ok(location)
}

/// Any registered category.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyCategory {
    Kind(Arc<Kind>),
    Mixin(Arc<Mixin>),
    Action(Arc<Action>),
}

impl AnyCategory {
    pub fn as_kind(&self) -> Option<&Arc<Kind>> {
        match self {
            Self::Kind(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_mixin(&self) -> Option<&Arc<Mixin>> {
        match self {
            Self::Mixin(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<&Arc<Action>> {
        match self {
            Self::Action(a) => Some(a),
            _ => None,
        }
    }

    /// Wire name of the category class: `kind`, `mixin` or `action`.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Kind(_) => "kind",
            Self::Mixin(_) => "mixin",
            Self::Action(_) => "action",
        }
    }
}

impl Categorized for AnyCategory {
    fn category(&self) -> &Category {
        match self {
            Self::Kind(k) => k.category(),
            Self::Mixin(m) => m.category(),
            Self::Action(a) => a.category(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeType;

    const CORE: &str = "http://schemas.ogf.org/occi/core#";
    const INFRA: &str = "http://schemas.ogf.org/occi/infrastructure#";

    fn kind(term: &str, scheme: &str, parent: Option<&Kind>) -> Arc<Kind> {
        Arc::new(Kind::new(Category::new(term, scheme).unwrap(), parent))
    }

    #[test]
    fn test_category_identifier() {
        let cat = Category::new("compute", INFRA).unwrap().with_title("Compute");
        assert_eq!(cat.identifier(), format!("{INFRA}compute"));
        assert_eq!(cat.to_string(), cat.identifier());
        assert_eq!(cat.title(), Some("Compute"));
    }

    #[test]
    fn test_invalid_term() {
        for term in ["", "Compute", "-x", "a b", "a.b"] {
            assert!(
                matches!(Category::new(term, INFRA), Err(OcciError::CategoryValidation(_))),
                "term {term:?} should be rejected"
            );
        }
        assert!(Category::new("os_tpl", INFRA).is_ok());
        assert!(Category::new("1a-b", INFRA).is_ok());
    }

    #[test]
    fn test_invalid_scheme() {
        for scheme in ["", "http://x/", "no-scheme#"] {
            assert!(matches!(
                Category::new("t", scheme),
                Err(OcciError::CategoryValidation(_))
            ));
        }
    }

    #[test]
    fn test_kind_default_location() {
        let k = kind("compute", INFRA, None);
        assert_eq!(k.location(), "/compute/");
        let m = Mixin::new(Category::new("os_tpl", INFRA).unwrap());
        assert_eq!(m.location(), "/mixin/os_tpl/");
    }

    #[test]
    fn test_kind_relations() {
        let entity = kind("entity", CORE, None);
        let resource = kind("resource", CORE, Some(&*entity));
        let compute = kind("compute", INFRA, Some(&*resource));

        assert!(entity.is_related(&entity));
        assert!(compute.is_related(&compute));
        assert!(compute.is_related(&resource));
        assert!(compute.is_related(&entity));
        assert!(!entity.is_related(&compute));
        assert!(compute.is_directly_related(&resource));
        assert!(!compute.is_directly_related(&entity));

        assert!(entity.is_hierarchy_root());
        assert!(entity.related().is_empty());
        assert_eq!(
            compute.related(),
            [format!("{CORE}resource"), format!("{CORE}entity")]
        );
        assert_eq!(compute.directly_related(), [format!("{CORE}resource")]);
        assert_eq!(compute.parent(), Some(format!("{CORE}resource").as_str()));
        assert!(entity.directly_related().is_empty());
    }

    #[test]
    fn test_parent_definitions_snapshot_parent_wins() {
        let parent_cat = Category::new("resource", CORE)
            .unwrap()
            .with_attribute("occi.core.summary", AttributeDefinition::new(AttributeType::String))
            .unwrap();
        let parent = Arc::new(Kind::new(parent_cat, None));
        let child_cat = Category::new("compute", INFRA)
            .unwrap()
            .with_attribute(
                "occi.core.summary",
                AttributeDefinition::new(AttributeType::Number),
            )
            .unwrap()
            .with_attribute("occi.compute.cores", AttributeDefinition::new(AttributeType::Number))
            .unwrap();
        let child = Kind::new(child_cat, Some(&*parent));

        assert_eq!(
            child.attributes().get("occi.core.summary").unwrap().attr_type(),
            AttributeType::String
        );
        assert!(child.attributes().contains("occi.compute.cores"));
    }

    #[test]
    fn test_kind_does_not_own_parent() {
        let entity = kind("entity", CORE, None);
        let resource = kind("resource", CORE, Some(&*entity));
        let weak = Arc::downgrade(&entity);
        drop(entity);
        assert!(weak.upgrade().is_none());
        assert!(resource.is_related_to(&format!("{CORE}entity")));
        assert_eq!(Arc::strong_count(&resource), 1);
    }

    #[test]
    fn test_mixin_related() {
        let m = Mixin::new(Category::new("small", "http://example.org/tpl#").unwrap())
            .with_depends([format!("{INFRA}os_tpl"), format!("{INFRA}os_tpl")])
            .with_applies([format!("{INFRA}compute"), format!("{INFRA}os_tpl")]);
        assert_eq!(m.depends().len(), 1);
        assert_eq!(m.related(), vec![format!("{INFRA}os_tpl"), format!("{INFRA}compute")]);
        assert!(m.is_related_to("http://example.org/tpl#small"));
        assert!(m.is_related_to(&format!("{INFRA}compute")));
        assert!(!m.is_related_to(&format!("{INFRA}network")));
    }

    #[test]
    fn test_mixin_entity_counts() {
        let m = Mixin::new(Category::new("small", "http://example.org/tpl#").unwrap());
        assert!(m.entities().is_empty());
        m.attach_entity("/compute/b");
        m.attach_entity("/compute/a");
        m.attach_entity("/compute/a");
        assert_eq!(m.entities(), vec!["/compute/a", "/compute/b"]);
        m.detach_entity("/compute/a");
        assert!(m.is_carried_by("/compute/a"));
        m.detach_entity("/compute/a");
        m.detach_entity("/compute/zzz");
        assert_eq!(m.entities(), vec!["/compute/b"]);
        assert_eq!(m.clone().entities(), vec!["/compute/b"]);
    }

    #[test]
    fn test_kind_actions() {
        let start = Arc::new(Action::new(
            Category::new("start", "http://schemas.ogf.org/occi/infrastructure/compute/action#").unwrap(),
        ));
        let k = Kind::new(Category::new("compute", INFRA).unwrap(), None)
            .with_action(start.clone())
            .with_action(start);
        assert_eq!(k.actions().len(), 1);
        assert!(k.action_by_term("start").is_some());
        assert!(k.action_by_term("stop").is_none());
    }
}
