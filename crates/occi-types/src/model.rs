//! Category registry.
//!
//! The [`Model`] owns every registered kind, mixin and action behind an `Arc`
//! and resolves identifiers to them. Identifiers are unique across all three
//! families. References between categories (kind parents, mixin
//! `depends`/`applies`, attached actions) must resolve inside the same model
//! at registration time, so registration order is parents and dependencies
//! first.

use crate::category::{Action, AnyCategory, Categorized, Kind, Mixin};
use crate::error::{OcciError, OcciResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of all known categories.
#[derive(Debug, Clone, Default)]
pub struct Model {
    kinds: BTreeMap<String, Arc<Kind>>,
    mixins: BTreeMap<String, Arc<Mixin>>,
    actions: BTreeMap<String, Arc<Action>>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of registered categories.
    pub fn len(&self) -> usize {
        self.kinds.len() + self.mixins.len() + self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.kinds.contains_key(identifier)
            || self.mixins.contains_key(identifier)
            || self.actions.contains_key(identifier)
    }

    fn ensure_unregistered(&self, identifier: &str) -> OcciResult<()> {
        if self.contains(identifier) {
            Err(OcciError::CategoryValidation(format!(
                "category {identifier} is already registered"
            )))
        } else {
            Ok(())
        }
    }

    fn ensure_actions(&self, owner: &str, actions: &[Arc<Action>]) -> OcciResult<()> {
        for action in actions {
            let id = action.identifier();
            if !self.actions.contains_key(&id) {
                return Err(OcciError::CategoryValidation(format!(
                    "action {id} of {owner} is not registered"
                )));
            }
        }
        Ok(())
    }

    fn ensure_parent(&self, kind: &Kind) -> OcciResult<()> {
        if let Some(id) = kind.parent() {
            if !self.kinds.contains_key(id) {
                return Err(OcciError::CategoryValidation(format!(
                    "parent {id} of kind {} is not registered",
                    kind.identifier()
                )));
            }
        }
        Ok(())
    }

    fn ensure_mixin_references(&self, mixin: &Mixin) -> OcciResult<()> {
        for id in mixin.depends() {
            if !self.mixins.contains_key(id) {
                return Err(OcciError::CategoryValidation(format!(
                    "mixin {} depends on unknown mixin {id}",
                    mixin.identifier()
                )));
            }
        }
        for id in mixin.applies() {
            if !self.kinds.contains_key(id) {
                return Err(OcciError::CategoryValidation(format!(
                    "mixin {} applies to unknown kind {id}",
                    mixin.identifier()
                )));
            }
        }
        Ok(())
    }

    pub fn register_action(&mut self, action: Action) -> OcciResult<Arc<Action>> {
        let id = action.identifier();
        self.ensure_unregistered(&id)?;
        let action = Arc::new(action);
        self.actions.insert(id.clone(), Arc::clone(&action));
        debug!(identifier = %id, "Registered action");
        Ok(action)
    }

    /// Register a kind. Its parent and actions must already be registered.
    pub fn register_kind(&mut self, kind: Kind) -> OcciResult<Arc<Kind>> {
        let id = kind.identifier();
        self.ensure_unregistered(&id)?;
        self.ensure_parent(&kind)?;
        self.ensure_actions(&id, kind.actions())?;
        let kind = Arc::new(kind);
        self.kinds.insert(id.clone(), Arc::clone(&kind));
        debug!(identifier = %id, "Registered kind");
        Ok(kind)
    }

    /// Register a mixin. Everything it depends on or applies to, and its
    /// actions, must already be registered.
    pub fn register_mixin(&mut self, mixin: Mixin) -> OcciResult<Arc<Mixin>> {
        let id = mixin.identifier();
        self.ensure_unregistered(&id)?;
        self.ensure_mixin_references(&mixin)?;
        self.ensure_actions(&id, mixin.actions())?;
        let mixin = Arc::new(mixin);
        self.mixins.insert(id.clone(), Arc::clone(&mixin));
        debug!(identifier = %id, "Registered mixin");
        Ok(mixin)
    }

    pub fn find_kind(&self, identifier: &str) -> Option<&Arc<Kind>> {
        self.kinds.get(identifier)
    }

    pub fn find_mixin(&self, identifier: &str) -> Option<&Arc<Mixin>> {
        self.mixins.get(identifier)
    }

    pub fn find_action(&self, identifier: &str) -> Option<&Arc<Action>> {
        self.actions.get(identifier)
    }

    pub fn find_by_identifier(&self, identifier: &str) -> Option<AnyCategory> {
        if let Some(k) = self.kinds.get(identifier) {
            return Some(AnyCategory::Kind(Arc::clone(k)));
        }
        if let Some(m) = self.mixins.get(identifier) {
            return Some(AnyCategory::Mixin(Arc::clone(m)));
        }
        self.actions
            .get(identifier)
            .map(|a| AnyCategory::Action(Arc::clone(a)))
    }

    /// Like [`find_by_identifier`](Self::find_by_identifier) but fails
    /// `CategoryNotFound` on a miss.
    pub fn require_by_identifier(&self, identifier: &str) -> OcciResult<AnyCategory> {
        self.find_by_identifier(identifier).ok_or_else(|| {
            OcciError::CategoryNotFound(format!("category {identifier} is not registered"))
        })
    }

    /// Every category with the given term, whatever its scheme.
    pub fn find_by_term(&self, term: &str) -> Vec<AnyCategory> {
        self.categories()
            .into_iter()
            .filter(|c| c.term() == term)
            .collect()
    }

    /// Kind or mixin whose location equals `location`.
    pub fn find_by_location(&self, location: &str) -> Option<AnyCategory> {
        if let Some(k) = self.kinds.values().find(|k| k.location() == location) {
            return Some(AnyCategory::Kind(Arc::clone(k)));
        }
        self.mixins
            .values()
            .find(|m| m.location() == location)
            .map(|m| AnyCategory::Mixin(Arc::clone(m)))
    }

    /// Mixins that list `mixin_identifier` in their `depends`.
    pub fn find_dependent(&self, mixin_identifier: &str) -> Vec<Arc<Mixin>> {
        self.mixins
            .values()
            .filter(|m| m.depends().iter().any(|d| d == mixin_identifier))
            .cloned()
            .collect()
    }

    /// Mixins that list `kind_identifier` in their `applies`.
    pub fn find_applicable(&self, kind_identifier: &str) -> Vec<Arc<Mixin>> {
        self.mixins
            .values()
            .filter(|m| m.applies().iter().any(|a| a == kind_identifier))
            .cloned()
            .collect()
    }

    /// Kinds that descend from `kind_identifier`, excluding the kind itself.
    pub fn find_related(&self, kind_identifier: &str) -> Vec<Arc<Kind>> {
        self.kinds
            .values()
            .filter(|k| k.identifier() != kind_identifier && k.is_related_to(kind_identifier))
            .cloned()
            .collect()
    }

    /// Resolve the parent of `kind` to its registered instance.
    pub fn parent_of(&self, kind: &Kind) -> Option<&Arc<Kind>> {
        kind.parent().and_then(|id| self.kinds.get(id))
    }

    /// Resolve the parent chain of `kind`, nearest first. Ancestors missing
    /// from this model are skipped.
    pub fn related_kinds(&self, kind: &Kind) -> Vec<Arc<Kind>> {
        kind.related()
            .iter()
            .filter_map(|id| self.kinds.get(id))
            .cloned()
            .collect()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &Arc<Kind>> {
        self.kinds.values()
    }

    pub fn mixins(&self) -> impl Iterator<Item = &Arc<Mixin>> {
        self.mixins.values()
    }

    pub fn actions(&self) -> impl Iterator<Item = &Arc<Action>> {
        self.actions.values()
    }

    /// All categories: kinds, then mixins, then actions.
    pub fn categories(&self) -> Vec<AnyCategory> {
        self.kinds
            .values()
            .map(|k| AnyCategory::Kind(Arc::clone(k)))
            .chain(self.mixins.values().map(|m| AnyCategory::Mixin(Arc::clone(m))))
            .chain(self.actions.values().map(|a| AnyCategory::Action(Arc::clone(a))))
            .collect()
    }

    /// Re-check the whole graph: every reference resolves inside this model
    /// and every default value satisfies its definition.
    pub fn validate(&self) -> OcciResult<()> {
        for kind in self.kinds.values() {
            self.ensure_parent(kind)?;
            self.ensure_actions(&kind.identifier(), kind.actions())?;
        }
        for mixin in self.mixins.values() {
            self.ensure_mixin_references(mixin)?;
            self.ensure_actions(&mixin.identifier(), mixin.actions())?;
        }
        for category in self.categories() {
            for (name, def) in category.attributes().iter() {
                if let Some(default) = def.default_value() {
                    def.check_type(default).map_err(|e| {
                        OcciError::CategoryValidation(format!(
                            "default of {name} in {}: {e}",
                            category.identifier()
                        ))
                    })?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;

    const CORE: &str = "http://schemas.ogf.org/occi/core#";
    const INFRA: &str = "http://schemas.ogf.org/occi/infrastructure#";

    fn base_model() -> Model {
        let mut model = Model::new();
        let start = model
            .register_action(Action::new(
                Category::new("start", "http://schemas.ogf.org/occi/infrastructure/compute/action#")
                    .unwrap(),
            ))
            .unwrap();
        let entity = model
            .register_kind(Kind::new(Category::new("entity", CORE).unwrap(), None))
            .unwrap();
        let resource = model
            .register_kind(Kind::new(Category::new("resource", CORE).unwrap(), Some(&*entity)))
            .unwrap();
        model
            .register_kind(
                Kind::new(Category::new("compute", INFRA).unwrap(), Some(&*resource))
                    .with_action(start),
            )
            .unwrap();
        model
            .register_mixin(
                Mixin::new(Category::new("os_tpl", INFRA).unwrap())
                    .with_applies([format!("{INFRA}compute")]),
            )
            .unwrap();
        model
            .register_mixin(
                Mixin::new(Category::new("ubuntu", "http://example.org/os_tpl#").unwrap())
                    .with_depends([format!("{INFRA}os_tpl")]),
            )
            .unwrap();
        model
    }

    #[test]
    fn test_lookup() {
        let model = base_model();
        assert_eq!(model.len(), 6);
        let found = model.find_by_identifier(&format!("{INFRA}compute")).unwrap();
        assert_eq!(found.class_name(), "kind");
        assert!(model.find_kind(&format!("{CORE}resource")).is_some());
        assert!(model.find_by_identifier("http://nowhere#x").is_none());
        assert!(matches!(
            model.require_by_identifier("http://nowhere#x"),
            Err(OcciError::CategoryNotFound(_))
        ));
        assert_eq!(model.find_by_term("start").len(), 1);
        assert_eq!(
            model.find_by_location("/compute/").unwrap().term(),
            "compute"
        );
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let mut model = base_model();
        let err = model
            .register_mixin(Mixin::new(Category::new("compute", INFRA).unwrap()))
            .unwrap_err();
        assert!(matches!(err, OcciError::CategoryValidation(_)));
    }

    #[test]
    fn test_unresolved_references_rejected() {
        let mut model = Model::new();
        let orphan_parent = Kind::new(Category::new("entity", CORE).unwrap(), None);
        assert!(matches!(
            model.register_kind(Kind::new(
                Category::new("resource", CORE).unwrap(),
                Some(&orphan_parent)
            )),
            Err(OcciError::CategoryValidation(_))
        ));
        assert!(matches!(
            model.register_mixin(
                Mixin::new(Category::new("tpl", INFRA).unwrap())
                    .with_depends(["http://nowhere#x"])
            ),
            Err(OcciError::CategoryValidation(_))
        ));
        let unregistered = Arc::new(Action::new(Category::new("stop", INFRA).unwrap()));
        assert!(matches!(
            model.register_kind(
                Kind::new(Category::new("compute", INFRA).unwrap(), None).with_action(unregistered)
            ),
            Err(OcciError::CategoryValidation(_))
        ));
        assert!(model.is_empty());
    }

    #[test]
    fn test_relation_queries() {
        let model = base_model();
        let dependent = model.find_dependent(&format!("{INFRA}os_tpl"));
        assert_eq!(dependent.len(), 1);
        assert_eq!(dependent[0].term(), "ubuntu");

        let applicable = model.find_applicable(&format!("{INFRA}compute"));
        assert_eq!(applicable.len(), 1);
        assert_eq!(applicable[0].term(), "os_tpl");

        let related: Vec<String> = model
            .find_related(&format!("{CORE}entity"))
            .iter()
            .map(|k| k.term().to_string())
            .collect();
        assert_eq!(related.len(), 2);
        assert!(related.contains(&"compute".to_string()));
        assert!(related.contains(&"resource".to_string()));

        let compute = model.find_kind(&format!("{INFRA}compute")).unwrap();
        assert_eq!(model.parent_of(compute).unwrap().term(), "resource");
        let chain: Vec<String> = model
            .related_kinds(compute)
            .iter()
            .map(|k| k.term().to_string())
            .collect();
        assert_eq!(chain, vec!["resource", "entity"]);
    }

    #[test]
    fn test_categories_and_validate() {
        let model = base_model();
        let classes: Vec<&str> = model.categories().iter().map(|c| c.class_name()).collect();
        assert_eq!(classes, vec!["kind", "kind", "kind", "mixin", "mixin", "action"]);
        model.validate().unwrap();
    }
}
