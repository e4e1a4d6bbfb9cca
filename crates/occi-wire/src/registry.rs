//! Category drafts: categories read off the wire whose references to other
//! categories (parent kind, depended-on mixins, actions) are still plain
//! identifiers.
//!
//! [`Drafts::register_into`] resolves them against a [`Model`] and registers
//! them in dependency order: actions first, then kinds parent-first, then
//! mixins after the mixins they depend on. Categories already present in the
//! model are reused as they are.

use occi_types::category::{Action, Category, Kind, Mixin};
use occi_types::error::{OcciError, OcciResult};
use occi_types::model::Model;
use std::sync::Arc;
use tracing::debug;

/// A kind whose parent and actions are identifiers.
#[derive(Debug, Clone)]
pub struct KindDraft {
    pub category: Category,
    pub parent: Option<String>,
    pub actions: Vec<String>,
    pub location: Option<String>,
}

/// A mixin whose actions are identifiers.
#[derive(Debug, Clone)]
pub struct MixinDraft {
    pub category: Category,
    pub depends: Vec<String>,
    pub applies: Vec<String>,
    pub actions: Vec<String>,
    pub location: Option<String>,
}

/// Everything read from one category listing.
#[derive(Debug, Clone, Default)]
pub struct Drafts {
    pub kinds: Vec<KindDraft>,
    pub mixins: Vec<MixinDraft>,
    pub actions: Vec<Category>,
}

impl Drafts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty() && self.mixins.is_empty() && self.actions.is_empty()
    }

    /// Resolve and register every draft. Any unresolved reference or
    /// registration failure is reported as `Parsing`.
    pub fn register_into(self, model: &mut Model) -> OcciResult<()> {
        for category in self.actions {
            let identifier = category.identifier();
            if model.contains(&identifier) {
                debug!(category = %identifier, "Reusing registered action");
                continue;
            }
            model
                .register_action(Action::new(category))
                .map_err(OcciError::into_parsing)?;
        }
        register_kinds(self.kinds, model)?;
        register_mixins(self.mixins, model)
    }

    /// Register into a fresh model.
    pub fn into_model(self) -> OcciResult<Model> {
        let mut model = Model::new();
        self.register_into(&mut model)?;
        Ok(model)
    }
}

fn resolve_actions(model: &Model, identifiers: &[String], owner: &str) -> OcciResult<Vec<Arc<Action>>> {
    identifiers
        .iter()
        .map(|id| {
            model.find_action(id).cloned().ok_or_else(|| {
                OcciError::Parsing(format!("action {id} of {owner} is not defined"))
            })
        })
        .collect()
}

fn register_kinds(mut pending: Vec<KindDraft>, model: &mut Model) -> OcciResult<()> {
    while !pending.is_empty() {
        let before = pending.len();
        let mut deferred = Vec::new();
        for draft in pending {
            let identifier = draft.category.identifier();
            if model.contains(&identifier) {
                debug!(category = %identifier, "Reusing registered kind");
                continue;
            }
            let parent = match &draft.parent {
                None => None,
                Some(parent_id) => match model.find_kind(parent_id) {
                    Some(parent) => Some(Arc::clone(parent)),
                    None => {
                        deferred.push(draft);
                        continue;
                    }
                },
            };
            let actions = resolve_actions(model, &draft.actions, &identifier)?;
            let mut kind = Kind::new(draft.category, parent.as_deref()).with_actions(actions);
            if let Some(location) = draft.location {
                kind = kind.with_location(location).map_err(OcciError::into_parsing)?;
            }
            model.register_kind(kind).map_err(OcciError::into_parsing)?;
        }
        if deferred.len() == before {
            let unresolved: Vec<String> = deferred
                .iter()
                .map(|d| {
                    format!(
                        "{} (parent {})",
                        d.category.identifier(),
                        d.parent.as_deref().unwrap_or_default()
                    )
                })
                .collect();
            return Err(OcciError::Parsing(format!(
                "kinds with unresolved parents: {}",
                unresolved.join(", ")
            )));
        }
        pending = deferred;
    }
    Ok(())
}

fn register_mixins(mut pending: Vec<MixinDraft>, model: &mut Model) -> OcciResult<()> {
    while !pending.is_empty() {
        let before = pending.len();
        let mut deferred = Vec::new();
        for draft in pending {
            let identifier = draft.category.identifier();
            if model.contains(&identifier) {
                debug!(category = %identifier, "Reusing registered mixin");
                continue;
            }
            if !draft.depends.iter().all(|d| model.find_mixin(d).is_some()) {
                deferred.push(draft);
                continue;
            }
            if let Some(missing) = draft.applies.iter().find(|a| model.find_kind(a).is_none()) {
                return Err(OcciError::Parsing(format!(
                    "mixin {identifier} applies to unknown kind {missing}"
                )));
            }
            let actions = resolve_actions(model, &draft.actions, &identifier)?;
            let mut mixin = Mixin::new(draft.category)
                .with_depends(draft.depends)
                .with_applies(draft.applies)
                .with_actions(actions);
            if let Some(location) = draft.location {
                mixin = mixin.with_location(location).map_err(OcciError::into_parsing)?;
            }
            model.register_mixin(mixin).map_err(OcciError::into_parsing)?;
        }
        if deferred.len() == before {
            let unresolved: Vec<String> =
                deferred.iter().map(|d| d.category.identifier()).collect();
            return Err(OcciError::Parsing(format!(
                "mixins with unresolved dependencies: {}",
                unresolved.join(", ")
            )));
        }
        pending = deferred;
    }
    Ok(())
}
