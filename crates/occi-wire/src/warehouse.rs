//! Compile-time embedded category definitions.
//!
//! The OCCI Core and OCCI Infrastructure categories are baked into the
//! binary via `include_str!()` as JSON category documents and loaded through
//! the JSON parser.

use crate::json::JsonParser;
use occi_types::error::OcciResult;
use occi_types::model::Model;
use tracing::info;

/// `entity`, `resource` and `link`.
pub const CORE: &str = include_str!("../warehouse/core.json");
/// Compute, network and storage with their links, actions and mixins.
pub const INFRASTRUCTURE: &str = include_str!("../warehouse/infrastructure.json");

/// Returns all bundled documents as `(name, JSON content)` pairs, in load
/// order.
pub fn bundled_documents() -> Vec<(&'static str, &'static str)> {
    vec![("core", CORE), ("infrastructure", INFRASTRUCTURE)]
}

/// Loader for the bundled documents.
pub struct Warehouse;

impl Warehouse {
    /// Register the OCCI Core categories. Already registered categories are
    /// reused, so bootstrapping twice is harmless.
    pub fn bootstrap_core(model: &mut Model) -> OcciResult<()> {
        JsonParser::extend_model(CORE, model)?;
        info!(categories = model.len(), "Bootstrapped OCCI Core model");
        Ok(())
    }

    /// Register OCCI Core and OCCI Infrastructure categories.
    pub fn bootstrap_infrastructure(model: &mut Model) -> OcciResult<()> {
        Self::bootstrap_core(model)?;
        JsonParser::extend_model(INFRASTRUCTURE, model)?;
        info!(categories = model.len(), "Bootstrapped OCCI Infrastructure model");
        Ok(())
    }

    /// A validated model holding only OCCI Core.
    pub fn core_model() -> OcciResult<Model> {
        let mut model = Model::new();
        Self::bootstrap_core(&mut model)?;
        model.validate()?;
        Ok(model)
    }

    /// A validated model holding OCCI Core and OCCI Infrastructure.
    pub fn infrastructure_model() -> OcciResult<Model> {
        let mut model = Model::new();
        Self::bootstrap_infrastructure(&mut model)?;
        model.validate()?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::CategoriesDocument;
    use occi_types::infrastructure::{
        AVAILABILITY_ZONE_MIXIN, COMPUTE_KIND, IPNETWORKINTERFACE_MIXIN, IPNETWORK_MIXIN,
        LINK_KIND, NETWORKINTERFACE_KIND, OS_TPL_MIXIN, RESOURCE_KIND, RESOURCE_TPL_MIXIN,
        SECURITYGROUPLINK_KIND, STORAGELINK_KIND,
    };

    #[test]
    fn test_bundled_count() {
        assert_eq!(bundled_documents().len(), 2);
    }

    #[test]
    fn test_all_bundled_parse() {
        for (name, content) in bundled_documents() {
            let document: CategoriesDocument = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse bundled document '{name}': {e}"));
            assert!(!document.kinds.is_empty(), "{name} defines no kinds");
        }
    }

    #[test]
    fn test_core_model() {
        let model = Warehouse::core_model().unwrap();
        assert_eq!(model.kinds().count(), 3);
        assert!(model.find_kind(RESOURCE_KIND).is_some());
        assert!(model.find_kind(LINK_KIND).is_some());
    }

    #[test]
    fn test_infrastructure_model() {
        let model = Warehouse::infrastructure_model().unwrap();
        for kind in [
            COMPUTE_KIND,
            NETWORKINTERFACE_KIND,
            STORAGELINK_KIND,
            SECURITYGROUPLINK_KIND,
        ] {
            assert!(model.find_kind(kind).is_some(), "{kind} missing");
        }
        for mixin in [
            OS_TPL_MIXIN,
            RESOURCE_TPL_MIXIN,
            IPNETWORK_MIXIN,
            IPNETWORKINTERFACE_MIXIN,
            AVAILABILITY_ZONE_MIXIN,
        ] {
            assert!(model.find_mixin(mixin).is_some(), "{mixin} missing");
        }
        let compute = model.find_kind(COMPUTE_KIND).unwrap();
        assert_eq!(compute.actions().len(), 5);
        assert!(compute.is_related_to(RESOURCE_KIND));
        assert_eq!(model.find_applicable(COMPUTE_KIND).len(), 3);
    }

    #[test]
    fn test_bootstrap_twice() {
        let mut model = Model::new();
        Warehouse::bootstrap_infrastructure(&mut model).unwrap();
        let count = model.len();
        Warehouse::bootstrap_infrastructure(&mut model).unwrap();
        assert_eq!(model.len(), count);
    }
}
