//! Action invocations.

use crate::attribute_set::AttributeSet;
use crate::category::{Action, Categorized};
use crate::config::ValidationConfig;
use crate::error::OcciResult;
use crate::value::AttributeValue;
use std::sync::Arc;

/// An invocation of an [`Action`] with its parameter values.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionInstance {
    action: Arc<Action>,
    attributes: AttributeSet,
}

impl ActionInstance {
    /// Instance with the action's parameter definitions bound and defaults
    /// applied.
    pub fn new(action: Arc<Action>) -> Self {
        let mut attributes = AttributeSet::new();
        attributes.reset(action.attributes(), true);
        Self { action, attributes }
    }

    pub fn action(&self) -> &Arc<Action> {
        &self.action
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeSet {
        &mut self.attributes
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<AttributeValue>) -> OcciResult<()> {
        self.attributes.set(name, value)
    }

    /// Validate every parameter against its definition.
    pub fn validate(&self, config: &ValidationConfig) -> OcciResult<()> {
        for (name, attribute) in self.attributes.attributes() {
            attribute
                .validate(config)
                .map_err(|e| e.in_attribute(&name))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeDefinition, AttributeType};
    use crate::category::Category;
    use crate::error::OcciError;

    fn stop() -> Arc<Action> {
        let category = Category::new(
            "stop",
            "http://schemas.ogf.org/occi/infrastructure/compute/action#",
        )
        .unwrap()
        .with_attribute(
            "method",
            AttributeDefinition::new(AttributeType::String)
                .with_default("graceful")
                .unwrap()
                .with_pattern("graceful|acpioff|poweroff")
                .unwrap(),
        )
        .unwrap();
        Arc::new(Action::new(category))
    }

    #[test]
    fn test_defaults_bound() {
        let instance = ActionInstance::new(stop());
        assert_eq!(
            instance.attributes().value("method").unwrap(),
            Some(&AttributeValue::from("graceful"))
        );
        instance.validate(&ValidationConfig::default()).unwrap();
    }

    #[test]
    fn test_parameter_validation() {
        let mut instance = ActionInstance::new(stop());
        instance.set_attribute("method", "unplug").unwrap();
        assert!(matches!(
            instance.validate(&ValidationConfig::default()),
            Err(OcciError::AttributeType(_))
        ));
        assert!(matches!(
            instance.set_attribute("method", 3),
            Err(OcciError::AttributeType(_))
        ));
    }
}
