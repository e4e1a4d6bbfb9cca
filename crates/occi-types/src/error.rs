//! Shared error types for the OCCI core model and codecs.

use thiserror::Error;

/// Top-level error type for the OCCI core.
///
/// Every variant carries a human-readable message that names the offending
/// attribute, category or wire fragment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OcciError {
    /// A required constructor or operation argument was not supplied.
    #[error("Mandatory argument missing: {0}")]
    MandatoryArgument(String),

    /// A required attribute has no value and no default.
    #[error("Attribute missing: {0}")]
    AttributeMissing(String),

    /// An attribute is present without a matching definition.
    #[error("Attribute not defined: {0}")]
    AttributeNotDefined(String),

    /// An attribute value does not match its definition.
    #[error("Attribute type mismatch: {0}")]
    AttributeType(String),

    /// A definition declares a type the checking pass cannot handle.
    #[error("Attribute property type unsupported: {0}")]
    AttributePropertyType(String),

    /// An attribute name uses the reserved `_` prefix.
    #[error("Attribute name invalid: {0}")]
    AttributeNameInvalid(String),

    /// Two mixins contribute a definition for the same attribute.
    #[error("Attribute definition conflict: {0}")]
    AttributeDefinition(String),

    /// An entity-level invariant does not hold.
    #[error("Instance validation failed: {0}")]
    InstanceValidation(String),

    /// A category could not be constructed or registered.
    #[error("Category validation failed: {0}")]
    CategoryValidation(String),

    /// No category with the given identifier is registered.
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    /// Malformed wire input or an unresolved reference in it.
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// A value cannot be expressed in the requested wire format.
    #[error("Rendering error: {0}")]
    Rendering(String),
}

impl OcciError {
    /// Returns the same error with the attribute name prepended to its message.
    pub fn in_attribute(self, name: &str) -> Self {
        let wrap = |msg: String| format!("Attribute {name:?} invalid: {msg}");
        match self {
            Self::MandatoryArgument(m) => Self::MandatoryArgument(wrap(m)),
            Self::AttributeMissing(m) => Self::AttributeMissing(wrap(m)),
            Self::AttributeNotDefined(m) => Self::AttributeNotDefined(wrap(m)),
            Self::AttributeType(m) => Self::AttributeType(wrap(m)),
            Self::AttributePropertyType(m) => Self::AttributePropertyType(wrap(m)),
            Self::AttributeNameInvalid(m) => Self::AttributeNameInvalid(wrap(m)),
            Self::AttributeDefinition(m) => Self::AttributeDefinition(wrap(m)),
            Self::InstanceValidation(m) => Self::InstanceValidation(wrap(m)),
            Self::CategoryValidation(m) => Self::CategoryValidation(wrap(m)),
            Self::CategoryNotFound(m) => Self::CategoryNotFound(wrap(m)),
            Self::Parsing(m) => Self::Parsing(wrap(m)),
            Self::Rendering(m) => Self::Rendering(wrap(m)),
        }
    }

    /// Converts any failure into a [`OcciError::Parsing`], keeping the message.
    ///
    /// Parsers use this to report model lookups and attribute failures that
    /// happen while reading wire input.
    pub fn into_parsing(self) -> Self {
        match self {
            Self::Parsing(_) => self,
            other => Self::Parsing(other.to_string()),
        }
    }

    /// Whether the failure is one of the attribute-level validation errors.
    pub fn is_attribute_error(&self) -> bool {
        matches!(
            self,
            Self::AttributeMissing(_)
                | Self::AttributeNotDefined(_)
                | Self::AttributeType(_)
                | Self::AttributePropertyType(_)
                | Self::AttributeNameInvalid(_)
                | Self::AttributeDefinition(_)
        )
    }
}

/// Alias for Result with OcciError.
pub type OcciResult<T> = Result<T, OcciError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_attribute_keeps_variant() {
        let err = OcciError::AttributeType("expected number".to_string())
            .in_attribute("occi.compute.cores");
        match err {
            OcciError::AttributeType(msg) => {
                assert!(msg.contains("occi.compute.cores"));
                assert!(msg.contains("expected number"));
            }
            other => panic!("Expected AttributeType, got {other:?}"),
        }
    }

    #[test]
    fn test_into_parsing() {
        let err = OcciError::CategoryNotFound("http://x#y".to_string()).into_parsing();
        assert!(matches!(err, OcciError::Parsing(ref m) if m.contains("http://x#y")));

        let err = OcciError::Parsing("bad".to_string()).into_parsing();
        assert_eq!(err, OcciError::Parsing("bad".to_string()));
    }

    #[test]
    fn test_error_display() {
        let err = OcciError::Rendering("nested set".to_string());
        assert_eq!(err.to_string(), "Rendering error: nested set");
        assert!(OcciError::AttributeMissing("a".into()).is_attribute_error());
        assert!(!OcciError::Parsing("a".into()).is_attribute_error());
    }
}
