//! Error types for model resolution and validation.

use std::fmt;

use thiserror::Error;

/// The way a body tree or a namespace is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralKind {
    /// A name appears twice within one namespace.
    DuplicateName {
        /// Namespace, e.g. `"body"` or `"joint"`.
        namespace: &'static str,
    },
    /// The parent is not declared anywhere.
    DanglingParent {
        /// The missing parent name.
        parent: String,
    },
    /// Following parent references returns to the starting entity.
    Cycle,
    /// No entity without a parent.
    MissingRoot,
    /// More than one entity without a parent.
    MultipleRoots,
    /// A free joint outside the root body, or on the root when disallowed.
    MisplacedFreeJoint,
}

impl fmt::Display for StructuralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName { namespace } => write!(f, "duplicate {namespace} name"),
            Self::DanglingParent { parent } => write!(f, "parent '{parent}' is not declared"),
            Self::Cycle => f.write_str("parent chain forms a cycle"),
            Self::MissingRoot => f.write_str("no root body"),
            Self::MultipleRoots => f.write_str("more than one root body"),
            Self::MisplacedFreeJoint => f.write_str("free joint is only allowed on the root body"),
        }
    }
}

/// Errors raised while resolving and validating a model.
///
/// Every variant names the offending entity. A model that produces any of
/// these is rejected as a whole.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Malformed tree or namespace.
    #[error("structural error at '{name}': {kind}")]
    Structural {
        /// Offending entity.
        name: String,
        /// What is wrong.
        kind: StructuralKind,
    },

    /// Reference to an undeclared joint.
    #[error("unknown joint '{joint}' referenced by {context}")]
    UnknownJoint {
        /// The missing joint name.
        joint: String,
        /// Where it was referenced.
        context: String,
    },

    /// Reference to an undeclared shape.
    #[error("unknown shape '{shape}' referenced by {context}")]
    UnknownShape {
        /// The missing shape name.
        shape: String,
        /// Where it was referenced.
        context: String,
    },

    /// Reference to an undeclared body, site, mesh or class.
    #[error("unknown {namespace} '{target}' referenced by {context}")]
    UnknownReference {
        /// Namespace of the target.
        namespace: &'static str,
        /// The missing name.
        target: String,
        /// Where it was referenced.
        context: String,
    },

    /// A range with `lo > hi`, or one that excludes its nominal value.
    #[error("invalid range [{lo}, {hi}] on '{name}': {reason}")]
    InvalidRange {
        /// Offending entity.
        name: String,
        /// Lower bound.
        lo: f64,
        /// Upper bound.
        hi: f64,
        /// What is wrong.
        reason: String,
    },

    /// A tendon whose range excludes its rest-pose value.
    #[error("tendon '{tendon}' evaluates to {value} at rest, outside [{lo}, {hi}]")]
    UnsatisfiableConstraint {
        /// Offending tendon.
        tendon: String,
        /// Rest-pose value.
        value: f64,
        /// Lower bound.
        lo: f64,
        /// Upper bound.
        hi: f64,
    },

    /// A numeric attribute outside its domain.
    #[error("invalid {parameter} on '{name}': {message}")]
    InvalidParameter {
        /// Offending entity.
        name: String,
        /// The attribute.
        parameter: &'static str,
        /// What is wrong.
        message: String,
    },
}

impl ModelError {
    /// Create a structural error.
    pub fn structural(name: impl Into<String>, kind: StructuralKind) -> Self {
        Self::Structural {
            name: name.into(),
            kind,
        }
    }

    /// Create a duplicate-name error.
    pub fn duplicate(namespace: &'static str, name: impl Into<String>) -> Self {
        Self::structural(name, StructuralKind::DuplicateName { namespace })
    }

    /// Create an unknown joint error.
    pub fn unknown_joint(joint: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnknownJoint {
            joint: joint.into(),
            context: context.into(),
        }
    }

    /// Create an unknown shape error.
    pub fn unknown_shape(shape: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnknownShape {
            shape: shape.into(),
            context: context.into(),
        }
    }

    /// Create an unknown reference error.
    pub fn unknown_reference(
        namespace: &'static str,
        target: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::UnknownReference {
            namespace,
            target: target.into(),
            context: context.into(),
        }
    }

    /// Create an invalid range error.
    pub fn invalid_range(name: impl Into<String>, lo: f64, hi: f64, reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            name: name.into(),
            lo,
            hi,
            reason: reason.into(),
        }
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(
        name: impl Into<String>,
        parameter: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            parameter,
            message: message.into(),
        }
    }
}

/// Result type for kernel operations.
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_display_names_entity() {
        let err = ModelError::duplicate("body", "palm");
        let text = err.to_string();
        assert!(text.contains("palm"));
        assert!(text.contains("duplicate body name"));
    }

    #[test]
    fn unknown_joint_display() {
        let err = ModelError::unknown_joint("FFJ9", "tendon 'T_FFJ1c'");
        assert!(err.to_string().contains("FFJ9"));
        assert!(err.to_string().contains("T_FFJ1c"));
    }

    #[test]
    fn range_display() {
        let err = ModelError::invalid_range("FFJ2", 1.0, 0.0, "lower bound exceeds upper bound");
        assert!(err.to_string().contains("[1, 0]"));
    }
}
