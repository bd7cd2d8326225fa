//! Project-layer errors.

use std::collections::HashMap;

/// Errors produced by the project layer.
///
/// Plugin validation failures are reported separately as a
/// [`FieldErrors`] map at the project boundary; the node is not mutated
/// when any field fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectError {
    /// The requested node or field does not exist.
    #[error("not found")]
    NotFound,

    /// The supplied value cannot be coerced to the expected type.
    #[error("invalid value")]
    InvalidValue,

    /// A required field is missing or empty.
    #[error("field is required")]
    FieldRequired,

    /// The value is outside the declared min/max range.
    #[error("value is out of range")]
    ValueOutOfRange,

    /// The snapshot has no root node.
    #[error("root node not found")]
    RootNodeNotFound,

    /// The snapshot root is not a valid root node.
    #[error("invalid root node")]
    InvalidRootNode,

    /// The node type is unknown.
    #[error("invalid node type")]
    InvalidNodeType,

    /// A property with this name already exists.
    #[error("field already exists")]
    FieldExisted,

    /// The field is not declared for this node type.
    #[error("invalid field")]
    InvalidField,

    /// The parent does not accept children of this node type.
    #[error("node type not accepted")]
    NodeTypeNotAccepted,

    /// A child index is out of bounds.
    #[error("invalid index")]
    InvalidIndex,

    /// The form type is unknown.
    #[error("invalid form type")]
    InvalidFormType,

    /// The node has no parent.
    #[error("parent not found")]
    ParentNotFound,

    /// The project is not loaded.
    #[error("project was not ready yet")]
    ProjectNotLoaded,

    /// A free-form validation message, used for name checks.
    #[error("{0}")]
    Validation(String),
}

impl ProjectError {
    /// Creates a free-form validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ProjectError::Validation(message.into())
    }
}

/// Field-name to error map returned by plugin validation.
pub type FieldErrors = HashMap<String, ProjectError>;

/// Result alias for the project layer.
pub type ProjectResult<T> = Result<T, ProjectError>;
