//! Hierarchy errors
//!
//! Two families live here. [`HierarchyError`] values are diagnostics: the
//! resolver records them in the registry, repairs the hierarchy in place and
//! carries on. [`EntityError`] values are contract violations detected while
//! constructing entities and are returned to the caller.

use thiserror::Error;

use crate::span::Span;

/// Result of constructing or registering an entity
pub type EntityResult<T> = Result<T, EntityError>;

/// Diagnostics recorded (never raised) during hierarchy resolution
#[derive(Debug, Clone, Error, PartialEq, Eq, Hash)]
pub enum HierarchyError {
    /// A base edge closes a cycle or repeats an earlier edge; the edge was removed
    #[error("Invalid derivation: '{class}' cannot derive from '{base}'")]
    InvalidDerivation {
        /// Class whose base list contained the edge
        class: String,
        /// Offending base name
        base: String,
        /// Declaration of `class`
        span: Span,
    },

    /// A base name is not declared anywhere visible
    #[error("Unknown base class '{base}' for '{class}'")]
    UnknownBaseClass {
        /// Class naming the base
        class: String,
        /// Unresolved base name
        base: String,
        /// Declaration of `class`
        span: Span,
    },

    /// A method name is declared twice within one class body
    #[error("Method '{method}' declared twice in '{class}'")]
    DeclaredFunctionTwice {
        /// Owning class
        class: String,
        /// Method name (lower-cased)
        method: String,
        /// The later declaration
        span: Span,
        /// The first declaration
        original: Span,
    },
}

impl HierarchyError {
    /// Primary location of the diagnostic
    pub fn span(&self) -> Span {
        match self {
            HierarchyError::InvalidDerivation { span, .. }
            | HierarchyError::UnknownBaseClass { span, .. }
            | HierarchyError::DeclaredFunctionTwice { span, .. } => *span,
        }
    }

    /// Name of the class the diagnostic is about
    pub fn class(&self) -> &str {
        match self {
            HierarchyError::InvalidDerivation { class, .. }
            | HierarchyError::UnknownBaseClass { class, .. }
            | HierarchyError::DeclaredFunctionTwice { class, .. } => class,
        }
    }
}

/// Contract violations while building entities
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityError {
    /// The parent name must be the first entry of the base list
    #[error("Parent '{parent}' of '{class}' must be the first base")]
    ParentNotFirstBase {
        /// Class being constructed
        class: String,
        /// Declared parent
        parent: String,
    },

    /// Classes and methods must be named
    #[error("Entity name must not be empty")]
    EmptyName,
}
