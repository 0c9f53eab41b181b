//! Quill Class Hierarchy
//!
//! Semantic model of classes and interfaces for the Quill ahead-of-time
//! compiler, where class names may be declared more than once, bases may be
//! unknown until runtime, and methods may be reached by name.
//!
//! This crate provides:
//! - Class and method entities owned by an arena-backed [`ClassRegistry`]
//! - Cycle repair and method collection across the hierarchy ([`resolver`])
//! - Ancestor, lookup and tri-state capability queries ([`query`])
//! - Codespan diagnostics for recorded hierarchy errors
//!
//! # Usage
//!
//! ```ignore
//! use quill_hierarchy::{ClassEntity, ClassKind, ClassRegistry, FunctionEntity};
//!
//! let mut registry = ClassRegistry::new();
//! let base = registry.declare_class(ClassEntity::new(ClassKind::NormalClass, "Base", None, &[] as &[&str])?);
//! registry.add_function(base, FunctionEntity::new("run")?);
//! let child = registry.declare_class(ClassEntity::new(ClassKind::NormalClass, "Child", Some("Base"), &["Base"])?);
//!
//! let report = registry.resolve();
//! assert!(report.converged);
//! let run = registry.find_function(child, "run", true, false);
//! ```

#![warn(missing_docs)]

pub mod diagnostic;
pub mod entity;
pub mod error;
pub mod function;
pub mod members;
pub mod options;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod span;
pub mod summary;
pub mod upgrade;

// Re-export main types
pub use entity::{
    Capability, CapabilityKey, ClassAttributes, ClassEntity, ClassId, ClassKind, Derivation,
    DerivationFlags,
};
pub use error::{EntityError, EntityResult, HierarchyError};
pub use function::{FunctionEntity, FunctionId, Visibility, CONSTRUCTOR_NAME, DESTRUCTOR_NAME};
pub use members::{Constant, ConstantTable, Property, PropertyTable, Storage};
pub use options::AnalysisOptions;
pub use registry::ClassRegistry;
pub use resolver::{MethodMap, ResolutionReport, Resolver};
pub use span::Span;
pub use summary::{class_info_flags, ClassSummary};
pub use upgrade::{Lookup, Upgrade};
