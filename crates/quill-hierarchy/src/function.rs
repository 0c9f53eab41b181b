//! Method entities
//!
//! A [`FunctionEntity`] is one textual method declaration. The registry owns
//! every function in an arena and classes refer to them by [`FunctionId`].

use serde::{Deserialize, Serialize};

use crate::entity::ClassId;
use crate::error::{EntityError, EntityResult};
use crate::span::Span;

/// Canonical constructor name
pub const CONSTRUCTOR_NAME: &str = "__construct";
/// Canonical destructor name
pub const DESTRUCTOR_NAME: &str = "__destruct";

/// Stable index of a function in the registry arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

impl FunctionId {
    /// Arena slot of this function
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Member visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible everywhere
    #[default]
    Public,
    /// Visible to the class and its descendants
    Protected,
    /// Visible to the declaring class only
    Private,
}

/// One declared method
#[derive(Debug, Clone)]
pub struct FunctionEntity {
    name: String,
    original_name: String,
    visibility: Visibility,
    is_static: bool,
    is_abstract: bool,
    is_virtual: bool,
    is_dynamic: bool,
    is_system: bool,
    redeclaring_index: Option<u32>,
    min_param_count: usize,
    max_param_count: usize,
    class: Option<ClassId>,
    span: Span,
}

impl FunctionEntity {
    /// Create a public, non-static, concrete method taking no parameters
    pub fn new(name: &str) -> EntityResult<Self> {
        if name.is_empty() {
            return Err(EntityError::EmptyName);
        }
        Ok(Self {
            name: name.to_ascii_lowercase(),
            original_name: name.to_string(),
            visibility: Visibility::Public,
            is_static: false,
            is_abstract: false,
            is_virtual: false,
            is_dynamic: false,
            is_system: false,
            redeclaring_index: None,
            min_param_count: 0,
            max_param_count: 0,
            class: None,
            span: Span::default(),
        })
    }

    /// Set the visibility
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Mark as a static method
    pub fn with_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Mark as an abstract method (no body)
    pub fn with_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Set the number of required and total parameters
    pub fn with_params(mut self, min: usize, max: usize) -> Self {
        self.min_param_count = min;
        self.max_param_count = max.max(min);
        self
    }

    /// Attach a source location
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Lower-cased name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name as written in the source
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Declared visibility
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// True for public methods
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// True for private methods
    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
    }

    /// True for static methods
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// True for abstract methods
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// True once resolution found that calls cannot be statically bound
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// True once the method must be reachable by runtime name lookup
    pub fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    /// True for methods of built-in classes
    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// Position among same-named declarations in one class body, if redeclared
    pub fn redeclaring_index(&self) -> Option<u32> {
        self.redeclaring_index
    }

    /// True when the class body declares this name more than once
    pub fn is_redeclaring(&self) -> bool {
        self.redeclaring_index.is_some()
    }

    /// Number of required parameters
    pub fn min_param_count(&self) -> usize {
        self.min_param_count
    }

    /// Number of declared parameters
    pub fn max_param_count(&self) -> usize {
        self.max_param_count
    }

    /// Owning class, set when the function is added to a class
    pub fn class(&self) -> Option<ClassId> {
        self.class
    }

    /// Declaration site
    pub fn span(&self) -> Span {
        self.span
    }

    /// True for the canonical constructor or a legacy constructor named after `class_name`
    pub fn is_constructor_of(&self, class_name: &str) -> bool {
        self.name == CONSTRUCTOR_NAME || self.name.eq_ignore_ascii_case(class_name)
    }

    /// True for the destructor
    pub fn is_destructor(&self) -> bool {
        self.name == DESTRUCTOR_NAME
    }

    /// True for `__`-prefixed magic methods
    pub fn is_magic(&self) -> bool {
        self.name.starts_with("__")
    }

    pub(crate) fn attach(&mut self, class: ClassId) {
        self.class = Some(class);
    }

    pub(crate) fn set_redeclaring(&mut self, index: u32) {
        self.redeclaring_index = Some(index);
    }

    pub(crate) fn set_system(&mut self) {
        self.is_system = true;
    }

    /// Returns true if the flag changed
    pub(crate) fn set_virtual(&mut self) -> bool {
        !std::mem::replace(&mut self.is_virtual, true)
    }

    /// Returns true if the flag changed
    pub(crate) fn set_dynamic(&mut self) -> bool {
        !std::mem::replace(&mut self.is_dynamic, true)
    }
}
