//! Property and constant tables
//!
//! The hierarchy core only needs a narrow view of class storage: it forces
//! non-private properties into dynamically-typed storage when the memory layout
//! of a class cannot be fixed at compile time, and it asks whether constants or
//! statics need lazy initialization.

use serde::{Deserialize, Serialize};

use crate::function::Visibility;

/// How a property's value is stored in generated code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Storage {
    /// Fixed, statically typed slot
    #[default]
    Typed,
    /// Uniform variant slot addressed indirectly
    Dynamic,
}

/// One declared property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Property name (case-sensitive)
    pub name: String,
    /// Declared visibility
    pub visibility: Visibility,
    /// Static (class-level) property
    pub is_static: bool,
    /// Current storage strategy
    pub storage: Storage,
    /// Initializer cannot be evaluated at compile time
    pub has_dynamic_initializer: bool,
}

impl Property {
    /// Public, non-static, typed property
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            is_static: false,
            storage: Storage::Typed,
            has_dynamic_initializer: false,
        }
    }

    /// Set the visibility
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Mark as static
    pub fn with_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Mark the initializer as runtime-evaluated
    pub fn with_dynamic_initializer(mut self) -> Self {
        self.has_dynamic_initializer = true;
        self
    }
}

/// Properties of one class
#[derive(Debug, Clone, Default)]
pub struct PropertyTable {
    properties: Vec<Property>,
    indirect_access: bool,
}

impl PropertyTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a property; a later declaration of the same name replaces the earlier one
    pub fn declare(&mut self, property: Property) {
        match self.properties.iter_mut().find(|p| p.name == property.name) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
    }

    /// Look up a property by name
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// True if the property is declared here
    pub fn is_present(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All properties in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    /// Number of declared properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// True if no property is declared
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Move every non-private property into dynamic storage.
    ///
    /// Returns true if any property changed.
    pub fn force_non_private_dynamic(&mut self) -> bool {
        let mut changed = false;
        for prop in self
            .properties
            .iter_mut()
            .filter(|p| p.visibility != Visibility::Private)
        {
            if prop.storage != Storage::Dynamic {
                prop.storage = Storage::Dynamic;
                changed = true;
            }
        }
        changed
    }

    /// Request indirect (global-pointer) property access. Returns true if newly set.
    pub fn request_indirect_access(&mut self) -> bool {
        !std::mem::replace(&mut self.indirect_access, true)
    }

    /// True once indirect access was requested
    pub fn needs_indirect_access(&self) -> bool {
        self.indirect_access
    }

    /// True if a static property has a runtime-evaluated initializer
    pub fn contains_dynamic_static(&self) -> bool {
        self.properties
            .iter()
            .any(|p| p.is_static && p.has_dynamic_initializer)
    }
}

/// One class constant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constant {
    /// Constant name
    pub name: String,
    /// Value is only known at runtime
    pub is_dynamic: bool,
}

/// Constants of one class
#[derive(Debug, Clone, Default)]
pub struct ConstantTable {
    constants: Vec<Constant>,
}

impl ConstantTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a constant with a compile-time value
    pub fn declare(&mut self, name: impl Into<String>) {
        self.push(Constant {
            name: name.into(),
            is_dynamic: false,
        });
    }

    /// Declare a constant whose value is computed at runtime
    pub fn declare_dynamic(&mut self, name: impl Into<String>) {
        self.push(Constant {
            name: name.into(),
            is_dynamic: true,
        });
    }

    fn push(&mut self, constant: Constant) {
        if !self.is_present(&constant.name) {
            self.constants.push(constant);
        }
    }

    /// True if the constant is declared here
    pub fn is_present(&self, name: &str) -> bool {
        self.constants.iter().any(|c| c.name == name)
    }

    /// True if any constant needs runtime evaluation
    pub fn has_dynamic(&self) -> bool {
        self.constants.iter().any(|c| c.is_dynamic)
    }

    /// All constants in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.constants.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_dynamic_skips_private() {
        let mut table = PropertyTable::new();
        table.declare(Property::new("a"));
        table.declare(Property::new("b").with_visibility(Visibility::Private));
        table.declare(Property::new("c").with_visibility(Visibility::Protected));

        assert!(table.force_non_private_dynamic());
        assert_eq!(table.get("a").unwrap().storage, Storage::Dynamic);
        assert_eq!(table.get("b").unwrap().storage, Storage::Typed);
        assert_eq!(table.get("c").unwrap().storage, Storage::Dynamic);

        // Second call is a no-op
        assert!(!table.force_non_private_dynamic());
    }

    #[test]
    fn test_dynamic_static_and_constants() {
        let mut table = PropertyTable::new();
        table.declare(Property::new("count").with_static());
        assert!(!table.contains_dynamic_static());
        table.declare(Property::new("count").with_static().with_dynamic_initializer());
        assert!(table.contains_dynamic_static());
        assert_eq!(table.len(), 1);

        let mut constants = ConstantTable::new();
        constants.declare("MAX");
        assert!(!constants.has_dynamic());
        constants.declare_dynamic("NOW");
        assert!(constants.has_dynamic());
    }
}
