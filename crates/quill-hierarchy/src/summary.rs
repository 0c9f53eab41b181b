//! Class metadata for the runtime class map and JSON dumps

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{ClassId, ClassKind, Derivation};
use crate::function::Visibility;
use crate::registry::ClassRegistry;

/// Attribute word of a class-map entry
pub mod class_info {
    /// No attribute
    pub const IS_NOTHING: u32 = 0;
    /// Built-in class
    pub const IS_SYSTEM: u32 = 1 << 0;
    /// Declared more than once
    pub const IS_REDECLARED: u32 = 1 << 1;
    /// Existence checked at runtime
    pub const IS_VOLATILE: u32 = 1 << 2;
    /// Interface
    pub const IS_INTERFACE: u32 = 1 << 3;
    /// Abstract class or interface
    pub const IS_ABSTRACT: u32 = 1 << 4;
    /// Final class
    pub const IS_FINAL: u32 = 1 << 5;
    /// Statics initialized on first use
    pub const IS_LAZY_INIT: u32 = 1 << 6;
}

/// Modifier bits of a property in a [`ClassSummary`]
pub mod property_flags {
    /// Public
    pub const PUBLIC: u32 = 1 << 0;
    /// Protected
    pub const PROTECTED: u32 = 1 << 1;
    /// Private
    pub const PRIVATE: u32 = 1 << 2;
    /// Static
    pub const STATIC: u32 = 1 << 3;
}

/// Class-map attribute word of a class
pub fn class_info_flags(registry: &ClassRegistry, class: ClassId) -> u32 {
    let entity = registry.class(class);
    let mut flags = class_info::IS_NOTHING;
    if !entity.is_user_class() {
        flags |= class_info::IS_SYSTEM;
    }
    if entity.is_redeclaring() {
        flags |= class_info::IS_REDECLARED;
    }
    if entity.is_volatile() {
        flags |= class_info::IS_VOLATILE;
    }
    match entity.kind() {
        ClassKind::Interface => flags |= class_info::IS_INTERFACE | class_info::IS_ABSTRACT,
        ClassKind::AbstractClass => flags |= class_info::IS_ABSTRACT,
        ClassKind::FinalClass => flags |= class_info::IS_FINAL,
        ClassKind::NormalClass => {}
    }
    if entity.needs_lazy_static_initializer() {
        flags |= class_info::IS_LAZY_INIT;
    }
    flags
}

/// Serializable snapshot of one class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSummary {
    /// Declared name
    pub name: String,
    /// Declaration kind
    pub kind: ClassKind,
    /// Raw [`ClassAttributes`](crate::ClassAttributes) bits
    pub attributes: u32,
    /// Class-map attribute word
    pub info: u32,
    /// Parent name, lower-cased
    pub parent: Option<String>,
    /// Base names, lower-cased, parent first
    pub bases: Vec<String>,
    /// Index among same-named declarations
    pub redeclaring_id: Option<u32>,
    /// Derivation state after resolution
    pub derivation: Derivation,
    /// Property name to [`property_flags`] bits
    pub properties: BTreeMap<String, u32>,
    /// Declared method names, lower-cased and sorted
    pub functions: Vec<String>,
    /// Constant name to whether its value is only known at runtime
    pub constants: BTreeMap<String, bool>,
}

impl ClassSummary {
    /// Snapshot a class
    pub fn from_registry(registry: &ClassRegistry, class: ClassId) -> Self {
        let entity = registry.class(class);

        let properties = entity
            .properties()
            .iter()
            .map(|p| {
                let mut bits = match p.visibility {
                    Visibility::Public => property_flags::PUBLIC,
                    Visibility::Protected => property_flags::PROTECTED,
                    Visibility::Private => property_flags::PRIVATE,
                };
                if p.is_static {
                    bits |= property_flags::STATIC;
                }
                (p.name.clone(), bits)
            })
            .collect();

        let mut functions: Vec<String> = entity.functions().keys().cloned().collect();
        functions.sort_unstable();

        Self {
            name: entity.original_name().to_string(),
            kind: entity.kind(),
            attributes: entity.attributes().bits(),
            info: class_info_flags(registry, class),
            parent: entity.parent().map(str::to_string),
            bases: entity.bases().to_vec(),
            redeclaring_id: entity.redeclaring_id(),
            derivation: entity.derives_from_redeclaring(),
            properties,
            functions,
            constants: entity
                .constants()
                .iter()
                .map(|c| (c.name.clone(), c.is_dynamic))
                .collect(),
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl ClassRegistry {
    /// Summaries of every class in declaration order
    pub fn summaries(&self) -> Vec<ClassSummary> {
        self.class_ids()
            .map(|id| ClassSummary::from_registry(self, id))
            .collect()
    }
}
