//! Class entities
//!
//! One [`ClassEntity`] exists per textual class or interface declaration.
//! Entities never point at each other directly: parents and interfaces are
//! stored as lower-cased names and resolved through the registry.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{EntityError, EntityResult};
use crate::function::FunctionId;
use crate::members::{ConstantTable, PropertyTable};
use crate::span::Span;

/// Stable index of a class in the registry arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub u32);

impl ClassId {
    /// Arena slot of this class
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind of declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    /// Ordinary instantiable class
    NormalClass,
    /// `abstract class`
    AbstractClass,
    /// `final class`
    FinalClass,
    /// `interface`
    Interface,
}

/// Class attribute bit-set
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ClassAttributes(u32);

impl ClassAttributes {
    /// Declares `__construct`
    pub const HAS_CONSTRUCTOR: ClassAttributes = ClassAttributes(1 << 0);
    /// Declares `__destruct`
    pub const HAS_DESTRUCTOR: ClassAttributes = ClassAttributes(1 << 1);
    /// Declares `__call`
    pub const HAS_UNKNOWN_METHOD_HANDLER: ClassAttributes = ClassAttributes(1 << 2);
    /// Declares `__get`
    pub const HAS_UNKNOWN_PROP_GETTER: ClassAttributes = ClassAttributes(1 << 3);
    /// Declares `__set`
    pub const HAS_UNKNOWN_PROP_SETTER: ClassAttributes = ClassAttributes(1 << 4);
    /// Uses a legacy constructor named after the class
    pub const CLASS_NAME_CONSTRUCTOR: ClassAttributes = ClassAttributes(1 << 5);
    /// Built-in class
    pub const SYSTEM: ClassAttributes = ClassAttributes(1 << 6);
    /// Implemented by a native extension
    pub const EXTENSION: ClassAttributes = ClassAttributes(1 << 7);
    /// Declared in user source
    pub const USER_CLASS: ClassAttributes = ClassAttributes(1 << 8);
    /// Static members have initializers that must run before first use
    pub const NEEDS_STATIC_INITIALIZER: ClassAttributes = ClassAttributes(1 << 9);

    const NAMES: [(ClassAttributes, &'static str); 10] = [
        (Self::HAS_CONSTRUCTOR, "HasConstructor"),
        (Self::HAS_DESTRUCTOR, "HasDestructor"),
        (Self::HAS_UNKNOWN_METHOD_HANDLER, "HasUnknownMethodHandler"),
        (Self::HAS_UNKNOWN_PROP_GETTER, "HasUnknownPropGetter"),
        (Self::HAS_UNKNOWN_PROP_SETTER, "HasUnknownPropSetter"),
        (Self::CLASS_NAME_CONSTRUCTOR, "ClassNameConstructor"),
        (Self::SYSTEM, "System"),
        (Self::EXTENSION, "Extension"),
        (Self::USER_CLASS, "UserClass"),
        (Self::NEEDS_STATIC_INITIALIZER, "NeedsStaticInitializer"),
    ];

    /// No attribute set
    pub const fn empty() -> Self {
        ClassAttributes(0)
    }

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set
    pub const fn contains(self, other: ClassAttributes) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`
    pub fn insert(&mut self, other: ClassAttributes) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`
    pub fn remove(&mut self, other: ClassAttributes) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for ClassAttributes {
    type Output = ClassAttributes;

    fn bitor(self, rhs: ClassAttributes) -> ClassAttributes {
        ClassAttributes(self.0 | rhs.0)
    }
}

impl fmt::Debug for ClassAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(attr, _)| self.contains(*attr))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "ClassAttributes({})", names.join(" | "))
    }
}

/// Whether a class inherits from a statically ambiguous or unknown ancestor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Derivation {
    /// Every ancestor is uniquely resolved
    FromNormal,
    /// The parent edge itself is redeclared or unknown
    DirectFromRedeclared,
    /// Some further ancestor is redeclared or unknown
    IndirectFromRedeclared,
}

/// Accumulated derivation facts.
///
/// Direct and indirect are independent upgrade targets; once set neither is
/// ever cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DerivationFlags {
    /// Parent edge is ambiguous or unknown
    pub direct: bool,
    /// Some ancestor further up is ambiguous or unknown
    pub indirect: bool,
}

impl DerivationFlags {
    /// Collapsed view: Direct wins over Indirect
    pub fn derivation(self) -> Derivation {
        if self.direct {
            Derivation::DirectFromRedeclared
        } else if self.indirect {
            Derivation::IndirectFromRedeclared
        } else {
            Derivation::FromNormal
        }
    }

    /// Record a fact. Returns true if it was new.
    pub fn upgrade(&mut self, to: Derivation) -> bool {
        let flag = match to {
            Derivation::FromNormal => return false,
            Derivation::DirectFromRedeclared => &mut self.direct,
            Derivation::IndirectFromRedeclared => &mut self.indirect,
        };
        !std::mem::replace(flag, true)
    }
}

/// Tri-state answer of a capability query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum Capability {
    /// Every candidate hierarchy lacks it
    No = 0,
    /// Every candidate hierarchy has it
    Yes = 1,
    /// Depends on which redeclared parent wins at runtime
    Ambiguous = -1,
}

impl Capability {
    /// Numeric form used in generated code: 1, 0 or -1
    pub fn as_i8(self) -> i8 {
        self as i8
    }
}

/// Key of the per-class capability memo
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CapabilityKey {
    /// A method with this lower-cased name is declared
    Method(String),
    /// This lower-cased interface is named as a base
    Interface(String),
}

/// One declared class or interface
#[derive(Debug, Clone)]
pub struct ClassEntity {
    name: String,
    original_name: String,
    kind: ClassKind,
    parent: Option<String>,
    bases: Vec<String>,
    attributes: ClassAttributes,
    is_dynamic: bool,
    is_volatile: bool,
    redeclaring_id: Option<u32>,
    derivation: DerivationFlags,
    derived_by_dynamic: bool,
    functions: FxHashMap<String, Vec<FunctionId>>,
    function_order: Vec<FunctionId>,
    missing_methods: FxHashSet<String>,
    capability_cache: FxHashMap<CapabilityKey, Capability>,
    merged_methods: FxHashMap<String, FunctionId>,
    properties: PropertyTable,
    constants: ConstantTable,
    span: Span,
}

impl ClassEntity {
    /// Create a class entity.
    ///
    /// `bases` lists the parent first (if any), then interfaces. When `parent`
    /// is given it must equal `bases[0]` (case-insensitively).
    pub fn new<S: AsRef<str>>(
        kind: ClassKind,
        name: &str,
        parent: Option<&str>,
        bases: &[S],
    ) -> EntityResult<Self> {
        if name.is_empty() {
            return Err(EntityError::EmptyName);
        }
        let bases: Vec<String> = bases
            .iter()
            .map(|b| b.as_ref().to_ascii_lowercase())
            .collect();
        let parent = parent.map(str::to_ascii_lowercase);
        if let Some(parent) = &parent {
            if bases.first() != Some(parent) {
                return Err(EntityError::ParentNotFirstBase {
                    class: name.to_string(),
                    parent: parent.clone(),
                });
            }
        }

        Ok(Self {
            name: name.to_ascii_lowercase(),
            original_name: name.to_string(),
            kind,
            parent,
            bases,
            attributes: ClassAttributes::empty(),
            is_dynamic: false,
            is_volatile: false,
            redeclaring_id: None,
            derivation: DerivationFlags::default(),
            derived_by_dynamic: false,
            functions: FxHashMap::default(),
            function_order: Vec::new(),
            missing_methods: FxHashSet::default(),
            capability_cache: FxHashMap::default(),
            merged_methods: FxHashMap::default(),
            properties: PropertyTable::new(),
            constants: ConstantTable::new(),
            span: Span::default(),
        })
    }

    /// Attach a source location
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Add attribute bits
    pub fn with_attributes(mut self, attributes: ClassAttributes) -> Self {
        self.attributes.insert(attributes);
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

    /// Declaration kind
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    /// Parent name, if the class extends one
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// True if `base` is the parent edge
    pub fn is_parent(&self, base: &str) -> bool {
        self.parent.as_deref() == Some(base)
    }

    /// Base names, parent first
    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    /// Interface names (bases after the parent)
    pub fn interfaces(&self) -> &[String] {
        let skip = usize::from(self.parent.is_some()).min(self.bases.len());
        &self.bases[skip..]
    }

    /// Declaration site
    pub fn span(&self) -> Span {
        self.span
    }

    /// Own attribute bits
    pub fn attributes(&self) -> ClassAttributes {
        self.attributes
    }

    /// True if this class itself carries `attr`
    pub fn has_own_attribute(&self, attr: ClassAttributes) -> bool {
        self.attributes.contains(attr)
    }

    /// True for interfaces
    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    /// True for abstract classes and interfaces
    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, ClassKind::AbstractClass | ClassKind::Interface)
    }

    /// True for final classes
    pub fn is_final(&self) -> bool {
        self.kind == ClassKind::FinalClass
    }

    /// True unless the class is built in
    pub fn is_user_class(&self) -> bool {
        !self.attributes.contains(ClassAttributes::SYSTEM)
    }

    /// True for classes implemented by a native extension
    pub fn is_extension_class(&self) -> bool {
        self.attributes.contains(ClassAttributes::EXTENSION)
    }

    /// Class can only be resolved dynamically
    pub fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    /// Existence must be checked at runtime before use
    pub fn is_volatile(&self) -> bool {
        self.is_volatile
    }

    /// Index among same-named declarations, if the name is redeclared
    pub fn redeclaring_id(&self) -> Option<u32> {
        self.redeclaring_id
    }

    /// True if other declarations share this name
    pub fn is_redeclaring(&self) -> bool {
        self.redeclaring_id.is_some()
    }

    /// Collapsed derivation state
    pub fn derives_from_redeclaring(&self) -> Derivation {
        self.derivation.derivation()
    }

    /// Both derivation facts
    pub fn derivation_flags(&self) -> DerivationFlags {
        self.derivation
    }

    /// True if a subclass can only be resolved dynamically
    pub fn derived_by_dynamic(&self) -> bool {
        self.derived_by_dynamic
    }

    /// Declared methods by lower-cased name
    pub fn functions(&self) -> &FxHashMap<String, Vec<FunctionId>> {
        &self.functions
    }

    /// Declared methods in declaration order
    pub fn function_order(&self) -> &[FunctionId] {
        &self.function_order
    }

    /// Every declaration of a method name in this class body
    pub fn function_ids(&self, name: &str) -> Option<&[FunctionId]> {
        self.functions.get(name).map(Vec::as_slice)
    }

    /// The declaration lookups resolve to (the latest one)
    pub fn latest_function(&self, name: &str) -> Option<FunctionId> {
        self.functions.get(name).and_then(|ids| ids.last().copied())
    }

    /// True if a method of that lower-cased name is declared here
    pub fn has_method(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Names declared abstract or otherwise unimplemented
    pub fn missing_methods(&self) -> &FxHashSet<String> {
        &self.missing_methods
    }

    /// Record a method the class must provide but does not implement
    pub fn add_missing_method(&mut self, name: &str) {
        self.missing_methods.insert(name.to_ascii_lowercase());
    }

    /// Memoized capability answer, if computed
    pub fn cached_capability(&self, key: &CapabilityKey) -> Option<Capability> {
        self.capability_cache.get(key).copied()
    }

    /// Method table merged across the hierarchy by the last resolution
    pub fn merged_methods(&self) -> &FxHashMap<String, FunctionId> {
        &self.merged_methods
    }

    /// Property table
    pub fn properties(&self) -> &PropertyTable {
        &self.properties
    }

    /// Mutable property table
    pub fn properties_mut(&mut self) -> &mut PropertyTable {
        &mut self.properties
    }

    /// Constant table
    pub fn constants(&self) -> &ConstantTable {
        &self.constants
    }

    /// Mutable constant table
    pub fn constants_mut(&mut self) -> &mut ConstantTable {
        &mut self.constants
    }

    /// Static members need initialization at first use rather than at startup
    pub fn needs_lazy_static_initializer(&self) -> bool {
        self.attributes.contains(ClassAttributes::NEEDS_STATIC_INITIALIZER)
            || self.properties.contains_dynamic_static()
            || self.constants.has_dynamic()
    }

    /// Identifier used in generated code; redeclared classes get `prefix` and their index appended
    pub fn id(&self, prefix: &str) -> String {
        match self.redeclaring_id {
            Some(index) => format!("{}{}{}", self.original_name, prefix, index),
            None => self.original_name.clone(),
        }
    }

    pub(crate) fn set_attribute(&mut self, attr: ClassAttributes) {
        self.attributes.insert(attr);
    }

    pub(crate) fn clear_attribute(&mut self, attr: ClassAttributes) {
        self.attributes.remove(attr);
    }

    pub(crate) fn set_dynamic_class(&mut self, dynamic: bool) {
        self.is_dynamic = dynamic;
    }

    pub(crate) fn clear_volatile(&mut self) {
        self.is_volatile = false;
    }

    pub(crate) fn set_redeclaring_id(&mut self, id: u32) {
        self.redeclaring_id = Some(id);
    }

    pub(crate) fn push_function(&mut self, id: FunctionId, name: &str) -> usize {
        let slot = self.functions.entry(name.to_string()).or_default();
        slot.push(id);
        self.function_order.push(id);
        slot.len()
    }

    pub(crate) fn set_merged_methods(&mut self, methods: FxHashMap<String, FunctionId>) {
        self.merged_methods = methods;
    }

    pub(crate) fn clear_capability_cache(&mut self) {
        self.capability_cache.clear();
    }

    /// Returns true if the entry was newly memoized
    pub(crate) fn cache_capability(&mut self, key: CapabilityKey, value: Capability) -> bool {
        use std::collections::hash_map::Entry;
        match self.capability_cache.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    pub(crate) fn upgrade_derivation(&mut self, to: Derivation) -> bool {
        self.derivation.upgrade(to)
    }

    pub(crate) fn mark_volatile(&mut self) -> bool {
        !std::mem::replace(&mut self.is_volatile, true)
    }

    pub(crate) fn mark_derived_by_dynamic(&mut self) -> bool {
        !std::mem::replace(&mut self.derived_by_dynamic, true)
    }

    /// Remove the edge at `index`, clearing the parent if it was the parent edge
    pub(crate) fn remove_base_at(&mut self, index: usize) -> String {
        let base = self.bases.remove(index);
        if index == 0 && self.parent.as_deref() == Some(base.as_str()) {
            self.parent = None;
        }
        base
    }

    /// Remove a non-parent edge by name. Returns true if removed.
    pub(crate) fn drop_interface(&mut self, base: &str) -> bool {
        let start = usize::from(self.parent.is_some());
        match self.bases.iter().skip(start).position(|b| b == base) {
            Some(offset) => {
                self.bases.remove(start + offset);
                true
            }
            None => false,
        }
    }
}
