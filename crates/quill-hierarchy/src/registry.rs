//! Class registry
//!
//! The registry owns every [`ClassEntity`] and [`FunctionEntity`] in two
//! arenas. Classes refer to each other by lower-cased name only, and the
//! registry maps each name to every declaration sharing it. This keeps the
//! semantic reference cycles of a class hierarchy out of the ownership graph.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::entity::{ClassAttributes, ClassEntity, ClassId, ClassKind};
use crate::error::{EntityResult, HierarchyError};
use crate::function::{FunctionEntity, FunctionId, CONSTRUCTOR_NAME};
use crate::options::AnalysisOptions;
use crate::upgrade::Upgrade;

/// Arena of all classes and methods in a program
#[derive(Debug, Default)]
pub struct ClassRegistry {
    options: AnalysisOptions,
    classes: Vec<ClassEntity>,
    functions: Vec<FunctionEntity>,
    by_name: FxHashMap<String, Vec<ClassId>>,
    unknown_classes: FxHashSet<String>,
    errors: Vec<HierarchyError>,
    recorded: FxHashSet<HierarchyError>,
}

impl ClassRegistry {
    /// Create an empty registry with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry
    pub fn with_options(options: AnalysisOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Options this registry was created with
    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    // ========================================================================
    // Declaration
    // ========================================================================

    /// Register a user class declaration.
    ///
    /// A second declaration of the same name turns the whole group into
    /// redeclared classes numbered in declaration order.
    pub fn declare_class(&mut self, mut class: ClassEntity) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        if class.is_user_class() {
            class.set_attribute(ClassAttributes::USER_CLASS);
        }
        if self.options.is_dynamic_class(class.name()) {
            class.set_dynamic_class(true);
            class.mark_volatile();
        }
        if self.options.all_volatile && class.is_user_class() {
            class.mark_volatile();
        }

        let name = class.name().to_string();
        debug!(class = %name, id = id.0, "declare class");
        self.classes.push(class);

        let group = self.by_name.entry(name.clone()).or_default();
        group.push(id);
        let group = group.clone();
        match group.len() {
            1 => {}
            2 => {
                debug!(class = %name, "class redeclared");
                for (index, member) in group.iter().enumerate() {
                    self.mark_redeclaring(*member, index as u32);
                }
            }
            n => self.mark_redeclaring(id, (n - 1) as u32),
        }
        id
    }

    /// Register a built-in class together with its method list
    pub fn declare_system_class(
        &mut self,
        kind: ClassKind,
        name: &str,
        parent: Option<&str>,
        bases: &[&str],
        methods: Vec<FunctionEntity>,
    ) -> EntityResult<ClassId> {
        let class = ClassEntity::new(kind, name, parent, bases)?
            .with_attributes(ClassAttributes::SYSTEM | ClassAttributes::EXTENSION);
        let id = self.declare_class(class);
        for method in methods {
            self.add_function(id, method);
        }
        self.set_system(id);
        Ok(id)
    }

    /// Add a method to a class body.
    ///
    /// Magic names set the matching class attributes. Declaring a name twice
    /// records a diagnostic and keeps both; lookups see the later one.
    pub fn add_function(&mut self, class: ClassId, mut func: FunctionEntity) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        func.attach(class);
        let name = func.name().to_string();

        let owner = &mut self.classes[class.index()];
        match name.as_str() {
            CONSTRUCTOR_NAME => {
                owner.set_attribute(ClassAttributes::HAS_CONSTRUCTOR);
                owner.clear_attribute(ClassAttributes::CLASS_NAME_CONSTRUCTOR);
            }
            "__destruct" => owner.set_attribute(ClassAttributes::HAS_DESTRUCTOR),
            "__call" => owner.set_attribute(ClassAttributes::HAS_UNKNOWN_METHOD_HANDLER),
            "__get" => owner.set_attribute(ClassAttributes::HAS_UNKNOWN_PROP_GETTER),
            "__set" => owner.set_attribute(ClassAttributes::HAS_UNKNOWN_PROP_SETTER),
            n if n == owner.name()
                && !owner.has_own_attribute(ClassAttributes::HAS_CONSTRUCTOR) =>
            {
                owner.set_attribute(ClassAttributes::CLASS_NAME_CONSTRUCTOR);
            }
            _ => {}
        }
        if func.is_abstract() {
            owner.add_missing_method(&name);
        }
        if owner.is_redeclaring() {
            func.set_dynamic();
        }

        let count = owner.push_function(id, &name);
        if count > 1 {
            func.set_redeclaring((count - 1) as u32);
        }
        let span = func.span();
        let class_name = owner.name().to_string();
        let first = owner.function_ids(&name).and_then(|ids| ids.first().copied());
        self.functions.push(func);

        if count == 2 {
            if let Some(first) = first {
                let original = self.functions[first.index()].span();
                self.functions[first.index()].set_redeclaring(0);
                self.report_error(HierarchyError::DeclaredFunctionTwice {
                    class: class_name,
                    method: name,
                    span,
                    original,
                });
            }
        }
        id
    }

    fn mark_redeclaring(&mut self, id: ClassId, index: u32) {
        let class = &mut self.classes[id.index()];
        class.set_redeclaring_id(index);
        self.apply_redeclaring_effects(id);
    }

    /// A redeclared class is volatile, every method is dynamic and non-private
    /// properties use dynamic storage. Safe to repeat after more members are added.
    pub(crate) fn apply_redeclaring_effects(&mut self, id: ClassId) -> bool {
        let class = &mut self.classes[id.index()];
        if !class.is_redeclaring() {
            return false;
        }
        let mut changed = class.mark_volatile();
        changed |= class.properties_mut().force_non_private_dynamic();
        let funcs = class.function_order().to_vec();
        for f in funcs {
            changed |= self.functions[f.index()].set_dynamic();
        }
        changed
    }

    /// Mark a class as built in: not volatile, not dynamic, its methods system methods
    pub fn set_system(&mut self, id: ClassId) {
        let class = &mut self.classes[id.index()];
        class.set_attribute(ClassAttributes::SYSTEM);
        class.clear_attribute(ClassAttributes::USER_CLASS);
        class.clear_volatile();
        class.set_dynamic_class(false);
        let firsts: Vec<FunctionId> = class
            .functions()
            .values()
            .filter_map(|ids| ids.first().copied())
            .collect();
        for f in firsts {
            self.functions[f.index()].set_system();
        }
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Class by id
    pub fn class(&self, id: ClassId) -> &ClassEntity {
        &self.classes[id.index()]
    }

    /// Mutable class by id
    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassEntity {
        &mut self.classes[id.index()]
    }

    /// Function by id
    pub fn function(&self, id: FunctionId) -> &FunctionEntity {
        &self.functions[id.index()]
    }

    /// Mutable function by id
    pub fn function_mut(&mut self, id: FunctionId) -> &mut FunctionEntity {
        &mut self.functions[id.index()]
    }

    /// Every class id in declaration order
    pub fn class_ids(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.classes.len() as u32).map(ClassId)
    }

    /// Number of declared classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True if nothing was declared
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Distinct declared class names, sorted
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    // ========================================================================
    // Name resolution
    // ========================================================================

    /// Representative declaration of a name (the first one).
    ///
    /// Check [`ClassEntity::is_redeclaring`] on the result to detect ambiguity.
    pub fn find_class(&self, name: &str) -> Option<ClassId> {
        self.find_classes(name).first().copied()
    }

    /// Every declaration sharing a name
    pub fn find_classes(&self, name: &str) -> &[ClassId] {
        match self.by_name.get(name) {
            Some(ids) => ids,
            None => self
                .by_name
                .get(&name.to_ascii_lowercase())
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        }
    }

    /// Alternatives of a statically ambiguous name; empty unless redeclared
    pub fn find_redeclared_classes(&self, name: &str) -> &[ClassId] {
        let ids = self.find_classes(name);
        if ids.len() > 1 {
            ids
        } else {
            &[]
        }
    }

    /// Remember a base name that is referenced but never declared.
    ///
    /// Returns true the first time a name is registered.
    pub fn declare_unknown_class(&mut self, name: &str) -> bool {
        self.unknown_classes.insert(name.to_ascii_lowercase())
    }

    /// True if `name` was registered as an unknown class
    pub fn is_unknown_class(&self, name: &str) -> bool {
        self.unknown_classes.contains(&name.to_ascii_lowercase())
    }

    /// Unknown class names, sorted
    pub fn unknown_classes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.unknown_classes.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Report a diagnostic for one occurrence, even if an identical one exists.
    ///
    /// Later [`record_error`](Self::record_error) calls with the same value are
    /// still suppressed.
    pub fn report_error(&mut self, error: HierarchyError) {
        debug!(%error, "hierarchy diagnostic");
        self.recorded.insert(error.clone());
        self.errors.push(error);
    }

    /// Record a diagnostic rediscovered by repeated walks. Identical
    /// diagnostics are kept once.
    pub fn record_error(&mut self, error: HierarchyError) -> bool {
        if self.recorded.contains(&error) {
            return false;
        }
        debug!(%error, "hierarchy diagnostic");
        self.recorded.insert(error.clone());
        self.errors.push(error);
        true
    }

    /// Diagnostics in the order they were recorded
    pub fn errors(&self) -> &[HierarchyError] {
        &self.errors
    }

    /// Drain recorded diagnostics
    pub fn take_errors(&mut self) -> Vec<HierarchyError> {
        self.recorded.clear();
        std::mem::take(&mut self.errors)
    }

    // ========================================================================
    // Attribute state
    // ========================================================================

    /// True if the latest declaration of any method in the class is private
    pub fn has_private_method(&self, id: ClassId) -> bool {
        self.class(id)
            .functions()
            .values()
            .filter_map(|ids| ids.last())
            .any(|f| self.function(*f).is_private())
    }

    /// Forget every memoized capability answer
    pub fn clear_capability_caches(&mut self) {
        for class in &mut self.classes {
            class.clear_capability_cache();
        }
    }

    /// Apply upgrades produced by a walk. Returns true if any state changed.
    pub fn apply(&mut self, upgrades: impl IntoIterator<Item = Upgrade>) -> bool {
        let mut changed = false;
        for upgrade in upgrades {
            let applied = self.apply_one(upgrade);
            changed |= applied;
        }
        changed
    }

    fn apply_one(&mut self, upgrade: Upgrade) -> bool {
        trace!(?upgrade, "apply");
        match upgrade {
            Upgrade::Derivation(id, derivation) => {
                self.classes[id.index()].upgrade_derivation(derivation)
            }
            Upgrade::Volatile(id) => self.classes[id.index()].mark_volatile(),
            Upgrade::DerivedByDynamic(id) => self.classes[id.index()].mark_derived_by_dynamic(),
            Upgrade::ForceDynamicProperties(id) => self.classes[id.index()]
                .properties_mut()
                .force_non_private_dynamic(),
            Upgrade::IndirectPropertyAccess(id) => self.classes[id.index()]
                .properties_mut()
                .request_indirect_access(),
            Upgrade::VirtualMethod(f) => self.functions[f.index()].set_virtual(),
            Upgrade::DynamicMethod(id, name) => self.set_dynamic(id, &name),
            Upgrade::DropBase(id, base) => {
                let dropped = self.classes[id.index()].drop_interface(&base);
                if dropped {
                    debug!(class = %self.classes[id.index()].name(), %base, "dropped unresolved base");
                }
                dropped
            }
            Upgrade::DeclareUnknownClass(name) => self.declare_unknown_class(&name),
            Upgrade::Record(error) => self.record_error(error),
            Upgrade::Capability { class, key, value } => {
                self.classes[class.index()].cache_capability(key, value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Derivation;
    use crate::function::Visibility;
    use crate::members::{Property, Storage};
    use crate::span::Span;

    fn class(name: &str) -> ClassEntity {
        ClassEntity::new(ClassKind::NormalClass, name, None, &[] as &[&str]).unwrap()
    }

    #[test]
    fn test_find_class_is_case_insensitive() {
        let mut reg = ClassRegistry::new();
        let id = reg.declare_class(class("Widget"));
        assert_eq!(reg.find_class("WIDGET"), Some(id));
        assert_eq!(reg.find_class("widget"), Some(id));
        assert!(reg.find_redeclared_classes("widget").is_empty());
        assert!(reg.class(id).has_own_attribute(ClassAttributes::USER_CLASS));
    }

    #[test]
    fn test_redeclaration_numbers_group() {
        let mut reg = ClassRegistry::new();
        let mut first = class("A");
        first
            .properties_mut()
            .declare(Property::new("x"));
        first
            .properties_mut()
            .declare(Property::new("y").with_visibility(Visibility::Private));
        let a0 = reg.declare_class(first);
        let f = reg.add_function(a0, FunctionEntity::new("run").unwrap());
        assert!(!reg.function(f).is_dynamic());

        let a1 = reg.declare_class(class("a"));
        assert_eq!(reg.class(a0).redeclaring_id(), Some(0));
        assert_eq!(reg.class(a1).redeclaring_id(), Some(1));
        assert!(reg.class(a0).is_volatile());
        assert!(reg.function(f).is_dynamic());
        assert_eq!(reg.class(a0).properties().get("x").unwrap().storage, Storage::Dynamic);
        assert_eq!(reg.class(a0).properties().get("y").unwrap().storage, Storage::Typed);
        assert_eq!(reg.find_class("a"), Some(a0));
        assert_eq!(reg.find_redeclared_classes("A"), &[a0, a1]);

        let a2 = reg.declare_class(class("A"));
        assert_eq!(reg.class(a2).redeclaring_id(), Some(2));
        assert_eq!(reg.class(a2).id("$$"), "A$$2");
    }

    #[test]
    fn test_function_declared_twice() {
        let mut reg = ClassRegistry::new();
        let id = reg.declare_class(class("A"));
        let first = reg.add_function(
            id,
            FunctionEntity::new("go").unwrap().with_span(Span::new(0, 2, 1, 1)),
        );
        let second = reg.add_function(
            id,
            FunctionEntity::new("Go").unwrap().with_span(Span::new(10, 12, 2, 1)),
        );

        assert_eq!(reg.function(first).redeclaring_index(), Some(0));
        assert_eq!(reg.function(second).redeclaring_index(), Some(1));
        assert_eq!(reg.class(id).latest_function("go"), Some(second));
        assert_eq!(reg.errors().len(), 1);
        assert!(matches!(
            &reg.errors()[0],
            HierarchyError::DeclaredFunctionTwice { original, .. } if original.start == 0
        ));
    }

    #[test]
    fn test_magic_methods_set_attributes() {
        let mut reg = ClassRegistry::new();
        let id = reg.declare_class(class("Widget"));
        reg.add_function(id, FunctionEntity::new("Widget").unwrap());
        assert!(reg.class(id).has_own_attribute(ClassAttributes::CLASS_NAME_CONSTRUCTOR));
        reg.add_function(id, FunctionEntity::new("__construct").unwrap());
        reg.add_function(id, FunctionEntity::new("__call").unwrap());
        let attrs = reg.class(id).attributes();
        assert!(attrs.contains(ClassAttributes::HAS_CONSTRUCTOR));
        assert!(attrs.contains(ClassAttributes::HAS_UNKNOWN_METHOD_HANDLER));
        assert!(!attrs.contains(ClassAttributes::CLASS_NAME_CONSTRUCTOR));
    }

    #[test]
    fn test_system_class() {
        let mut reg = ClassRegistry::with_options(AnalysisOptions {
            all_volatile: true,
            ..Default::default()
        });
        let id = reg
            .declare_system_class(
                ClassKind::NormalClass,
                "Exception",
                None,
                &[],
                vec![
                    FunctionEntity::new("__construct").unwrap(),
                    FunctionEntity::new("getMessage").unwrap(),
                ],
            )
            .unwrap();
        let class = reg.class(id);
        assert!(!class.is_user_class());
        assert!(!class.is_volatile());
        assert!(class.has_own_attribute(ClassAttributes::HAS_CONSTRUCTOR));
        let f = class.latest_function("getmessage").unwrap();
        assert!(reg.function(f).is_system());
    }

    #[test]
    fn test_apply_reports_change_once() {
        let mut reg = ClassRegistry::new();
        let id = reg.declare_class(class("A"));
        let ups = vec![
            Upgrade::Derivation(id, Derivation::IndirectFromRedeclared),
            Upgrade::Volatile(id),
        ];
        assert!(reg.apply(ups.clone()));
        assert!(!reg.apply(ups));
        assert_eq!(
            reg.class(id).derives_from_redeclaring(),
            Derivation::IndirectFromRedeclared
        );
    }

    #[test]
    fn test_record_error_dedupes() {
        let mut reg = ClassRegistry::new();
        let err = HierarchyError::UnknownBaseClass {
            class: "b".into(),
            base: "ghost".into(),
            span: Span::default(),
        };
        assert!(reg.record_error(err.clone()));
        assert!(!reg.record_error(err.clone()));

        reg.report_error(err.clone());
        assert_eq!(reg.errors().len(), 2);
        assert!(!reg.record_error(err));
        assert_eq!(reg.errors().len(), 1);
    }
}
