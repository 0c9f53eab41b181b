//! Method collection across a hierarchy
//!
//! [`collect_methods`] merges the method tables of a class and its ancestors
//! into one name-to-function map, and works out which attributes the class
//! must take on because an ancestor is redeclared or unknown. It is a pure
//! walk: every discovered fact is returned as an [`Upgrade`].

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::entity::{ClassId, Derivation};
use crate::error::HierarchyError;
use crate::function::FunctionId;
use crate::registry::ClassRegistry;
use crate::upgrade::{Lookup, Upgrade, UpgradeLog};

/// Lower-cased method name to the declaration that answers it
pub type MethodMap = FxHashMap<String, FunctionId>;

enum Task {
    /// Merge the class's own methods, then schedule its bases
    Enter { class: ClassId, include_private: bool },
    /// Handle `bases[index]` of `class`
    Base { class: ClassId, index: usize },
    /// Inspect a uniquely resolved ancestor after its subtree was merged
    AfterUnique { class: ClassId, ancestor: ClassId, via_parent: bool },
    /// Merge the next redeclared alternative of the parent, or finish
    FanOut {
        class: ClassId,
        alternatives: Vec<ClassId>,
        next: usize,
        pristine: MethodMap,
    },
    /// Fold the alternative's map back into the accumulator below it
    MergeAlternative,
    /// Leave `class`
    Exit { class: ClassId },
}

struct Walk<'r> {
    registry: &'r ClassRegistry,
    for_invoke: bool,
    log: UpgradeLog,
    accumulators: Vec<MethodMap>,
    on_path: FxHashSet<ClassId>,
    tasks: Vec<Task>,
}

/// Merge the methods of `class` and its ancestors into `seed`.
///
/// Own methods come first; private ones only when `include_private`.
/// Ancestors never contribute private methods. A name found twice marks both
/// declarations virtual. With `for_invoke` only the parent edge is followed
/// and a redeclared parent is not entered.
pub fn collect_methods_into(
    registry: &ClassRegistry,
    class: ClassId,
    seed: MethodMap,
    include_private: bool,
    for_invoke: bool,
) -> Lookup<MethodMap> {
    let mut walk = Walk {
        registry,
        for_invoke,
        log: UpgradeLog::new(),
        accumulators: vec![seed],
        on_path: FxHashSet::default(),
        tasks: vec![Task::Enter {
            class,
            include_private,
        }],
    };
    walk.run();
    let methods = walk.accumulators.pop().unwrap_or_default();
    walk.log.finish(methods)
}

/// [`collect_methods_into`] starting from an empty map
pub fn collect_methods(
    registry: &ClassRegistry,
    class: ClassId,
    include_private: bool,
    for_invoke: bool,
) -> Lookup<MethodMap> {
    collect_methods_into(registry, class, MethodMap::default(), include_private, for_invoke)
}

impl<'r> Walk<'r> {
    fn run(&mut self) {
        while let Some(task) = self.tasks.pop() {
            match task {
                Task::Enter {
                    class,
                    include_private,
                } => self.enter(class, include_private),
                Task::Base { class, index } => self.base(class, index),
                Task::AfterUnique {
                    class,
                    ancestor,
                    via_parent,
                } => self.after_unique(class, ancestor, via_parent),
                Task::FanOut {
                    class,
                    alternatives,
                    next,
                    pristine,
                } => self.fan_out(class, alternatives, next, pristine),
                Task::MergeAlternative => self.merge_alternative(),
                Task::Exit { class } => {
                    self.on_path.remove(&class);
                }
            }
        }
    }

    fn top(&mut self) -> &mut MethodMap {
        if self.accumulators.is_empty() {
            self.accumulators.push(MethodMap::default());
        }
        let last = self.accumulators.len() - 1;
        &mut self.accumulators[last]
    }

    fn enter(&mut self, class: ClassId, include_private: bool) {
        if !self.on_path.insert(class) {
            trace!(class = class.0, "cycle during method collection, skipping");
            return;
        }
        let registry = self.registry;
        let entity = registry.class(class);

        let mut virtuals = Vec::new();
        {
            let acc = self.top();
            for (name, ids) in entity.functions() {
                let Some(&latest) = ids.last() else { continue };
                if !include_private && registry.function(latest).is_private() {
                    continue;
                }
                match acc.get(name) {
                    Some(&existing) => {
                        virtuals.push(existing);
                        virtuals.push(latest);
                    }
                    None => {
                        acc.insert(name.clone(), latest);
                    }
                }
            }
            for missing in entity.missing_methods() {
                if let Some(&existing) = acc.get(missing) {
                    virtuals.push(existing);
                }
            }
        }
        for f in virtuals {
            self.log.push(Upgrade::VirtualMethod(f));
        }

        self.tasks.push(Task::Exit { class });
        // Popped last-to-first, so bases are handled from the end of the list
        for index in 0..entity.bases().len() {
            self.tasks.push(Task::Base { class, index });
        }
    }

    fn base(&mut self, class: ClassId, index: usize) {
        let registry = self.registry;
        let entity = registry.class(class);
        let Some(base) = entity.bases().get(index) else {
            return;
        };
        let via_parent = entity.is_parent(base);
        if self.for_invoke && !via_parent {
            return;
        }

        let Some(ancestor) = registry.find_class(base) else {
            self.unknown_base(class, base, via_parent);
            return;
        };

        if self.log.derived_by_dynamic(registry, class) {
            self.log.push(Upgrade::DerivedByDynamic(ancestor));
        }

        if registry.class(ancestor).is_redeclaring() {
            if via_parent {
                if self.for_invoke {
                    return;
                }
                let alternatives = registry.find_redeclared_classes(base).to_vec();
                let pristine = self.top().clone();
                trace!(class = %entity.name(), parent = %base, count = alternatives.len(), "fan out over redeclared parent");
                self.tasks.push(Task::FanOut {
                    class,
                    alternatives,
                    next: 0,
                    pristine,
                });
            } else if entity.is_interface() {
                self.log
                    .push(Upgrade::Derivation(class, Derivation::DirectFromRedeclared));
            }
            return;
        }

        self.tasks.push(Task::AfterUnique {
            class,
            ancestor,
            via_parent,
        });
        self.tasks.push(Task::Enter {
            class: ancestor,
            include_private: false,
        });
    }

    fn unknown_base(&mut self, class: ClassId, base: &str, via_parent: bool) {
        let entity = self.registry.class(class);
        self.log.push(Upgrade::Record(HierarchyError::UnknownBaseClass {
            class: entity.original_name().to_string(),
            base: base.to_string(),
            span: entity.span(),
        }));
        if via_parent {
            self.log.push(Upgrade::DeclareUnknownClass(base.to_string()));
            self.log
                .push(Upgrade::Derivation(class, Derivation::DirectFromRedeclared));
            self.log.push(Upgrade::IndirectPropertyAccess(class));
            self.log.push(Upgrade::ForceDynamicProperties(class));
            self.log.push(Upgrade::Volatile(class));
        } else {
            if entity.is_interface() {
                self.log
                    .push(Upgrade::Derivation(class, Derivation::DirectFromRedeclared));
            }
            self.log.push(Upgrade::DropBase(class, base.to_string()));
        }
    }

    fn after_unique(&mut self, class: ClassId, ancestor: ClassId, via_parent: bool) {
        if self.log.derivation(self.registry, ancestor) == Derivation::FromNormal {
            return;
        }
        if via_parent {
            self.log
                .push(Upgrade::Derivation(class, Derivation::IndirectFromRedeclared));
            self.log.push(Upgrade::ForceDynamicProperties(class));
            self.log.push(Upgrade::Volatile(class));
        } else if self.registry.class(class).is_interface() {
            self.log
                .push(Upgrade::Derivation(class, Derivation::IndirectFromRedeclared));
        }
    }

    fn fan_out(&mut self, class: ClassId, alternatives: Vec<ClassId>, next: usize, pristine: MethodMap) {
        let Some(&alternative) = alternatives.get(next) else {
            self.log
                .push(Upgrade::Derivation(class, Derivation::DirectFromRedeclared));
            self.log.push(Upgrade::ForceDynamicProperties(class));
            self.log.push(Upgrade::IndirectPropertyAccess(class));
            self.log.push(Upgrade::Volatile(class));
            return;
        };

        self.log.push(Upgrade::DerivedByDynamic(alternative));
        let start = pristine.clone();
        self.tasks.push(Task::FanOut {
            class,
            alternatives,
            next: next + 1,
            pristine,
        });
        self.tasks.push(Task::MergeAlternative);
        self.accumulators.push(start);
        self.tasks.push(Task::Enter {
            class: alternative,
            include_private: false,
        });
    }

    fn merge_alternative(&mut self) {
        let Some(branch) = self.accumulators.pop() else {
            return;
        };
        let acc = self.top();
        for (name, f) in branch {
            acc.entry(name).or_insert(f);
        }
    }
}

/// True if generated dispatch must fall through to the parent's own invoke function.
///
/// That is the case when (with `consider_self`) the class declares a private
/// method, or somewhere up the parent chain the parent is unknown, redeclared,
/// or declares a private method.
pub fn needs_invoke_parent(registry: &ClassRegistry, class: ClassId, consider_self: bool) -> bool {
    let mut current = class;
    let mut consider = consider_self;
    let mut seen = FxHashSet::default();
    loop {
        if consider && registry.has_private_method(current) {
            return true;
        }
        consider = true;
        if !seen.insert(current) {
            return false;
        }
        let Some(parent) = registry.class(current).parent() else {
            return false;
        };
        match registry.find_class(parent) {
            None => return true,
            Some(p) if registry.class(p).is_redeclaring() => return true,
            Some(p) => current = p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ClassEntity, ClassKind};
    use crate::function::{FunctionEntity, Visibility};

    fn declare(reg: &mut ClassRegistry, name: &str, parent: Option<&str>, methods: &[&str]) -> ClassId {
        let bases: Vec<&str> = parent.into_iter().collect();
        let id = reg.declare_class(ClassEntity::new(ClassKind::NormalClass, name, parent, &bases).unwrap());
        for m in methods {
            reg.add_function(id, FunctionEntity::new(m).unwrap());
        }
        id
    }

    #[test]
    fn test_override_marks_both_virtual() {
        let mut reg = ClassRegistry::new();
        let a = declare(&mut reg, "A", None, &["run", "stop"]);
        let b = declare(&mut reg, "B", Some("A"), &["run"]);
        let lookup = collect_methods(&reg, b, true, false);
        let run_b = reg.class(b).latest_function("run").unwrap();
        let run_a = reg.class(a).latest_function("run").unwrap();
        assert_eq!(lookup.value.get("run"), Some(&run_b));
        assert!(lookup.value.contains_key("stop"));
        assert!(lookup.upgrades.contains(&Upgrade::VirtualMethod(run_a)));
        assert!(lookup.upgrades.contains(&Upgrade::VirtualMethod(run_b)));
    }

    #[test]
    fn test_ancestor_private_methods_skipped() {
        let mut reg = ClassRegistry::new();
        let a = declare(&mut reg, "A", None, &[]);
        reg.add_function(
            a,
            FunctionEntity::new("secret").unwrap().with_visibility(Visibility::Private),
        );
        let b = declare(&mut reg, "B", Some("A"), &[]);
        assert!(!collect_methods(&reg, b, true, false).value.contains_key("secret"));
        assert!(collect_methods(&reg, a, true, false).value.contains_key("secret"));
        assert!(!collect_methods(&reg, a, false, false).value.contains_key("secret"));
    }

    #[test]
    fn test_for_invoke_skips_redeclared_parent() {
        let mut reg = ClassRegistry::new();
        declare(&mut reg, "P", None, &["one"]);
        declare(&mut reg, "P", None, &["two"]);
        let c = declare(&mut reg, "C", Some("P"), &["own"]);
        let lookup = collect_methods(&reg, c, true, true);
        assert_eq!(lookup.value.len(), 1);
        assert!(lookup.is_pure());
    }

    #[test]
    fn test_needs_invoke_parent() {
        let mut reg = ClassRegistry::new();
        let a = declare(&mut reg, "A", None, &[]);
        let b = declare(&mut reg, "B", Some("A"), &[]);
        assert!(!needs_invoke_parent(&reg, b, true));

        reg.add_function(
            a,
            FunctionEntity::new("hidden").unwrap().with_visibility(Visibility::Private),
        );
        assert!(needs_invoke_parent(&reg, b, false));
        assert!(!needs_invoke_parent(&reg, a, false));

        let orphan = declare(&mut reg, "Orphan", Some("Ghost"), &[]);
        assert!(needs_invoke_parent(&reg, orphan, false));
    }
}
