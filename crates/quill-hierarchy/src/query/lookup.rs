//! Method and constructor resolution, and dynamic-dispatch patching
//!
//! Lookups are pure: when the search runs into a redeclared ancestor it
//! reports the consequences (the class derives from a redeclared class, the
//! name must stay reachable by runtime lookup) as upgrades.

use rustc_hash::FxHashSet;
use tracing::trace;

use crate::entity::{ClassAttributes, ClassId, Derivation};
use crate::function::{FunctionId, CONSTRUCTOR_NAME};
use crate::registry::ClassRegistry;
use crate::upgrade::{Lookup, Upgrade, UpgradeLog};

struct Frame {
    class: ClassId,
    next: usize,
}

/// Resolve method `name` starting at `class`.
///
/// A hit in the class's own table wins. Otherwise, if `recursive`, bases are
/// searched in declared order. With `exclude_interface_base` the search stops
/// at the first interface base. A redeclared interface base is skipped; a
/// redeclared class base ends the search and makes the class derive directly
/// from a redeclared class. Every class whose search fails while it is known
/// to derive directly from a redeclared class gets `name` marked dynamic.
pub fn find_function(
    registry: &ClassRegistry,
    class: ClassId,
    name: &str,
    recursive: bool,
    exclude_interface_base: bool,
) -> Lookup<Option<FunctionId>> {
    let name = name.to_ascii_lowercase();
    let mut log = UpgradeLog::new();

    if let Some(found) = registry.class(class).latest_function(&name) {
        return log.finish(Some(found));
    }
    if !recursive {
        mark_dynamic_if_direct(registry, &mut log, class, &name);
        return log.finish(None);
    }

    let mut on_path = FxHashSet::default();
    on_path.insert(class);
    let mut stack = vec![Frame { class, next: 0 }];

    while let Some(frame) = stack.last_mut() {
        let current = frame.class;
        let bases = registry.class(current).bases();
        let mut descend = None;

        while let Some(base) = bases.get(frame.next) {
            frame.next += 1;
            let Some(ancestor) = registry.find_class(base) else {
                continue;
            };
            let entity = registry.class(ancestor);
            if exclude_interface_base && entity.is_interface() {
                frame.next = bases.len();
                break;
            }
            if entity.is_redeclaring() {
                if entity.is_interface() {
                    continue;
                }
                trace!(class = current.0, base = %base, "lookup hit redeclared base");
                log.push(Upgrade::Derivation(current, Derivation::DirectFromRedeclared));
                frame.next = bases.len();
                break;
            }
            if on_path.contains(&ancestor) {
                continue;
            }
            descend = Some(ancestor);
            break;
        }

        if let Some(ancestor) = descend {
            if let Some(found) = registry.class(ancestor).latest_function(&name) {
                return log.finish(Some(found));
            }
            on_path.insert(ancestor);
            stack.push(Frame {
                class: ancestor,
                next: 0,
            });
            continue;
        }

        mark_dynamic_if_direct(registry, &mut log, current, &name);
        on_path.remove(&current);
        stack.pop();
    }

    log.finish(None)
}

/// Resolve the constructor of `class`.
///
/// A class using the legacy convention is searched for a method named after
/// itself first, then for the canonical constructor. Only the parent chain is
/// followed, and not past a class deriving directly from a redeclared class.
pub fn find_constructor(registry: &ClassRegistry, class: ClassId, recursive: bool) -> Lookup<Option<FunctionId>> {
    let mut log = UpgradeLog::new();
    let mut chain = Vec::new();
    let mut seen = FxHashSet::default();
    seen.insert(class);
    let mut current = class;

    loop {
        if let Some(found) = own_constructor(registry, current) {
            return log.finish(Some(found));
        }
        chain.push(current);
        if !recursive || log.derivation(registry, current) == Derivation::DirectFromRedeclared {
            break;
        }
        let Some(parent) = registry
            .class(current)
            .parent()
            .and_then(|p| registry.find_class(p))
        else {
            break;
        };
        if !seen.insert(parent) {
            break;
        }
        current = parent;
    }

    for id in chain {
        let name = constructor_names(registry, id)[0].to_string();
        mark_dynamic_if_direct(registry, &mut log, id, &name);
    }
    log.finish(None)
}

fn constructor_names(registry: &ClassRegistry, class: ClassId) -> Vec<&str> {
    let entity = registry.class(class);
    if entity.has_own_attribute(ClassAttributes::CLASS_NAME_CONSTRUCTOR) {
        vec![entity.name(), CONSTRUCTOR_NAME]
    } else {
        vec![CONSTRUCTOR_NAME]
    }
}

fn own_constructor(registry: &ClassRegistry, class: ClassId) -> Option<FunctionId> {
    let entity = registry.class(class);
    constructor_names(registry, class)
        .into_iter()
        .find_map(|name| entity.latest_function(name))
}

fn mark_dynamic_if_direct(registry: &ClassRegistry, log: &mut UpgradeLog, class: ClassId, name: &str) {
    if log.derivation(registry, class) == Derivation::DirectFromRedeclared {
        log.push(Upgrade::DynamicMethod(class, name.to_string()));
    }
}

impl ClassRegistry {
    /// Resolve a method and apply what the lookup discovered
    pub fn find_function(
        &mut self,
        class: ClassId,
        name: &str,
        recursive: bool,
        exclude_interface_base: bool,
    ) -> Option<FunctionId> {
        let lookup = find_function(self, class, name, recursive, exclude_interface_base);
        self.apply(lookup.upgrades);
        lookup.value
    }

    /// Resolve a constructor and apply what the lookup discovered
    pub fn find_constructor(&mut self, class: ClassId, recursive: bool) -> Option<FunctionId> {
        let lookup = find_constructor(self, class, recursive);
        self.apply(lookup.upgrades);
        lookup.value
    }

    /// Make every declaration of `name` reachable by runtime name lookup.
    ///
    /// When the class does not declare it, the request moves to the parent, or
    /// to every alternative of a redeclared parent. Returns true if anything changed.
    pub fn set_dynamic(&mut self, class: ClassId, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        let mut changed = false;
        let mut seen = FxHashSet::default();
        let mut work = vec![class];

        while let Some(id) = work.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(ids) = self.class(id).function_ids(&name) {
                for f in ids.to_vec() {
                    changed |= self.function_mut(f).set_dynamic();
                }
                continue;
            }
            work.extend(self.parent_targets(id));
        }
        changed
    }

    /// Make every static method of the class and its ancestors reachable by
    /// runtime name lookup. Returns true if anything changed.
    pub fn set_static_dynamic(&mut self, class: ClassId) -> bool {
        let mut changed = false;
        let mut seen = FxHashSet::default();
        let mut work = vec![class];

        while let Some(id) = work.pop() {
            if !seen.insert(id) {
                continue;
            }
            let statics: Vec<FunctionId> = self
                .class(id)
                .function_order()
                .iter()
                .copied()
                .filter(|f| self.function(*f).is_static())
                .collect();
            for f in statics {
                changed |= self.function_mut(f).set_dynamic();
            }
            work.extend(self.parent_targets(id));
        }
        changed
    }

    /// Every declaration of the parent if the parent edge is ambiguous, else the parent
    fn parent_targets(&self, class: ClassId) -> Vec<ClassId> {
        let entity = self.class(class);
        let Some(parent) = entity.parent() else {
            return Vec::new();
        };
        if entity.derives_from_redeclaring() == Derivation::DirectFromRedeclared {
            self.find_classes(parent).to_vec()
        } else {
            self.find_class(parent).into_iter().collect()
        }
    }
}
