//! Ancestor queries

use rustc_hash::FxHashSet;

use crate::entity::{ClassAttributes, ClassId};
use crate::registry::ClassRegistry;

/// True iff `name` is one of the class's own base edges
pub fn derives_directly_from(registry: &ClassRegistry, class: ClassId, name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    registry.class(class).bases().iter().any(|b| *b == name)
}

/// True if `name` is reachable through base edges.
///
/// With `strict`, a redeclared ancestor cannot be looked through: the answer
/// is `default_when_redeclared` if that is true, otherwise that branch is
/// skipped.
pub fn derives_from(
    registry: &ClassRegistry,
    class: ClassId,
    name: &str,
    strict: bool,
    default_when_redeclared: bool,
) -> bool {
    let name = name.to_ascii_lowercase();
    if derives_directly_from(registry, class, &name) {
        return true;
    }

    let mut visited = FxHashSet::default();
    visited.insert(class);
    let mut stack: Vec<ClassId> = resolved_bases(registry, class).collect();
    stack.reverse();

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        if strict && registry.class(current).is_redeclaring() {
            if default_when_redeclared {
                return true;
            }
            continue;
        }
        if derives_directly_from(registry, current, &name) {
            return true;
        }
        let mut next: Vec<ClassId> = resolved_bases(registry, current).collect();
        next.reverse();
        stack.extend(next);
    }
    false
}

fn resolved_bases(registry: &ClassRegistry, class: ClassId) -> impl Iterator<Item = ClassId> + '_ {
    registry
        .class(class)
        .bases()
        .iter()
        .filter_map(|b| registry.find_class(b))
}

/// Nearest common ancestor name of two classes, searching base lists pairwise.
///
/// A name compared with itself is its own common parent. When one side is
/// unknown or derives from the other, the other is returned. Names of declared
/// classes are returned in their declared spelling.
pub fn find_common_parent(registry: &ClassRegistry, first: &str, second: &str) -> Option<String> {
    let mut visited: FxHashSet<(String, String)> = FxHashSet::default();
    let mut stack = vec![(first.to_string(), second.to_string())];

    while let Some((a, b)) = stack.pop() {
        if !visited.insert((a.to_ascii_lowercase(), b.to_ascii_lowercase())) {
            continue;
        }
        if a.eq_ignore_ascii_case(&b) {
            return Some(display_name(registry, &a));
        }

        let class_a = registry.find_class(&a);
        let class_b = registry.find_class(&b);
        let (class_a, class_b) = match (class_a, class_b) {
            (None, _) => return Some(display_name(registry, &b)),
            (Some(ca), _) if derives_from(registry, ca, &b, true, false) => {
                return Some(display_name(registry, &b))
            }
            (_, None) => return Some(display_name(registry, &a)),
            (_, Some(cb)) if derives_from(registry, cb, &a, true, false) => {
                return Some(display_name(registry, &a))
            }
            (Some(ca), Some(cb)) => (ca, cb),
        };

        // Preserve declared order: the first pair is searched first
        let bases_a = registry.class(class_a).bases();
        let bases_b = registry.class(class_b).bases();
        for base_a in bases_a.iter().rev() {
            for base_b in bases_b.iter().rev() {
                stack.push((base_a.clone(), base_b.clone()));
            }
        }
    }
    None
}

fn display_name(registry: &ClassRegistry, name: &str) -> String {
    match registry.find_class(name) {
        Some(id) => registry.class(id).original_name().to_string(),
        None => name.to_string(),
    }
}

/// True if the class or any class on its parent chain carries `attr`
pub fn has_attribute(registry: &ClassRegistry, class: ClassId, attr: ClassAttributes) -> bool {
    let mut seen = FxHashSet::default();
    let mut current = Some(class);
    while let Some(id) = current {
        if !seen.insert(id) {
            return false;
        }
        if registry.class(id).has_own_attribute(attr) {
            return true;
        }
        current = parent_scope(registry, id);
    }
    false
}

/// Resolved parent declaration, if any
pub fn parent_scope(registry: &ClassRegistry, class: ClassId) -> Option<ClassId> {
    registry
        .class(class)
        .parent()
        .and_then(|parent| registry.find_class(parent))
}

/// Every ancestor name reachable through base edges, deduplicated and sorted.
///
/// Redeclared ancestors are listed but not entered, since which declaration
/// applies is only known at runtime.
pub fn all_parents(registry: &ClassRegistry, class: ClassId) -> Vec<String> {
    let mut names: FxHashSet<String> = FxHashSet::default();
    let mut visited = FxHashSet::default();
    let mut stack = vec![class];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        for base in registry.class(id).bases() {
            names.insert(base.clone());
            if let Some(next) = registry.find_class(base) {
                if !registry.class(next).is_redeclaring() {
                    stack.push(next);
                }
            }
        }
    }
    let mut names: Vec<String> = names.into_iter().collect();
    names.sort_unstable();
    names
}

/// Top-most class on the parent chain declaring `method`.
///
/// With an empty `method` this is the top of the chain. Falls back to the
/// class itself.
pub fn root_parent(registry: &ClassRegistry, class: ClassId, method: &str) -> ClassId {
    let method = method.to_ascii_lowercase();
    let mut root = class;
    let mut seen = FxHashSet::default();
    seen.insert(class);
    let mut current = parent_scope(registry, class);
    while let Some(id) = current {
        if !seen.insert(id) {
            break;
        }
        if method.is_empty() || registry.class(id).has_method(&method) {
            root = id;
        }
        current = parent_scope(registry, id);
    }
    root
}

/// [`root_parent`] across every combination of redeclared parents.
///
/// Each path up the hierarchy contributes the top-most declaring class on
/// that path. Duplicates are removed, first occurrence kept.
pub fn root_parents(registry: &ClassRegistry, class: ClassId, method: &str) -> Vec<ClassId> {
    let method = method.to_ascii_lowercase();
    let mut roots = Vec::new();
    let mut visited = FxHashSet::default();
    let mut stack = vec![(class, class)];

    while let Some((id, current_root)) = stack.pop() {
        if !visited.insert((id, current_root)) {
            continue;
        }
        let candidates = match registry.class(id).parent() {
            Some(parent) => registry.find_classes(parent),
            None => &[],
        };
        if candidates.is_empty() {
            if !roots.contains(&current_root) {
                roots.push(current_root);
            }
            continue;
        }
        for &candidate in candidates.iter().rev() {
            let next_root = if method.is_empty() || registry.class(candidate).has_method(&method) {
                candidate
            } else {
                current_root
            };
            stack.push((candidate, next_root));
        }
    }
    roots
}

impl ClassRegistry {
    /// See [`derives_from`]
    pub fn derives_from(&self, class: ClassId, name: &str, strict: bool, default_when_redeclared: bool) -> bool {
        derives_from(self, class, name, strict, default_when_redeclared)
    }

    /// See [`find_common_parent`]
    pub fn find_common_parent(&self, first: &str, second: &str) -> Option<String> {
        find_common_parent(self, first, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ClassEntity, ClassKind};

    fn declare(reg: &mut ClassRegistry, name: &str, parent: Option<&str>, interfaces: &[&str]) -> ClassId {
        let mut bases: Vec<&str> = parent.into_iter().collect();
        bases.extend_from_slice(interfaces);
        reg.declare_class(ClassEntity::new(ClassKind::NormalClass, name, parent, &bases).unwrap())
    }

    #[test]
    fn test_derives_from_transitive() {
        let mut reg = ClassRegistry::new();
        declare(&mut reg, "A", None, &[]);
        declare(&mut reg, "B", Some("A"), &[]);
        let c = declare(&mut reg, "C", Some("B"), &[]);
        assert!(derives_directly_from(&reg, c, "B"));
        assert!(!derives_directly_from(&reg, c, "A"));
        assert!(derives_from(&reg, c, "a", false, false));
        assert!(!derives_from(&reg, c, "Z", false, false));
    }

    #[test]
    fn test_strict_stops_at_redeclared() {
        let mut reg = ClassRegistry::new();
        declare(&mut reg, "Root", None, &[]);
        declare(&mut reg, "Mid", Some("Root"), &[]);
        declare(&mut reg, "Mid", Some("Root"), &[]);
        let leaf = declare(&mut reg, "Leaf", Some("Mid"), &[]);
        assert!(derives_from(&reg, leaf, "Root", false, false));
        assert!(!derives_from(&reg, leaf, "Root", true, false));
        assert!(derives_from(&reg, leaf, "Root", true, true));
    }

    #[test]
    fn test_common_parent() {
        let mut reg = ClassRegistry::new();
        declare(&mut reg, "A", None, &[]);
        declare(&mut reg, "B", Some("A"), &[]);
        declare(&mut reg, "C", Some("A"), &[]);
        declare(&mut reg, "D", Some("C"), &[]);
        assert_eq!(find_common_parent(&reg, "B", "C").as_deref(), Some("A"));
        assert_eq!(find_common_parent(&reg, "D", "C").as_deref(), Some("C"));
        assert_eq!(find_common_parent(&reg, "b", "d").as_deref(), Some("A"));
        assert_eq!(find_common_parent(&reg, "B", "b").as_deref(), Some("B"));
    }

    #[test]
    fn test_common_parent_none() {
        let mut reg = ClassRegistry::new();
        declare(&mut reg, "X", None, &[]);
        declare(&mut reg, "Y", None, &[]);
        assert_eq!(find_common_parent(&reg, "X", "Y"), None);
        assert_eq!(find_common_parent(&reg, "Ghost", "Y").as_deref(), Some("Y"));
    }

    #[test]
    fn test_root_parent() {
        let mut reg = ClassRegistry::new();
        let a = declare(&mut reg, "A", None, &[]);
        let b = declare(&mut reg, "B", Some("A"), &[]);
        let c = declare(&mut reg, "C", Some("B"), &[]);
        reg.add_function(b, crate::function::FunctionEntity::new("run").unwrap());
        assert_eq!(root_parent(&reg, c, ""), a);
        assert_eq!(root_parent(&reg, c, "run"), b);
        assert_eq!(root_parent(&reg, c, "missing"), c);
        assert_eq!(parent_scope(&reg, a), None);
    }

    #[test]
    fn test_root_parents_over_alternatives() {
        let mut reg = ClassRegistry::new();
        let p0 = declare(&mut reg, "P", None, &[]);
        let p1 = declare(&mut reg, "P", None, &[]);
        let c = declare(&mut reg, "C", Some("P"), &[]);
        assert_eq!(root_parents(&reg, c, ""), vec![p0, p1]);
    }

    #[test]
    fn test_all_parents_sorted() {
        let mut reg = ClassRegistry::new();
        declare(&mut reg, "Countable", None, &[]);
        declare(&mut reg, "Base", None, &["Countable"]);
        let c = declare(&mut reg, "Child", Some("Base"), &["Iterator"]);
        assert_eq!(all_parents(&reg, c), vec!["base", "countable", "iterator"]);
    }

    #[test]
    fn test_has_attribute_walks_parents() {
        let mut reg = ClassRegistry::new();
        let a = declare(&mut reg, "A", None, &[]);
        let b = declare(&mut reg, "B", Some("A"), &[]);
        reg.add_function(a, crate::function::FunctionEntity::new("__call").unwrap());
        assert!(has_attribute(&reg, b, ClassAttributes::HAS_UNKNOWN_METHOD_HANDLER));
        assert!(!has_attribute(&reg, b, ClassAttributes::HAS_DESTRUCTOR));
    }
}
