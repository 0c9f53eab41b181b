//! Base-edge validation
//!
//! Depth-first walk over base lists that removes every edge closing a cycle
//! or repeating an earlier edge of the same list. The walk keeps its own
//! frame stack so hierarchy depth never reaches the call stack.

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::entity::ClassId;
use crate::error::HierarchyError;
use crate::registry::ClassRegistry;

struct Frame {
    class: ClassId,
    name: String,
    /// Bases still to visit are `bases[..cursor]`, walked from the end
    cursor: usize,
    visited: FxHashSet<String>,
    pending: Vec<ClassId>,
}

impl Frame {
    fn enter(registry: &ClassRegistry, class: ClassId) -> Self {
        let entity = registry.class(class);
        Self {
            class,
            name: entity.name().to_string(),
            cursor: entity.bases().len(),
            visited: FxHashSet::default(),
            pending: Vec::new(),
        }
    }
}

/// Validate the base edges reachable from `root`.
///
/// An edge is invalid when its name is already on the current path (a cycle)
/// or was already seen earlier in the same base list (walked last to first).
/// Invalid edges are reported and removed; removing the parent edge clears
/// the parent. Returns the number of removed edges.
pub fn check_derivation(registry: &mut ClassRegistry, root: ClassId) -> usize {
    let mut removed = 0;
    let mut on_path: FxHashSet<String> = FxHashSet::default();
    let first = Frame::enter(registry, root);
    on_path.insert(first.name.clone());
    let mut stack = vec![first];

    while let Some(frame) = stack.last_mut() {
        if let Some(next) = frame.pending.pop() {
            let child = Frame::enter(registry, next);
            on_path.insert(child.name.clone());
            stack.push(child);
            continue;
        }

        if frame.cursor == 0 {
            if let Some(done) = stack.pop() {
                on_path.remove(&done.name);
            }
            continue;
        }

        frame.cursor -= 1;
        let index = frame.cursor;
        let base = registry.class(frame.class).bases()[index].clone();

        if on_path.contains(&base) || frame.visited.contains(&base) {
            let class = registry.class(frame.class);
            let error = HierarchyError::InvalidDerivation {
                class: class.original_name().to_string(),
                base: base.clone(),
                span: class.span(),
            };
            debug!(class = %frame.name, %base, "removing invalid base edge");
            registry.report_error(error);
            registry.class_mut(frame.class).remove_base_at(index);
            removed += 1;
            continue;
        }
        frame.visited.insert(base.clone());

        // Visit every declaration of the base, first declaration first
        let mut declarations = registry.find_classes(&base).to_vec();
        declarations.reverse();
        frame.pending = declarations;
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ClassEntity, ClassKind};

    fn declare(reg: &mut ClassRegistry, kind: ClassKind, name: &str, parent: Option<&str>, bases: &[&str]) -> ClassId {
        reg.declare_class(ClassEntity::new(kind, name, parent, bases).unwrap())
    }

    #[test]
    fn test_self_cycle_removed() {
        let mut reg = ClassRegistry::new();
        let a = declare(&mut reg, ClassKind::NormalClass, "A", Some("A"), &["A"]);
        assert_eq!(check_derivation(&mut reg, a), 1);
        assert!(reg.class(a).bases().is_empty());
        assert_eq!(reg.class(a).parent(), None);
    }

    #[test]
    fn test_two_class_cycle() {
        let mut reg = ClassRegistry::new();
        let a = declare(&mut reg, ClassKind::NormalClass, "A", Some("B"), &["B"]);
        let b = declare(&mut reg, ClassKind::NormalClass, "B", Some("A"), &["A"]);
        assert_eq!(check_derivation(&mut reg, a), 1);
        // The edge closing the cycle is the one from B back to A
        assert_eq!(reg.class(a).parent(), Some("b"));
        assert_eq!(reg.class(b).parent(), None);
        assert_eq!(check_derivation(&mut reg, b), 0);
    }

    #[test]
    fn test_duplicate_interface_keeps_one_edge() {
        let mut reg = ClassRegistry::new();
        declare(&mut reg, ClassKind::Interface, "I", None, &[]);
        let c = declare(&mut reg, ClassKind::NormalClass, "C", None, &["I", "i"]);
        assert_eq!(check_derivation(&mut reg, c), 1);
        assert_eq!(reg.class(c).bases(), &["i".to_string()]);
        assert_eq!(reg.errors().len(), 1);
    }

    #[test]
    fn test_each_duplicate_edge_is_reported() {
        let mut reg = ClassRegistry::new();
        declare(&mut reg, ClassKind::Interface, "I", None, &[]);
        let c = declare(&mut reg, ClassKind::NormalClass, "C", None, &["I", "I", "I"]);
        assert_eq!(check_derivation(&mut reg, c), 2);
        assert_eq!(reg.class(c).bases(), &["i".to_string()]);
        assert_eq!(reg.errors().len(), 2);
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut reg = ClassRegistry::new();
        declare(&mut reg, ClassKind::Interface, "Root", None, &[]);
        declare(&mut reg, ClassKind::Interface, "Left", None, &["Root"]);
        declare(&mut reg, ClassKind::Interface, "Right", None, &["Root"]);
        let c = declare(&mut reg, ClassKind::NormalClass, "C", None, &["Left", "Right"]);
        assert_eq!(check_derivation(&mut reg, c), 0);
        assert!(reg.errors().is_empty());
    }
}
