//! Tri-state capability queries
//!
//! A capability holds for a class when the class itself provides it, or when
//! every candidate parent does. If the parent is redeclared and only some
//! candidates provide it the answer is [`Capability::Ambiguous`]. Answers are
//! memoized per class and key.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::entity::{Capability, CapabilityKey, ClassEntity, ClassId};
use crate::registry::ClassRegistry;
use crate::upgrade::{Lookup, Upgrade, UpgradeLog};

/// Interface queried by [`implements_array_access`]
pub const ARRAY_ACCESS: &str = "arrayaccess";

/// Does the class (or every candidate parent chain) declare method `name`?
pub fn implements_capability(registry: &ClassRegistry, class: ClassId, name: &str) -> Lookup<Capability> {
    evaluate(registry, class, CapabilityKey::Method(name.to_ascii_lowercase()))
}

/// Does the class (or every candidate parent chain) name `ArrayAccess` among its interfaces?
pub fn implements_array_access(registry: &ClassRegistry, class: ClassId) -> Lookup<Capability> {
    evaluate(registry, class, CapabilityKey::Interface(ARRAY_ACCESS.to_string()))
}

fn provides_locally(class: &ClassEntity, key: &CapabilityKey) -> bool {
    match key {
        CapabilityKey::Method(name) => class.has_method(name),
        CapabilityKey::Interface(name) => class.interfaces().iter().any(|i| i == name),
    }
}

fn parent_candidates(registry: &ClassRegistry, class: ClassId) -> &[ClassId] {
    match registry.class(class).parent() {
        Some(parent) => registry.find_classes(parent),
        None => &[],
    }
}

/// Fold the answers of the parent candidates.
///
/// Any ambiguous candidate makes the whole answer ambiguous; otherwise a mix
/// of yes and no is ambiguous.
fn fold(answers: impl IntoIterator<Item = Capability>) -> Capability {
    let (mut yes, mut no) = (0usize, 0usize);
    for answer in answers {
        match answer {
            Capability::Ambiguous => return Capability::Ambiguous,
            Capability::Yes => yes += 1,
            Capability::No => no += 1,
        }
    }
    match (yes, no) {
        (0, _) => Capability::No,
        (_, 0) => Capability::Yes,
        _ => Capability::Ambiguous,
    }
}

/// Post-order evaluation over parent candidates with an explicit stack
fn evaluate(registry: &ClassRegistry, root: ClassId, key: CapabilityKey) -> Lookup<Capability> {
    let mut log = UpgradeLog::new();
    let mut results: FxHashMap<ClassId, Capability> = FxHashMap::default();
    let mut on_path: FxHashSet<ClassId> = FxHashSet::default();
    let mut stack = vec![(root, false)];

    while let Some((id, expanded)) = stack.pop() {
        if results.contains_key(&id) {
            continue;
        }
        let class = registry.class(id);

        if !expanded {
            if let Some(cached) = class.cached_capability(&key) {
                results.insert(id, cached);
                continue;
            }
            if provides_locally(class, &key) {
                finish(&mut log, &mut results, id, &key, Capability::Yes);
                continue;
            }
            let parents = parent_candidates(registry, id);
            if parents.is_empty() {
                finish(&mut log, &mut results, id, &key, Capability::No);
                continue;
            }
            on_path.insert(id);
            stack.push((id, true));
            for &parent in parents.iter().rev() {
                if !results.contains_key(&parent) && !on_path.contains(&parent) {
                    stack.push((parent, false));
                }
            }
            continue;
        }

        on_path.remove(&id);
        // A candidate still missing here closes a cycle and counts as "no"
        let answer = fold(
            parent_candidates(registry, id)
                .iter()
                .map(|p| results.get(p).copied().unwrap_or(Capability::No)),
        );
        finish(&mut log, &mut results, id, &key, answer);
    }

    let value = results.get(&root).copied().unwrap_or(Capability::No);
    log.finish(value)
}

fn finish(
    log: &mut UpgradeLog,
    results: &mut FxHashMap<ClassId, Capability>,
    class: ClassId,
    key: &CapabilityKey,
    value: Capability,
) {
    results.insert(class, value);
    log.push(Upgrade::Capability {
        class,
        key: key.clone(),
        value,
    });
}

impl ClassRegistry {
    /// Memoizing form of [`implements_capability`]
    pub fn implements_capability(&mut self, class: ClassId, name: &str) -> Capability {
        let lookup = implements_capability(self, class, name);
        self.apply(lookup.upgrades);
        lookup.value
    }

    /// Memoizing form of [`implements_array_access`]
    pub fn implements_array_access(&mut self, class: ClassId) -> Capability {
        let lookup = implements_array_access(self, class);
        self.apply(lookup.upgrades);
        lookup.value
    }
}
