//! Deferred mutations produced by hierarchy walks
//!
//! Walks such as method collection or function lookup never touch the
//! registry. They describe what they learned as a list of [`Upgrade`]s that
//! the caller applies with [`ClassRegistry::apply`](crate::ClassRegistry::apply).
//! Every upgrade is monotonic, so applying the same list twice is harmless.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::entity::{Capability, CapabilityKey, ClassId, Derivation, DerivationFlags};
use crate::error::HierarchyError;
use crate::function::FunctionId;
use crate::registry::ClassRegistry;

/// One monotonic fact about the hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upgrade {
    /// Record a derivation fact on a class
    Derivation(ClassId, Derivation),
    /// Class existence must be checked at runtime
    Volatile(ClassId),
    /// Some subclass of this class is resolved dynamically
    DerivedByDynamic(ClassId),
    /// Move every non-private property to dynamic storage
    ForceDynamicProperties(ClassId),
    /// Access properties through the global pointer
    IndirectPropertyAccess(ClassId),
    /// Calls to this method cannot be statically bound
    VirtualMethod(FunctionId),
    /// Make the named method reachable by runtime name lookup, following the parent chain
    DynamicMethod(ClassId, String),
    /// Remove an unresolved interface edge
    DropBase(ClassId, String),
    /// Register a name that is referenced but never declared
    DeclareUnknownClass(String),
    /// Record a diagnostic
    Record(HierarchyError),
    /// Memoize a capability answer
    Capability {
        /// Class the answer belongs to
        class: ClassId,
        /// What was asked
        key: CapabilityKey,
        /// The answer
        value: Capability,
    },
}

/// Result of a pure walk plus the upgrades it discovered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup<T> {
    /// Answer of the query
    pub value: T,
    /// Mutations the caller should apply
    pub upgrades: Vec<Upgrade>,
}

impl<T> Lookup<T> {
    /// A result with nothing to apply
    pub fn pure(value: T) -> Self {
        Self {
            value,
            upgrades: Vec::new(),
        }
    }

    /// Transform the value, keeping the upgrades
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        Lookup {
            value: f(self.value),
            upgrades: self.upgrades,
        }
    }

    /// True if the walk discovered nothing new
    pub fn is_pure(&self) -> bool {
        self.upgrades.is_empty()
    }
}

/// Upgrades collected during one walk, with an overlay so the walk sees its own findings
#[derive(Debug, Default)]
pub(crate) struct UpgradeLog {
    upgrades: Vec<Upgrade>,
    derivations: FxHashMap<ClassId, DerivationFlags>,
    derived_by_dynamic: FxHashSet<ClassId>,
}

impl UpgradeLog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, upgrade: Upgrade) {
        match &upgrade {
            Upgrade::Derivation(id, derivation) => {
                self.derivations.entry(*id).or_default().upgrade(*derivation);
            }
            Upgrade::DerivedByDynamic(id) => {
                self.derived_by_dynamic.insert(*id);
            }
            _ => {}
        }
        self.upgrades.push(upgrade);
    }

    /// Derivation state of `id` including facts found so far
    pub(crate) fn derivation(&self, registry: &ClassRegistry, id: ClassId) -> Derivation {
        let mut flags = registry.class(id).derivation_flags();
        if let Some(pending) = self.derivations.get(&id) {
            flags.direct |= pending.direct;
            flags.indirect |= pending.indirect;
        }
        flags.derivation()
    }

    pub(crate) fn derived_by_dynamic(&self, registry: &ClassRegistry, id: ClassId) -> bool {
        registry.class(id).derived_by_dynamic() || self.derived_by_dynamic.contains(&id)
    }

    pub(crate) fn finish<T>(self, value: T) -> Lookup<T> {
        Lookup {
            value,
            upgrades: self.upgrades,
        }
    }
}
