//! Whole-program hierarchy resolution
//!
//! Resolution runs in two phases:
//!
//! 1. [`check_derivation`] over every class, repairing cyclic and duplicate
//!    base edges.
//! 2. Rounds of [`collect_methods`] over every class, applying the discovered
//!    upgrades after each walk, until a full round changes nothing.
//!
//! Every upgrade is monotonic and base lists only shrink, so the rounds reach
//! the same fixpoint whatever order classes were declared in.

mod derivation;
mod methods;

pub use derivation::check_derivation;
pub use methods::{collect_methods, collect_methods_into, needs_invoke_parent, MethodMap};

use tracing::{debug, warn};

use crate::entity::ClassId;
use crate::registry::ClassRegistry;

/// Outcome of a resolution pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolutionReport {
    /// Method-collection rounds run
    pub rounds: usize,
    /// False if the round limit was hit before a fixpoint
    pub converged: bool,
    /// Base edges removed by derivation checking
    pub edges_removed: usize,
    /// Upgrades that changed state
    pub upgrades_applied: usize,
}

/// Drives a [`ClassRegistry`] to its resolved state
pub struct Resolver<'r> {
    registry: &'r mut ClassRegistry,
    max_rounds: usize,
}

impl<'r> Resolver<'r> {
    /// Create a resolver using the registry's round limit
    pub fn new(registry: &'r mut ClassRegistry) -> Self {
        let max_rounds = registry.options().max_resolution_rounds.max(1);
        Self {
            registry,
            max_rounds,
        }
    }

    /// Run both phases
    pub fn resolve(mut self) -> ResolutionReport {
        let mut report = ResolutionReport {
            edges_removed: self.check_derivations(),
            ..Default::default()
        };

        while report.rounds < self.max_rounds {
            report.rounds += 1;
            let applied = self.collect_round();
            report.upgrades_applied += applied;
            debug!(round = report.rounds, applied, "resolution round");
            if applied == 0 {
                report.converged = true;
                break;
            }
        }
        if !report.converged {
            warn!(rounds = report.rounds, "hierarchy resolution did not reach a fixpoint");
        }
        report
    }

    fn check_derivations(&mut self) -> usize {
        let ids: Vec<ClassId> = self.registry.class_ids().collect();
        let mut removed = 0;
        for id in ids {
            removed += check_derivation(self.registry, id);
        }
        removed
    }

    /// One pass over every class. Returns the number of changes made.
    fn collect_round(&mut self) -> usize {
        self.registry.clear_capability_caches();
        let ids: Vec<ClassId> = self.registry.class_ids().collect();
        let mut applied = 0;

        for &id in &ids {
            if self.registry.apply_redeclaring_effects(id) {
                applied += 1;
            }
        }
        for id in ids {
            let lookup = collect_methods(self.registry, id, true, false);
            for upgrade in lookup.upgrades {
                if self.registry.apply([upgrade]) {
                    applied += 1;
                }
            }
            if self.registry.class(id).merged_methods() != &lookup.value {
                self.registry.class_mut(id).set_merged_methods(lookup.value);
                applied += 1;
            }
        }
        applied
    }
}

impl ClassRegistry {
    /// Resolve the whole hierarchy in place
    pub fn resolve(&mut self) -> ResolutionReport {
        Resolver::new(self).resolve()
    }

    /// Collect methods and apply what the walk discovered
    pub fn collect_methods(&mut self, class: ClassId, include_private: bool, for_invoke: bool) -> MethodMap {
        let lookup = collect_methods(self, class, include_private, for_invoke);
        self.apply(lookup.upgrades);
        lookup.value
    }

    /// See [`needs_invoke_parent`]
    pub fn needs_invoke_parent(&self, class: ClassId, consider_self: bool) -> bool {
        needs_invoke_parent(self, class, consider_self)
    }
}
