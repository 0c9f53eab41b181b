//! Analysis options

use serde::{Deserialize, Serialize};

/// Knobs consulted while declaring and resolving classes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Treat every user class as volatile
    pub all_volatile: bool,

    /// Class names (case-insensitive) whose declarations are dynamic, and therefore volatile
    pub dynamic_classes: Vec<String>,

    /// Upper bound on method-collection rounds before the resolver gives up on a fixpoint
    #[serde(default = "default_max_resolution_rounds")]
    pub max_resolution_rounds: usize,
}

fn default_max_resolution_rounds() -> usize {
    64
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            all_volatile: false,
            dynamic_classes: Vec::new(),
            max_resolution_rounds: default_max_resolution_rounds(),
        }
    }
}

impl AnalysisOptions {
    /// True if the lower-cased `name` was configured as dynamic
    pub fn is_dynamic_class(&self, name: &str) -> bool {
        self.dynamic_classes
            .iter()
            .any(|c| c.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = AnalysisOptions::default();
        assert!(!opts.all_volatile);
        assert_eq!(opts.max_resolution_rounds, 64);
    }

    #[test]
    fn test_dynamic_class_is_case_insensitive() {
        let opts = AnalysisOptions {
            dynamic_classes: vec!["Plugin".to_string()],
            ..Default::default()
        };
        assert!(opts.is_dynamic_class("plugin"));
        assert!(!opts.is_dynamic_class("widget"));
    }
}
