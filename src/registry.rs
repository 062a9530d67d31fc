//! Rule Registry (spec §3.3): the set of registered rules keyed by stable ID.
//!
//! Grounded on the teacher's `config/registry.rs::RuleRegistry`, which
//! builds a lookup structure once from a rule list (`from_rules`) and serves
//! metadata queries against it. Here the registry holds the rules
//! themselves (not just their config schemas), since rule bodies are
//! supplied externally — this crate only owns the contract, registration,
//! and lookup.

use indexmap::IndexMap;

use crate::error::ConfigError;
use crate::rule::Rule;

/// Read-only after construction (spec §5 "Shared resources"): built once
/// from a list of rules, keyed by their stable IDs with registration order
/// preserved for the "registry-default order" spec §5 names as one of the
/// three valid within-file rule orderings.
pub struct RuleRegistry {
    rules: IndexMap<String, Box<dyn Rule>>,
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry").field("rules", &self.rules.keys().collect::<Vec<_>>()).finish()
    }
}

impl RuleRegistry {
    /// Builds a registry from a list of rules, failing if any two share an
    /// ID (spec §3.3 invariant: "IDs are unique").
    pub fn from_rules(rules: Vec<Box<dyn Rule>>) -> Result<Self, ConfigError> {
        let mut map = IndexMap::with_capacity(rules.len());
        for rule in rules {
            let id = rule.id().to_string();
            if map.insert(id.clone(), rule).is_some() {
                return Err(ConfigError::DuplicateRuleId(id));
            }
        }
        Ok(Self { rules: map })
    }

    pub fn get(&self, id: &str) -> Option<&dyn Rule> {
        self.rules.get(id).map(|r| r.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rules.contains_key(id)
    }

    /// All registered rules in registration order.
    pub fn all(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.values().map(|r| r.as_ref())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{RuleConfig, Severity, Violation};
    use crate::ufm::{ProjectContext, UnifiedFileModel};

    struct Stub(&'static str);
    impl Rule for Stub {
        fn id(&self) -> &str {
            self.0
        }
        fn category(&self) -> &str {
            "test"
        }
        fn default_severity(&self) -> Severity {
            Severity::Warn
        }
        fn description(&self) -> &str {
            "stub"
        }
        fn rationale(&self) -> &str {
            "stub"
        }
        fn check(&self, _file: &UnifiedFileModel, _ctx: &ProjectContext, _cfg: &RuleConfig) -> Vec<Violation> {
            Vec::new()
        }
    }

    #[test]
    fn rejects_duplicate_ids() {
        let rules: Vec<Box<dyn Rule>> = vec![Box::new(Stub("A")), Box::new(Stub("A"))];
        let err = RuleRegistry::from_rules(rules).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRuleId(id) if id == "A"));
    }

    #[test]
    fn preserves_registration_order() {
        let rules: Vec<Box<dyn Rule>> = vec![Box::new(Stub("B")), Box::new(Stub("A"))];
        let registry = RuleRegistry::from_rules(rules).unwrap();
        let ids: Vec<_> = registry.ids().collect();
        assert_eq!(ids, vec!["B", "A"]);
    }
}
