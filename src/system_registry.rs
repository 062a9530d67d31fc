//! System Registry Loader (spec §3.10, §4.8).
//!
//! Grounded on the teacher's YAML-shaped config loading (`config/types.rs`
//! deserializes the project config from YAML/TOML via serde); here the
//! document is a flat list of service metadata records loaded with
//! `serde_yml`, matching the dependency already carried for this purpose.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// One escalation contact (spec §3.10).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub role: String,
    pub name: String,
    pub channel: String,
}

/// One system's metadata record (spec §3.10).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemRecord {
    pub id: String,
    pub name: String,
    pub owner_team: String,
    pub runbook_url: String,
    pub doc_root: String,
    #[serde(default, alias = "escalation")]
    pub contacts: Vec<Contact>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    systems: Vec<SystemRecord>,
}

/// Ordered collection of system metadata records keyed by a
/// case-insensitive, non-empty, unique ID (spec §3.10).
#[derive(Debug, Clone, Default)]
pub struct SystemRegistry {
    by_id: IndexMap<String, SystemRecord>,
}

impl SystemRegistry {
    /// Parses a YAML-shaped document of the form
    /// `{ systems: [ { id, name, owner_team, runbook_url, doc_root, escalation: [...] } ] }`
    /// (spec §4.8 "System registry file").
    pub fn load(yaml: &str) -> Result<Self, RegistryError> {
        let doc: RegistryDocument = serde_yml::from_str(yaml)
            .map_err(|e| RegistryError::MalformedContact { id: String::new(), reason: e.to_string() })?;

        let mut by_id = IndexMap::with_capacity(doc.systems.len());
        for system in doc.systems {
            if system.id.trim().is_empty() {
                return Err(RegistryError::EmptyId);
            }
            let key = system.id.trim().to_ascii_lowercase();
            for contact in &system.contacts {
                if contact.role.trim().is_empty() || contact.channel.trim().is_empty() {
                    return Err(RegistryError::MalformedContact {
                        id: system.id.clone(),
                        reason: "contact role and channel must not be empty".to_string(),
                    });
                }
            }
            if by_id.insert(key, system.clone()).is_some() {
                return Err(RegistryError::DuplicateId { id: system.id });
            }
        }
        Ok(Self { by_id })
    }

    /// Looks up a system by case-insensitive ID.
    pub fn get(&self, id: &str) -> Option<&SystemRecord> {
        self.by_id.get(&id.trim().to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_systems_and_looks_up_case_insensitively() {
        let yaml = r##"
systems:
  - id: ServiceX
    name: Service X
    owner_team: team.x
    runbook_url: https://runbooks/x
    doc_root: https://docs/x
    escalation:
      - role: primary
        name: Alice
        channel: "#x-oncall"
"##;
        let registry = SystemRegistry::load(yaml).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("servicex").is_some());
        assert!(registry.get("SERVICEX").is_some());
    }

    #[test]
    fn rejects_duplicate_case_insensitive_ids() {
        let yaml = r#"
systems:
  - id: ServiceX
    name: a
    owner_team: t
    runbook_url: u
    doc_root: d
  - id: servicex
    name: b
    owner_team: t
    runbook_url: u
    doc_root: d
"#;
        let err = SystemRegistry::load(yaml).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId { .. }));
    }

    #[test]
    fn rejects_empty_id() {
        let yaml = r#"
systems:
  - id: ""
    name: a
    owner_team: t
    runbook_url: u
    doc_root: d
"#;
        let err = SystemRegistry::load(yaml).unwrap_err();
        assert!(matches!(err, RegistryError::EmptyId));
    }

    #[test]
    fn rejects_malformed_contact() {
        let yaml = r##"
systems:
  - id: ServiceX
    name: a
    owner_team: t
    runbook_url: u
    doc_root: d
    escalation:
      - role: ""
        name: Alice
        channel: "#x"
"##;
        let err = SystemRegistry::load(yaml).unwrap_err();
        assert!(matches!(err, RegistryError::MalformedContact { .. }));
    }
}
