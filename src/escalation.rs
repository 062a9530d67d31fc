//! Escalation Resolver (spec §4.7): BFS over the service graph implied by
//! lineage source refs, seeded from the system registry.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::lineage::{Artifact, LineageAnnotation, SourceRef};
use crate::system_registry::{Contact, SystemRegistry};

/// One hop in an escalation chain (spec §4.7 step 5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationStep {
    pub system_id: String,
    pub display_name: String,
    pub owner_team: String,
    pub runbook_url: String,
    pub doc_root: String,
    pub contacts: Vec<Contact>,
}

fn normalize(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}

fn upstream_of(source: &SourceRef) -> Option<String> {
    if let Some(upstream) = &source.upstream_system {
        return Some(normalize(upstream));
    }
    if source.scope == crate::lineage::annotation::Scope::External {
        return source.provider_id.as_deref().map(normalize);
    }
    if matches!(source.kind, crate::lineage::annotation::SourceKind::Api | crate::lineage::annotation::SourceKind::Event) {
        let prefix = source
            .target
            .split(|c| c == '.' || c == '/')
            .next()
            .unwrap_or(&source.target);
        return Some(normalize(prefix));
    }
    None
}

/// Resolves the escalation chain starting at `start_system_id`, walking
/// transitive upstreams up to `max_depth` hops (spec §4.7).
pub fn resolve(
    start_system_id: &str,
    artifact: &Artifact,
    registry: &SystemRegistry,
    max_depth: usize,
) -> Vec<EscalationStep> {
    let mut by_producer: HashMap<String, Vec<&LineageAnnotation>> = HashMap::new();
    for annotation in &artifact.annotations {
        by_producer
            .entry(normalize(&annotation.source_system))
            .or_default()
            .push(annotation);
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    queue.push_back((normalize(start_system_id), 0));
    visited.insert(normalize(start_system_id));

    let mut steps = Vec::new();

    while let Some((system_id, depth)) = queue.pop_front() {
        let fields = by_producer.get(&system_id).cloned().unwrap_or_default();
        steps.push(build_step(&system_id, registry, &fields));

        if depth >= max_depth {
            continue;
        }
        for field in &fields {
            for source in &field.sources {
                let Some(upstream) = upstream_of(source) else { continue };
                if visited.insert(upstream.clone()) {
                    queue.push_back((upstream, depth + 1));
                }
            }
        }
    }

    steps
}

fn build_step(system_id: &str, registry: &SystemRegistry, fields: &[&LineageAnnotation]) -> EscalationStep {
    if let Some(record) = registry.get(system_id) {
        return EscalationStep {
            system_id: system_id.to_string(),
            display_name: record.name.clone(),
            owner_team: record.owner_team.clone(),
            runbook_url: record.runbook_url.clone(),
            doc_root: record.doc_root.clone(),
            contacts: record.contacts.clone(),
        };
    }

    // No registry entry: fall back to the owner/escalation of the first
    // field produced by this system in deterministic (artifact) order (spec
    // §9 open question 1).
    let fallback = fields.first();
    EscalationStep {
        system_id: system_id.to_string(),
        display_name: system_id.to_string(),
        owner_team: fallback.map(|f| f.owner.clone()).unwrap_or_default(),
        runbook_url: String::new(),
        doc_root: String::new(),
        contacts: fallback
            .map(|f| {
                vec![Contact {
                    role: "owner".to_string(),
                    name: f.owner.clone(),
                    channel: f.escalation.to_string(),
                }]
            })
            .unwrap_or_default(),
    }
}
