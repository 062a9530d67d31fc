//! Drift Classifier (spec §4.6): four-phase diff between a base and head
//! artifact.
//!
//! The per-attribute severity table (spec §9 "Drift tables as data") is a
//! `phf::Map` rather than a long `match`, the same design choice made for
//! [`crate::lineage::aliases`] — auditable and changeable without touching
//! control flow.

use std::collections::HashMap;

use chrono::NaiveDate;
use phf::phf_map;

use super::types::{Change, ChangeDirection, ChangeType, DriftResult, DriftSeverity, TypeDelta};
use crate::lineage::{Artifact, LineageAnnotation, Override, SourceRef};

/// Attribute name -> (change type, severity) for attributes whose severity
/// does not depend on the values involved (spec §4.6 Phase 2 table, minus
/// `confidence` and `data_classification` which are value-dependent).
static ATTRIBUTE_SEVERITY: phf::Map<&'static str, (ChangeType, DriftSeverity)> = phf_map! {
    "field" => (ChangeType::FieldPathChanged, DriftSeverity::Medium),
    "source_system" => (ChangeType::SourceSystemChanged, DriftSeverity::High),
    "source_version" => (ChangeType::SourceVersionChanged, DriftSeverity::Medium),
    "min_supported_source_version" => (ChangeType::MinSupportedSourceVersionChanged, DriftSeverity::High),
    "transform_type" => (ChangeType::TransformTypeChanged, DriftSeverity::Medium),
    "merge_strategy" => (ChangeType::MergeStrategyChanged, DriftSeverity::Medium),
    "break_policy" => (ChangeType::BreakPolicyChanged, DriftSeverity::High),
    "owner" => (ChangeType::OwnerChanged, DriftSeverity::Low),
    "escalation" => (ChangeType::EscalationChanged, DriftSeverity::Low),
    "contract_test_id" => (ChangeType::ContractTestIdChanged, DriftSeverity::Medium),
    "sunset_at" => (ChangeType::SunsetChanged, DriftSeverity::Medium),
    "flow" => (ChangeType::FlowChanged, DriftSeverity::Low),
    "note" => (ChangeType::NoteChanged, DriftSeverity::Info),
};

/// Diffs `base` against `head` (spec §4.6).
pub fn classify(base: &Artifact, head: &Artifact) -> DriftResult {
    let base_by_id: HashMap<&str, &LineageAnnotation> =
        base.annotations.iter().map(|a| (a.field_id.as_str(), a)).collect();
    let head_by_id: HashMap<&str, &LineageAnnotation> =
        head.annotations.iter().map(|a| (a.field_id.as_str(), a)).collect();

    // Rename map: head field id -> base field id it claims to rename from,
    // but only when that base id is not itself still present (spec §9 open
    // question 2: "compare by base ID first, rename is only applied when
    // the source-side ID is absent").
    let rename_map: HashMap<&str, &str> = head
        .annotations
        .iter()
        .filter_map(|h| {
            let base_id = h.renamed_from.as_deref()?;
            if base_by_id.contains_key(h.field_id.as_str()) {
                None
            } else {
                Some((h.field_id.as_str(), base_id))
            }
        })
        .collect();

    let mut changes = Vec::new();

    for head_annotation in &head.annotations {
        if let Some(base_id) = rename_map.get(head_annotation.field_id.as_str()) {
            let Some(base_annotation) = base_by_id.get(base_id) else { continue };
            changes.push(Change::new(
                DriftSeverity::Medium,
                ChangeType::FieldRenamed,
                head_annotation.field_id.clone(),
                format!("field renamed from '{base_id}' to '{}'", head_annotation.field_id),
            ));
            changes.extend(compare_fields(base_annotation, head_annotation));
        } else if let Some(base_annotation) = base_by_id.get(head_annotation.field_id.as_str()) {
            changes.extend(compare_fields(base_annotation, head_annotation));
        } else {
            changes.push(Change::new(
                DriftSeverity::Medium,
                ChangeType::FieldAdded,
                head_annotation.field_id.clone(),
                format!("field '{}' added", head_annotation.field_id),
            ));
        }
    }

    let renamed_base_ids: std::collections::HashSet<&str> = rename_map.values().copied().collect();
    for base_annotation in &base.annotations {
        let field_id = base_annotation.field_id.as_str();
        if head_by_id.contains_key(field_id) || renamed_base_ids.contains(field_id) {
            continue;
        }
        changes.push(Change::new(
            DriftSeverity::High,
            ChangeType::FieldRemoved,
            field_id.to_string(),
            format!("field '{field_id}' removed"),
        ));
    }

    apply_overrides(&mut changes, &head.overrides);

    changes.sort_by(|a, b| {
        (
            std::cmp::Reverse(a.severity.rank()),
            a.field_id.clone(),
            a.change_type.as_str(),
        )
            .cmp(&(std::cmp::Reverse(b.severity.rank()), b.field_id.clone(), b.change_type.as_str()))
    });

    DriftResult::from_changes(changes)
}

/// Phase 2 (per-field attribute comparison) + Phase 3 (per-source
/// comparison) for one paired base/head record.
fn compare_fields(base: &LineageAnnotation, head: &LineageAnnotation) -> Vec<Change> {
    let mut changes = Vec::new();
    let field_id = &head.field_id;

    let mut emit = |attr: &str, before: String, after: String| {
        if let Some((change_type, severity)) = ATTRIBUTE_SEVERITY.get(attr) {
            changes.push(Change::new(
                *severity,
                *change_type,
                field_id.clone(),
                format!("{attr} changed from '{before}' to '{after}'"),
            ));
        }
    };

    if base.field != head.field {
        emit("field", base.field.clone(), head.field.clone());
    }
    if base.source_system != head.source_system {
        emit("source_system", base.source_system.clone(), head.source_system.clone());
    }
    if base.source_version != head.source_version {
        emit("source_version", base.source_version.clone(), head.source_version.clone());
    }
    if base.min_supported_source_version != head.min_supported_source_version {
        emit(
            "min_supported_source_version",
            base.min_supported_source_version.clone(),
            head.min_supported_source_version.clone(),
        );
    }
    if base.transform_type != head.transform_type {
        emit("transform_type", base.transform_type.to_string(), head.transform_type.to_string());
    }
    if base.merge_strategy != head.merge_strategy {
        emit("merge_strategy", base.merge_strategy.to_string(), head.merge_strategy.to_string());
    }
    if base.break_policy != head.break_policy {
        emit("break_policy", base.break_policy.to_string(), head.break_policy.to_string());
    }
    if base.owner != head.owner {
        emit("owner", base.owner.clone(), head.owner.clone());
    }
    if base.escalation != head.escalation {
        emit("escalation", base.escalation.to_string(), head.escalation.to_string());
    }
    if base.contract_test_id != head.contract_test_id {
        emit("contract_test_id", base.contract_test_id.clone(), head.contract_test_id.clone());
    }
    if base.sunset_at != head.sunset_at {
        let fmt = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "none".to_string());
        emit("sunset_at", fmt(base.sunset_at), fmt(head.sunset_at));
    }
    if base.flow != head.flow {
        emit("flow", base.flow.clone(), head.flow.clone());
    }
    if base.note != head.note {
        emit("note", base.note.clone(), head.note.clone());
    }

    if base.confidence != head.confidence {
        let severity = if base.confidence.to_string() == "declared" && head.confidence.to_string() == "inferred" {
            DriftSeverity::Medium
        } else {
            DriftSeverity::Low
        };
        changes.push(Change::new(
            severity,
            ChangeType::ConfidenceChanged,
            field_id.clone(),
            format!("confidence changed from '{}' to '{}'", base.confidence, head.confidence),
        ));
    }

    if base.data_classification != head.data_classification {
        let (before, after) = (base.data_classification.rank(), head.data_classification.rank());
        let (change_type, severity, direction) = if after < before {
            (ChangeType::ClassificationRelaxed, DriftSeverity::High, ChangeDirection::Relaxed)
        } else {
            (ChangeType::ClassificationTightened, DriftSeverity::Low, ChangeDirection::Tightened)
        };
        changes.push(
            Change::new(
                severity,
                change_type,
                field_id.clone(),
                format!(
                    "data_classification changed from '{}' to '{}'",
                    base.data_classification, head.data_classification
                ),
            )
            .with_type_delta(TypeDelta {
                before: base.data_classification.to_string(),
                after: head.data_classification.to_string(),
                direction,
            }),
        );
    }

    changes.extend(compare_sources(field_id, &base.sources, &head.sources));
    changes
}

fn contract_ref_label(raw: &str) -> String {
    if let Some(idx) = raw.rfind('@') {
        let suffix = &raw[idx + 1..];
        let atomic = !suffix.is_empty()
            && suffix.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if atomic {
            return suffix.to_string();
        }
    }
    if raw.chars().count() > 72 {
        raw.chars().take(72).collect()
    } else {
        raw.to_string()
    }
}

fn compare_sources(field_id: &str, base: &[SourceRef], head: &[SourceRef]) -> Vec<Change> {
    let mut changes = Vec::new();
    let base_by_id: HashMap<_, &SourceRef> = base.iter().map(|s| (s.identity(), s)).collect();
    let head_by_id: HashMap<_, &SourceRef> = head.iter().map(|s| (s.identity(), s)).collect();

    for head_source in head {
        let identity = head_source.identity();
        let Some(base_source) = base_by_id.get(&identity) else {
            changes.push(Change::new(
                DriftSeverity::Medium,
                ChangeType::SourceAdded,
                field_id.to_string(),
                format!("source '{}' added", head_source.raw),
            ));
            continue;
        };

        if base_source.contract_ref != head_source.contract_ref {
            changes.push(
                Change::new(
                    DriftSeverity::Medium,
                    ChangeType::SourceContractRefChanged,
                    field_id.to_string(),
                    format!("contract_ref changed for source '{}'", head_source.raw),
                )
                .with_type_delta(TypeDelta {
                    before: contract_ref_label(&base_source.contract_ref),
                    after: contract_ref_label(&head_source.contract_ref),
                    direction: ChangeDirection::Unspecified,
                }),
            );
        }
        if base_source.provider_id != head_source.provider_id {
            changes.push(Change::new(
                DriftSeverity::Medium,
                ChangeType::SourceProviderChanged,
                field_id.to_string(),
                format!("provider_id changed for source '{}'", head_source.raw),
            ));
        }
        if base_source.upstream_system != head_source.upstream_system {
            changes.push(Change::new(
                DriftSeverity::Medium,
                ChangeType::SourceUpstreamSystemChanged,
                field_id.to_string(),
                format!("upstream_system changed for source '{}'", head_source.raw),
            ));
        }
        if base_source.as_of != head_source.as_of
            && base_source.scope == crate::lineage::annotation::Scope::External
            && head_source.scope == crate::lineage::annotation::Scope::External
        {
            match (base_source.as_of, head_source.as_of) {
                (Some(b), Some(h)) if h < b => changes.push(Change::new(
                    DriftSeverity::High,
                    ChangeType::ExternalAsOfRollback,
                    field_id.to_string(),
                    format!("as_of rolled back for source '{}'", head_source.raw),
                )),
                (Some(b), Some(h)) if h > b => changes.push(Change::new(
                    DriftSeverity::Low,
                    ChangeType::ExternalAsOfAdvanced,
                    field_id.to_string(),
                    format!("as_of advanced for source '{}'", head_source.raw),
                )),
                (Some(_), Some(_)) => {}
                _ => changes.push(Change::new(
                    DriftSeverity::Medium,
                    ChangeType::ExternalAsOfChanged,
                    field_id.to_string(),
                    format!("as_of changed for source '{}'", head_source.raw),
                )),
            }
        }
    }

    for base_source in base {
        if !head_by_id.contains_key(&base_source.identity()) {
            changes.push(Change::new(
                DriftSeverity::High,
                ChangeType::SourceRemoved,
                field_id.to_string(),
                format!("source '{}' removed", base_source.raw),
            ));
        }
    }

    changes
}

/// Phase 4: marks changes covered by an active head override (spec §4.6
/// Phase 4). Active means `expires >= today` using the current UTC date.
fn apply_overrides(changes: &mut [Change], overrides: &[Override]) {
    let today = chrono::Utc::now().date_naive();
    let active: Vec<&Override> = overrides.iter().filter(|o| o.is_active_on(today)).collect();
    for change in changes.iter_mut() {
        if let Some(matched) = active.iter().find(|o| o.matches(&change.field_id, change.change_type.as_str())) {
            change.overridden = true;
            change.matched_override = Some((*matched).clone());
        }
    }
}

/// `true` iff any non-overridden change's severity rank is at or above
/// `threshold`'s rank (spec §4.6 "Threshold enforcement"). `None` threshold
/// (the `none` token) never fails.
pub fn should_fail_at_threshold(result: &DriftResult, threshold: Option<DriftSeverity>) -> bool {
    let Some(threshold) = threshold else { return false };
    result
        .changes
        .iter()
        .any(|c| !c.overridden && c.severity.rank() >= threshold.rank())
}

/// `block` delegates to [`should_fail_at_threshold`]; `warn` never fails
/// (spec §4.6, spec §8 invariant 10).
pub fn should_fail_at_threshold_with_mode(result: &DriftResult, threshold: Option<DriftSeverity>, mode: &str) -> bool {
    if mode == "warn" {
        return false;
    }
    should_fail_at_threshold(result, threshold)
}
