//! Drift Change and Result types (spec §3.11).

use serde::{Deserialize, Serialize};

use crate::lineage::Override;

/// `info=1 < low=2 < medium=3 < high=4` (spec §4.6 "Sort"; GLOSSARY "Severity
/// rank").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftSeverity {
    Info,
    Low,
    Medium,
    High,
}

impl DriftSeverity {
    pub fn rank(self) -> u8 {
        match self {
            Self::Info => 1,
            Self::Low => 2,
            Self::Medium => 3,
            Self::High => 4,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for DriftSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

/// Closed set of change-type tags (spec §4.6 Phase 1–3 tables).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    FieldAdded,
    FieldRemoved,
    FieldRenamed,
    FieldPathChanged,
    SourceSystemChanged,
    SourceVersionChanged,
    MinSupportedSourceVersionChanged,
    TransformTypeChanged,
    MergeStrategyChanged,
    BreakPolicyChanged,
    ConfidenceChanged,
    ClassificationRelaxed,
    ClassificationTightened,
    OwnerChanged,
    EscalationChanged,
    ContractTestIdChanged,
    SunsetChanged,
    FlowChanged,
    NoteChanged,
    SourceRemoved,
    SourceAdded,
    SourceContractRefChanged,
    SourceProviderChanged,
    SourceUpstreamSystemChanged,
    ExternalAsOfRollback,
    ExternalAsOfAdvanced,
    ExternalAsOfChanged,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FieldAdded => "field_added",
            Self::FieldRemoved => "field_removed",
            Self::FieldRenamed => "field_renamed",
            Self::FieldPathChanged => "field_path_changed",
            Self::SourceSystemChanged => "source_system_changed",
            Self::SourceVersionChanged => "source_version_changed",
            Self::MinSupportedSourceVersionChanged => "min_supported_source_version_changed",
            Self::TransformTypeChanged => "transform_type_changed",
            Self::MergeStrategyChanged => "merge_strategy_changed",
            Self::BreakPolicyChanged => "break_policy_changed",
            Self::ConfidenceChanged => "confidence_changed",
            Self::ClassificationRelaxed => "classification_relaxed",
            Self::ClassificationTightened => "classification_tightened",
            Self::OwnerChanged => "owner_changed",
            Self::EscalationChanged => "escalation_changed",
            Self::ContractTestIdChanged => "contract_test_id_changed",
            Self::SunsetChanged => "sunset_changed",
            Self::FlowChanged => "flow_changed",
            Self::NoteChanged => "note_changed",
            Self::SourceRemoved => "source_removed",
            Self::SourceAdded => "source_added",
            Self::SourceContractRefChanged => "source_contract_ref_changed",
            Self::SourceProviderChanged => "source_provider_changed",
            Self::SourceUpstreamSystemChanged => "source_upstream_system_changed",
            Self::ExternalAsOfRollback => "external_as_of_rollback",
            Self::ExternalAsOfAdvanced => "external_as_of_advanced",
            Self::ExternalAsOfChanged => "external_as_of_changed",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A type-delta's before/after display labels (spec §4.6 Phase 3,
/// `source_contract_ref_changed`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDelta {
    pub before: String,
    pub after: String,
    pub direction: ChangeDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    Relaxed,
    Tightened,
    Unspecified,
}

/// A service+api edge referenced by a change (spec §3.11).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEdge {
    pub service: String,
    pub api: String,
}

/// One emitted drift finding (spec §3.11).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub severity: DriftSeverity,
    pub change_type: ChangeType,
    pub field_id: String,
    pub message: String,
    pub producer: Option<ServiceEdge>,
    pub impact: Option<ServiceEdge>,
    pub type_delta: Option<TypeDelta>,
    pub modifiers: Vec<String>,
    pub validation: Option<String>,
    pub suggestion: Option<String>,
    pub overridden: bool,
    pub matched_override: Option<Override>,
}

impl Change {
    pub fn new(severity: DriftSeverity, change_type: ChangeType, field_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            change_type,
            field_id: field_id.into(),
            message: message.into(),
            producer: None,
            impact: None,
            type_delta: None,
            modifiers: Vec::new(),
            validation: None,
            suggestion: None,
            overridden: false,
            matched_override: None,
        }
    }

    pub fn with_type_delta(mut self, delta: TypeDelta) -> Self {
        self.type_delta = Some(delta);
        self
    }
}

/// Aggregated diff result (spec §3.11): changes plus per-severity counts,
/// both computed after the final sort (spec §4.6 "Sort").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriftResult {
    pub changes: Vec<Change>,
    pub info_count: usize,
    pub low_count: usize,
    pub medium_count: usize,
    pub high_count: usize,
}

impl DriftResult {
    pub fn from_changes(changes: Vec<Change>) -> Self {
        let mut result = Self { changes, ..Default::default() };
        for change in &result.changes {
            match change.severity {
                DriftSeverity::Info => result.info_count += 1,
                DriftSeverity::Low => result.low_count += 1,
                DriftSeverity::Medium => result.medium_count += 1,
                DriftSeverity::High => result.high_count += 1,
            }
        }
        result
    }
}
