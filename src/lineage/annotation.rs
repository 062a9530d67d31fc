//! Lineage Annotation, Source Ref, and Override records (spec §3.6–§3.8).
//!
//! Grounded on the teacher's data-first rule-config style (`RuleConfig` in
//! `rule.rs`): these are plain, serializable structs with a `validate`
//! method that returns every violated invariant rather than stopping at the
//! first one, so [`crate::lineage::parser`] can surface a complete list of
//! parse errors for one malformed record instead of one-at-a-time.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Rising-sensitivity data classification (spec §3.6). Rank order is the
/// classification-relaxed/tightened comparison in spec §4.6 Phase 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataClassification {
    Public,
    Internal,
    Sensitive,
    Regulated,
}

impl DataClassification {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "internal" => Some(Self::Internal),
            "sensitive" => Some(Self::Sensitive),
            "regulated" => Some(Self::Regulated),
            _ => None,
        }
    }

    /// `public=1, internal=2, sensitive=3, regulated=4` (spec §4.6 Phase 2).
    pub fn rank(self) -> u8 {
        match self {
            Self::Public => 1,
            Self::Internal => 2,
            Self::Sensitive => 3,
            Self::Regulated => 4,
        }
    }
}

impl std::fmt::Display for DataClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Public => "public",
            Self::Internal => "internal",
            Self::Sensitive => "sensitive",
            Self::Regulated => "regulated",
        };
        f.write_str(s)
    }
}

macro_rules! simple_enum {
    ($name:ident { $($variant:ident => $token:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($token => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let s = match self {
                    $(Self::$variant => $token,)+
                };
                f.write_str(s)
            }
        }
    };
}

simple_enum!(TransformType {
    Passthrough => "passthrough",
    Enrichment => "enrichment",
    Normalization => "normalization",
    Derivation => "derivation",
    Aggregation => "aggregation",
    Redaction => "redaction",
});

simple_enum!(MergeStrategy {
    SingleSource => "single_source",
    Priority => "priority",
    Merge => "merge",
    LatestWins => "latest_wins",
});

simple_enum!(BreakPolicy {
    Strict => "strict",
    Lenient => "lenient",
    WarnOnly => "warn_only",
});

simple_enum!(Confidence {
    Declared => "declared",
    Inferred => "inferred",
    Estimated => "estimated",
});

simple_enum!(SourceKind {
    Api => "api",
    Input => "input",
    Db => "db",
    Event => "event",
    File => "file",
    Cache => "cache",
});

simple_enum!(Scope {
    Internal => "internal",
    CrossRepo => "cross_repo",
    External => "external",
});

const FLOW_VERBS: &[&str] = &["enriched", "normalized", "derived", "validated", "mapped", "merged"];

static FLOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^from @(\S+)((?:\s+(?:enriched|normalized|derived|validated|mapped|merged)\s+@\S+)*)$")
        .expect("static flow grammar regex is valid")
});

static FIELD_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("static field id regex is valid"));

/// `kind:value` escalation pointer (spec §3.6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRef {
    pub kind: String,
    pub value: String,
}

impl EscalationRef {
    pub fn parse(raw: &str) -> Option<Self> {
        let (kind, value) = raw.split_once(':')?;
        if kind.is_empty() || value.is_empty() {
            return None;
        }
        Some(Self { kind: kind.to_string(), value: value.to_string() })
    }
}

impl std::fmt::Display for EscalationRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// A single upstream dependency of a field (spec §3.7). Identity is
/// `(kind, target, path, scope)`; `raw` retains the canonical-form string
/// this ref was parsed from for diffing display purposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub kind: SourceKind,
    pub target: String,
    pub path: String,
    pub scope: Scope,
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    pub contract_ref: String,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub upstream_system: Option<String>,
    pub raw: String,
    #[serde(default)]
    pub mapped_from: Vec<String>,
}

impl SourceRef {
    pub fn identity(&self) -> (SourceKind, &str, &str, Scope) {
        (self.kind, self.target.as_str(), self.path.as_str(), self.scope)
    }
}

/// Field ID + change type + expiry + reason (+ optional ticket) (spec §3.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
    pub field_id: String,
    pub change_type: String,
    pub expires: NaiveDate,
    pub reason: String,
    #[serde(default)]
    pub ticket: Option<String>,
    pub file_path: String,
    pub line: usize,
}

impl Override {
    /// Active on UTC calendar day `today` iff `today <= expires` (spec §3.8,
    /// inclusive at the boundary per spec §8 invariant 8).
    pub fn is_active_on(&self, today: NaiveDate) -> bool {
        today <= self.expires
    }

    pub fn matches(&self, field_id: &str, change_type: &str) -> bool {
        self.field_id == field_id && (self.change_type == "*" || self.change_type == change_type)
    }
}

/// A lineage annotation record (spec §3.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageAnnotation {
    pub schema_version: String,
    pub field_id: String,
    #[serde(default)]
    pub renamed_from: Option<String>,
    pub field: String,
    pub source_system: String,
    pub source_version: String,
    pub min_supported_source_version: String,
    pub transform_type: TransformType,
    pub merge_strategy: MergeStrategy,
    pub break_policy: BreakPolicy,
    pub confidence: Confidence,
    pub data_classification: DataClassification,
    pub owner: String,
    pub escalation: EscalationRef,
    pub contract_test_id: String,
    pub introduced_at: NaiveDate,
    #[serde(default)]
    pub sunset_at: Option<NaiveDate>,
    pub sources: Vec<SourceRef>,
    pub flow: String,
    pub note: String,
    pub file_path: String,
    pub line: usize,
    #[serde(default)]
    pub mapped_from: Vec<String>,
}

impl LineageAnnotation {
    /// Every invariant violation, as a human-readable message (spec §3.6
    /// "Invariants"). Returns an empty vec for a valid record.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.field_id.len() < 3 || self.field_id.len() > 64 || !FIELD_ID_RE.is_match(&self.field_id) {
            errors.push(format!(
                "field_id '{}' must be snake_case, 3-64 characters",
                self.field_id
            ));
        }
        if let Some(renamed_from) = &self.renamed_from
            && renamed_from == &self.field_id
        {
            errors.push("renamed_from must not equal field_id".to_string());
        }
        if let Some(sunset_at) = self.sunset_at
            && sunset_at < self.introduced_at
        {
            errors.push("sunset_at must be >= introduced_at".to_string());
        }
        let single_source_ok = (self.merge_strategy == MergeStrategy::SingleSource) == (self.sources.len() == 1);
        if !single_source_ok {
            errors.push("merge_strategy=single_source iff exactly one source is present".to_string());
        }
        if self.sources.is_empty() {
            errors.push("at least one source ref is required".to_string());
        }
        for source in &self.sources {
            if source.scope == Scope::External && (source.as_of.is_none() || source.provider_id.is_none()) {
                errors.push(format!(
                    "source '{}' has scope=external but is missing as_of/provider_id",
                    source.raw
                ));
            }
            if source.scope != Scope::External && source.as_of.is_some() {
                errors.push(format!("source '{}' sets as_of but scope is not external", source.raw));
            }
            if source.contract_ref.is_empty() {
                errors.push(format!("source '{}' is missing contract_ref", source.raw));
            }
        }
        if !FLOW_RE.is_match(&self.flow) {
            errors.push(format!(
                "flow '{}' does not match 'from @NODE (VERB @NODE)*' with verbs {:?}",
                self.flow, FLOW_VERBS
            ));
        }

        errors
    }
}
