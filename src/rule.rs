//! Rule contract, per-rule configuration, and violations (spec §3.3–§3.5).
//!
//! `Rule` generalizes the contract the teacher's Markdown rules satisfy
//! (`name`, `description`, `check(&LintContext) -> LintResult`, seen in
//! `rules/md009_trailing_spaces.rs`) to the cross-language, project-aware
//! shape spec.md requires: a rule is a pure function of a file, the full
//! project context, and its resolved configuration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ufm::{ProjectContext, UnifiedFileModel};

/// Per-rule severity (spec §3.4). `Off` removes the rule from a run; it is
/// never meaningful as a *violation's* severity, only as a *config* value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Off,
    Warn,
    Error,
}

impl Severity {
    /// Case-insensitive parse. Returns `None` for anything else; per spec
    /// §4.1, callers that need "unknown ranks as error" apply that rule
    /// themselves rather than have `parse` silently coerce.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Some(Severity::Off),
            "warn" | "warning" => Some(Severity::Warn),
            "error" => Some(Severity::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Off => "off",
            Severity::Warn => "warn",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// Optional suggested-fix metadata attached to a [`Violation`] (spec §3.5).
/// Fix *application* is an external collaborator (spec §1); this is purely
/// descriptive data a host could act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedFix {
    pub description: String,
    pub replacement: Option<String>,
}

/// A single rule finding (spec §3.5).
///
/// Construct with [`Violation::new`], which applies the documented defaults
/// (non-positive start line clamps to 1) eagerly so every `Violation` that
/// exists is already valid; the engine's crash-barrier and suppression pass
/// (spec §4.1) only need to fill in `rule_id` when a rule left it blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub column: Option<usize>,
    pub suggested_fix: Option<SuggestedFix>,
}

impl Violation {
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        file_path: impl Into<String>,
        start_line: usize,
    ) -> Self {
        let start_line = if start_line == 0 { 1 } else { start_line };
        Self {
            rule_id: rule_id.into(),
            severity,
            message: message.into(),
            file_path: file_path.into(),
            start_line,
            end_line: start_line,
            column: None,
            suggested_fix: None,
        }
    }

    pub fn with_end_line(mut self, end_line: usize) -> Self {
        self.end_line = end_line.max(self.start_line);
        self
    }

    pub fn with_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }

    pub fn with_suggested_fix(mut self, fix: SuggestedFix) -> Self {
        self.suggested_fix = Some(fix);
        self
    }
}

/// Per-rule configuration (spec §3.4): a severity override plus an
/// open-ended options map. Options are `serde_json::Value` (not a closed
/// struct) because the option keys are rule-specific and unknown to the
/// engine; `IndexMap` preserves the order options were supplied in for
/// stable debug/display output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub severity: Option<Severity>,
    #[serde(default)]
    pub options: IndexMap<String, Value>,
}

impl RuleConfig {
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// The severity a rule runs with once this config is applied: the
    /// override if present, else the rule's own default (spec §3.4).
    pub fn effective_severity(&self, rule_default: Severity) -> Severity {
        self.severity.unwrap_or(rule_default)
    }
}

/// A registered, polymorphic rule (spec §3.3).
///
/// Implementations must be pure: `check` never mutates `file` or `context`
/// and produces the same violations for the same inputs (spec §3.3
/// invariant, and the determinism contract of spec §4.1/§8).
pub trait Rule: Send + Sync {
    /// Stable identifier, e.g. `"TQ-no-shallow-assertions"`. Unique across
    /// the registry (spec §3.3 invariant).
    fn id(&self) -> &str;

    /// Free-form category tag used by the engine's case-insensitive
    /// category filter (spec §4.1).
    fn category(&self) -> &str;

    fn default_severity(&self) -> Severity;

    fn description(&self) -> &str;

    fn rationale(&self) -> &str;

    /// Whether this rule needs cross-file reasoning via the project
    /// context, or can be evaluated from `file` alone (spec §3.3).
    fn needs_project_context(&self) -> bool {
        false
    }

    /// Evaluate the rule against one file. May assume `config` is this
    /// rule's effective configuration, already resolved by the engine/registry
    /// (severity `off` rules are never invoked — they are filtered out
    /// before scheduling, per spec §4.1).
    fn check(&self, file: &UnifiedFileModel, context: &ProjectContext, config: &RuleConfig) -> Vec<Violation>;
}
