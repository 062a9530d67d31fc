//! Rule Engine (spec §4.1, §5): selection, scheduling, crash isolation,
//! suppression/severity filtering, and the final deterministic sort.
//!
//! Grounded on the teacher's orchestration shape in `commands/check.rs`
//! (load config → resolve rules → run → filter → exit) and its panic
//! barrier in `main.rs` (`std::panic::catch_unwind` around the whole CLI
//! dispatch) — here the barrier wraps each individual `check` call instead,
//! since a rule panic must not take down other rules or files (spec §5
//! "Failure isolation").

use itertools::Itertools;

use crate::error::ConfigError;
use crate::rule::{Rule, RuleConfig, Severity, Violation};
use crate::suppression::{self, SuppressionPolicy};
use crate::ufm::{ProjectContext, UnifiedFileModel};
use std::collections::HashMap;

/// A rule selected for this run, decorated with its effective configuration
/// (spec §4.1 "the engine decorates each selected rule with its effective
/// config").
pub struct ConfiguredRule<'a> {
    pub rule: &'a dyn Rule,
    pub config: RuleConfig,
}

impl<'a> std::fmt::Debug for ConfiguredRule<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredRule").field("rule", &self.rule.id()).field("config", &self.config).finish()
    }
}

impl<'a> ConfiguredRule<'a> {
    pub fn effective_severity(&self) -> Severity {
        self.config.effective_severity(self.rule.default_severity())
    }
}

/// Resolves which rules run and in what order (spec §4.1 "Rule selection").
///
/// - `explicit_ids`, when present, is the *only* source of truth and
///   preserves caller order (e.g. CLI `--rule` order); unknown IDs are a
///   fatal configuration error.
/// - Otherwise `config_rule_ids`, when present, selects that set but — since
///   it originates from an unordered config map — is applied in a stable
///   alphabetical order (spec §5 "a stable alphabetical order over config
///   keys"); unknown IDs are likewise fatal, since a config typo should
///   never silently no-op.
/// - Otherwise every registered rule runs, in registry (registration) order.
///
/// The optional `category` filter (spec §4.1) is applied case-insensitively
/// after the candidate set is resolved. Rules whose effective severity
/// resolves to `off` are dropped.
pub fn select_rules<'a>(
    registry: &'a crate::registry::RuleRegistry,
    explicit_ids: Option<&[String]>,
    config_rule_ids: Option<&[String]>,
    category: Option<&str>,
    configs: &HashMap<String, RuleConfig>,
) -> Result<Vec<ConfiguredRule<'a>>, ConfigError> {
    let mut candidate_ids = if let Some(ids) = explicit_ids {
        for id in ids {
            if !registry.contains(id) {
                return Err(ConfigError::UnknownRuleId(id.clone()));
            }
        }
        ids.to_vec()
    } else if let Some(ids) = config_rule_ids {
        for id in ids {
            if !registry.contains(id) {
                return Err(ConfigError::UnknownRuleId(id.clone()));
            }
        }
        ids.iter().cloned().sorted().dedup().collect()
    } else {
        registry.ids().map(String::from).collect()
    };

    if let Some(category) = category {
        candidate_ids.retain(|id| {
            registry
                .get(id)
                .is_some_and(|rule| rule.category().eq_ignore_ascii_case(category))
        });
    }

    let mut selected = Vec::with_capacity(candidate_ids.len());
    for id in candidate_ids {
        let Some(rule) = registry.get(&id) else { continue };
        let config = configs.get(&id).cloned().unwrap_or_default();
        let severity = config.effective_severity(rule.default_severity());
        if severity == Severity::Off {
            continue;
        }
        selected.push(ConfiguredRule { rule, config });
    }
    Ok(selected)
}

/// Engine scheduler (spec §4.1, §5). Parallel mode partitions files across a
/// worker pool; each worker runs a file's full rule set sequentially so
/// within-file determinism is preserved, and the combiner concatenates then
/// sorts — the only place ordering is actually decided (spec §5 "Ordering
/// guarantees").
pub enum Scheduler {
    Sequential,
    Parallel { width: usize },
}

impl Scheduler {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Scheduler::Parallel { width } = self
            && *width == 0
        {
            return Err(ConfigError::InvalidConcurrency(0));
        }
        Ok(())
    }
}

/// Parses the CLI-facing minimum-severity token (spec §4.1: "warn" or
/// "error"). Unrecognized tokens rank as `error` rather than being rejected,
/// per spec's explicit "avoid accidental silent-drop" design choice — an
/// unrecognized filter should never widen the output.
pub fn parse_min_severity(token: &str) -> Severity {
    match token.trim().to_ascii_lowercase().as_str() {
        "warn" | "warning" => Severity::Warn,
        _ => Severity::Error,
    }
}

/// `--quiet` is equivalent to `minimum = error` (spec §4.1).
pub fn quiet_min_severity() -> Severity {
    Severity::Error
}

/// Inputs to one engine run (spec §4.1 "Inputs").
pub struct RunRequest<'a> {
    pub context: &'a ProjectContext,
    /// Canonical paths to process; must be present in `context`. Order does
    /// not affect the final (sorted) output (spec §8 invariant 1).
    pub files: Vec<&'a str>,
    pub rules: Vec<ConfiguredRule<'a>>,
    pub scheduler: Scheduler,
    /// Positive cap on emitted violations (spec §4.1 "Max-violation cap").
    /// `None` or `Some(0)` mean uncapped.
    pub max_violations: Option<usize>,
    /// When a baseline filter is configured downstream, the cap must be
    /// disabled here so post-filter suppression never hides unfinished
    /// findings (spec §4.1).
    pub disable_cap_for_baseline: bool,
    /// Minimum severity to retain after sorting (spec §4.1).
    pub min_severity: Option<Severity>,
}

/// Output of one engine run (spec §4.1 "Output"; `truncated` is a
/// SPEC_FULL.md supplement so a host can tell "0 violations" apart from
/// "capped before completion").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    pub violations: Vec<Violation>,
    pub truncated: bool,
}

/// Runs the engine end to end: compile suppression, invoke rules inside the
/// crash barrier, filter/clamp/fill, sort, and apply the severity filter.
pub fn run(request: RunRequest<'_>) -> Result<RunOutcome, ConfigError> {
    request.scheduler.validate()?;

    let effective_cap = if request.disable_cap_for_baseline {
        None
    } else {
        request.max_violations.filter(|&c| c > 0)
    };

    let (mut violations, truncated) = match &request.scheduler {
        Scheduler::Sequential => run_sequential(&request, effective_cap),
        Scheduler::Parallel { width } => run_parallel(&request, effective_cap, *width),
    };

    violations.sort_by(|a, b| {
        (a.file_path.as_str(), a.start_line, a.rule_id.as_str()).cmp(&(
            b.file_path.as_str(),
            b.start_line,
            b.rule_id.as_str(),
        ))
    });

    if let Some(min_severity) = request.min_severity {
        violations.retain(|v| v.severity >= min_severity);
    }

    Ok(RunOutcome { violations, truncated })
}

fn run_sequential(request: &RunRequest<'_>, cap: Option<usize>) -> (Vec<Violation>, bool) {
    let mut out = Vec::new();
    let mut truncated = false;
    'files: for path in &request.files {
        let Some(file) = request.context.get(path) else { continue };
        let policy = suppression::compile(&file.source);
        for configured in &request.rules {
            if let Some(cap) = cap
                && out.len() >= cap
            {
                truncated = true;
                break 'files;
            }
            for violation in run_rule_with_barrier(configured, file, request.context) {
                if let Some(v) = finalize_violation(violation, configured.rule.id(), &policy) {
                    out.push(v);
                }
            }
        }
    }
    (out, truncated)
}

#[cfg(feature = "parallel")]
fn run_parallel(request: &RunRequest<'_>, cap: Option<usize>, width: usize) -> (Vec<Violation>, bool) {
    use rayon::prelude::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(width.max(1))
        .build()
        .expect("failed to build rule engine thread pool");

    let counter = AtomicUsize::new(0);
    let truncated = AtomicBool::new(false);

    let per_file: Vec<Vec<Violation>> = pool.install(|| {
        request
            .files
            .par_iter()
            .map(|path| {
                let Some(file) = request.context.get(path) else {
                    return Vec::new();
                };
                if let Some(cap) = cap
                    && counter.load(Ordering::Relaxed) >= cap
                {
                    truncated.store(true, Ordering::Relaxed);
                    return Vec::new();
                }
                let policy = suppression::compile(&file.source);
                let mut buf = Vec::new();
                for configured in &request.rules {
                    if let Some(cap) = cap
                        && counter.load(Ordering::Relaxed) >= cap
                    {
                        truncated.store(true, Ordering::Relaxed);
                        break;
                    }
                    for violation in run_rule_with_barrier(configured, file, request.context) {
                        if let Some(v) = finalize_violation(violation, configured.rule.id(), &policy) {
                            if cap.is_some() {
                                counter.fetch_add(1, Ordering::Relaxed);
                            }
                            buf.push(v);
                        }
                    }
                }
                buf
            })
            .collect()
    });

    (per_file.into_iter().flatten().collect(), truncated.load(Ordering::Relaxed))
}

#[cfg(not(feature = "parallel"))]
fn run_parallel(request: &RunRequest<'_>, cap: Option<usize>, _width: usize) -> (Vec<Violation>, bool) {
    run_sequential(request, cap)
}

fn run_rule_with_barrier(
    configured: &ConfiguredRule<'_>,
    file: &UnifiedFileModel,
    context: &ProjectContext,
) -> Vec<Violation> {
    let rule = configured.rule;
    let config = &configured.config;
    let result =
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| rule.check(file, context, config)));
    match result {
        Ok(violations) => violations,
        Err(payload) => {
            let cause = panic_cause(&payload);
            log::error!("rule {} panicked on {}: {cause}", rule.id(), file.path);
            vec![Violation::new(
                rule.id(),
                Severity::Error,
                format!("Rule panicked: {cause}"),
                file.path.clone(),
                1,
            )]
        }
    }
}

fn panic_cause(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Fills a blank rule ID, clamps a non-positive start line, and drops the
/// violation if suppressed (spec §4.1 "Evaluation protocol").
fn finalize_violation(mut v: Violation, rule_id: &str, policy: &SuppressionPolicy) -> Option<Violation> {
    if v.rule_id.is_empty() {
        v.rule_id = rule_id.to_string();
    }
    if v.start_line == 0 {
        v.start_line = 1;
    }
    if v.end_line < v.start_line {
        v.end_line = v.start_line;
    }
    if policy.suppressed(&v.rule_id, v.start_line) {
        return None;
    }
    Some(v)
}
