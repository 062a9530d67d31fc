//! End-to-end engine tests: registry -> selection -> scheduling ->
//! suppression -> sort -> severity filter, exercised together rather than
//! unit-by-unit (spec §8 scenarios S1-S3, plus the cap/category paths the
//! `engine` module's own inline tests don't reach).

use pretty_assertions::assert_eq;
use std::collections::HashMap;

use stricture_core::engine::{self, ConfiguredRule, RunRequest, Scheduler};
use stricture_core::registry::RuleRegistry;
use stricture_core::rule::{Rule, RuleConfig, Severity, Violation};
use stricture_core::ufm::{ProjectContext, UnifiedFileModel};

struct LineCounter {
    id: &'static str,
    category: &'static str,
    severity: Severity,
}

impl Rule for LineCounter {
    fn id(&self) -> &str {
        self.id
    }
    fn category(&self) -> &str {
        self.category
    }
    fn default_severity(&self) -> Severity {
        self.severity
    }
    fn description(&self) -> &str {
        "flags every non-empty line"
    }
    fn rationale(&self) -> &str {
        "test fixture exercising the full engine pipeline"
    }
    fn check(&self, file: &UnifiedFileModel, _ctx: &ProjectContext, _cfg: &RuleConfig) -> Vec<Violation> {
        file.content()
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(idx, _)| Violation::new(self.id, self.severity, "non-empty line", file.path.clone(), idx + 1))
            .collect()
    }
}

fn three_file_project() -> ProjectContext {
    let mut ctx = ProjectContext::new();
    ctx.insert(UnifiedFileModel::new("a.go", b"package a\nfunc A() {}\n".to_vec(), false));
    ctx.insert(UnifiedFileModel::new(
        "b.go",
        b"package b\n// stricture-disable-next-line RULE-style\nfunc B() {}\n".to_vec(),
        false,
    ));
    ctx.insert(UnifiedFileModel::new("c.py", b"def c():\n    pass\n".to_vec(), true));
    ctx
}

fn registry() -> RuleRegistry {
    let rules: Vec<Box<dyn Rule>> = vec![
        Box::new(LineCounter { id: "RULE-style", category: "style", severity: Severity::Warn }),
        Box::new(LineCounter { id: "RULE-security", category: "security", severity: Severity::Error }),
    ];
    RuleRegistry::from_rules(rules).unwrap()
}

fn select<'a>(reg: &'a RuleRegistry, category: Option<&str>) -> Vec<ConfiguredRule<'a>> {
    engine::select_rules(reg, None, None, category, &HashMap::new()).unwrap()
}

#[test]
fn category_filter_and_suppression_compose_under_either_scheduler() {
    let context = three_file_project();
    let reg = registry();
    let files = vec!["a.go", "b.go", "c.py"];

    for scheduler in [Scheduler::Sequential, Scheduler::Parallel { width: 3 }] {
        let outcome = engine::run(RunRequest {
            context: &context,
            files: files.clone(),
            rules: select(&reg, Some("style")),
            scheduler,
            max_violations: None,
            disable_cap_for_baseline: false,
            min_severity: None,
        })
        .unwrap();

        // b.go's line 3 ("func B() {}") is suppressed by the preceding
        // disable-next-line; every other non-empty line across the three
        // files is still reported by RULE-style alone (2 + 2 + 2).
        assert_eq!(outcome.violations.len(), 6);
        assert!(outcome.violations.iter().all(|v| v.rule_id == "RULE-style"));
        assert!(!outcome.violations.iter().any(|v| v.file_path == "b.go" && v.start_line == 3));
    }
}

#[test]
fn max_violations_cap_truncates_and_baseline_flag_disables_it() {
    let context = three_file_project();
    let reg = registry();
    let files = vec!["a.go", "b.go", "c.py"];

    let capped = engine::run(RunRequest {
        context: &context,
        files: files.clone(),
        rules: select(&reg, None),
        scheduler: Scheduler::Sequential,
        max_violations: Some(2),
        disable_cap_for_baseline: false,
        min_severity: None,
    })
    .unwrap();
    assert_eq!(capped.violations.len(), 2);
    assert!(capped.truncated);

    let uncapped = engine::run(RunRequest {
        context: &context,
        files,
        rules: select(&reg, None),
        scheduler: Scheduler::Sequential,
        max_violations: Some(2),
        disable_cap_for_baseline: true,
        min_severity: None,
    })
    .unwrap();
    assert!(!uncapped.truncated);
    assert!(uncapped.violations.len() > 2);
}

#[test]
fn min_severity_filter_applies_after_the_final_sort() {
    let context = three_file_project();
    let reg = registry();
    let files = vec!["a.go", "b.go", "c.py"];

    let outcome = engine::run(RunRequest {
        context: &context,
        files,
        rules: select(&reg, None),
        scheduler: Scheduler::Sequential,
        max_violations: None,
        disable_cap_for_baseline: false,
        min_severity: Some(Severity::Error),
    })
    .unwrap();

    assert!(outcome.violations.iter().all(|v| v.severity == Severity::Error));
    assert!(outcome.violations.windows(2).all(|w| w[0].file_path <= w[1].file_path));
}
