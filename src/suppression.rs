//! Suppression Compiler (spec §4.2).
//!
//! Compiles the inline `stricture-disable*` directives embedded in any of
//! the comment syntaxes of spec §4.5.1 into a predicate
//! `suppressed(rule_id, line) -> bool`. Line-oriented and regex-backed,
//! mirroring the teacher's `utils/regex_cache.rs` style of caching a small
//! set of `LazyLock` statics rather than recompiling per call.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

/// Token that suppresses all rules at a given scope (spec §4.2).
const WILDCARD: &str = "*";

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?://|#|/\*|\*)\s*stricture-(disable-next-line|disable-file|disable|enable)\b\s+(\S+)")
        .expect("static suppression directive regex is valid")
});

#[derive(Debug, Clone)]
struct SuppressionRange {
    start: usize,
    /// `None` means the matching `stricture-enable` was never found; the
    /// range stays active through end of file (spec §4.2 tolerance of
    /// unbalanced enables).
    end: Option<usize>,
    rule_id: String,
}

impl SuppressionRange {
    fn covers(&self, line: usize) -> bool {
        line >= self.start && self.end.is_none_or(|end| line <= end)
    }

    fn matches(&self, rule_id: &str) -> bool {
        self.rule_id == WILDCARD || self.rule_id == rule_id
    }
}

/// A compiled, per-file suppression predicate.
#[derive(Debug, Clone, Default)]
pub struct SuppressionPolicy {
    file_wide: HashSet<String>,
    next_line: HashMap<usize, HashSet<String>>,
    ranges: Vec<SuppressionRange>,
}

impl SuppressionPolicy {
    /// Whether `rule_id` is suppressed at `line` (1-indexed), per the three
    /// directive scopes of spec §4.2.
    pub fn suppressed(&self, rule_id: &str, line: usize) -> bool {
        if self.file_wide.contains(rule_id) || self.file_wide.contains(WILDCARD) {
            return true;
        }
        if let Some(ids) = self.next_line.get(&line)
            && (ids.contains(rule_id) || ids.contains(WILDCARD))
        {
            return true;
        }
        self.ranges
            .iter()
            .any(|range| range.covers(line) && range.matches(rule_id))
    }
}

/// Compiles the suppression policy for one file from its raw source bytes.
pub fn compile(source: &[u8]) -> SuppressionPolicy {
    let text = String::from_utf8_lossy(source);
    let mut policy = SuppressionPolicy::default();
    // Tracks disables not yet closed by a matching enable, keyed by rule id
    // (or "*"); flushed to `ranges` with `end: None` at end of file.
    let mut open: HashMap<String, usize> = HashMap::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let Some(caps) = DIRECTIVE_RE.captures(line) else {
            continue;
        };
        let directive = &caps[1];
        let rule_id = caps[2].trim().to_string();

        match directive {
            "disable-next-line" => {
                policy.next_line.entry(line_no + 1).or_default().insert(rule_id);
            }
            "disable-file" => {
                policy.file_wide.insert(rule_id);
            }
            "disable" => {
                open.entry(rule_id).or_insert(line_no);
            }
            "enable" => {
                if let Some(start) = open.remove(&rule_id) {
                    policy.ranges.push(SuppressionRange {
                        start,
                        end: Some(line_no),
                        rule_id,
                    });
                } else if rule_id == WILDCARD {
                    // A bare "enable *" with nothing open is a no-op; there
                    // is nothing to close.
                }
            }
            _ => unreachable!("regex only captures known directive names"),
        }
    }

    for (rule_id, start) in open {
        policy.ranges.push(SuppressionRange {
            start,
            end: None,
            rule_id,
        });
    }

    policy
}
