//! Drift Classifier (spec §3.11, §4.6): diffs two lineage artifacts and
//! enforces pass/fail thresholds.

pub mod classifier;
pub mod types;

pub use classifier::{classify, should_fail_at_threshold, should_fail_at_threshold_with_mode};
pub use types::{Change, ChangeType, DriftResult, DriftSeverity};
