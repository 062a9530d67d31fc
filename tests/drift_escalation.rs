//! Drift classification and escalation resolution fed by artifacts loaded
//! from JSON (as a host CLI or CI job would receive them), rather than
//! built from Rust struct literals the way the inline unit tests do.

use pretty_assertions::assert_eq;

use stricture_core::drift::{classify, should_fail_at_threshold, ChangeType, DriftSeverity};
use stricture_core::escalation;
use stricture_core::lineage::Artifact;
use stricture_core::system_registry::SystemRegistry;

fn artifact(annotations_json: &str) -> Artifact {
    let json = format!(r#"{{"schema_version": "1", "annotations": [{annotations_json}], "overrides": []}}"#);
    Artifact::load(&json).unwrap()
}

const USER_ID_BASE: &str = r##"{
    "field_id": "user_id",
    "field": "user.id",
    "source_system": "accounts",
    "source_version": "1.0.0",
    "min_supported_source_version": "1.0.0",
    "transform_type": "passthrough",
    "merge_strategy": "single_source",
    "break_policy": "strict",
    "confidence": "declared",
    "data_classification": "internal",
    "owner": "team.accounts",
    "escalation": {"kind": "slack", "value": "#accounts-oncall"},
    "contract_test_id": "ci://contracts/accounts/user_id",
    "introduced_at": "2024-01-01",
    "sources": [{
        "kind": "api",
        "target": "accounts.GetUser",
        "path": "response.id",
        "scope": "internal",
        "contract_ref": "accounts@1.0.0",
        "raw": "api:accounts.GetUser#response.id?contract_ref=accounts@1.0.0"
    }],
    "flow": "from @accounts mapped @self",
    "note": "n",
    "file_path": "a.go",
    "line": 1
}"##;

#[test]
fn tightening_and_source_system_change_are_classified_together() {
    let base = artifact(USER_ID_BASE);
    let head_json = USER_ID_BASE
        .replace("\"data_classification\": \"internal\"", "\"data_classification\": \"regulated\"")
        .replace("\"source_system\": \"accounts\"", "\"source_system\": \"accounts-v2\"");
    let head = artifact(&head_json);

    let result = classify(&base, &head);
    let change_types: Vec<_> = result.changes.iter().map(|c| c.change_type).collect();
    assert!(change_types.contains(&ChangeType::ClassificationTightened));
    assert!(change_types.contains(&ChangeType::SourceSystemChanged));
    assert_eq!(result.high_count, 1);
    assert!(should_fail_at_threshold(&result, Some(DriftSeverity::High)));
    assert!(should_fail_at_threshold(&result, Some(DriftSeverity::Info)));
}

#[test]
fn escalation_falls_back_through_registry_then_to_field_owner() {
    let yaml = r##"
systems:
  - id: accounts
    name: Accounts Service
    owner_team: team.accounts
    runbook_url: https://runbooks/accounts
    doc_root: https://docs/accounts
    escalation:
      - role: primary
        name: Accounts Oncall
        channel: "#accounts-oncall"
"##;
    let registry = SystemRegistry::load(yaml).unwrap();
    let artifact = artifact(USER_ID_BASE);

    let steps = escalation::resolve("accounts", &artifact, &registry, 2);
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].display_name, "Accounts Service");
    assert_eq!(steps[0].contacts[0].name, "Accounts Oncall");

    // A system absent from the registry still resolves, via the field's
    // own owner/escalation as a fallback (spec §4.7 step 5 note).
    let empty_registry = SystemRegistry::default();
    let fallback_steps = escalation::resolve("accounts", &artifact, &empty_registry, 2);
    assert_eq!(fallback_steps.len(), 1);
    assert_eq!(fallback_steps[0].display_name, "accounts");
    assert_eq!(fallback_steps[0].owner_team, "team.accounts");
}
