//! End-to-end lineage pipeline: scan a small on-disk tree, build an
//! artifact, export it under every profile, and load it back, alias keys
//! and all (spec §8, scenario-adjacent to S4-S7 which exercise `classify`
//! and `resolve` directly against in-memory artifacts).

use pretty_assertions::assert_eq;

use stricture_core::error::IoError;
use stricture_core::lineage::artifact::{collect, serialize, ExportProfile};
use stricture_core::lineage::Artifact;

fn write(dir: &std::path::Path, rel: &str, contents: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

#[test]
fn scan_export_and_reload_round_trips_across_every_profile() {
    let dir = tempfile::tempdir().unwrap();
    write(
        &dir.path(),
        "svc/handler.go",
        "// stricture-source field_id=user_id source=api:accounts.GetUser#response.id?contract_ref=accounts@1.0.0 source_system=accounts source_version=1.0.0\n",
    );
    write(
        &dir.path(),
        "svc/other.go",
        "// stricture-source field_id=order_total source=db:billing.orders#total?contract_ref=billing@2,api:billing.GetOrder#total?contract_ref=billing@2 source_system=billing source_version=2.0.0 data_classification=sensitive\n",
    );
    // .git is on the skip list; a recognized extension inside it must never surface.
    write(
        &dir.path(),
        ".git/hooks/fake.go",
        "// stricture-source field_id=should_not_appear source=api:a.B#p?contract_ref=x source_system=s source_version=1\n",
    );

    let (artifact, errors) = collect(dir.path()).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(artifact.annotations.len(), 2);
    assert_eq!(artifact.annotations[0].field_id, "order_total");
    assert_eq!(artifact.annotations[0].sources.len(), 2);
    assert_eq!(artifact.annotations[1].field_id, "user_id");

    for profile in
        [ExportProfile::Stricture, ExportProfile::Otel, ExportProfile::OpenLineage, ExportProfile::OpenApi, ExportProfile::AsyncApi]
    {
        let json = serialize(&artifact, profile).unwrap();
        let reloaded = Artifact::load(&json).unwrap();
        assert_eq!(reloaded.annotations.len(), artifact.annotations.len());
        assert_eq!(reloaded.annotations[0].field_id, artifact.annotations[0].field_id);
        assert_eq!(reloaded.annotations[0].sources, artifact.annotations[0].sources);
    }
}

#[test]
fn an_unreadable_file_aborts_the_whole_scan() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path(), "a.go", "// stricture-source field_id=x source=api:a.B#p?contract_ref=c source_system=s source_version=1\n");
    // A symlink with a recognized extension but no target: collected by the
    // walk, but fails to read.
    std::os::unix::fs::symlink(dir.path().join("missing-target"), dir.path().join("b.go")).unwrap();

    let err = collect(dir.path()).unwrap_err();
    assert!(matches!(err, IoError::Read { path, .. } if path.ends_with("b.go")));
}

#[test]
fn externally_authored_json_with_mixed_alias_keys_loads_cleanly() {
    let json = r#"{
        "annotations": [{
            "schema_version": "1",
            "field_id": "checkout_total",
            "json_path": "checkout.total",
            "service.name": "billing",
            "source_version": "3.1.0",
            "min_supported_source_version": "3.0.0",
            "transform_type": "aggregation",
            "merge_strategy": "priority",
            "break_policy": "strict",
            "confidence": "inferred",
            "data_classification": "sensitive",
            "owner": "team.billing",
            "escalation": {"kind": "pagerduty", "value": "billing-oncall"},
            "contract_test_id": "ci://contracts/billing/checkout_total",
            "introduced_at": "2025-06-01",
            "sources": [{
                "kind": "api",
                "target": "billing.GetCheckout",
                "path": "response.total",
                "scope": "external",
                "as_of": "2025-06-01",
                "external_provider": "stripe",
                "contract_uri": "stripe@2025-06-01",
                "raw": "api:billing.GetCheckout#response.total@external!2025-06-01?provider_id=stripe&contract_ref=stripe@2025-06-01"
            }],
            "flow": "from @billing mapped @self",
            "note": "n",
            "file_path": "billing/checkout.go",
            "line": 10
        }],
        "overrides": []
    }"#;

    let artifact = Artifact::load(json).unwrap();
    assert_eq!(artifact.annotations[0].field, "checkout.total");
    assert_eq!(artifact.annotations[0].source_system, "billing");
    assert_eq!(artifact.annotations[0].sources[0].provider_id.as_deref(), Some("stripe"));
    assert_eq!(artifact.annotations[0].sources[0].contract_ref, "stripe@2025-06-01");
}
