//! Alias resolution for artifacts written by external ecosystems (spec
//! §4.5.2). Grounded on the teacher's `markdownlint_config.rs` pattern of a
//! static lookup table translating one ecosystem's vocabulary into the
//! crate's own — here a `phf::Map` compile-time table instead of a runtime
//! `HashMap`, since the alias set is fixed at build time (spec §9 "Drift
//! tables as data" applies equally well to this table).

use indexmap::IndexMap;
use phf::phf_map;

/// Annotation-level field aliases.
pub static FIELD_ALIASES: phf::Map<&'static str, &'static str> = phf_map! {
    "field_path" => "field",
    "json_path" => "field",
    "property_path" => "field",
    "openapi_field_path" => "field",
    "asyncapi_field_path" => "field",
    "service_name" => "source_system",
    "service.name" => "source_system",
    "openlineage_job_name" => "source_system",
    "service_version" => "source_version",
    "service.version" => "source_version",
    "spec_version" => "source_version",
    "openlineage_job_version" => "source_version",
    "min_source_version" => "min_supported_source_version",
    "min_supported_version" => "min_supported_source_version",
    "owner_team" => "owner",
    "owner.team" => "owner",
    "contract_test" => "contract_test_id",
    "test_id" => "contract_test_id",
};

/// Source-ref-level field aliases.
pub static SOURCE_ALIASES: phf::Map<&'static str, &'static str> = phf_map! {
    "schema_ref" => "contract_ref",
    "spec_ref" => "contract_ref",
    "contract_uri" => "contract_ref",
    "schema_url" => "contract_ref",
    "provider" => "provider_id",
    "external_provider" => "provider_id",
    "upstream_service" => "upstream_system",
    "upstream_source_system" => "upstream_system",
    "asof" => "as_of",
    "snapshot_as_of" => "as_of",
};

/// Export-profile alias keys injected alongside canonical fields (spec
/// §4.5.3). Each profile lists the `(canonical, alias)` pairs it mirrors.
pub fn export_alias_keys(profile: &str) -> &'static [(&'static str, &'static str)] {
    match profile {
        "otel" => &[("source_system", "service.name"), ("source_version", "service.version")],
        "openlineage" => &[
            ("source_system", "openlineage_job_name"),
            ("source_version", "openlineage_job_version"),
        ],
        "openapi" => &[("field", "openapi_field_path")],
        "asyncapi" => &[("field", "asyncapi_field_path")],
        _ => &[],
    }
}

/// Canonicalized field values with a record of which alias keys (if any)
/// contributed, for a record's `mapped_from` list (spec §4.5.2).
pub struct Resolved {
    pub values: IndexMap<String, String>,
    pub mapped_from: Vec<String>,
}

/// Resolves a flat `key -> value` map against an alias table, failing if a
/// canonical key and an alias that maps to it disagree after trimming (spec
/// §4.5.2 "always fail on conflicting values").
pub fn resolve(map: &phf::Map<&'static str, &'static str>, raw: &IndexMap<String, String>) -> Result<Resolved, String> {
    let mut values: IndexMap<String, String> = IndexMap::new();
    let mut origin: IndexMap<String, String> = IndexMap::new();
    let mut mapped_from = Vec::new();

    for (key, value) in raw {
        let canonical = map.get(key.as_str()).copied().unwrap_or(key.as_str());
        let trimmed = value.trim().to_string();
        if canonical != key {
            mapped_from.push(key.clone());
        }
        if let Some(existing) = values.get(canonical) {
            if existing != &trimmed {
                let alias_key = origin.get(canonical).cloned().unwrap_or_else(|| key.clone());
                return Err(format!(
                    "conflicting values for '{canonical}': canonical has '{existing}', '{alias_key}' has '{trimmed}'"
                ));
            }
        } else {
            values.insert(canonical.to_string(), trimmed);
            origin.insert(canonical.to_string(), key.clone());
        }
    }

    Ok(Resolved { values, mapped_from })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_resolves_to_canonical_key() {
        let mut raw = IndexMap::new();
        raw.insert("service_name".to_string(), "accounts".to_string());
        let resolved = resolve(&FIELD_ALIASES, &raw).unwrap();
        assert_eq!(resolved.values.get("source_system").unwrap(), "accounts");
        assert_eq!(resolved.mapped_from, vec!["service_name".to_string()]);
    }

    #[test]
    fn agreeing_canonical_and_alias_do_not_conflict() {
        let mut raw = IndexMap::new();
        raw.insert("source_system".to_string(), "accounts".to_string());
        raw.insert("service_name".to_string(), " accounts ".to_string());
        let resolved = resolve(&FIELD_ALIASES, &raw).unwrap();
        assert_eq!(resolved.values.get("source_system").unwrap(), "accounts");
    }

    #[test]
    fn disagreeing_canonical_and_alias_conflict() {
        let mut raw = IndexMap::new();
        raw.insert("source_system".to_string(), "accounts".to_string());
        raw.insert("service_name".to_string(), "billing".to_string());
        assert!(resolve(&FIELD_ALIASES, &raw).is_err());
    }
}
