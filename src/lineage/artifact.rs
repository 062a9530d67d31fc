//! Lineage Artifact Builder (spec §4.4) and export-profile serialization
//! (spec §4.5.3).
//!
//! The tree walk is a plain recursive `std::fs::read_dir` — the teacher's
//! git-aware `ignore`/`globset` walkers solve a broader problem (respecting
//! `.gitignore`, glob-based per-file rule scoping) that this scan does not
//! need; spec §4.4 calls for a fixed three-directory skip-list and a fixed
//! extension allowlist, nothing path-pattern-based.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::aliases::{self, FIELD_ALIASES, SOURCE_ALIASES};
use super::annotation::{
    BreakPolicy, Confidence, DataClassification, LineageAnnotation, MergeStrategy, Override, Scope, SourceKind,
    TransformType,
};
use super::parser::{self, ParseError};
use crate::error::{DeserializeError, IoError};
use crate::ufm::canonicalize_path;

const SKIP_DIRS: &[&str] = &[".git", "node_modules", "bin"];
const RECOGNIZED_EXTENSIONS: &[&str] = &["go", "ts", "tsx", "js", "jsx", "py", "java", "kt"];

/// Export profile tag (spec §4.5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportProfile {
    Stricture,
    Otel,
    OpenLineage,
    OpenApi,
    AsyncApi,
}

impl ExportProfile {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stricture" => Some(Self::Stricture),
            "otel" => Some(Self::Otel),
            "openlineage" => Some(Self::OpenLineage),
            "openapi" => Some(Self::OpenApi),
            "asyncapi" => Some(Self::AsyncApi),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Stricture => "stricture",
            Self::Otel => "otel",
            Self::OpenLineage => "openlineage",
            Self::OpenApi => "openapi",
            Self::AsyncApi => "asyncapi",
        }
    }

    fn alias_keys(self) -> &'static [(&'static str, &'static str)] {
        aliases::export_alias_keys(self.tag())
    }
}

/// Deterministic collection of annotations and overrides for a repository
/// (spec §3.9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub annotations: Vec<LineageAnnotation>,
    pub overrides: Vec<Override>,
}

fn default_schema_version() -> String {
    "1".to_string()
}

/// JSON-value label for an alias-conflict error message: the raw string for
/// string values, the compact JSON rendering otherwise.
fn value_label(value: &serde_json::Value) -> String {
    value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string())
}

/// Resolves alias keys against a canonical table in place on a JSON object
/// (spec §4.5.2): an alias key is renamed to its canonical key unless the
/// canonical key is already present with a *different* value, which is an
/// [`DeserializeError::AliasConflict`].
fn resolve_aliases_in_place(
    value: &mut serde_json::Value,
    table: &phf::Map<&'static str, &'static str>,
) -> Result<(), DeserializeError> {
    let Some(obj) = value.as_object_mut() else { return Ok(()) };
    let alias_keys: Vec<String> =
        obj.keys().filter(|k| table.contains_key(k.as_str())).cloned().collect();
    for key in alias_keys {
        let canonical = table.get(key.as_str()).copied().expect("key was just filtered by contains_key");
        let alias_value = obj.remove(&key).expect("key observed present above");
        match obj.get(canonical) {
            Some(existing) if existing != &alias_value => {
                return Err(DeserializeError::AliasConflict {
                    key: canonical.to_string(),
                    canonical: value_label(existing),
                    alias_key: key,
                    alias_value: value_label(&alias_value),
                });
            }
            Some(_) => {}
            None => {
                obj.insert(canonical.to_string(), alias_value);
            }
        }
    }
    Ok(())
}

/// Fails with [`DeserializeError::InvalidEnum`] if `field` is present as a
/// string on `obj` but `parse` rejects it, delegating to each enum's own
/// `parse` so the accepted tokens never drift from [`super::annotation`].
fn check_enum<T>(
    obj: &serde_json::Map<String, serde_json::Value>,
    field: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<(), DeserializeError> {
    if let Some(v) = obj.get(field).and_then(|v| v.as_str())
        && parse(v).is_none()
    {
        return Err(DeserializeError::InvalidEnum { field: field.to_string(), value: v.to_string() });
    }
    Ok(())
}

const EXPORT_PROFILE_TOKENS: &[&str] = &["stricture", "otel", "openlineage", "openapi", "asyncapi"];

impl Artifact {
    /// Deserializes an artifact JSON document (spec §4.5.2): alias keys
    /// written by external ecosystems (e.g. `service_name` for
    /// `source_system`, `schema_ref` for `contract_ref`) are resolved to
    /// their canonical field names first, failing on a genuine conflict
    /// between a canonical value and a disagreeing alias. Malformed JSON and
    /// invalid enum tokens are reported as typed errors rather than a bare
    /// `serde_json::Error` (spec §7 "Deserialization error").
    pub fn load(json: &str) -> Result<Self, DeserializeError> {
        let mut value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| DeserializeError::MalformedJson(e.to_string()))?;

        if let Some(export_profile) = value.get("export_profile").and_then(|v| v.as_str())
            && !EXPORT_PROFILE_TOKENS.contains(&export_profile)
        {
            return Err(DeserializeError::UnknownProfile(export_profile.to_string()));
        }

        if let Some(annotations) = value.get_mut("annotations").and_then(|v| v.as_array_mut()) {
            for annotation in annotations.iter_mut() {
                resolve_aliases_in_place(annotation, &FIELD_ALIASES)?;
                if let Some(obj) = annotation.as_object() {
                    check_enum(obj, "transform_type", TransformType::parse)?;
                    check_enum(obj, "merge_strategy", MergeStrategy::parse)?;
                    check_enum(obj, "break_policy", BreakPolicy::parse)?;
                    check_enum(obj, "confidence", Confidence::parse)?;
                    check_enum(obj, "data_classification", DataClassification::parse)?;
                }
                if let Some(sources) = annotation.get_mut("sources").and_then(|v| v.as_array_mut()) {
                    for source in sources.iter_mut() {
                        resolve_aliases_in_place(source, &SOURCE_ALIASES)?;
                        if let Some(obj) = source.as_object() {
                            check_enum(obj, "kind", SourceKind::parse)?;
                            check_enum(obj, "scope", Scope::parse)?;
                        }
                    }
                }
            }
        }

        serde_json::from_value(value).map_err(|e| DeserializeError::MalformedJson(e.to_string()))
    }
}

/// Scans `root`, parsing every recognized source file, and returns the
/// aggregated, sorted artifact alongside any parse errors encountered (spec
/// §4.4; parse errors never abort the scan). An unreadable file is an IO
/// error (spec §7 "cannot read a file"): surfaced to the caller, aborting
/// the scan, rather than silently skipped.
pub fn collect(root: &Path) -> Result<(Artifact, Vec<ParseError>), IoError> {
    let mut files = Vec::new();
    walk(root, &mut files);
    files.sort();

    let mut annotations = Vec::new();
    let mut overrides = Vec::new();
    let mut errors = Vec::new();

    for path in files {
        let bytes = std::fs::read(&path).map_err(|source| IoError::Read {
            path: path.to_string_lossy().into_owned(),
            source,
        })?;
        let canonical = canonicalize_path(&path.to_string_lossy());
        let (file_annotations, file_overrides, file_errors) = parser::parse(&canonical, &bytes);
        annotations.extend(file_annotations);
        overrides.extend(file_overrides);
        errors.extend(file_errors);
    }

    Ok((normalize(annotations, overrides), sort_errors(errors)))
}

fn walk(dir: &Path, out: &mut Vec<std::path::PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if path.is_dir() {
            if SKIP_DIRS.contains(&name.as_ref()) {
                continue;
            }
            walk(&path, out);
        } else if let Some(ext) = path.extension().and_then(|e| e.to_str())
            && RECOGNIZED_EXTENSIONS.contains(&ext)
        {
            out.push(path);
        }
    }
}

/// Applies the deterministic sort order of spec §4.4 to an aggregated set of
/// annotations and overrides, and sorts each annotation's sources by
/// identity tuple.
pub fn normalize(mut annotations: Vec<LineageAnnotation>, mut overrides: Vec<Override>) -> Artifact {
    for annotation in &mut annotations {
        annotation.sources.sort_by(|a, b| {
            let a_id = a.identity();
            let b_id = b.identity();
            (a_id.0.to_string(), a_id.1, a_id.2, a_id.3.to_string()).cmp(&(
                b_id.0.to_string(),
                b_id.1,
                b_id.2,
                b_id.3.to_string(),
            ))
        });
    }
    annotations.sort_by(|a, b| (&a.field_id, &a.file_path, a.line).cmp(&(&b.field_id, &b.file_path, b.line)));
    overrides.sort_by(|a, b| {
        (&a.field_id, &a.change_type, a.expires, &a.file_path, a.line).cmp(&(
            &b.field_id,
            &b.change_type,
            b.expires,
            &b.file_path,
            b.line,
        ))
    });
    Artifact { schema_version: default_schema_version(), annotations, overrides }
}

fn sort_errors(mut errors: Vec<ParseError>) -> Vec<ParseError> {
    errors.sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
    errors
}

/// Serializes an artifact under the given export profile (spec §4.5.3).
/// Non-canonical profiles inject an `export_profile` field and mirror
/// canonical top-level keys under the profile's alias names; canonical
/// fields are never removed.
pub fn serialize(artifact: &Artifact, profile: ExportProfile) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(artifact)?;
    if profile != ExportProfile::Stricture {
        let obj = value.as_object_mut().expect("artifact serializes to a JSON object");
        obj.insert("export_profile".to_string(), serde_json::Value::String(profile.tag().to_string()));
        if let Some(serde_json::Value::Array(annotations)) = obj.get_mut("annotations") {
            for annotation in annotations {
                if let Some(annotation_obj) = annotation.as_object_mut() {
                    for (canonical, alias) in profile.alias_keys() {
                        if let Some(v) = annotation_obj.get(*canonical).cloned() {
                            annotation_obj.insert((*alias).to_string(), v);
                        }
                    }
                }
            }
        }
    }
    serde_json::to_string_pretty(&value)
}
