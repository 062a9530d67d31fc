//! Lineage Annotation Parser (spec §4.3).
//!
//! Grounded on the teacher's line-oriented, regex-backed inline-directive
//! style seen in [`crate::suppression`] (itself grounded on the teacher's
//! `utils/regex_cache.rs` approach): scan physical lines for a comment
//! marker, recognize a directive keyword, then tokenize the remainder as
//! `key=value` pairs; a `source` value itself may list several refs
//! separated by `,` (spec §6 "Reserved delimiters"), each parsed
//! independently. Validation failures never abort the scan — they
//! become a [`ParseError`] and parsing continues (spec §4.3 "parsing
//! continues").

use chrono::NaiveDate;
use indexmap::IndexMap;

use super::aliases::{self, FIELD_ALIASES, SOURCE_ALIASES};
use super::annotation::{
    BreakPolicy, Confidence, DataClassification, EscalationRef, LineageAnnotation, MergeStrategy, Override,
    Scope, SourceKind, SourceRef, TransformType,
};

/// One parse-time failure (SPEC_FULL.md supplement; spec §4.3 "Output").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub file: String,
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.message)
    }
}

enum Directive<'a> {
    Annotation(&'a str),
    Override(&'a str),
}

fn strip_comment_marker(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix("//") {
        return Some(rest.trim());
    }
    if let Some(rest) = trimmed.strip_prefix('#') {
        return Some(rest.trim());
    }
    if let Some(rest) = trimmed.strip_prefix("/*") {
        return Some(rest.trim_end_matches("*/").trim());
    }
    if trimmed.starts_with('*') && !trimmed.starts_with("*/") {
        return Some(trimmed[1..].trim());
    }
    None
}

/// Strips `prefix` from `payload`, but only when it is followed by
/// whitespace or the end of the string — otherwise a comment like
/// `stricture-sourced-by-hand` would be mistaken for the `stricture-source`
/// directive (mirrors [`crate::suppression`]'s `\b` boundary).
fn strip_keyword<'a>(payload: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = payload.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

fn classify(payload: &str) -> Option<Directive<'_>> {
    const ANNOTATION_PREFIXES: [&str; 2] = ["stricture-source", "stricture:source"];
    const OVERRIDE_PREFIXES: [&str; 2] = ["stricture-lineage-override", "stricture:lineage-override"];
    for prefix in ANNOTATION_PREFIXES {
        if let Some(rest) = strip_keyword(payload, prefix) {
            return Some(Directive::Annotation(rest.trim()));
        }
    }
    for prefix in OVERRIDE_PREFIXES {
        if let Some(rest) = strip_keyword(payload, prefix) {
            return Some(Directive::Override(rest.trim()));
        }
    }
    None
}

/// Tokenizes a `key=value key2="quoted value" ...` payload. Values may be
/// unquoted tokens or single/double-quoted strings with backslash escapes
/// (spec §4.3 "Payload tokenization"). Tokens without a visible `=` are
/// skipped rather than treated as fatal.
fn tokenize(payload: &str) -> IndexMap<String, String> {
    let chars: Vec<char> = payload.chars().collect();
    let mut out = IndexMap::new();
    let mut i = 0;
    while i < chars.len() {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }
        let key_start = i;
        while i < chars.len() && chars[i] != '=' && !chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() || chars[i] != '=' {
            while i < chars.len() && !chars[i].is_whitespace() {
                i += 1;
            }
            continue;
        }
        let key: String = chars[key_start..i].iter().collect();
        i += 1;
        let mut value = String::new();
        if i < chars.len() && (chars[i] == '"' || chars[i] == '\'') {
            let quote = chars[i];
            i += 1;
            while i < chars.len() && chars[i] != quote {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    i += 1;
                }
                value.push(chars[i]);
                i += 1;
            }
            i += 1;
        } else {
            while i < chars.len() && !chars[i].is_whitespace() {
                value.push(chars[i]);
                i += 1;
            }
        }
        out.insert(key, value);
    }
    out
}

/// Splits a `source=` payload value on `,`, the spec §6 reserved delimiter
/// between source-ref list elements, then parses each element (spec §3.7).
fn parse_source_list(raw: &str) -> Result<Vec<SourceRef>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_source_ref)
        .collect()
}

/// Parses a `kind:target#path[@scope[!as_of]][?query]` source ref (spec
/// §3.7). Percent-decodes and alias-resolves the query string.
fn parse_source_ref(raw: &str) -> Result<SourceRef, String> {
    let (head, query) = raw.split_once('?').unwrap_or((raw, ""));
    let (kind_str, rest) = head.split_once(':').ok_or("source ref is missing 'kind:'")?;
    let kind = SourceKind::parse(kind_str)
        .ok_or_else(|| format!("source ref has unknown kind '{kind_str}'"))?;
    let (target, path_and_scope) = rest.split_once('#').ok_or("source ref is missing '#path'")?;
    if target.is_empty() {
        return Err("source ref has an empty target".to_string());
    }

    let (path, scope_and_asof) = match path_and_scope.split_once('@') {
        Some((p, s)) => (p, Some(s)),
        None => (path_and_scope, None),
    };

    let (scope, structural_as_of) = match scope_and_asof {
        None => (Scope::Internal, None),
        Some(s) => match s.split_once('!') {
            Some((scope_str, as_of_str)) => {
                let scope = Scope::parse(scope_str).ok_or_else(|| format!("source ref has unknown scope '{scope_str}'"))?;
                let as_of = NaiveDate::parse_from_str(as_of_str, "%Y-%m-%d")
                    .map_err(|_| format!("source ref has invalid as_of date '{as_of_str}'"))?;
                (scope, Some(as_of))
            }
            None => (
                Scope::parse(s).ok_or_else(|| format!("source ref has unknown scope '{s}'"))?,
                None,
            ),
        },
    };

    let mut raw_query: IndexMap<String, String> = IndexMap::new();
    for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
        raw_query.insert(k.into_owned(), v.into_owned());
    }
    let resolved = aliases::resolve(&SOURCE_ALIASES, &raw_query).map_err(|e| format!("source ref: {e}"))?;

    let contract_ref = resolved
        .values
        .get("contract_ref")
        .cloned()
        .ok_or("source ref query is missing required 'contract_ref'")?;
    let provider_id = resolved.values.get("provider_id").cloned();
    let upstream_system = resolved.values.get("upstream_system").cloned();

    let as_of = match structural_as_of {
        Some(d) => Some(d),
        None => resolved
            .values
            .get("as_of")
            .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .transpose()
            .map_err(|_| "source ref has an invalid as_of date in its query".to_string())?,
    };

    if scope == Scope::External && (as_of.is_none() || provider_id.is_none()) {
        return Err("scope=external requires both as_of and provider_id".to_string());
    }
    if scope != Scope::External && as_of.is_some() {
        return Err("as_of is only valid for scope=external".to_string());
    }

    Ok(SourceRef {
        kind,
        target: target.to_string(),
        path: path.to_string(),
        scope,
        as_of,
        contract_ref,
        provider_id,
        upstream_system,
        raw: raw.to_string(),
        mapped_from: resolved.mapped_from,
    })
}

fn normalize_for_default(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

struct Pending {
    fields: IndexMap<String, String>,
    sources: Vec<SourceRef>,
    mapped_from: Vec<String>,
    first_line: usize,
}

/// Parses one file's lineage annotations and overrides (spec §4.3).
pub fn parse(file_path: &str, source: &[u8]) -> (Vec<LineageAnnotation>, Vec<Override>, Vec<ParseError>) {
    let text = String::from_utf8_lossy(source);
    let mut pending: IndexMap<String, Pending> = IndexMap::new();
    let mut overrides = Vec::new();
    let mut errors = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let Some(payload) = strip_comment_marker(line) else { continue };
        let Some(directive) = classify(payload) else { continue };

        match directive {
            Directive::Annotation(rest) => {
                let raw_tokens = tokenize(rest);
                let Some(field_id) = raw_tokens.get("field_id").cloned() else {
                    errors.push(ParseError {
                        file: file_path.to_string(),
                        line: line_no,
                        message: "stricture-source annotation is missing field_id".to_string(),
                    });
                    continue;
                };
                let Some(source_raw) = raw_tokens.get("source").cloned() else {
                    errors.push(ParseError {
                        file: file_path.to_string(),
                        line: line_no,
                        message: "stricture-source annotation is missing source".to_string(),
                    });
                    continue;
                };
                let mut scalar = raw_tokens.clone();
                scalar.shift_remove("source");

                let resolved = match aliases::resolve(&FIELD_ALIASES, &scalar) {
                    Ok(r) => r,
                    Err(e) => {
                        errors.push(ParseError { file: file_path.to_string(), line: line_no, message: e });
                        continue;
                    }
                };

                let source_refs = match parse_source_list(&source_raw) {
                    Ok(s) => s,
                    Err(e) => {
                        errors.push(ParseError { file: file_path.to_string(), line: line_no, message: e });
                        continue;
                    }
                };

                let entry = pending.entry(field_id.clone()).or_insert_with(|| Pending {
                    fields: IndexMap::new(),
                    sources: Vec::new(),
                    mapped_from: Vec::new(),
                    first_line: line_no,
                });
                for (k, v) in resolved.values {
                    entry.fields.insert(k, v);
                }
                for m in resolved.mapped_from {
                    if !entry.mapped_from.contains(&m) {
                        entry.mapped_from.push(m);
                    }
                }
                entry.sources.extend(source_refs);
            }
            Directive::Override(rest) => {
                let tokens = tokenize(rest);
                let field_id = tokens.get("field_id").cloned();
                let change_type = tokens.get("change_type").cloned();
                let expires = tokens.get("expires").and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
                let reason = tokens.get("reason").cloned();
                match (field_id, change_type, expires, reason) {
                    (Some(field_id), Some(change_type), Some(expires), Some(reason)) => {
                        overrides.push(Override {
                            field_id,
                            change_type,
                            expires,
                            reason,
                            ticket: tokens.get("ticket").cloned(),
                            file_path: file_path.to_string(),
                            line: line_no,
                        });
                    }
                    _ => errors.push(ParseError {
                        file: file_path.to_string(),
                        line: line_no,
                        message: "stricture-lineage-override requires field_id, change_type, expires, reason"
                            .to_string(),
                    }),
                }
            }
        }
    }

    let mut annotations = Vec::new();
    for (field_id, pending_field) in pending {
        match build_annotation(file_path, &field_id, pending_field) {
            Ok(annotation) => {
                let validation_errors = annotation.validate();
                if validation_errors.is_empty() {
                    annotations.push(annotation);
                } else {
                    for message in validation_errors {
                        errors.push(ParseError { file: file_path.to_string(), line: annotation.line, message });
                    }
                }
            }
            Err((line, message)) => errors.push(ParseError { file: file_path.to_string(), line, message }),
        }
    }

    (annotations, overrides, errors)
}

fn build_annotation(
    file_path: &str,
    field_id: &str,
    pending: Pending,
) -> Result<LineageAnnotation, (usize, String)> {
    let line = pending.first_line;
    let get = |k: &str| pending.fields.get(k).cloned();
    let err = |m: &str| (line, m.to_string());

    let source_system = get("source_system").ok_or_else(|| err("missing required key source_system"))?;
    let source_version = get("source_version").ok_or_else(|| err("missing required key source_version"))?;
    let normalized_system = normalize_for_default(&source_system);

    let transform_type = match get("transform_type") {
        Some(s) => TransformType::parse(&s).ok_or_else(|| err("invalid transform_type"))?,
        None => TransformType::Passthrough,
    };
    let merge_strategy = match get("merge_strategy") {
        Some(s) => MergeStrategy::parse(&s).ok_or_else(|| err("invalid merge_strategy"))?,
        None if pending.sources.len() == 1 => MergeStrategy::SingleSource,
        None => MergeStrategy::Priority,
    };
    let break_policy = match get("break_policy") {
        Some(s) => BreakPolicy::parse(&s).ok_or_else(|| err("invalid break_policy"))?,
        None => BreakPolicy::Strict,
    };
    let confidence = match get("confidence") {
        Some(s) => Confidence::parse(&s).ok_or_else(|| err("invalid confidence"))?,
        None => Confidence::Declared,
    };
    let data_classification = match get("data_classification") {
        Some(s) => DataClassification::parse(&s).ok_or_else(|| err("invalid data_classification"))?,
        None => DataClassification::Internal,
    };
    let owner = get("owner").unwrap_or_else(|| format!("team.{normalized_system}"));
    let escalation = match get("escalation") {
        Some(s) => EscalationRef::parse(&s).ok_or_else(|| err("invalid escalation ref, expected kind:value"))?,
        None => EscalationRef { kind: "slack".to_string(), value: format!("#{normalized_system}-oncall") },
    };
    let contract_test_id =
        get("contract_test_id").unwrap_or_else(|| format!("ci://contracts/{normalized_system}/{field_id}"));
    let introduced_at = match get("introduced_at") {
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| err("invalid introduced_at date"))?,
        None => NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid constant date"),
    };
    let sunset_at = get("sunset_at")
        .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
        .transpose()
        .map_err(|_| err("invalid sunset_at date"))?;
    let min_supported_source_version = get("min_supported_source_version").unwrap_or_else(|| source_version.clone());
    let flow = get("flow").unwrap_or_else(|| format!("from @{source_system} mapped @self"));
    let note = get("note").unwrap_or_else(|| "defaulted_by=stricture".to_string());
    let field = get("field").unwrap_or_else(|| field_id.replace('_', "."));
    let renamed_from = get("renamed_from");
    let schema_version = get("schema_version").unwrap_or_else(|| "1".to_string());

    Ok(LineageAnnotation {
        schema_version,
        field_id: field_id.to_string(),
        renamed_from,
        field,
        source_system,
        source_version,
        min_supported_source_version,
        transform_type,
        merge_strategy,
        break_policy,
        confidence,
        data_classification,
        owner,
        escalation,
        contract_test_id,
        introduced_at,
        sunset_at,
        sources: pending.sources,
        flow,
        note,
        file_path: file_path.to_string(),
        line,
        mapped_from: pending.mapped_from,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_annotation_with_defaults() {
        let source = b"// stricture-source field_id=user_id source=api:accounts.GetUser#response.id?contract_ref=accounts@1.0.0 source_system=accounts source_version=1.0.0\n";
        let (annotations, overrides, errors) = parse("a.go", source);
        assert!(errors.is_empty(), "{errors:?}");
        assert!(overrides.is_empty());
        assert_eq!(annotations.len(), 1);
        let a = &annotations[0];
        assert_eq!(a.transform_type, TransformType::Passthrough);
        assert_eq!(a.merge_strategy, MergeStrategy::SingleSource);
        assert_eq!(a.owner, "team.accounts");
        assert_eq!(a.escalation.kind, "slack");
        assert_eq!(a.flow, "from @accounts mapped @self");
        assert_eq!(a.sources.len(), 1);
        assert_eq!(a.sources[0].contract_ref, "accounts@1.0.0");
    }

    #[test]
    fn multiple_lines_for_same_field_id_accumulate_sources() {
        let source = concat!(
            "// stricture-source field_id=user_id source=api:accounts.GetUser#response.id?contract_ref=a@1 source_system=accounts source_version=1.0.0\n",
            "// stricture-source field_id=user_id source=db:accounts.users#id?contract_ref=a@1 source_system=accounts source_version=1.0.0 merge_strategy=priority\n",
        );
        let (annotations, _, errors) = parse("a.go", source.as_bytes());
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(annotations[0].sources.len(), 2);
        assert_eq!(annotations[0].merge_strategy, MergeStrategy::Priority);
    }

    #[test]
    fn comma_separated_source_list_yields_multiple_source_refs() {
        let source = b"// stricture-source field_id=user_id source=api:accounts.GetUser#response.id?contract_ref=a@1,db:accounts.users#id?contract_ref=a@1 source_system=accounts source_version=1.0.0 merge_strategy=priority\n";
        let (annotations, _, errors) = parse("a.go", source);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].sources.len(), 2);
        assert_eq!(annotations[0].sources[0].contract_ref, "a@1");
        assert_eq!(annotations[0].sources[1].contract_ref, "a@1");
        assert_eq!(annotations[0].sources[1].kind, SourceKind::Db);
    }

    #[test]
    fn malformed_annotation_does_not_block_other_valid_ones() {
        let source = concat!(
            "// stricture-source field_id=ok_field source=api:a.B#p?contract_ref=a@1 source_system=a source_version=1\n",
            "// stricture-source missing_field_id source=api:a.B#p?contract_ref=a@1\n",
        );
        let (annotations, _, errors) = parse("a.go", source.as_bytes());
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].field_id, "ok_field");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn unrelated_comment_sharing_a_directive_prefix_is_ignored() {
        let source = b"// stricture-sourced-by-hand, see ticket JIRA-123\n";
        let (annotations, overrides, errors) = parse("a.go", source);
        assert!(annotations.is_empty());
        assert!(overrides.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn override_directive_is_parsed() {
        let source = b"# stricture-lineage-override field_id=user_id change_type=* expires=2099-12-31 reason=\"planned migration\"\n";
        let (_, overrides, errors) = parse("a.go", source);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].reason, "planned migration");
    }

    #[test]
    fn external_source_requires_as_of_and_provider_id() {
        let raw = "api:spotify.GetTrack#response.track@external?contract_ref=x";
        assert!(parse_source_ref(raw).is_err());
        let raw_ok = "api:spotify.GetTrack#response.track@external!2026-02-14?provider_id=spotify&contract_ref=x";
        assert!(parse_source_ref(raw_ok).is_ok());
    }

    #[test]
    fn source_alias_resolves_inside_query_string() {
        let raw = "api:spotify.GetTrack#response.track?schema_ref=x&provider=spotify";
        let parsed = parse_source_ref(raw).unwrap();
        assert_eq!(parsed.contract_ref, "x");
        assert_eq!(parsed.provider_id.as_deref(), Some("spotify"));
    }
}
