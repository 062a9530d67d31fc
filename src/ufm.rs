//! Unified File Model (spec §3.1) and Project Context (spec §3.2).
//!
//! Grounded on the teacher's `lint_context/mod.rs::LintContext`: a per-file
//! record that owns everything rules need and is treated as immutable once
//! built. Here the record is language-neutral rather than Markdown-specific,
//! and a project-wide map of these records forms the read-only universe
//! rules see during a run.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Detected source language of a file (spec §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    TypeScript,
    JavaScript,
    Python,
    Java,
    Rust,
    Unknown,
}

impl Language {
    /// Best-effort detection from a file extension. Adapters that know more
    /// than the extension (e.g. `.tsx` vs `.ts` semantics) may override this.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "go" => Language::Go,
            "ts" | "tsx" => Language::TypeScript,
            "js" | "jsx" => Language::JavaScript,
            "py" => Language::Python,
            "java" | "kt" => Language::Java,
            "rs" => Language::Rust,
            _ => Language::Unknown,
        }
    }
}

/// One declared import, in source-declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    pub path: String,
    pub line: usize,
}

/// One declared export, in source-declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInfo {
    pub name: String,
    pub line: usize,
}

/// One declared function/method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub line: usize,
    pub is_exported: bool,
}

/// One declared type/interface/struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub name: String,
    pub line: usize,
}

/// One declared class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    pub line: usize,
}

/// One declared test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseInfo {
    pub name: String,
    pub line: usize,
}

/// Language-neutral per-file record consumed by rules (spec §3.1).
///
/// Owned by the engine for the duration of a run and never mutated by a
/// rule; all collections preserve source-declaration order, which is an
/// explicit invariant rather than an implementation accident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedFileModel {
    /// Canonical forward-slash path (see [`canonicalize_path`]).
    pub path: String,
    pub language: Language,
    #[serde(with = "serde_bytes_as_string_lossy")]
    pub source: Vec<u8>,
    pub line_count: usize,
    pub is_test_file: bool,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,
    pub functions: Vec<FunctionInfo>,
    pub types: Vec<TypeInfo>,
    pub classes: Vec<ClassInfo>,
    pub test_cases: Vec<TestCaseInfo>,
}

/// (De)serializes raw source bytes as a UTF-8 (lossy) string so a
/// `UnifiedFileModel` round-trips through JSON without a base64 detour;
/// adapters only ever hand us text source files.
mod serde_bytes_as_string_lossy {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        Ok(s.into_bytes())
    }
}

/// Rewrites a possibly-Windows path into the canonical forward-slash form
/// used as the identity of a file throughout this crate (spec §3.1, §4.4).
pub fn canonicalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

impl UnifiedFileModel {
    /// Derives the [`Language`] from the path extension and counts lines,
    /// leaving the structural lists empty for a caller to populate via
    /// [`UfmBuilder`].
    pub fn new(path: impl Into<String>, source: Vec<u8>, is_test_file: bool) -> Self {
        let path = canonicalize_path(&path.into());
        let language = path
            .rsplit('.')
            .next()
            .filter(|ext| *ext != path)
            .map(Language::from_extension)
            .unwrap_or(Language::Unknown);
        let line_count = String::from_utf8_lossy(&source).lines().count();
        Self {
            path,
            language,
            source,
            line_count,
            is_test_file,
            imports: Vec::new(),
            exports: Vec::new(),
            functions: Vec::new(),
            types: Vec::new(),
            classes: Vec::new(),
            test_cases: Vec::new(),
        }
    }

    /// The file's source as a (possibly lossily-converted) UTF-8 string.
    pub fn content(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.source)
    }
}

/// Builder an external language adapter uses to populate the structural
/// lists of a [`UnifiedFileModel`] while preserving source-declaration order
/// (spec §3.1 "ordering is the source-declaration order").
#[derive(Debug, Default)]
pub struct UfmBuilder {
    model: Option<UnifiedFileModel>,
}

impl UfmBuilder {
    pub fn new(path: impl Into<String>, source: Vec<u8>, is_test_file: bool) -> Self {
        Self {
            model: Some(UnifiedFileModel::new(path, source, is_test_file)),
        }
    }

    fn model_mut(&mut self) -> &mut UnifiedFileModel {
        self.model.as_mut().expect("UfmBuilder used after build()")
    }

    pub fn with_import(mut self, path: impl Into<String>, line: usize) -> Self {
        self.model_mut().imports.push(ImportInfo { path: path.into(), line });
        self
    }

    pub fn with_export(mut self, name: impl Into<String>, line: usize) -> Self {
        self.model_mut().exports.push(ExportInfo { name: name.into(), line });
        self
    }

    pub fn with_function(mut self, name: impl Into<String>, line: usize, is_exported: bool) -> Self {
        self.model_mut().functions.push(FunctionInfo {
            name: name.into(),
            line,
            is_exported,
        });
        self
    }

    pub fn with_type(mut self, name: impl Into<String>, line: usize) -> Self {
        self.model_mut().types.push(TypeInfo { name: name.into(), line });
        self
    }

    pub fn with_class(mut self, name: impl Into<String>, line: usize) -> Self {
        self.model_mut().classes.push(ClassInfo { name: name.into(), line });
        self
    }

    pub fn with_test_case(mut self, name: impl Into<String>, line: usize) -> Self {
        self.model_mut().test_cases.push(TestCaseInfo { name: name.into(), line });
        self
    }

    pub fn build(mut self) -> UnifiedFileModel {
        self.model.take().expect("UfmBuilder used after build()")
    }
}

/// A mapping from canonical path to [`UnifiedFileModel`], exposing the full
/// analysis universe so rules can perform cross-file reasoning (spec §3.2).
/// Shared read-only across concurrent rule invocations; `IndexMap` keeps
/// insertion order so iteration is deterministic independent of hashing.
#[derive(Debug, Clone, Default)]
pub struct ProjectContext {
    files: IndexMap<String, UnifiedFileModel>,
}

impl ProjectContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: UnifiedFileModel) {
        self.files.insert(model.path.clone(), model);
    }

    pub fn get(&self, path: &str) -> Option<&UnifiedFileModel> {
        self.files.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn files(&self) -> impl Iterator<Item = &UnifiedFileModel> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FromIterator<UnifiedFileModel> for ProjectContext {
    fn from_iter<T: IntoIterator<Item = UnifiedFileModel>>(iter: T) -> Self {
        let mut ctx = ProjectContext::new();
        for model in iter {
            ctx.insert(model);
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_windows_paths() {
        assert_eq!(canonicalize_path("src\\pkg\\file.go"), "src/pkg/file.go");
    }

    #[test]
    fn detects_language_from_extension() {
        let model = UnifiedFileModel::new("a/b.rs", b"fn main() {}".to_vec(), false);
        assert_eq!(model.language, Language::Rust);
        assert_eq!(model.line_count, 1);
    }

    #[test]
    fn builder_preserves_declaration_order() {
        let model = UfmBuilder::new("a.go", b"".to_vec(), false)
            .with_import("fmt", 1)
            .with_import("os", 2)
            .with_function("main", 4, false)
            .build();
        assert_eq!(model.imports[0].path, "fmt");
        assert_eq!(model.imports[1].path, "os");
        assert_eq!(model.functions[0].name, "main");
    }

    #[test]
    fn project_context_is_deterministically_ordered() {
        let mut ctx = ProjectContext::new();
        ctx.insert(UnifiedFileModel::new("b.go", b"".to_vec(), false));
        ctx.insert(UnifiedFileModel::new("a.go", b"".to_vec(), false));
        let paths: Vec<_> = ctx.paths().collect();
        assert_eq!(paths, vec!["b.go", "a.go"]);
    }
}
