//! Crate-wide error taxonomy (spec §7).
//!
//! One `thiserror` enum per fallible subsystem, matching the teacher's
//! `config/types.rs::ConfigError` pattern, plus a top-level `StrictureError`
//! that callers who don't care which subsystem failed can use via `?`.
//! Rule panics are never represented here: they are recovered locally by the
//! engine's crash barrier and turned into a [`crate::rule::Violation`]
//! instead of an `Err`.

use thiserror::Error;

/// Configuration-time errors: bad rule selection, bad severity/threshold/mode
/// tokens, bad concurrency width. These abort the run before any file is
/// touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown rule id: {0}")]
    UnknownRuleId(String),
    #[error("invalid severity '{0}' (expected error, warn, or off)")]
    InvalidSeverity(String),
    #[error("invalid threshold '{0}' (expected high, medium, low, info, or none)")]
    InvalidThreshold(String),
    #[error("invalid enforcement mode '{0}' (expected block or warn)")]
    InvalidMode(String),
    #[error("invalid category '{0}'")]
    InvalidCategory(String),
    #[error("concurrency width must be >= 1, got {0}")]
    InvalidConcurrency(usize),
    #[error("duplicate rule id registered: {0}")]
    DuplicateRuleId(String),
}

/// Filesystem errors reading source files or writing artifacts.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Artifact (de)serialization errors: malformed JSON, alias conflicts,
/// invalid enum tokens. These abort the single operation that requested the
/// load, unlike [`crate::lineage::parser::ParseError`] which is collected
/// per-annotation and never aborts a scan.
#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("malformed artifact json: {0}")]
    MalformedJson(String),
    #[error(
        "conflicting values for '{key}': canonical record has '{canonical}', alias '{alias_key}' has '{alias_value}'"
    )]
    AliasConflict {
        key: String,
        canonical: String,
        alias_key: String,
        alias_value: String,
    },
    #[error("invalid value '{value}' for enum field '{field}'")]
    InvalidEnum { field: String, value: String },
    #[error("unknown export profile '{0}'")]
    UnknownProfile(String),
}

/// System registry loading errors (spec §4.8).
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("system id must not be empty")]
    EmptyId,
    #[error("duplicate system id (case-insensitive): {id}")]
    DuplicateId { id: String },
    #[error("malformed contact for system '{id}': {reason}")]
    MalformedContact { id: String, reason: String },
}

/// Umbrella error type for callers that want a single `Result` alias across
/// subsystems. Subsystem-specific code should prefer returning its own error
/// type and let `#[from]` do the conversion at the boundary.
#[derive(Debug, Error)]
pub enum StrictureError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Deserialize(#[from] DeserializeError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
