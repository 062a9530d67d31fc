//! Cross-service contract and data-lineage core.
//!
//! Two subsystems live here: a multi-language rule-evaluation engine
//! ([`engine`], [`rule`], [`registry`], [`suppression`], [`ufm`]) and a
//! lineage subsystem that parses annotations out of source comments,
//! normalizes them into a deterministic artifact, classifies drift between
//! two artifacts, and resolves escalation chains across a service graph
//! ([`lineage`], [`drift`], [`escalation`], [`system_registry`]).
//!
//! Language adapters, CLI surfaces, report formatting and rule bodies are
//! external collaborators and are not implemented by this crate.

pub mod drift;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod lineage;
pub mod registry;
pub mod rule;
pub mod suppression;
pub mod system_registry;
pub mod ufm;

pub use error::StrictureError;
