//! jobmap - deterministic CI job-name resolution
//!
//! Computes, for any named source project, the exact set of CI job names
//! implied by two YAML repositories: per-project job definitions and a
//! library of reusable job-name templates. Template defaults and per-entry
//! overrides are merged by priority and list-valued parameters expand
//! combinatorially, producing a deterministic, partitioned
//! (`resolved`/`unresolved`) job-name set per project.
//!
//! The crate never talks to a CI server and never executes a job; it only
//! derives the *expected* name set from the declarative definitions.

pub mod definitions;
pub mod error;
pub mod expand;
pub mod models;
pub mod resolver;
pub mod templates;

// Re-exports for convenience
pub use definitions::{DefinitionStats, ProjectDefinitionLoader};
pub use error::{JobmapError, JobmapResult};
pub use expand::{expand, Expansion};
pub use models::{
    ExpandedJobSet, JobEntry, ParamMap, ParamValue, ProjectBlock, ScalarValue, SourceProject,
    TemplateSpec,
};
pub use resolver::{Resolver, ResolverSummary};
pub use templates::{TemplateLibrary, TemplateLoadStats};
