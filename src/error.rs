//! Error types for jobmap
//!
//! Uses `thiserror` for library errors. Data-quality faults (malformed
//! files, missing templates, absent definition files) are deliberately
//! not errors: they are contained where they occur and surfaced as
//! counters and log entries instead.

use thiserror::Error;

/// Result type alias for jobmap operations
pub type JobmapResult<T> = Result<T, JobmapError>;

/// Main error type for jobmap operations
#[derive(Error, Debug)]
pub enum JobmapError {
    /// `parse_project_jobs` was called before `load_templates`.
    ///
    /// This is a precondition violation by the caller, not a data-quality
    /// condition, which is why it is the one fault that crosses the
    /// `Resolver` boundary as an error.
    #[error("templates not loaded - call load_templates() before resolving project jobs")]
    TemplatesNotLoaded,
}
