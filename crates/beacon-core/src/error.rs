//! Core error types.
//!
//! Uses `thiserror` for structured, matchable variants. Only structural or
//! usage errors live here: semantic findings are diagnostics
//! (`crate::diagnostic`), and missing-reference conditions are legitimate
//! transient states that no-op rather than fail.

use thiserror::Error;

/// Errors produced by the beacon-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A file spec carried neither a usable src nor dest.
    #[error("invalid file spec: {reason}")]
    InvalidFileSpec { reason: String },

    /// An absolute source path does not live under the project root.
    #[error("path '{path}' is not under the project root '{root}'")]
    PathOutsideRoot { path: String, root: String },

    /// A diagnostic filter glob failed to compile.
    #[error("invalid diagnostic filter glob '{glob}': {reason}")]
    InvalidFilterGlob { glob: String, reason: String },

    /// Reading project input from disk failed.
    #[error("failed to read '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
