//! The Beacon program layer: files, scopes, and the incremental
//! dependency/scope revalidation lifecycle.
//!
//! [`Program`] is the single entry point: `set_file` / `remove_file` keep
//! the dependency graph and scope registries consistent on every edit, and
//! `validate` brings diagnostics current while redoing only the work whose
//! dependency closure actually changed.

pub mod file;
pub mod plugin;
pub mod program;
pub mod scanner;
pub mod scope;
pub mod state;
pub mod testing;

// Re-export commonly used types
pub use file::{component_key, ComponentFile, File, FileKind, ScriptFile};
pub use plugin::{FileEvent, Plugin, PluginSet, ScopeEvent};
pub use program::Program;
pub use scanner::{ComponentMarkupReader, DeclScanner};
pub use scope::{FileLink, Scope, ScopeContext, ScopeKind, GLOBAL_SCOPE_KEY, SOURCE_SCOPE_KEY};
pub use state::ValidationState;
