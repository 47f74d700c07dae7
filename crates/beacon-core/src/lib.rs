pub mod diagnostic;
pub mod error;
pub mod filter;
pub mod graph;
pub mod options;
pub mod path;
pub mod symbols;
pub mod unit;

// Re-export commonly used types
pub use diagnostic::{messages, Diagnostic, Position, Range, RelatedInformation, Severity};
pub use error::CoreError;
pub use filter::{apply_severity_overrides, DiagnosticFilter, DiagnosticFilterer};
pub use graph::{ChangeEvent, DependencyGraph, SubscriptionToken};
pub use options::ProgramOptions;
pub use path::{resolve_file_spec, FileSpec, ResolvedPath};
pub use symbols::{NamespaceLookup, Symbol, SymbolKind, SymbolTable};
pub use unit::{ComponentDescriptor, ComponentInfo, ParsedUnit, Parser};
