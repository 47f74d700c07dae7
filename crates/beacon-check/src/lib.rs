//! Scope-level validation rules for Beacon programs.
//!
//! Every check is a pure function over a [`ScopeQuery`] -- the read-only
//! view of one scope at validation time -- and returns all findings at once
//! as diagnostics. Nothing here mutates state or caches results; the caching
//! and invalidation story belongs to the program layer that assembles the
//! query.
//!
//! [`run_all`] is the fixed pipeline the program layer invokes per scope:
//! duplicate callables, call-site resolution and arity, name collisions,
//! class/interface hierarchies, script-import existence and redundancy, and
//! component-name validity.

pub mod callables;
pub mod components;
pub mod hierarchy;
pub mod imports;

use beacon_core::diagnostic::Diagnostic;
use beacon_core::symbols::SymbolTable;
use beacon_core::unit::{ComponentInfo, ParsedUnit};

/// Read-only view of a scope under validation.
///
/// `own_units` are the parsed units of the files this scope directly owns,
/// in file order, with typedef substitution already applied. The symbol
/// table is the merged own + ancestor table, duplicates retained.
pub trait ScopeQuery {
    fn scope_name(&self) -> &str;

    /// `(pkg_path, unit)` per owned script file, file order.
    fn own_units(&self) -> Vec<(&str, &ParsedUnit)>;

    /// Merged symbol table for this scope and its ancestors.
    fn symbol_table(&self) -> &SymbolTable;

    /// `(pkg_path, info)` of the owning component description, when this is
    /// a component scope.
    fn component(&self) -> Option<(&str, &ComponentInfo)>;

    /// Whether a file exists anywhere in the program under this package
    /// path (lowercased).
    fn has_file(&self, pkg_key: &str) -> bool;

    /// Whether an ancestor scope already supplies this package path
    /// (lowercased).
    fn parent_provides(&self, pkg_key: &str) -> bool;

    /// Whether a component with this declared name (case-insensitive) is
    /// currently loaded.
    fn component_exists(&self, name: &str) -> bool;
}

/// Runs the full scope check pipeline, returning every finding.
pub fn run_all(query: &dyn ScopeQuery) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    diagnostics.extend(callables::check_duplicate_callables(query));
    diagnostics.extend(callables::check_call_sites(query));
    diagnostics.extend(hierarchy::check_name_collisions(query));
    diagnostics.extend(hierarchy::check_class_hierarchies(query));
    diagnostics.extend(imports::check_script_imports(query));
    diagnostics.extend(components::check_component(query));
    diagnostics
}
