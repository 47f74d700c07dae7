//! Script-import checks: referenced files must exist, and imports already
//! supplied by an ancestor scope are redundant.

use beacon_core::diagnostic::{messages, Diagnostic};
use beacon_core::path::pkg_key;

use crate::ScopeQuery;

pub fn check_script_imports(query: &dyn ScopeQuery) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (pkg_path, unit) in query.own_units() {
        for import in &unit.imports {
            let target = pkg_key(&import.path);
            if !query.has_file(&target) {
                diagnostics.push(
                    messages::referenced_file_does_not_exist(&import.path)
                        .at(pkg_path, import.range),
                );
            } else if query.parent_provides(&target) {
                diagnostics.push(
                    messages::unnecessary_script_import(&import.path).at(pkg_path, import.range),
                );
            }
        }
    }
    diagnostics
}
