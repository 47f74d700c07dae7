//! Callable checks: duplicate implementations, call resolution, arity.

use std::collections::HashMap;

use beacon_core::diagnostic::{messages, Diagnostic};
use beacon_core::symbols::{Symbol, SymbolKind};
use beacon_core::unit::{CallSite, FunctionDecl};

use crate::ScopeQuery;

/// Reports every declaration site of a function name implemented more than
/// once within the scope's own files.
pub fn check_duplicate_callables(query: &dyn ScopeQuery) -> Vec<Diagnostic> {
    let mut by_name: HashMap<String, Vec<(&str, &FunctionDecl)>> = HashMap::new();
    for (pkg_path, unit) in query.own_units() {
        for decl in &unit.functions {
            by_name
                .entry(decl.name.to_lowercase())
                .or_default()
                .push((pkg_path, decl));
        }
    }

    let mut diagnostics = Vec::new();
    for sites in by_name.into_values() {
        if sites.len() < 2 {
            continue;
        }
        for (pkg_path, decl) in &sites {
            let mut diagnostic =
                messages::duplicate_function_implementation(&decl.name, query.scope_name())
                    .at(*pkg_path, decl.range);
            for (other_pkg, other) in &sites {
                if std::ptr::eq(*other, *decl) {
                    continue;
                }
                diagnostic = diagnostic.with_related(
                    format!("'{}' is also declared here", other.name),
                    *other_pkg,
                    other.range,
                );
            }
            diagnostics.push(diagnostic);
        }
    }
    diagnostics
}

/// Checks every call site in the scope's own files: the callee must resolve
/// to a known name, and when it resolves to a function, the argument count
/// must fit the declared arity.
pub fn check_call_sites(query: &dyn ScopeQuery) -> Vec<Diagnostic> {
    let table = query.symbol_table();
    let mut diagnostics = Vec::new();

    for (pkg_path, unit) in query.own_units() {
        for call in &unit.calls {
            if let Some(diagnostic) = check_one_call(query, table, call) {
                diagnostics.push(diagnostic.at(pkg_path, call.range));
            }
        }
    }
    diagnostics
}

fn check_one_call(
    query: &dyn ScopeQuery,
    table: &beacon_core::symbols::SymbolTable,
    call: &CallSite,
) -> Option<Diagnostic> {
    // Dotted callees are only statically resolvable when the leading
    // segment names a namespace; anything else is a method call on a value.
    if let Some((head, _)) = call.name.split_once('.') {
        let head_is_namespace = symbols_of_kind(table.get(head), SymbolKind::Namespace).is_some()
            || call
                .containing_namespace
                .as_deref()
                .and_then(|ns| {
                    symbols_of_kind(table.get(&format!("{ns}.{head}")), SymbolKind::Namespace)
                })
                .is_some();
        if !head_is_namespace {
            return None;
        }
    }

    let mut candidates = table.get(&call.name);
    if candidates.is_empty() {
        if let Some(ns) = call.containing_namespace.as_deref() {
            candidates = table.get(&format!("{ns}.{}", call.name));
        }
    }

    if candidates.is_empty() {
        return Some(messages::call_to_unknown_function(
            &call.name,
            query.scope_name(),
        ));
    }

    let function = symbols_of_kind(candidates, SymbolKind::Function)?;
    let (min, max) = function.arity?;
    if call.arg_count < min || call.arg_count > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        };
        return Some(messages::mismatch_argument_count(
            &call.name,
            &expected,
            call.arg_count,
        ));
    }
    None
}

fn symbols_of_kind(symbols: &[Symbol], kind: SymbolKind) -> Option<&Symbol> {
    symbols.iter().find(|s| s.kind == kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::TestScope;
    use beacon_core::diagnostic::Range;
    use beacon_core::unit::{NamespaceDecl, ParsedUnit};

    fn function(name: &str, min: usize, max: usize, line: u32) -> FunctionDecl {
        FunctionDecl {
            name: name.to_string(),
            min_args: min,
            max_args: max,
            range: Range::on_line(line, 0, name.len() as u32),
        }
    }

    fn call(name: &str, args: usize, line: u32) -> CallSite {
        CallSite {
            name: name.to_string(),
            containing_namespace: None,
            arg_count: args,
            range: Range::on_line(line, 0, name.len() as u32),
        }
    }

    #[test]
    fn single_declaration_is_clean() {
        let scope = TestScope::new("source").with_unit(
            "source/lib.bcn",
            ParsedUnit {
                functions: vec![function("DoSomething", 0, 0, 0)],
                ..ParsedUnit::default()
            },
        );
        assert!(check_duplicate_callables(&scope).is_empty());
    }

    #[test]
    fn duplicate_reported_once_per_site_with_cross_references() {
        let scope = TestScope::new("source").with_unit(
            "source/lib.bcn",
            ParsedUnit {
                functions: vec![function("DoSomething", 0, 0, 0), function("dosomething", 0, 0, 5)],
                ..ParsedUnit::default()
            },
        );
        let diagnostics = check_duplicate_callables(&scope);
        assert_eq!(diagnostics.len(), 2);
        for diagnostic in &diagnostics {
            assert_eq!(diagnostic.code, messages::DUPLICATE_FUNCTION_IMPLEMENTATION);
            assert_eq!(diagnostic.related.len(), 1);
        }
    }

    #[test]
    fn duplicates_across_files_in_same_scope() {
        let scope = TestScope::new("source")
            .with_unit(
                "source/a.bcn",
                ParsedUnit {
                    functions: vec![function("Init", 0, 0, 0)],
                    ..ParsedUnit::default()
                },
            )
            .with_unit(
                "source/b.bcn",
                ParsedUnit {
                    functions: vec![function("Init", 0, 0, 0)],
                    ..ParsedUnit::default()
                },
            );
        assert_eq!(check_duplicate_callables(&scope).len(), 2);
    }

    #[test]
    fn unknown_call_is_reported() {
        let scope = TestScope::new("source").with_unit(
            "source/main.bcn",
            ParsedUnit {
                calls: vec![call("DoSomething", 0, 2)],
                ..ParsedUnit::default()
            },
        );
        let diagnostics = check_call_sites(&scope);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, messages::CALL_TO_UNKNOWN_FUNCTION);
        assert!(diagnostics[0].message.contains("DoSomething"));
    }

    #[test]
    fn known_call_with_matching_arity_is_clean() {
        let scope = TestScope::new("source").with_unit(
            "source/main.bcn",
            ParsedUnit {
                functions: vec![function("Clamp", 1, 3, 0)],
                calls: vec![call("clamp", 2, 4)],
                ..ParsedUnit::default()
            },
        );
        assert!(check_call_sites(&scope).is_empty());
    }

    #[test]
    fn arity_mismatch_is_reported() {
        let scope = TestScope::new("source").with_unit(
            "source/main.bcn",
            ParsedUnit {
                functions: vec![function("Clamp", 1, 3, 0)],
                calls: vec![call("Clamp", 5, 4)],
                ..ParsedUnit::default()
            },
        );
        let diagnostics = check_call_sites(&scope);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, messages::MISMATCH_ARGUMENT_COUNT);
        assert!(diagnostics[0].message.contains("1 to 3"));
    }

    #[test]
    fn namespace_relative_call_resolves() {
        let mut unit = ParsedUnit {
            functions: vec![function("Acme.Util.Log", 1, 1, 0)],
            ..ParsedUnit::default()
        };
        unit.namespaces.push(NamespaceDecl {
            name: "Acme.Util".to_string(),
            range: Range::default(),
        });
        unit.calls.push(CallSite {
            name: "Log".to_string(),
            containing_namespace: Some("Acme.Util".to_string()),
            arg_count: 1,
            range: Range::on_line(3, 0, 3),
        });
        let scope = TestScope::new("source").with_unit("source/util.bcn", unit);
        assert!(check_call_sites(&scope).is_empty());
    }

    #[test]
    fn dotted_call_on_value_is_skipped() {
        let scope = TestScope::new("source").with_unit(
            "source/main.bcn",
            ParsedUnit {
                calls: vec![call("node.GetChild", 1, 0)],
                ..ParsedUnit::default()
            },
        );
        assert!(check_call_sites(&scope).is_empty());
    }

    #[test]
    fn dotted_call_through_namespace_is_checked() {
        let mut unit = ParsedUnit {
            functions: vec![function("Acme.Log", 1, 1, 0)],
            calls: vec![call("Acme.Missing", 0, 2)],
            ..ParsedUnit::default()
        };
        unit.namespaces.push(NamespaceDecl {
            name: "Acme".to_string(),
            range: Range::default(),
        });
        let scope = TestScope::new("source").with_unit("source/util.bcn", unit);
        let diagnostics = check_call_sites(&scope);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, messages::CALL_TO_UNKNOWN_FUNCTION);
    }
}
