//! Declaration hierarchy checks: unknown parents, inheritance cycles, and
//! cross-kind name collisions.

use std::collections::{HashMap, HashSet};

use beacon_core::diagnostic::{messages, Diagnostic, Range};
use beacon_core::symbols::SymbolKind;

use crate::ScopeQuery;

/// One class-like declaration flattened out of the scope's own units.
struct ClassLike<'a> {
    pkg_path: &'a str,
    name: &'a str,
    parent_name: Option<&'a str>,
    range: Range,
    kind: SymbolKind,
}

/// Reports unknown parent classes/interfaces and circular inheritance
/// chains among the scope's own declarations.
pub fn check_class_hierarchies(query: &dyn ScopeQuery) -> Vec<Diagnostic> {
    let mut decls: Vec<ClassLike> = Vec::new();
    for (pkg_path, unit) in query.own_units() {
        for decl in &unit.classes {
            decls.push(ClassLike {
                pkg_path,
                name: &decl.name,
                parent_name: decl.parent_name.as_deref(),
                range: decl.range,
                kind: SymbolKind::Class,
            });
        }
        for decl in &unit.interfaces {
            decls.push(ClassLike {
                pkg_path,
                name: &decl.name,
                parent_name: decl.parent_name.as_deref(),
                range: decl.range,
                kind: SymbolKind::Interface,
            });
        }
    }

    // Own declarations by lowercased full name, for the cycle walk.
    let by_name: HashMap<String, &ClassLike> = decls
        .iter()
        .map(|decl| (decl.name.to_lowercase(), decl))
        .collect();

    let table = query.symbol_table();
    let mut diagnostics = Vec::new();

    for decl in &decls {
        let Some(parent_name) = decl.parent_name else {
            continue;
        };

        let Some(parent_key) = resolve_parent(decl.name, parent_name, decl.kind, table) else {
            let diagnostic = match decl.kind {
                SymbolKind::Interface => messages::unknown_parent_interface(parent_name),
                _ => messages::unknown_parent_class(parent_name),
            };
            diagnostics.push(diagnostic.at(decl.pkg_path, decl.range));
            continue;
        };

        // Single-hop walk over own declarations; a revisited key is a cycle.
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(decl.name.to_lowercase());
        let mut current = parent_key;
        loop {
            if !visited.insert(current.clone()) {
                diagnostics.push(
                    messages::circular_inheritance(decl.name).at(decl.pkg_path, decl.range),
                );
                break;
            }
            let Some(next_decl) = by_name.get(&current) else {
                break;
            };
            let Some(next_parent) = next_decl.parent_name else {
                break;
            };
            match resolve_parent(next_decl.name, next_parent, next_decl.kind, table) {
                Some(key) => current = key,
                None => break,
            }
        }
    }
    diagnostics
}

/// Resolves a parent name to its lowercased full name: the name taken as
/// written first, then qualified with the child's namespace. Returns `None`
/// when no declaration of the right kind exists in the merged table.
fn resolve_parent(
    child_name: &str,
    parent_name: &str,
    kind: SymbolKind,
    table: &beacon_core::symbols::SymbolTable,
) -> Option<String> {
    let direct = parent_name.to_lowercase();
    if table.get(&direct).iter().any(|s| s.kind == kind) {
        return Some(direct);
    }
    let namespace = child_name.rsplit_once('.')?.0;
    let qualified = format!("{}.{}", namespace.to_lowercase(), parent_name.to_lowercase());
    if table.get(&qualified).iter().any(|s| s.kind == kind) {
        return Some(qualified);
    }
    None
}

/// Reports names declared as two different kinds of thing (or re-declared
/// for non-callable kinds). Namespace reopening is legal; same-name function
/// duplicates are the duplicate-callable check's concern.
pub fn check_name_collisions(query: &dyn ScopeQuery) -> Vec<Diagnostic> {
    struct Site<'a> {
        pkg_path: &'a str,
        name: &'a str,
        range: Range,
        kind: SymbolKind,
    }

    let mut by_name: HashMap<String, Vec<Site>> = HashMap::new();
    for (pkg_path, unit) in query.own_units() {
        for d in &unit.functions {
            by_name.entry(d.name.to_lowercase()).or_default().push(Site {
                pkg_path,
                name: &d.name,
                range: d.range,
                kind: SymbolKind::Function,
            });
        }
        for d in &unit.classes {
            by_name.entry(d.name.to_lowercase()).or_default().push(Site {
                pkg_path,
                name: &d.name,
                range: d.range,
                kind: SymbolKind::Class,
            });
        }
        for d in &unit.interfaces {
            by_name.entry(d.name.to_lowercase()).or_default().push(Site {
                pkg_path,
                name: &d.name,
                range: d.range,
                kind: SymbolKind::Interface,
            });
        }
        for d in &unit.enums {
            by_name.entry(d.name.to_lowercase()).or_default().push(Site {
                pkg_path,
                name: &d.name,
                range: d.range,
                kind: SymbolKind::Enum,
            });
        }
        for d in &unit.constants {
            by_name.entry(d.name.to_lowercase()).or_default().push(Site {
                pkg_path,
                name: &d.name,
                range: d.range,
                kind: SymbolKind::Constant,
            });
        }
        for d in &unit.namespaces {
            by_name.entry(d.name.to_lowercase()).or_default().push(Site {
                pkg_path,
                name: &d.name,
                range: d.range,
                kind: SymbolKind::Namespace,
            });
        }
    }

    let mut diagnostics = Vec::new();
    for sites in by_name.into_values() {
        let non_namespace: Vec<&Site> = sites
            .iter()
            .filter(|s| s.kind != SymbolKind::Namespace)
            .collect();
        let has_namespace = non_namespace.len() < sites.len();

        let all_functions = non_namespace
            .iter()
            .all(|s| s.kind == SymbolKind::Function);
        let colliding = if has_namespace {
            !non_namespace.is_empty()
        } else {
            non_namespace.len() > 1 && !all_functions
        };
        if !colliding {
            continue;
        }

        for site in &non_namespace {
            let other_kind = sites
                .iter()
                .find(|s| !std::ptr::eq(*s, *site))
                .map(|s| s.kind.label())
                .unwrap_or("namespace");
            diagnostics.push(
                messages::name_collision(site.name, other_kind).at(site.pkg_path, site.range),
            );
        }
    }
    diagnostics
}
