//! Symbol tables and the namespace lookup tree.
//!
//! A [`SymbolTable`] maps lowercased (possibly dot-qualified) names to the
//! symbols declared under that name. Duplicates are deliberately retained:
//! the validation pipeline diagnoses them instead of silently shadowing.
//! Per-file tables are built from a [`ParsedUnit`] and merged in file order
//! into a per-scope table during validation.
//!
//! [`NamespaceLookup`] is the read-path over the same data: a tree of
//! namespace nodes supporting qualified-name resolution (fully qualified
//! first, then relative to a containing namespace), case-insensitive.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::diagnostic::Range;
use crate::unit::ParsedUnit;

/// What kind of entity a symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    Enum,
    Constant,
    Namespace,
}

impl SymbolKind {
    /// Human-readable label used in collision messages.
    pub fn label(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Enum => "enum",
            SymbolKind::Constant => "const",
            SymbolKind::Namespace => "namespace",
        }
    }
}

/// One named declaration, with enough context to locate and arity-check it.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    /// Full declared name, original casing, dot-qualified when namespaced.
    pub name: String,
    pub kind: SymbolKind,
    /// Package path of the declaring file.
    pub pkg_path: String,
    pub range: Range,
    /// `(min, max)` accepted argument counts, functions only.
    pub arity: Option<(usize, usize)>,
}

type Bucket = SmallVec<[Symbol; 1]>;

/// Case-insensitive name → symbols multimap.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: IndexMap<String, Bucket>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn insert(&mut self, symbol: Symbol) {
        self.entries
            .entry(symbol.name.to_lowercase())
            .or_default()
            .push(symbol);
    }

    /// All symbols declared under `name` (case-insensitive), declaration
    /// order preserved.
    pub fn get(&self, name: &str) -> &[Symbol] {
        self.entries
            .get(&name.to_lowercase())
            .map(|bucket| bucket.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        !self.get(name).is_empty()
    }

    /// Total number of symbols (not distinct names).
    pub fn symbol_count(&self) -> usize {
        self.entries.values().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(lowercased name, symbols)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Symbol])> {
        self.entries
            .iter()
            .map(|(name, bucket)| (name.as_str(), bucket.as_slice()))
    }

    /// Appends every declaration of `unit` as symbols owned by `pkg_path`.
    pub fn extend_from_unit(&mut self, pkg_path: &str, unit: &ParsedUnit) {
        for decl in &unit.functions {
            self.insert(Symbol {
                name: decl.name.clone(),
                kind: SymbolKind::Function,
                pkg_path: pkg_path.to_string(),
                range: decl.range,
                arity: Some((decl.min_args, decl.max_args)),
            });
        }
        for decl in &unit.classes {
            self.insert(Symbol {
                name: decl.name.clone(),
                kind: SymbolKind::Class,
                pkg_path: pkg_path.to_string(),
                range: decl.range,
                arity: None,
            });
        }
        for decl in &unit.interfaces {
            self.insert(Symbol {
                name: decl.name.clone(),
                kind: SymbolKind::Interface,
                pkg_path: pkg_path.to_string(),
                range: decl.range,
                arity: None,
            });
        }
        for decl in &unit.enums {
            self.insert(Symbol {
                name: decl.name.clone(),
                kind: SymbolKind::Enum,
                pkg_path: pkg_path.to_string(),
                range: decl.range,
                arity: None,
            });
        }
        for decl in &unit.constants {
            self.insert(Symbol {
                name: decl.name.clone(),
                kind: SymbolKind::Constant,
                pkg_path: pkg_path.to_string(),
                range: decl.range,
                arity: None,
            });
        }
        for decl in &unit.namespaces {
            self.insert(Symbol {
                name: decl.name.clone(),
                kind: SymbolKind::Namespace,
                pkg_path: pkg_path.to_string(),
                range: decl.range,
                arity: None,
            });
        }
    }

    /// Builds a table from a single unit.
    pub fn from_unit(pkg_path: &str, unit: &ParsedUnit) -> Self {
        let mut table = SymbolTable::new();
        table.extend_from_unit(pkg_path, unit);
        table
    }

    /// Merges another table in, cloning its symbols. Later merges append
    /// after earlier ones, so duplicate names keep file order.
    pub fn merge(&mut self, other: &SymbolTable) {
        for (_, symbols) in other.iter() {
            for symbol in symbols {
                self.insert(symbol.clone());
            }
        }
    }
}

/// One node in the namespace tree: child namespaces plus member symbols,
/// both keyed by lowercased segment.
#[derive(Debug, Default)]
pub struct NamespaceNode {
    /// Segment name, original casing of the first declaration seen.
    pub name: String,
    children: IndexMap<String, NamespaceNode>,
    members: IndexMap<String, Bucket>,
}

impl NamespaceNode {
    /// Member symbols declared directly in this namespace under `name`.
    pub fn members(&self, name: &str) -> &[Symbol] {
        self.members
            .get(&name.to_lowercase())
            .map(|bucket| bucket.as_slice())
            .unwrap_or(&[])
    }

    pub fn child(&self, segment: &str) -> Option<&NamespaceNode> {
        self.children.get(&segment.to_lowercase())
    }

    fn ensure_child(&mut self, segment: &str) -> &mut NamespaceNode {
        self.children
            .entry(segment.to_lowercase())
            .or_insert_with(|| NamespaceNode {
                name: segment.to_string(),
                ..NamespaceNode::default()
            })
    }
}

/// The lazily built namespace resolution tree over a merged symbol table.
#[derive(Debug, Default)]
pub struct NamespaceLookup {
    root: NamespaceNode,
}

impl NamespaceLookup {
    /// Builds the tree from every symbol in `table`. Namespace symbols
    /// create nodes; all other symbols become members of the node named by
    /// their qualifier segments.
    pub fn build(table: &SymbolTable) -> Self {
        let mut lookup = NamespaceLookup::default();
        for (_, symbols) in table.iter() {
            for symbol in symbols {
                lookup.add(symbol);
            }
        }
        lookup
    }

    fn add(&mut self, symbol: &Symbol) {
        let segments: Vec<&str> = symbol.name.split('.').collect();
        if symbol.kind == SymbolKind::Namespace {
            let mut node = &mut self.root;
            for segment in &segments {
                node = node.ensure_child(segment);
            }
            return;
        }
        let Some((last, path)) = segments.split_last() else {
            return;
        };
        let mut node = &mut self.root;
        for segment in path {
            node = node.ensure_child(segment);
        }
        node.members
            .entry(last.to_lowercase())
            .or_default()
            .push(symbol.clone());
    }

    fn resolve_path(&self, name: &str, kind: SymbolKind) -> Option<&Symbol> {
        let segments: Vec<&str> = name.split('.').collect();
        let (last, path) = segments.split_last()?;
        let mut node = &self.root;
        for segment in path {
            node = node.child(segment)?;
        }
        node.members(last).iter().find(|s| s.kind == kind)
    }

    /// Resolves `name` to a symbol of `kind`: the name taken as fully
    /// qualified wins, otherwise the name relative to
    /// `containing_namespace`. Case-insensitive; first match wins.
    pub fn resolve(
        &self,
        name: &str,
        containing_namespace: Option<&str>,
        kind: SymbolKind,
    ) -> Option<&Symbol> {
        if let Some(symbol) = self.resolve_path(name, kind) {
            return Some(symbol);
        }
        let containing = containing_namespace?;
        self.resolve_path(&format!("{containing}.{name}"), kind)
    }

    /// Resolves `name` to a namespace node with the same precedence rules.
    pub fn resolve_namespace(
        &self,
        name: &str,
        containing_namespace: Option<&str>,
    ) -> Option<&NamespaceNode> {
        let walk = |full: &str| -> Option<&NamespaceNode> {
            let mut node = &self.root;
            for segment in full.split('.') {
                node = node.child(segment)?;
            }
            Some(node)
        };
        if let Some(node) = walk(name) {
            return Some(node);
        }
        let containing = containing_namespace?;
        walk(&format!("{containing}.{name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{ClassDecl, FunctionDecl, NamespaceDecl};

    fn unit_with(functions: Vec<(&str, usize, usize)>, classes: Vec<&str>) -> ParsedUnit {
        ParsedUnit {
            functions: functions
                .into_iter()
                .map(|(name, min, max)| FunctionDecl {
                    name: name.to_string(),
                    min_args: min,
                    max_args: max,
                    range: Range::default(),
                })
                .collect(),
            classes: classes
                .into_iter()
                .map(|name| ClassDecl {
                    name: name.to_string(),
                    parent_name: None,
                    range: Range::default(),
                })
                .collect(),
            ..ParsedUnit::default()
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let table = SymbolTable::from_unit("source/a.bcn", &unit_with(vec![("DoThing", 0, 0)], vec![]));
        assert_eq!(table.get("dothing").len(), 1);
        assert_eq!(table.get("DOTHING").len(), 1);
        assert_eq!(table.get("DoThing")[0].name, "DoThing");
    }

    #[test]
    fn duplicates_are_retained_in_order() {
        let mut table = SymbolTable::from_unit(
            "source/a.bcn",
            &unit_with(vec![("DoThing", 0, 0)], vec![]),
        );
        table.merge(&SymbolTable::from_unit(
            "source/b.bcn",
            &unit_with(vec![("dothing", 1, 1)], vec![]),
        ));

        let symbols = table.get("DoThing");
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].pkg_path, "source/a.bcn");
        assert_eq!(symbols[1].pkg_path, "source/b.bcn");
    }

    #[test]
    fn functions_carry_arity() {
        let table = SymbolTable::from_unit(
            "source/a.bcn",
            &unit_with(vec![("Clamp", 1, 3)], vec!["Widget"]),
        );
        assert_eq!(table.get("Clamp")[0].arity, Some((1, 3)));
        assert_eq!(table.get("Widget")[0].arity, None);
    }

    #[test]
    fn namespace_resolution_prefers_fully_qualified() {
        let mut unit = unit_with(vec![("Acme.Util.Log", 1, 1), ("Log", 0, 0)], vec![]);
        unit.namespaces.push(NamespaceDecl {
            name: "Acme.Util".to_string(),
            range: Range::default(),
        });
        let table = SymbolTable::from_unit("source/a.bcn", &unit);
        let lookup = NamespaceLookup::build(&table);

        // Fully qualified name resolves through the tree.
        let qualified = lookup
            .resolve("Acme.Util.Log", None, SymbolKind::Function)
            .unwrap();
        assert_eq!(qualified.arity, Some((1, 1)));

        // Bare name as "fully qualified" hits the root-level Log first.
        let bare = lookup.resolve("Log", Some("Acme.Util"), SymbolKind::Function).unwrap();
        assert_eq!(bare.arity, Some((0, 0)));
    }

    #[test]
    fn namespace_relative_fallback() {
        let unit = unit_with(vec![("Acme.Util.Helper", 0, 0)], vec![]);
        let table = SymbolTable::from_unit("source/a.bcn", &unit);
        let lookup = NamespaceLookup::build(&table);

        // Not at root, but resolvable relative to the containing namespace.
        assert!(lookup.resolve("Helper", None, SymbolKind::Function).is_none());
        assert!(lookup
            .resolve("Helper", Some("Acme.Util"), SymbolKind::Function)
            .is_some());
        assert!(lookup
            .resolve("Util.Helper", Some("Acme"), SymbolKind::Function)
            .is_some());
    }

    #[test]
    fn resolve_filters_by_kind() {
        let unit = unit_with(vec![("Thing", 0, 0)], vec!["Thing"]);
        let table = SymbolTable::from_unit("source/a.bcn", &unit);
        let lookup = NamespaceLookup::build(&table);

        assert_eq!(
            lookup.resolve("Thing", None, SymbolKind::Class).unwrap().kind,
            SymbolKind::Class
        );
        assert_eq!(
            lookup
                .resolve("Thing", None, SymbolKind::Function)
                .unwrap()
                .kind,
            SymbolKind::Function
        );
        assert!(lookup.resolve("Thing", None, SymbolKind::Enum).is_none());
    }

    #[test]
    fn resolve_namespace_nodes() {
        let mut unit = ParsedUnit::default();
        unit.namespaces.push(NamespaceDecl {
            name: "Acme.Net".to_string(),
            range: Range::default(),
        });
        let table = SymbolTable::from_unit("source/a.bcn", &unit);
        let lookup = NamespaceLookup::build(&table);

        assert!(lookup.resolve_namespace("Acme", None).is_some());
        assert!(lookup.resolve_namespace("acme.net", None).is_some());
        assert!(lookup.resolve_namespace("Net", Some("Acme")).is_some());
        assert!(lookup.resolve_namespace("Missing", None).is_none());
    }
}
