//! Scopes: the unit of semantic validation.
//!
//! A [`Scope`] is a named set of files validated together -- the global
//! scope, the implicit source scope, or one scope per component. It owns its
//! validation state machine and scope-level diagnostics, and shares its
//! state/generation cells with its dependency-graph subscription so a change
//! anywhere in the scope's dependency closure marks it [`Stale`] without the
//! listener holding any reference to the scope itself.
//!
//! [`ScopeContext`] bundles a scope with its owning program for the read
//! paths: file membership, live parent resolution, and the namespace
//! lookups. Parent resolution is deliberately uncached -- the parent
//! component can be renamed or removed between calls -- while the namespace
//! lookup tree is memoized against the scope's change generation.
//!
//! [`ValidationState::Stale`]: crate::state::ValidationState::Stale

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use beacon_core::diagnostic::Diagnostic;
use beacon_core::graph::{DependencyGraph, SubscriptionToken};
use beacon_core::path::pkg_key;
use beacon_core::symbols::{NamespaceLookup, Symbol, SymbolKind, SymbolTable};
use beacon_core::unit::{ComponentInfo, ParsedUnit};

use crate::file::{implementation_key, typedef_companion_key, File, FileKind};
use crate::program::Program;
use crate::state::ValidationState;

/// Reserved graph key of the global scope.
pub const GLOBAL_SCOPE_KEY: &str = "scope:global";
/// Reserved graph key of the source scope.
pub const SOURCE_SCOPE_KEY: &str = "scope:source";

/// What flavor of scope this is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Source,
    /// A component scope; carries the component file's package key.
    Component { pkg_key: String },
}

/// A named, ordered collection of files validated as one unit.
pub struct Scope {
    /// Registry key: `"global"`, `"source"`, or the component file's
    /// package key.
    key: String,
    /// Display name: `"global"`, `"source"`, or the component file's
    /// package path in original casing.
    name: String,
    kind: ScopeKind,
    graph_key: String,
    state: Rc<Cell<ValidationState>>,
    generation: Rc<Cell<u64>>,
    subscription: Option<SubscriptionToken>,
    diagnostics: Vec<Diagnostic>,
    lookup_cache: RefCell<Option<(u64, Rc<NamespaceLookup>)>>,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("graph_key", &self.graph_key)
            .field("state", &self.state.get())
            .field("diagnostics", &self.diagnostics.len())
            .finish()
    }
}

impl Scope {
    /// The always-present global scope. Always validated; its internal
    /// conflicts are suppressed by never running checks against it.
    pub fn global() -> Self {
        Scope {
            key: "global".to_string(),
            name: "global".to_string(),
            kind: ScopeKind::Global,
            graph_key: GLOBAL_SCOPE_KEY.to_string(),
            state: Rc::new(Cell::new(ValidationState::Valid)),
            generation: Rc::new(Cell::new(0)),
            subscription: None,
            diagnostics: Vec::new(),
            lookup_cache: RefCell::new(None),
        }
    }

    /// The implicit source scope, created lazily with the first
    /// source-rooted file.
    pub fn source() -> Self {
        Scope {
            key: "source".to_string(),
            name: "source".to_string(),
            kind: ScopeKind::Source,
            graph_key: SOURCE_SCOPE_KEY.to_string(),
            state: Rc::new(Cell::new(ValidationState::Stale)),
            generation: Rc::new(Cell::new(0)),
            subscription: None,
            diagnostics: Vec::new(),
            lookup_cache: RefCell::new(None),
        }
    }

    /// A component scope, named after its component file's package path and
    /// keyed in the graph by the component's key.
    pub fn for_component(pkg_path: &str, file_pkg_key: String, graph_key: String) -> Self {
        Scope {
            key: file_pkg_key.clone(),
            name: pkg_path.to_string(),
            kind: ScopeKind::Component {
                pkg_key: file_pkg_key,
            },
            graph_key,
            state: Rc::new(Cell::new(ValidationState::Stale)),
            generation: Rc::new(Cell::new(0)),
            subscription: None,
            diagnostics: Vec::new(),
            lookup_cache: RefCell::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ScopeKind {
        &self.kind
    }

    pub fn is_global(&self) -> bool {
        self.kind == ScopeKind::Global
    }

    pub fn graph_key(&self) -> &str {
        &self.graph_key
    }

    pub fn state(&self) -> ValidationState {
        self.state.get()
    }

    pub fn is_validated(&self) -> bool {
        self.state.get().is_valid()
    }

    /// Current change generation; bumped on every dependency-graph
    /// notification and explicit invalidation.
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Subscribes this scope's graph key for change notifications. The
    /// listener owns only the shared state/generation cells. Re-attaching
    /// releases the prior subscription first, so repeated attachment never
    /// leaks listeners.
    pub fn attach_dependency_graph(&mut self, graph: &mut DependencyGraph) {
        if let Some(token) = self.subscription.take() {
            graph.unsubscribe(token);
        }
        if self.is_global() {
            return;
        }
        let state = Rc::clone(&self.state);
        let generation = Rc::clone(&self.generation);
        let token = graph.on_change(&self.graph_key, move |_| {
            state.set(ValidationState::Stale);
            generation.set(generation.get() + 1);
        });
        self.subscription = Some(token);
    }

    /// Releases the graph subscription.
    pub fn detach_dependency_graph(&mut self, graph: &mut DependencyGraph) {
        if let Some(token) = self.subscription.take() {
            graph.unsubscribe(token);
        }
    }

    /// Re-keys this scope in the graph (duplicate-component index churn) and
    /// re-subscribes under the new key.
    pub(crate) fn set_graph_key(&mut self, graph_key: String, graph: &mut DependencyGraph) {
        if self.graph_key == graph_key {
            return;
        }
        self.graph_key = graph_key;
        self.attach_dependency_graph(graph);
        self.invalidate();
    }

    /// Explicit invalidation, equivalent to a dependency-change
    /// notification. No-op for the global scope.
    pub fn invalidate(&self) {
        if self.is_global() {
            return;
        }
        self.state.set(ValidationState::Stale);
        self.generation.set(self.generation.get() + 1);
    }

    pub(crate) fn mark_validating(&self) {
        self.state.set(ValidationState::Validating);
    }

    /// Replaces this scope's diagnostics wholesale and marks it valid.
    pub(crate) fn set_diagnostics(&mut self, diagnostics: Vec<Diagnostic>) {
        self.diagnostics = diagnostics;
        self.state.set(ValidationState::Valid);
    }

    /// This scope's own cross-file diagnostics. Member files' own
    /// diagnostics are merged separately by the program.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

/// A resolved symbol together with the file that declares it.
pub struct FileLink<'a> {
    pub symbol: Symbol,
    pub file: &'a File,
}

/// A scope bundled with its owning program: the read paths.
pub struct ScopeContext<'a> {
    program: &'a Program,
    scope: &'a Scope,
}

impl<'a> ScopeContext<'a> {
    pub(crate) fn new(program: &'a Program, scope: &'a Scope) -> Self {
        ScopeContext { program, scope }
    }

    pub fn scope(&self) -> &'a Scope {
        self.scope
    }

    /// The parent scope, resolved live on every call: global has none;
    /// source's parent is global; a component scope's parent is the scope of
    /// whatever its `extends` name currently resolves to, falling back to
    /// global.
    pub fn parent_scope(&self) -> Option<&'a Scope> {
        match &self.scope.kind {
            ScopeKind::Global => None,
            ScopeKind::Source => Some(self.program.global_scope()),
            ScopeKind::Component { pkg_key } => {
                let parent = self
                    .program
                    .file_by_pkg_key(pkg_key)
                    .and_then(File::component_info)
                    .and_then(|info| info.parent_name.as_deref())
                    .and_then(|name| self.program.get_component(name))
                    .map(|(_, scope)| scope);
                parent.or(Some(self.program.global_scope()))
            }
        }
    }

    /// This scope plus its ancestors, cycle-guarded, nearest first.
    fn chain(&self) -> Vec<&'a Scope> {
        let mut chain = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = Some(self.scope);
        while let Some(scope) = current {
            if !visited.insert(scope.key().to_string()) {
                break;
            }
            chain.push(scope);
            current = ScopeContext::new(self.program, scope).parent_scope();
        }
        chain
    }

    /// Unfiltered package keys this scope contributes: the component file
    /// plus its dependency closure, or every source-rooted script.
    fn membership_keys(program: &'a Program, scope: &'a Scope) -> Vec<String> {
        match &scope.kind {
            ScopeKind::Global => Vec::new(),
            ScopeKind::Source => {
                let prefix = format!("{}/", program.options().source_dir.to_lowercase());
                program
                    .files()
                    .filter(|file| file.is_script() && file.pkg_key().starts_with(&prefix))
                    .map(|file| file.pkg_key().to_string())
                    .collect()
            }
            ScopeKind::Component { pkg_key } => {
                let mut keys = vec![pkg_key.clone()];
                for key in program
                    .dependency_graph()
                    .get_all_dependencies(&[scope.graph_key()], None)
                {
                    if program.file_by_pkg_key(&key).is_some() {
                        keys.push(key);
                    }
                }
                keys
            }
        }
    }

    /// The files this scope directly owns: its membership minus whatever an
    /// ancestor scope already supplies.
    pub fn own_files(&self) -> Vec<&'a File> {
        let chain = self.chain();
        let mut ancestor_keys: HashSet<String> = HashSet::new();
        for scope in chain.iter().skip(1) {
            ancestor_keys.extend(Self::membership_keys(self.program, scope));
        }

        let mut seen = HashSet::new();
        Self::membership_keys(self.program, self.scope)
            .into_iter()
            .filter(|key| !ancestor_keys.contains(key))
            .filter(|key| seen.insert(key.clone()))
            .filter_map(|key| self.program.file_by_pkg_key(&key))
            .collect()
    }

    /// Own files plus every ancestor scope's files, deduplicated, nearest
    /// scope first.
    pub fn all_files(&self) -> Vec<&'a File> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        for scope in self.chain() {
            for key in Self::membership_keys(self.program, scope) {
                if !seen.insert(key.clone()) {
                    continue;
                }
                if let Some(file) = self.program.file_by_pkg_key(&key) {
                    files.push(file);
                }
            }
        }
        files
    }

    /// The merged symbol table for this scope: every visible file's
    /// effective unit in file order, duplicates retained.
    pub fn build_symbol_table(&self) -> SymbolTable {
        let mut table = SymbolTable::new();
        for file in self.all_files() {
            if let Some((pkg_path, unit)) = effective_unit(self.program, file) {
                table.extend_from_unit(pkg_path, unit);
            }
        }
        table
    }

    /// The namespace lookup tree, rebuilt only when the scope's change
    /// generation moves. Works whether or not `validate()` has run.
    pub fn namespace_lookup(&self) -> Rc<NamespaceLookup> {
        let generation = self.scope.generation();
        if let Some((cached_generation, lookup)) = self.scope.lookup_cache.borrow().as_ref() {
            if *cached_generation == generation {
                return Rc::clone(lookup);
            }
        }
        let table = self.build_symbol_table();
        let lookup = Rc::new(NamespaceLookup::build(&table));
        *self.scope.lookup_cache.borrow_mut() = Some((generation, Rc::clone(&lookup)));
        lookup
    }

    fn lookup_symbol(
        &self,
        name: &str,
        containing_namespace: Option<&str>,
        kind: SymbolKind,
    ) -> Option<Symbol> {
        self.namespace_lookup()
            .resolve(name, containing_namespace, kind)
            .cloned()
    }

    fn lookup_file_link(
        &self,
        name: &str,
        containing_namespace: Option<&str>,
        kind: SymbolKind,
    ) -> Option<FileLink<'a>> {
        let symbol = self.lookup_symbol(name, containing_namespace, kind)?;
        let file = self.program.file_by_pkg_key(&pkg_key(&symbol.pkg_path))?;
        Some(FileLink { symbol, file })
    }

    pub fn get_class(&self, name: &str, containing_namespace: Option<&str>) -> Option<Symbol> {
        self.lookup_symbol(name, containing_namespace, SymbolKind::Class)
    }

    pub fn get_class_file_link(
        &self,
        name: &str,
        containing_namespace: Option<&str>,
    ) -> Option<FileLink<'a>> {
        self.lookup_file_link(name, containing_namespace, SymbolKind::Class)
    }

    pub fn get_interface(&self, name: &str, containing_namespace: Option<&str>) -> Option<Symbol> {
        self.lookup_symbol(name, containing_namespace, SymbolKind::Interface)
    }

    pub fn get_interface_file_link(
        &self,
        name: &str,
        containing_namespace: Option<&str>,
    ) -> Option<FileLink<'a>> {
        self.lookup_file_link(name, containing_namespace, SymbolKind::Interface)
    }

    pub fn get_enum(&self, name: &str, containing_namespace: Option<&str>) -> Option<Symbol> {
        self.lookup_symbol(name, containing_namespace, SymbolKind::Enum)
    }

    pub fn get_enum_file_link(
        &self,
        name: &str,
        containing_namespace: Option<&str>,
    ) -> Option<FileLink<'a>> {
        self.lookup_file_link(name, containing_namespace, SymbolKind::Enum)
    }

    pub fn get_constant(&self, name: &str, containing_namespace: Option<&str>) -> Option<Symbol> {
        self.lookup_symbol(name, containing_namespace, SymbolKind::Constant)
    }

    pub fn get_constant_file_link(
        &self,
        name: &str,
        containing_namespace: Option<&str>,
    ) -> Option<FileLink<'a>> {
        self.lookup_file_link(name, containing_namespace, SymbolKind::Constant)
    }

    pub fn namespace_exists(&self, name: &str, containing_namespace: Option<&str>) -> bool {
        self.namespace_lookup()
            .resolve_namespace(name, containing_namespace)
            .is_some()
    }
}

/// The unit a file contributes to symbol resolution: a script's typedef
/// companion shadows the implementation when loaded, and a typedef only
/// stands on its own when its implementation is absent.
fn effective_unit<'a>(program: &'a Program, file: &'a File) -> Option<(&'a str, &'a ParsedUnit)> {
    let FileKind::Script(script) = file.kind() else {
        return None;
    };
    let options = program.options();
    if script.is_typedef {
        let shadowed = implementation_key(file.pkg_key(), options)
            .is_some_and(|key| program.file_by_pkg_key(&key).is_some());
        if shadowed {
            return None;
        }
        return Some((file.pkg_path(), &script.unit));
    }
    if let Some(companion_key) = typedef_companion_key(file.pkg_key(), options) {
        if let Some(companion) = program.file_by_pkg_key(&companion_key) {
            if let FileKind::Script(typedef) = companion.kind() {
                return Some((companion.pkg_path(), &typedef.unit));
            }
        }
    }
    Some((file.pkg_path(), &script.unit))
}

/// Assembles the check-pipeline view for one scope and runs every rule.
pub(crate) fn run_scope_checks(program: &Program, scope: &Scope) -> Vec<Diagnostic> {
    if scope.is_global() {
        return Vec::new();
    }
    let ctx = ScopeContext::new(program, scope);

    let own_files = ctx.own_files();
    let own_units: Vec<(&str, &ParsedUnit)> = own_files
        .iter()
        .filter_map(|file| effective_unit(program, file))
        .collect();
    let table = ctx.build_symbol_table();

    let mut parent_keys: HashSet<String> = HashSet::new();
    for ancestor in ctx.chain().iter().skip(1) {
        parent_keys.extend(ScopeContext::membership_keys(program, ancestor));
    }

    let component: Option<(&str, &ComponentInfo)> = match scope.kind() {
        ScopeKind::Component { pkg_key } => program
            .file_by_pkg_key(pkg_key)
            .and_then(|file| file.component_info().map(|info| (file.pkg_path(), info))),
        _ => None,
    };

    struct Query<'a> {
        program: &'a Program,
        scope_name: &'a str,
        own_units: &'a [(&'a str, &'a ParsedUnit)],
        table: &'a SymbolTable,
        component: Option<(&'a str, &'a ComponentInfo)>,
        parent_keys: &'a HashSet<String>,
    }

    impl beacon_check::ScopeQuery for Query<'_> {
        fn scope_name(&self) -> &str {
            self.scope_name
        }

        fn own_units(&self) -> Vec<(&str, &ParsedUnit)> {
            self.own_units.to_vec()
        }

        fn symbol_table(&self) -> &SymbolTable {
            self.table
        }

        fn component(&self) -> Option<(&str, &ComponentInfo)> {
            self.component
        }

        fn has_file(&self, pkg_key: &str) -> bool {
            self.program.file_by_pkg_key(pkg_key).is_some()
        }

        fn parent_provides(&self, pkg_key: &str) -> bool {
            self.parent_keys.contains(pkg_key)
        }

        fn component_exists(&self, name: &str) -> bool {
            self.program.get_component(name).is_some()
        }
    }

    let query = Query {
        program,
        scope_name: scope.name(),
        own_units: &own_units,
        table: &table,
        component,
        parent_keys: &parent_keys,
    };
    beacon_check::run_all(&query)
}
