//! The root aggregate: file, scope and component lifecycle.
//!
//! [`Program`] owns the dependency graph, the flat file registry (indexed by
//! source path and package path), the scope registry, and the component
//! registry. Every mutation flows through [`Program::set_file`] /
//! [`Program::remove_file`]; edits are modeled as remove-then-add so graph
//! rebuilding is uniform and no listener leaks across replacements.
//! [`Program::validate`] is idempotent and cache-respecting: files validate
//! once, scopes revalidate only when their dependency closure changed.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use beacon_core::diagnostic::{messages, Diagnostic, Range};
use beacon_core::error::CoreError;
use beacon_core::filter::{apply_severity_overrides, DiagnosticFilterer};
use beacon_core::graph::DependencyGraph;
use beacon_core::options::ProgramOptions;
use beacon_core::path::{self, resolve_file_spec, FileSpec};
use beacon_core::unit::{ComponentDescriptor, Parser};

use crate::file::{classify, component_key, ComponentFile, File, FileClass, FileKind, ScriptFile};
use crate::plugin::{FileEvent, Plugin, PluginSet, ScopeEvent};
use crate::scanner::{ComponentMarkupReader, DeclScanner};
use crate::scope::{run_scope_checks, Scope, ScopeContext, SOURCE_SCOPE_KEY};
use crate::state::ValidationState;

/// One entry in the component registry. Multiple files may declare the same
/// component name; entries are kept sorted by package key so index 0 is
/// deterministically "the" component.
#[derive(Debug, Clone)]
pub(crate) struct ComponentEntry {
    pub pkg_key: String,
    pub src_key: String,
}

/// The whole-program container and lifecycle orchestrator.
pub struct Program {
    options: ProgramOptions,
    filterer: DiagnosticFilterer,
    graph: DependencyGraph,
    /// src key -> file, insertion ordered.
    files: IndexMap<String, File>,
    /// pkg key -> src key.
    pkg_index: HashMap<String, String>,
    /// "global" | "source" | component pkg key -> scope.
    scopes: IndexMap<String, Scope>,
    /// Lowercased component name -> entries sorted by pkg key.
    components: HashMap<String, Vec<ComponentEntry>>,
    parser: Box<dyn Parser>,
    descriptor: Box<dyn ComponentDescriptor>,
    plugins: PluginSet,
    program_diagnostics: Vec<Diagnostic>,
    ready: bool,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("files", &self.files.len())
            .field("scopes", &self.scopes.len())
            .field("components", &self.components.len())
            .field("ready", &self.ready)
            .finish()
    }
}

impl Program {
    /// A program using the built-in declaration scanner and component
    /// markup reader.
    pub fn new(options: ProgramOptions) -> Result<Self, CoreError> {
        Program::with_collaborators(
            options,
            Box::new(DeclScanner::new()),
            Box::new(ComponentMarkupReader::new()),
        )
    }

    /// A program with caller-supplied parser/descriptor collaborators.
    pub fn with_collaborators(
        options: ProgramOptions,
        parser: Box<dyn Parser>,
        descriptor: Box<dyn ComponentDescriptor>,
    ) -> Result<Self, CoreError> {
        let filterer = DiagnosticFilterer::new(&options.diagnostic_filters)?;
        let mut program = Program {
            options,
            filterer,
            graph: DependencyGraph::new(),
            files: IndexMap::new(),
            pkg_index: HashMap::new(),
            scopes: IndexMap::new(),
            components: HashMap::new(),
            parser,
            descriptor,
            plugins: PluginSet::new(),
            program_diagnostics: Vec::new(),
            ready: false,
        };
        let mut global = Scope::global();
        global.attach_dependency_graph(&mut program.graph);
        program.scopes.insert("global".to_string(), global);
        Ok(program)
    }

    pub fn add_plugin(&mut self, plugin: Rc<dyn Plugin>) {
        self.plugins.add(plugin);
    }

    pub fn options(&self) -> &ProgramOptions {
        &self.options
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// True once the first `validate()` has completed (the one-shot
    /// readiness gate editor services wait on).
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.files.values()
    }

    pub(crate) fn file_by_pkg_key(&self, pkg_key: &str) -> Option<&File> {
        let src_key = self.pkg_index.get(pkg_key)?;
        self.files.get(src_key)
    }

    /// Looks a file up by source path or package path.
    pub fn get_file(&self, file_path: &str) -> Option<&File> {
        if let Some(file) = self.file_by_pkg_key(&path::pkg_key(file_path)) {
            return Some(file);
        }
        self.files.get(&path::src_key(Path::new(file_path)))
    }

    /// Adds or replaces a file. An existing file at the same source path is
    /// fully torn down first; the dependency graph and scope registries are
    /// consistent when this returns, and diagnostics are current after the
    /// next `validate()`.
    pub fn set_file(
        &mut self,
        spec: impl Into<FileSpec>,
        contents: &str,
    ) -> Result<&File, CoreError> {
        let spec = spec.into();
        let resolved = resolve_file_spec(&spec, &self.options.root_dir)?;
        let src_key = path::src_key(&resolved.src_path);
        let pkg_key = path::pkg_key(&resolved.pkg_path);

        if self.files.contains_key(&src_key) {
            self.remove_file_by_src_key(&src_key);
        }

        let class = classify(&pkg_key, &self.options);
        let event = FileEvent {
            pkg_path: resolved.pkg_path.clone(),
        };
        self.plugins.emit(|p| p.before_file_parse(&event));
        let kind = match class {
            FileClass::Script { typedef } => FileKind::Script(ScriptFile {
                unit: self.parser.parse(&resolved.pkg_path, contents),
                is_typedef: typedef,
            }),
            FileClass::Component => {
                let info = self.descriptor.parse(&resolved.pkg_path, contents);
                let name_key = info
                    .name
                    .as_deref()
                    .map(str::to_lowercase)
                    .unwrap_or_else(|| pkg_key.clone());
                FileKind::Component(ComponentFile {
                    info,
                    name_key,
                    graph_index: None,
                    attached: false,
                })
            }
            FileClass::Opaque => FileKind::Opaque,
        };
        self.plugins.emit(|p| p.after_file_parse(&event));

        let file = File::new(resolved, kind);
        debug!(pkg_path = %file.pkg_path(), "set file");
        self.pkg_index.insert(pkg_key.clone(), src_key.clone());
        self.files.insert(src_key.clone(), file);

        match class {
            FileClass::Script { .. } => {
                let (graph_key, deps) = {
                    let file = self.files.get(&src_key).expect("just inserted");
                    (file.graph_key(), file.own_dependencies(&self.options))
                };
                self.graph.add_or_replace(&graph_key, &deps);

                let source_prefix = format!("{}/", self.options.source_dir.to_lowercase());
                if pkg_key.starts_with(&source_prefix) {
                    self.ensure_source_scope();
                    self.graph.add_dependency(SOURCE_SCOPE_KEY, &graph_key);
                }
            }
            FileClass::Component => {
                let (pkg_path, name_key) = {
                    let file = self.files.get(&src_key).expect("just inserted");
                    let component = file.component().expect("component class");
                    (file.pkg_path().to_string(), component.name_key.clone())
                };
                let scope_event = ScopeEvent {
                    name: pkg_path.clone(),
                };
                self.plugins.emit(|p| p.before_scope_create(&scope_event));
                let mut scope = Scope::for_component(
                    &pkg_path,
                    pkg_key.clone(),
                    component_key(&name_key, None),
                );
                scope.attach_dependency_graph(&mut self.graph);
                self.scopes.insert(pkg_key.clone(), scope);
                self.plugins.emit(|p| p.after_scope_create(&scope_event));

                self.register_component(name_key, pkg_key.clone(), src_key.clone());
            }
            FileClass::Opaque => {
                self.graph.add_or_replace::<&str>(&pkg_key, &[]);
            }
        }

        Ok(self.files.get(&src_key).expect("just inserted"))
    }

    /// Removes a file by source or package path. No-op (returns false) when
    /// the file is not loaded.
    pub fn remove_file(&mut self, file_path: &str) -> bool {
        let by_src = path::src_key(Path::new(file_path));
        let src_key = if self.files.contains_key(&by_src) {
            by_src
        } else if let Some(src_key) = self.pkg_index.get(&path::pkg_key(file_path)) {
            src_key.clone()
        } else {
            return false;
        };
        self.remove_file_by_src_key(&src_key);
        true
    }

    fn remove_file_by_src_key(&mut self, src_key: &str) {
        let Some(file) = self.files.get(src_key) else {
            return;
        };
        let pkg_key = file.pkg_key().to_string();
        let pkg_path = file.pkg_path().to_string();
        let graph_key = file.graph_key();
        let component_name_key = file.component().map(|c| c.name_key.clone());
        let is_script = file.is_script();
        debug!(pkg_path = %pkg_path, "remove file");

        // Component scope teardown comes first so dependents observe the
        // scope vanishing before the file itself.
        if self.scopes.contains_key(&pkg_key) {
            let scope_event = ScopeEvent {
                name: pkg_path.clone(),
            };
            self.plugins.emit(|p| p.before_scope_dispose(&scope_event));
            if let Some(mut scope) = self.scopes.shift_remove(&pkg_key) {
                scope.detach_dependency_graph(&mut self.graph);
                self.graph.remove(scope.graph_key());
            }
            self.plugins.emit(|p| p.after_scope_dispose(&scope_event));
        }

        let removed = self.files.shift_remove(src_key);
        self.pkg_index.remove(&pkg_key);
        self.graph.remove(&graph_key);

        let source_prefix = format!("{}/", self.options.source_dir.to_lowercase());
        if is_script && pkg_key.starts_with(&source_prefix) {
            self.graph.remove_dependency(SOURCE_SCOPE_KEY, &graph_key);
        }

        if let Some(name_key) = component_name_key {
            self.unregister_component(&name_key, src_key);
        }

        let event = FileEvent { pkg_path };
        self.plugins.emit(|p| p.before_file_dispose(&event));
        drop(removed);
        self.plugins.emit(|p| p.after_file_dispose(&event));
    }

    fn ensure_source_scope(&mut self) {
        if self.scopes.contains_key("source") {
            return;
        }
        let scope_event = ScopeEvent {
            name: "source".to_string(),
        };
        self.plugins.emit(|p| p.before_scope_create(&scope_event));
        let mut scope = Scope::source();
        scope.attach_dependency_graph(&mut self.graph);
        self.scopes.insert("source".to_string(), scope);
        self.plugins.emit(|p| p.after_scope_create(&scope_event));
    }

    fn register_component(&mut self, name_key: String, pkg_key: String, src_key: String) {
        let entries = self.components.entry(name_key.clone()).or_default();
        entries.push(ComponentEntry { pkg_key, src_key });
        entries.sort_by(|a, b| a.pkg_key.cmp(&b.pkg_key));
        self.sync_component_dependency_graph(&name_key);
    }

    fn unregister_component(&mut self, name_key: &str, src_key: &str) {
        let Some(entries) = self.components.get_mut(name_key) else {
            return;
        };
        entries.retain(|entry| entry.src_key != src_key);
        if entries.is_empty() {
            self.components.remove(name_key);
            return;
        }
        self.sync_component_dependency_graph(name_key);
    }

    /// Reconciles graph keys after component registry churn: the entry at
    /// index 0 publishes under the unsuffixed key, duplicates under
    /// index-qualified keys, and each shifted entry's scope re-subscribes in
    /// lockstep.
    fn sync_component_dependency_graph(&mut self, name_key: &str) {
        let entries: Vec<ComponentEntry> = match self.components.get(name_key) {
            Some(entries) => entries.clone(),
            None => return,
        };

        // Tear down every attachment whose index shifted before installing
        // anything, so a demoted entry never deletes the node its successor
        // just claimed.
        for (position, entry) in entries.iter().enumerate() {
            let desired = if position == 0 { None } else { Some(position) };
            let mut stale_key = None;
            if let Some(file) = self.files.get_mut(&entry.src_key) {
                if let FileKind::Component(component) = file.kind_mut() {
                    if component.attached && component.graph_index != desired {
                        stale_key =
                            Some(component_key(&component.name_key, component.graph_index));
                        component.attached = false;
                    }
                }
            }
            if let Some(stale_key) = stale_key {
                self.graph.remove(&stale_key);
            }
        }

        for (position, entry) in entries.iter().enumerate() {
            let desired = if position == 0 { None } else { Some(position) };
            {
                let Some(file) = self.files.get_mut(&entry.src_key) else {
                    continue;
                };
                let FileKind::Component(component) = file.kind_mut() else {
                    continue;
                };
                if component.attached {
                    continue;
                }
                component.graph_index = desired;
                component.attached = true;
            }

            let (new_key, deps) = {
                let file = self.files.get(&entry.src_key).expect("entry file exists");
                (file.graph_key(), file.own_dependencies(&self.options))
            };
            self.graph.add_or_replace(&new_key, &deps);
            if let Some(scope) = self.scopes.get_mut(&entry.pkg_key) {
                scope.set_graph_key(new_key, &mut self.graph);
            }
        }
    }

    /// Validates every file not yet validated, then every stale scope, then
    /// runs whole-program checks. Idempotent: a second call with no
    /// intervening mutation re-parses nothing and produces identical
    /// diagnostics.
    pub fn validate(&mut self) {
        self.plugins.emit(|p| p.before_program_validate());
        self.program_diagnostics.clear();

        let stale_files: Vec<String> = self
            .files
            .iter()
            .filter(|(_, file)| !file.state().is_valid())
            .map(|(key, _)| key.clone())
            .collect();
        for src_key in stale_files {
            let event = FileEvent {
                pkg_path: self
                    .files
                    .get(&src_key)
                    .map(|f| f.pkg_path().to_string())
                    .unwrap_or_default(),
            };
            self.plugins.emit(|p| p.before_file_validate(&event));
            if let Some(file) = self.files.get_mut(&src_key) {
                file.set_state(ValidationState::Valid);
            }
            self.plugins.emit(|p| p.after_file_validate(&event));
        }

        let scope_keys: Vec<String> = self.scopes.keys().cloned().collect();
        for scope_key in scope_keys {
            self.validate_scope(&scope_key, false);
        }

        self.check_duplicate_component_names();
        self.ready = true;
        self.plugins.emit(|p| p.after_program_validate());
    }

    /// Validates one scope, respecting its cache unless `force` is set.
    pub fn validate_scope(&mut self, scope_key: &str, force: bool) {
        let Some(scope) = self.scopes.get(scope_key) else {
            return;
        };
        if scope.is_global() {
            return;
        }
        if scope.is_validated() && !force {
            return;
        }
        scope.mark_validating();
        let diagnostics = run_scope_checks(self, scope);
        trace!(scope = scope_key, count = diagnostics.len(), "validated scope");
        if let Some(scope) = self.scopes.get_mut(scope_key) {
            scope.set_diagnostics(diagnostics);
        }
    }

    /// One diagnostic per component file whose declared name collides with
    /// another component, cross-referencing every sibling.
    fn check_duplicate_component_names(&mut self) {
        let mut names: Vec<&String> = self.components.keys().collect();
        names.sort();

        let mut diagnostics = Vec::new();
        for name in names {
            let entries = &self.components[name];
            if entries.len() < 2 {
                continue;
            }
            let sites: Vec<&File> = entries
                .iter()
                .filter_map(|entry| self.files.get(&entry.src_key))
                .collect();
            for file in &sites {
                let Some(info) = file.component_info() else {
                    continue;
                };
                let display = info.name.as_deref().unwrap_or_else(|| file.pkg_path());
                let mut diagnostic =
                    messages::duplicate_component_name(display).at(file.pkg_path(), info.range);
                for other in &sites {
                    if std::ptr::eq(*other, *file) {
                        continue;
                    }
                    let Some(other_info) = other.component_info() else {
                        continue;
                    };
                    diagnostic = diagnostic.with_related(
                        format!("component '{display}' is also declared here"),
                        other.pkg_path(),
                        other_info.range,
                    );
                }
                diagnostics.push(diagnostic);
            }
        }
        self.program_diagnostics.extend(diagnostics);
    }

    /// Source keys of every file owned by at least one scope.
    fn scoped_file_src_keys(&self) -> HashSet<String> {
        let mut keys = HashSet::new();
        for scope in self.scopes.values() {
            let ctx = ScopeContext::new(self, scope);
            for file in ctx.own_files() {
                keys.insert(file.src_key().to_string());
            }
        }
        keys
    }

    /// Files that belong to no scope.
    pub fn get_unreferenced_files(&self) -> Vec<&File> {
        let referenced = self.scoped_file_src_keys();
        self.files
            .values()
            .filter(|file| !referenced.contains(file.src_key()))
            .collect()
    }

    /// Merges program-level, scope-level and per-file diagnostics, marks
    /// unreferenced files, then applies the filter pass followed by the
    /// severity-override pass. A filtered diagnostic is never resurrected.
    pub fn get_diagnostics(&self) -> Vec<Diagnostic> {
        let mut all = self.program_diagnostics.clone();
        for scope in self.scopes.values() {
            all.extend_from_slice(scope.diagnostics());
        }
        let referenced = self.scoped_file_src_keys();
        for file in self.files.values() {
            all.extend_from_slice(file.diagnostics());
            if !referenced.contains(file.src_key()) {
                all.push(
                    messages::file_not_referenced(file.pkg_path())
                        .at(file.pkg_path(), Range::default()),
                );
            }
        }
        all.retain(|diagnostic| !self.filterer.is_suppressed(diagnostic));
        apply_severity_overrides(&self.options.diagnostic_severity_overrides, &mut all);
        all
    }

    /// The primary (lexicographically first by package key) component file
    /// and scope for a declared name, case-insensitive.
    pub fn get_component(&self, name: &str) -> Option<(&File, &Scope)> {
        let entries = self.components.get(&name.to_lowercase())?;
        let entry = entries.first()?;
        let file = self.files.get(&entry.src_key)?;
        let scope = self.scopes.get(&entry.pkg_key)?;
        Some((file, scope))
    }

    /// Every file currently registered under a component name, registry
    /// order (sorted by package key).
    pub fn get_component_files(&self, name: &str) -> Vec<&File> {
        self.components
            .get(&name.to_lowercase())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| self.files.get(&entry.src_key))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn scope_registry_key(&self, name: &str) -> String {
        match name {
            "global" | "source" => name.to_string(),
            other => path::pkg_key(other),
        }
    }

    /// Looks up a scope by name: `"global"`, `"source"`, or a component
    /// file's package path.
    pub fn get_scope(&self, name: &str) -> Option<&Scope> {
        self.scopes.get(&self.scope_registry_key(name))
    }

    pub fn global_scope(&self) -> &Scope {
        self.scopes.get("global").expect("global scope always exists")
    }

    /// The read-path view over one scope.
    pub fn scope_context(&self, name: &str) -> Option<ScopeContext<'_>> {
        let scope = self.get_scope(name)?;
        Some(ScopeContext::new(self, scope))
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        self.plugins.emit(|p| p.before_program_dispose());
        self.graph.dispose();
        self.plugins.emit(|p| p.after_program_dispose());
    }
}
