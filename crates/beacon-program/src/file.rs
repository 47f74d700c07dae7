//! File abstractions as dependency-graph participants.
//!
//! A [`File`] carries its two identities (absolute source path, package
//! path), the parsed payload behind the closed [`FileKind`] union, and the
//! logic to compute its own dependency-graph key and dependency set. The
//! kind is decided exactly once at load time from the extension; there is no
//! downcasting anywhere downstream.

use std::path::{Path, PathBuf};

use beacon_core::diagnostic::Diagnostic;
use beacon_core::options::ProgramOptions;
use beacon_core::path::{self, ResolvedPath};
use beacon_core::unit::{ComponentInfo, ParsedUnit};

use crate::state::ValidationState;

/// Builds a component dependency-graph key: `component:<name>` for the
/// primary entry, `component:<name>[n]` for the n-th duplicate.
pub fn component_key(name_key: &str, index: Option<usize>) -> String {
    match index {
        None => format!("component:{name_key}"),
        Some(n) => format!("component:{name_key}[{n}]"),
    }
}

/// Script file payload.
#[derive(Debug)]
pub struct ScriptFile {
    pub unit: ParsedUnit,
    /// Declarations-only companion file (`.d.bcn`).
    pub is_typedef: bool,
}

/// Component description payload.
#[derive(Debug)]
pub struct ComponentFile {
    pub info: ComponentInfo,
    /// Lowercased declared component name, falling back to the package key
    /// when the name attribute is missing.
    pub name_key: String,
    /// Position among same-named components: `None` for the primary entry,
    /// `Some(n)` for duplicates. Drives the graph-key suffix.
    pub graph_index: Option<usize>,
    /// Whether this file's node is currently installed in the graph.
    pub attached: bool,
}

/// Closed union over the kinds of file the program tracks.
#[derive(Debug)]
pub enum FileKind {
    Script(ScriptFile),
    Component(ComponentFile),
    /// Unsupported extension: registered, tracked for unreferenced-file
    /// diagnostics, but never parsed or scoped.
    Opaque,
}

/// How an incoming path classifies, decided once from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileClass {
    Script { typedef: bool },
    Component,
    Opaque,
}

pub(crate) fn classify(pkg_key: &str, options: &ProgramOptions) -> FileClass {
    let typedef_suffix = format!(".{}", options.typedef_extension.to_lowercase());
    let script_suffix = format!(".{}", options.script_extension.to_lowercase());
    let component_suffix = format!(".{}", options.component_extension.to_lowercase());
    let components_prefix = format!("{}/", options.components_dir.to_lowercase());

    if pkg_key.ends_with(&typedef_suffix) {
        FileClass::Script { typedef: true }
    } else if pkg_key.ends_with(&script_suffix) {
        FileClass::Script { typedef: false }
    } else if pkg_key.ends_with(&component_suffix) && pkg_key.starts_with(&components_prefix) {
        FileClass::Component
    } else {
        FileClass::Opaque
    }
}

/// Package key of the typedef companion for a script file, `None` for
/// typedefs themselves and non-script keys.
pub(crate) fn typedef_companion_key(pkg_key: &str, options: &ProgramOptions) -> Option<String> {
    let typedef_suffix = format!(".{}", options.typedef_extension.to_lowercase());
    let script_suffix = format!(".{}", options.script_extension.to_lowercase());
    if pkg_key.ends_with(&typedef_suffix) {
        return None;
    }
    pkg_key
        .strip_suffix(&script_suffix)
        .map(|stem| format!("{stem}{typedef_suffix}"))
}

/// Package key of the implementation file a typedef shadows.
pub(crate) fn implementation_key(pkg_key: &str, options: &ProgramOptions) -> Option<String> {
    let typedef_suffix = format!(".{}", options.typedef_extension.to_lowercase());
    let script_suffix = format!(".{}", options.script_extension.to_lowercase());
    pkg_key
        .strip_suffix(&typedef_suffix)
        .map(|stem| format!("{stem}{script_suffix}"))
}

/// One loaded file.
#[derive(Debug)]
pub struct File {
    src_path: PathBuf,
    pkg_path: String,
    src_key: String,
    pkg_key: String,
    kind: FileKind,
    state: ValidationState,
}

impl File {
    pub(crate) fn new(resolved: ResolvedPath, kind: FileKind) -> Self {
        let src_key = path::src_key(&resolved.src_path);
        let pkg_key = path::pkg_key(&resolved.pkg_path);
        File {
            src_path: resolved.src_path,
            pkg_path: resolved.pkg_path,
            src_key,
            pkg_key,
            kind,
            state: ValidationState::Stale,
        }
    }

    /// Absolute source path, original casing.
    pub fn src_path(&self) -> &Path {
        &self.src_path
    }

    /// Package-relative path, original casing.
    pub fn pkg_path(&self) -> &str {
        &self.pkg_path
    }

    pub fn src_key(&self) -> &str {
        &self.src_key
    }

    pub fn pkg_key(&self) -> &str {
        &self.pkg_key
    }

    pub fn kind(&self) -> &FileKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut FileKind {
        &mut self.kind
    }

    pub fn state(&self) -> ValidationState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ValidationState) {
        self.state = state;
    }

    pub fn is_script(&self) -> bool {
        matches!(self.kind, FileKind::Script(_))
    }

    pub fn is_component(&self) -> bool {
        matches!(self.kind, FileKind::Component(_))
    }

    pub fn is_typedef(&self) -> bool {
        matches!(&self.kind, FileKind::Script(script) if script.is_typedef)
    }

    pub fn script(&self) -> Option<&ScriptFile> {
        match &self.kind {
            FileKind::Script(script) => Some(script),
            _ => None,
        }
    }

    pub fn component(&self) -> Option<&ComponentFile> {
        match &self.kind {
            FileKind::Component(component) => Some(component),
            _ => None,
        }
    }

    /// The parsed unit, scripts only.
    pub fn unit(&self) -> Option<&ParsedUnit> {
        self.script().map(|script| &script.unit)
    }

    /// The component info, component files only.
    pub fn component_info(&self) -> Option<&ComponentInfo> {
        self.component().map(|component| &component.info)
    }

    /// This file's own parse diagnostics.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match &self.kind {
            FileKind::Script(script) => &script.unit.diagnostics,
            FileKind::Component(component) => &component.info.diagnostics,
            FileKind::Opaque => &[],
        }
    }

    /// The key this file publishes under in the dependency graph.
    pub fn graph_key(&self) -> String {
        match &self.kind {
            FileKind::Component(component) => {
                component_key(&component.name_key, component.graph_index)
            }
            _ => self.pkg_key.clone(),
        }
    }

    /// The dependency keys this file declares, recomputed from its parsed
    /// payload: imports and the typedef companion for scripts, script tags
    /// and the parent component for component files.
    pub fn own_dependencies(&self, options: &ProgramOptions) -> Vec<String> {
        match &self.kind {
            FileKind::Script(script) => {
                let mut deps: Vec<String> = script
                    .unit
                    .imports
                    .iter()
                    .map(|import| path::pkg_key(&import.path))
                    .collect();
                if !script.is_typedef {
                    if let Some(companion) = typedef_companion_key(&self.pkg_key, options) {
                        deps.push(companion);
                    }
                }
                deps
            }
            FileKind::Component(component) => {
                let mut deps: Vec<String> = component
                    .info
                    .scripts
                    .iter()
                    .map(|script| path::pkg_key(&script.uri))
                    .collect();
                if let Some(parent) = &component.info.parent_name {
                    deps.push(component_key(&parent.to_lowercase(), None));
                }
                deps
            }
            FileKind::Opaque => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::diagnostic::Range;
    use beacon_core::unit::{ImportDecl, ScriptRef};

    fn options() -> ProgramOptions {
        ProgramOptions::with_root("/proj")
    }

    fn resolved(pkg: &str) -> ResolvedPath {
        ResolvedPath {
            src_path: PathBuf::from(format!("/proj/{pkg}")),
            pkg_path: pkg.to_string(),
        }
    }

    #[test]
    fn classification_is_extension_driven() {
        let options = options();
        assert_eq!(
            classify("source/main.bcn", &options),
            FileClass::Script { typedef: false }
        );
        assert_eq!(
            classify("source/main.d.bcn", &options),
            FileClass::Script { typedef: true }
        );
        assert_eq!(classify("components/widget.xml", &options), FileClass::Component);
        // An xml outside the components root is opaque.
        assert_eq!(classify("source/widget.xml", &options), FileClass::Opaque);
        assert_eq!(classify("assets/logo.png", &options), FileClass::Opaque);
    }

    #[test]
    fn typedef_companion_round_trip() {
        let options = options();
        assert_eq!(
            typedef_companion_key("source/lib.bcn", &options),
            Some("source/lib.d.bcn".to_string())
        );
        assert_eq!(typedef_companion_key("source/lib.d.bcn", &options), None);
        assert_eq!(
            implementation_key("source/lib.d.bcn", &options),
            Some("source/lib.bcn".to_string())
        );
    }

    #[test]
    fn script_dependencies_are_imports_plus_companion() {
        let mut unit = ParsedUnit::default();
        unit.imports.push(ImportDecl {
            path: "pkg:/source/Util.bcn".to_string(),
            range: Range::default(),
        });
        let file = File::new(
            resolved("source/main.bcn"),
            FileKind::Script(ScriptFile {
                unit,
                is_typedef: false,
            }),
        );
        let deps = file.own_dependencies(&options());
        assert!(deps.contains(&"source/util.bcn".to_string()));
        assert!(deps.contains(&"source/main.d.bcn".to_string()));
    }

    #[test]
    fn component_dependencies_are_scripts_plus_parent() {
        let info = ComponentInfo {
            name: Some("Widget".to_string()),
            parent_name: Some("BaseWidget".to_string()),
            scripts: vec![ScriptRef {
                uri: "pkg:/components/Widget.bcn".to_string(),
                range: Range::default(),
            }],
            range: Range::default(),
            diagnostics: Vec::new(),
        };
        let file = File::new(
            resolved("components/Widget.xml"),
            FileKind::Component(ComponentFile {
                info,
                name_key: "widget".to_string(),
                graph_index: None,
                attached: false,
            }),
        );
        let deps = file.own_dependencies(&options());
        assert!(deps.contains(&"components/widget.bcn".to_string()));
        assert!(deps.contains(&"component:basewidget".to_string()));
        assert_eq!(file.graph_key(), "component:widget");
    }

    #[test]
    fn duplicate_component_key_carries_index() {
        assert_eq!(component_key("widget", None), "component:widget");
        assert_eq!(component_key("widget", Some(1)), "component:widget[1]");
    }

    #[test]
    fn keys_are_case_folded() {
        let file = File::new(resolved("Source/Main.BCN"), FileKind::Opaque);
        assert_eq!(file.pkg_path(), "Source/Main.BCN");
        assert_eq!(file.pkg_key(), "source/main.bcn");
        assert_eq!(file.src_key(), "/proj/source/main.bcn");
    }
}
