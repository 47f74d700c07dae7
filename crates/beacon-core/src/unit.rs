//! The parser/component-descriptor collaborator boundary.
//!
//! The real Beacon grammar parser and the XML component-description parser
//! live behind the [`Parser`] and [`ComponentDescriptor`] traits. This crate
//! only defines the data they must produce: [`ParsedUnit`] for script files
//! (declarations, imports, call sites, syntax diagnostics) and
//! [`ComponentInfo`] for component description files. Everything downstream
//! (symbol tables, scope validation, the dependency graph) consumes these
//! shapes and never the source text.

use serde::{Deserialize, Serialize};

use crate::diagnostic::{Diagnostic, Range};

/// A function or sub declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    /// Declared name, dot-qualified when declared inside a namespace
    /// (`Acme.Util.Log`). Original casing is preserved.
    pub name: String,
    /// Required parameter count.
    pub min_args: usize,
    /// Required plus optional parameter count.
    pub max_args: usize,
    pub range: Range,
}

/// A class declaration, optionally extending a parent class by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    pub parent_name: Option<String>,
    pub range: Range,
}

/// An interface declaration, optionally extending a parent interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    pub parent_name: Option<String>,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstDecl {
    pub name: String,
    pub range: Range,
}

/// A namespace block. Namespaces may be reopened across files and within a
/// file; each occurrence is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceDecl {
    pub name: String,
    pub range: Range,
}

/// A script import statement. `path` is the referenced package path with any
/// `pkg:/` prefix stripped, separators normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDecl {
    pub path: String,
    pub range: Range,
}

/// A call expression site, recorded for name-resolution and arity checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSite {
    /// Callee name as written, possibly dot-qualified.
    pub name: String,
    /// Namespace the call site appears in, for relative resolution.
    pub containing_namespace: Option<String>,
    pub arg_count: usize,
    pub range: Range,
}

/// Everything the parser collaborator reports about one script file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedUnit {
    pub functions: Vec<FunctionDecl>,
    pub classes: Vec<ClassDecl>,
    pub interfaces: Vec<InterfaceDecl>,
    pub enums: Vec<EnumDecl>,
    pub constants: Vec<ConstDecl>,
    pub namespaces: Vec<NamespaceDecl>,
    pub imports: Vec<ImportDecl>,
    pub calls: Vec<CallSite>,
    /// Syntax diagnostics, propagated unreinterpreted.
    pub diagnostics: Vec<Diagnostic>,
}

/// A `<script>` reference inside a component description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRef {
    /// Referenced package path, `pkg:/` prefix stripped.
    pub uri: String,
    pub range: Range,
}

/// Everything the component-descriptor collaborator reports about one
/// component description file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentInfo {
    /// Declared component name; `None` when the attribute is missing or
    /// unparseable (validation reports it).
    pub name: Option<String>,
    /// Declared parent component name from the `extends` attribute.
    pub parent_name: Option<String>,
    pub scripts: Vec<ScriptRef>,
    /// Range of the component element itself, anchor for name-level
    /// diagnostics.
    pub range: Range,
    pub diagnostics: Vec<Diagnostic>,
}

/// The script parser collaborator.
pub trait Parser {
    /// Parses `contents` into a [`ParsedUnit`]. `pkg_path` identifies the
    /// file for diagnostics. Must not fail: malformed input is reported via
    /// `ParsedUnit::diagnostics`.
    fn parse(&self, pkg_path: &str, contents: &str) -> ParsedUnit;
}

/// The component description parser collaborator.
pub trait ComponentDescriptor {
    /// Parses `contents` into a [`ComponentInfo`]. Must not fail: malformed
    /// input is reported via `ComponentInfo::diagnostics`.
    fn parse(&self, pkg_path: &str, contents: &str) -> ComponentInfo;
}
