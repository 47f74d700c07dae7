//! Structured findings produced by parsing and validation.
//!
//! A [`Diagnostic`] is always data, never an error: parse problems, duplicate
//! declarations, unresolved names and the rest of the semantic taxonomy are
//! collected on the owning file or scope and surfaced through the program's
//! read APIs. The [`messages`] module is the single catalog of diagnostic
//! codes and message constructors, so code numbers and wording stay
//! consistent across the check pipeline.

use serde::{Deserialize, Serialize};

/// Zero-based line/character position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Position { line, character }
    }
}

/// Half-open source range, start inclusive, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start_line: u32, start_character: u32, end_line: u32, end_character: u32) -> Self {
        Range {
            start: Position::new(start_line, start_character),
            end: Position::new(end_line, end_character),
        }
    }

    /// Span covering `len` characters on a single line.
    pub fn on_line(line: u32, start_character: u32, len: u32) -> Self {
        Range::new(line, start_character, line, start_character + len)
    }
}

/// Diagnostic severity, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    #[serde(alias = "warn")]
    Warning,
    #[serde(alias = "information")]
    Info,
    Hint,
}

impl Severity {
    /// Lenient parser for configuration values (`"error"`, `"warn"`,
    /// `"warning"`, `"info"`, `"information"`, `"hint"`, any case).
    /// Unrecognized values yield `None` and leave diagnostics untouched.
    pub fn from_config_str(value: &str) -> Option<Severity> {
        match value.to_lowercase().as_str() {
            "error" => Some(Severity::Error),
            "warn" | "warning" => Some(Severity::Warning),
            "info" | "information" => Some(Severity::Info),
            "hint" => Some(Severity::Hint),
            _ => None,
        }
    }
}

/// A cross-reference attached to a diagnostic (e.g. the other declaration
/// sites of a duplicated name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedInformation {
    pub message: String,
    pub pkg_path: String,
    pub range: Range,
}

/// A single structured finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Numeric code from the [`messages`] catalog.
    pub code: u16,
    pub severity: Severity,
    pub message: String,
    /// Package path of the owning file; empty for program-level findings
    /// until they are attached.
    pub pkg_path: String,
    pub range: Range,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<RelatedInformation>,
}

impl Diagnostic {
    pub fn new(code: u16, severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            severity,
            message: message.into(),
            pkg_path: String::new(),
            range: Range::default(),
            related: Vec::new(),
        }
    }

    /// Attaches the owning file and range.
    pub fn at(mut self, pkg_path: impl Into<String>, range: Range) -> Self {
        self.pkg_path = pkg_path.into();
        self.range = range;
        self
    }

    pub fn with_related(
        mut self,
        message: impl Into<String>,
        pkg_path: impl Into<String>,
        range: Range,
    ) -> Self {
        self.related.push(RelatedInformation {
            message: message.into(),
            pkg_path: pkg_path.into(),
            range,
        });
        self
    }

    /// The code as a string, the form severity overrides are keyed by.
    pub fn code_string(&self) -> String {
        self.code.to_string()
    }
}

/// The diagnostic catalog: one constructor per code.
pub mod messages {
    use super::{Diagnostic, Severity};

    pub const CALL_TO_UNKNOWN_FUNCTION: u16 = 1001;
    pub const MISMATCH_ARGUMENT_COUNT: u16 = 1002;
    pub const DUPLICATE_FUNCTION_IMPLEMENTATION: u16 = 1003;
    pub const REFERENCED_FILE_DOES_NOT_EXIST: u16 = 1004;
    pub const UNNECESSARY_SCRIPT_IMPORT: u16 = 1005;
    pub const UNKNOWN_COMPONENT_PARENT: u16 = 1006;
    pub const COMPONENT_MISSING_NAME: u16 = 1007;
    pub const DUPLICATE_COMPONENT_NAME: u16 = 1008;
    pub const NAME_COLLISION: u16 = 1009;
    pub const UNKNOWN_PARENT_CLASS: u16 = 1010;
    pub const CIRCULAR_INHERITANCE: u16 = 1011;
    pub const FILE_NOT_REFERENCED: u16 = 1012;
    pub const SYNTAX_ERROR: u16 = 1013;
    pub const UNKNOWN_PARENT_INTERFACE: u16 = 1014;

    pub fn call_to_unknown_function(name: &str, scope_name: &str) -> Diagnostic {
        Diagnostic::new(
            CALL_TO_UNKNOWN_FUNCTION,
            Severity::Error,
            format!("cannot find name '{name}' in scope '{scope_name}'"),
        )
    }

    pub fn mismatch_argument_count(name: &str, expected: &str, actual: usize) -> Diagnostic {
        Diagnostic::new(
            MISMATCH_ARGUMENT_COUNT,
            Severity::Error,
            format!("'{name}' expects {expected} argument(s), got {actual}"),
        )
    }

    pub fn duplicate_function_implementation(name: &str, scope_name: &str) -> Diagnostic {
        Diagnostic::new(
            DUPLICATE_FUNCTION_IMPLEMENTATION,
            Severity::Error,
            format!("duplicate function implementation for '{name}' in scope '{scope_name}'"),
        )
    }

    pub fn referenced_file_does_not_exist(path: &str) -> Diagnostic {
        Diagnostic::new(
            REFERENCED_FILE_DOES_NOT_EXIST,
            Severity::Error,
            format!("referenced file 'pkg:/{path}' does not exist"),
        )
    }

    pub fn unnecessary_script_import(path: &str) -> Diagnostic {
        Diagnostic::new(
            UNNECESSARY_SCRIPT_IMPORT,
            Severity::Warning,
            format!("unnecessary import: 'pkg:/{path}' is already provided by a parent scope"),
        )
    }

    pub fn unknown_component_parent(parent: &str, child: &str) -> Diagnostic {
        Diagnostic::new(
            UNKNOWN_COMPONENT_PARENT,
            Severity::Warning,
            format!("component '{child}' extends unknown component '{parent}'"),
        )
    }

    pub fn component_missing_name() -> Diagnostic {
        Diagnostic::new(
            COMPONENT_MISSING_NAME,
            Severity::Error,
            "component is missing a 'name' attribute".to_string(),
        )
    }

    pub fn duplicate_component_name(name: &str) -> Diagnostic {
        Diagnostic::new(
            DUPLICATE_COMPONENT_NAME,
            Severity::Error,
            format!("there are multiple components with the name '{name}'"),
        )
    }

    pub fn name_collision(name: &str, other_kind: &str) -> Diagnostic {
        Diagnostic::new(
            NAME_COLLISION,
            Severity::Error,
            format!("'{name}' is already declared as a {other_kind}"),
        )
    }

    pub fn unknown_parent_class(name: &str) -> Diagnostic {
        Diagnostic::new(
            UNKNOWN_PARENT_CLASS,
            Severity::Error,
            format!("cannot find parent class '{name}'"),
        )
    }

    pub fn unknown_parent_interface(name: &str) -> Diagnostic {
        Diagnostic::new(
            UNKNOWN_PARENT_INTERFACE,
            Severity::Error,
            format!("cannot find parent interface '{name}'"),
        )
    }

    pub fn circular_inheritance(name: &str) -> Diagnostic {
        Diagnostic::new(
            CIRCULAR_INHERITANCE,
            Severity::Error,
            format!("'{name}' has a circular inheritance chain"),
        )
    }

    pub fn file_not_referenced(pkg_path: &str) -> Diagnostic {
        Diagnostic::new(
            FILE_NOT_REFERENCED,
            Severity::Warning,
            format!("'pkg:/{pkg_path}' is not referenced by any file in the project"),
        )
    }

    pub fn syntax_error(detail: &str) -> Diagnostic {
        Diagnostic::new(SYNTAX_ERROR, Severity::Error, detail.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_config_parsing_is_lenient() {
        assert_eq!(Severity::from_config_str("error"), Some(Severity::Error));
        assert_eq!(Severity::from_config_str("WARN"), Some(Severity::Warning));
        assert_eq!(Severity::from_config_str("warning"), Some(Severity::Warning));
        assert_eq!(Severity::from_config_str("info"), Some(Severity::Info));
        assert_eq!(Severity::from_config_str("hint"), Some(Severity::Hint));
        assert_eq!(Severity::from_config_str("fatal"), None);
    }

    #[test]
    fn builder_attaches_location_and_related() {
        let diag = messages::duplicate_component_name("Widget")
            .at("components/widget.xml", Range::on_line(1, 0, 9))
            .with_related(
                "also declared here",
                "components/other/widget.xml",
                Range::on_line(0, 0, 9),
            );
        assert_eq!(diag.code, messages::DUPLICATE_COMPONENT_NAME);
        assert_eq!(diag.pkg_path, "components/widget.xml");
        assert_eq!(diag.related.len(), 1);
        assert_eq!(diag.code_string(), "1008");
    }

    #[test]
    fn serde_roundtrip() {
        let diag = messages::call_to_unknown_function("DoSomething", "source")
            .at("source/main.bcn", Range::on_line(3, 4, 11));
        let json = serde_json::to_string(&diag).unwrap();
        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(diag, back);
    }

    #[test]
    fn severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }
}
