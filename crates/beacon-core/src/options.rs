//! Program configuration.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::filter::DiagnosticFilter;

/// Options controlling file classification, diagnostics post-processing and
/// path resolution. Deserializable so callers can load them from a project
/// config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProgramOptions {
    /// Project root all paths resolve against.
    pub root_dir: PathBuf,
    /// Package directory holding source scripts (the implicit source scope).
    pub source_dir: String,
    /// Package directory holding component description files.
    pub components_dir: String,
    /// Script file extension.
    pub script_extension: String,
    /// Typedef companion extension (declarations-only sibling files).
    pub typedef_extension: String,
    /// Component description extension.
    pub component_extension: String,
    /// Suppression rules applied before severity overrides.
    pub diagnostic_filters: Vec<DiagnosticFilter>,
    /// Diagnostic-code (as string) to severity name overrides.
    pub diagnostic_severity_overrides: HashMap<String, String>,
}

impl Default for ProgramOptions {
    fn default() -> Self {
        ProgramOptions {
            root_dir: PathBuf::from("."),
            source_dir: "source".to_string(),
            components_dir: "components".to_string(),
            script_extension: "bcn".to_string(),
            typedef_extension: "d.bcn".to_string(),
            component_extension: "xml".to_string(),
            diagnostic_filters: Vec::new(),
            diagnostic_severity_overrides: HashMap::new(),
        }
    }
}

impl ProgramOptions {
    /// Options rooted at `root_dir`, everything else defaulted.
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        ProgramOptions {
            root_dir: root_dir.into(),
            ..ProgramOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ProgramOptions::default();
        assert_eq!(options.source_dir, "source");
        assert_eq!(options.components_dir, "components");
        assert_eq!(options.script_extension, "bcn");
        assert_eq!(options.typedef_extension, "d.bcn");
    }

    #[test]
    fn deserializes_partial_config() {
        let options: ProgramOptions = serde_json::from_str(
            r#"{
                "rootDir": "/proj",
                "diagnosticSeverityOverrides": { "1005": "hint" }
            }"#,
        )
        .unwrap();
        assert_eq!(options.root_dir, PathBuf::from("/proj"));
        assert_eq!(
            options.diagnostic_severity_overrides.get("1005"),
            Some(&"hint".to_string())
        );
        assert_eq!(options.script_extension, "bcn");
    }
}
