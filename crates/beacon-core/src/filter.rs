//! Diagnostic post-processing: suppression filters and severity overrides.
//!
//! `get_diagnostics` applies these in a fixed order: the filter pass decides
//! membership first, then the override pass adjusts severities of whatever
//! survived. An override can therefore never resurrect a filtered-out
//! diagnostic.

use std::collections::HashMap;

use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};

use crate::diagnostic::{Diagnostic, Severity};
use crate::error::CoreError;

/// One code value in a filter entry; numbers and strings are both accepted
/// in configuration and compared as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodeMatcher {
    Number(u32),
    Text(String),
}

impl CodeMatcher {
    fn as_string(&self) -> String {
        match self {
            CodeMatcher::Number(n) => n.to_string(),
            CodeMatcher::Text(s) => s.clone(),
        }
    }
}

/// A single suppression rule. `src` is a glob over package paths; `codes`
/// is a list of diagnostic codes. A rule with both fields requires both to
/// match; a rule with one field matches on that field alone. A rule with
/// neither field matches nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticFilter {
    pub src: Option<String>,
    pub codes: Option<Vec<CodeMatcher>>,
}

struct CompiledFilter {
    src: Option<GlobMatcher>,
    codes: Option<Vec<String>>,
}

/// Compiled filter set applied by `get_diagnostics` before severity
/// overrides.
pub struct DiagnosticFilterer {
    entries: Vec<CompiledFilter>,
}

impl DiagnosticFilterer {
    pub fn new(filters: &[DiagnosticFilter]) -> Result<Self, CoreError> {
        let mut entries = Vec::with_capacity(filters.len());
        for filter in filters {
            let src = match &filter.src {
                Some(pattern) => Some(
                    Glob::new(pattern)
                        .map_err(|e| CoreError::InvalidFilterGlob {
                            glob: pattern.clone(),
                            reason: e.to_string(),
                        })?
                        .compile_matcher(),
                ),
                None => None,
            };
            let codes = filter
                .codes
                .as_ref()
                .map(|codes| codes.iter().map(CodeMatcher::as_string).collect());
            entries.push(CompiledFilter { src, codes });
        }
        Ok(DiagnosticFilterer { entries })
    }

    /// True when any rule suppresses this diagnostic.
    pub fn is_suppressed(&self, diagnostic: &Diagnostic) -> bool {
        let code = diagnostic.code_string();
        self.entries.iter().any(|entry| {
            let src_matches = match &entry.src {
                Some(matcher) => matcher.is_match(&diagnostic.pkg_path),
                None => true,
            };
            let code_matches = match &entry.codes {
                Some(codes) => codes.iter().any(|c| *c == code),
                None => true,
            };
            let has_criteria = entry.src.is_some() || entry.codes.is_some();
            has_criteria && src_matches && code_matches
        })
    }
}

/// Applies configured severity overrides in place. Keys are diagnostic codes
/// compared as strings; unrecognized severity values and unknown codes leave
/// diagnostics untouched.
pub fn apply_severity_overrides(
    overrides: &HashMap<String, String>,
    diagnostics: &mut [Diagnostic],
) {
    if overrides.is_empty() {
        return;
    }
    for diagnostic in diagnostics {
        if let Some(value) = overrides.get(&diagnostic.code_string()) {
            if let Some(severity) = Severity::from_config_str(value) {
                diagnostic.severity = severity;
            }
        }
    }
}
