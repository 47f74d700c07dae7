//! Built-in collaborator implementations.
//!
//! [`DeclScanner`] is a line-oriented declaration extractor implementing the
//! [`Parser`] boundary: it recovers declarations, imports and call sites --
//! everything dependency and scope analysis needs -- without building a full
//! AST. The real recursive-descent grammar parser plugs in through the same
//! trait. [`ComponentMarkupReader`] implements the [`ComponentDescriptor`]
//! boundary for the small `<component>` markup subset.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use beacon_core::diagnostic::{messages, Position, Range};
use beacon_core::path::normalize_pkg_path;
use beacon_core::unit::{
    CallSite, ClassDecl, ComponentDescriptor, ComponentInfo, ConstDecl, EnumDecl, FunctionDecl,
    ImportDecl, InterfaceDecl, NamespaceDecl, ParsedUnit, Parser, ScriptRef,
};

lazy_static! {
    static ref FUNCTION_RE: Regex =
        Regex::new(r"(?i)^\s*(?:sub|function)\s+([A-Za-z_]\w*)\s*\(([^)]*)\)").unwrap();
    static ref CLASS_RE: Regex =
        Regex::new(r"(?i)^\s*class\s+([A-Za-z_][\w.]*)(?:\s+extends\s+([A-Za-z_][\w.]*))?")
            .unwrap();
    static ref INTERFACE_RE: Regex =
        Regex::new(r"(?i)^\s*interface\s+([A-Za-z_][\w.]*)(?:\s+extends\s+([A-Za-z_][\w.]*))?")
            .unwrap();
    static ref ENUM_RE: Regex = Regex::new(r"(?i)^\s*enum\s+([A-Za-z_][\w.]*)").unwrap();
    static ref CONST_RE: Regex = Regex::new(r"(?i)^\s*const\s+([A-Za-z_]\w*)").unwrap();
    static ref NAMESPACE_RE: Regex =
        Regex::new(r"(?i)^\s*namespace\s+([A-Za-z_][\w.]*)").unwrap();
    static ref END_NAMESPACE_RE: Regex = Regex::new(r"(?i)^\s*end\s+namespace\b").unwrap();
    static ref END_BLOCK_RE: Regex =
        Regex::new(r"(?i)^\s*end\s+(?:sub|function|class|interface|enum)\b").unwrap();
    static ref IMPORT_RE: Regex = Regex::new(r#"(?i)^\s*import\s+"([^"]+)""#).unwrap();
    static ref CALL_RE: Regex =
        Regex::new(r"([A-Za-z_]\w*(?:\.[A-Za-z_]\w*)*)\s*\(").unwrap();
    static ref KEYWORDS: HashSet<&'static str> = [
        "if", "while", "for", "return", "and", "or", "not", "then", "else", "elseif", "end",
        "sub", "function", "each", "to", "step", "in", "stop", "dim", "goto", "print", "as",
        "true", "false", "invalid",
    ]
    .into_iter()
    .collect();
}

/// The built-in line-oriented script scanner.
#[derive(Debug, Default)]
pub struct DeclScanner;

impl DeclScanner {
    pub fn new() -> Self {
        DeclScanner
    }
}

impl Parser for DeclScanner {
    fn parse(&self, pkg_path: &str, contents: &str) -> ParsedUnit {
        let mut unit = ParsedUnit::default();
        // Open namespace blocks: (segment as written, opening line).
        let mut namespace_stack: Vec<(String, u32)> = Vec::new();

        for (line_no, raw_line) in contents.lines().enumerate() {
            let line_no = line_no as u32;
            let line = strip_comment(raw_line);
            if line.trim().is_empty() {
                continue;
            }

            if END_NAMESPACE_RE.is_match(line) {
                if namespace_stack.pop().is_none() {
                    unit.diagnostics.push(
                        messages::syntax_error("'end namespace' without a matching 'namespace'")
                            .at(pkg_path, line_range(line_no, line)),
                    );
                }
                continue;
            }
            if let Some(caps) = NAMESPACE_RE.captures(line) {
                let name = caps.get(1).unwrap();
                unit.namespaces.push(NamespaceDecl {
                    name: qualify(&namespace_stack, name.as_str()),
                    range: match_range(line_no, &name),
                });
                namespace_stack.push((name.as_str().to_string(), line_no));
                continue;
            }
            if let Some(caps) = IMPORT_RE.captures(line) {
                let path = caps.get(1).unwrap();
                unit.imports.push(ImportDecl {
                    path: normalize_pkg_path(path.as_str()),
                    range: match_range(line_no, &path),
                });
                continue;
            }
            if let Some(caps) = FUNCTION_RE.captures(line) {
                let name = caps.get(1).unwrap();
                let (min_args, max_args) = count_params(caps.get(2).unwrap().as_str());
                unit.functions.push(FunctionDecl {
                    name: qualify(&namespace_stack, name.as_str()),
                    min_args,
                    max_args,
                    range: match_range(line_no, &name),
                });
                continue;
            }
            if let Some(caps) = CLASS_RE.captures(line) {
                let name = caps.get(1).unwrap();
                unit.classes.push(ClassDecl {
                    name: qualify(&namespace_stack, name.as_str()),
                    parent_name: caps.get(2).map(|m| m.as_str().to_string()),
                    range: match_range(line_no, &name),
                });
                continue;
            }
            if let Some(caps) = INTERFACE_RE.captures(line) {
                let name = caps.get(1).unwrap();
                unit.interfaces.push(InterfaceDecl {
                    name: qualify(&namespace_stack, name.as_str()),
                    parent_name: caps.get(2).map(|m| m.as_str().to_string()),
                    range: match_range(line_no, &name),
                });
                continue;
            }
            if let Some(caps) = ENUM_RE.captures(line) {
                let name = caps.get(1).unwrap();
                unit.enums.push(EnumDecl {
                    name: qualify(&namespace_stack, name.as_str()),
                    range: match_range(line_no, &name),
                });
                continue;
            }
            if let Some(caps) = CONST_RE.captures(line) {
                let name = caps.get(1).unwrap();
                unit.constants.push(ConstDecl {
                    name: qualify(&namespace_stack, name.as_str()),
                    range: match_range(line_no, &name),
                });
                continue;
            }
            if END_BLOCK_RE.is_match(line) {
                continue;
            }

            scan_calls(line, line_no, &namespace_stack, &mut unit);
        }

        for (name, opened_at) in &namespace_stack {
            unit.diagnostics.push(
                messages::syntax_error(&format!("namespace '{name}' is missing 'end namespace'"))
                    .at(pkg_path, Range::on_line(*opened_at, 0, name.len() as u32)),
            );
        }
        unit
    }
}

/// Drops a trailing `'` comment, respecting double-quoted strings.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '\'' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn qualify(stack: &[(String, u32)], name: &str) -> String {
    if stack.is_empty() {
        return name.to_string();
    }
    let prefix: Vec<&str> = stack.iter().map(|(segment, _)| segment.as_str()).collect();
    format!("{}.{}", prefix.join("."), name)
}

fn current_namespace(stack: &[(String, u32)]) -> Option<String> {
    if stack.is_empty() {
        return None;
    }
    let segments: Vec<&str> = stack.iter().map(|(segment, _)| segment.as_str()).collect();
    Some(segments.join("."))
}

/// `(required, total)` parameter counts; a `=` default marks optional.
fn count_params(params: &str) -> (usize, usize) {
    if params.trim().is_empty() {
        return (0, 0);
    }
    let mut depth = 0usize;
    let mut segments = vec![String::new()];
    for ch in params.chars() {
        match ch {
            '(' | '[' => {
                depth += 1;
                segments.last_mut().unwrap().push(ch);
            }
            ')' | ']' => {
                depth = depth.saturating_sub(1);
                segments.last_mut().unwrap().push(ch);
            }
            ',' if depth == 0 => segments.push(String::new()),
            _ => segments.last_mut().unwrap().push(ch),
        }
    }
    let total = segments.len();
    let required = segments.iter().filter(|s| !s.contains('=')).count();
    (required, total)
}

fn scan_calls(line: &str, line_no: u32, stack: &[(String, u32)], unit: &mut ParsedUnit) {
    for caps in CALL_RE.captures_iter(line) {
        let name = caps.get(1).unwrap();
        // A leading '.' means a chained method on an expression result, not
        // a resolvable callee.
        if name.start() > 0 && line.as_bytes()[name.start() - 1] == b'.' {
            continue;
        }
        let lowered = name.as_str().to_lowercase();
        if KEYWORDS.contains(lowered.as_str()) {
            continue;
        }
        let whole = caps.get(0).unwrap();
        unit.calls.push(CallSite {
            name: name.as_str().to_string(),
            containing_namespace: current_namespace(stack),
            arg_count: count_args(&line[whole.end()..]),
            range: match_range(line_no, &name),
        });
    }
}

/// Counts top-level arguments after an opening paren, stopping at the
/// matching close.
fn count_args(rest: &str) -> usize {
    let mut depth = 0usize;
    let mut commas = 0usize;
    let mut any = false;
    let mut in_string = false;
    for ch in rest.chars() {
        if in_string {
            if ch == '"' {
                in_string = false;
            }
            any = true;
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                any = true;
            }
            '(' | '[' => {
                depth += 1;
                any = true;
            }
            ')' if depth == 0 => break,
            ')' | ']' => {
                depth = depth.saturating_sub(1);
                any = true;
            }
            ',' if depth == 0 => commas += 1,
            c if !c.is_whitespace() => any = true,
            _ => {}
        }
    }
    if any {
        commas + 1
    } else {
        0
    }
}

fn match_range(line_no: u32, m: &regex::Match) -> Range {
    Range::new(line_no, m.start() as u32, line_no, m.end() as u32)
}

fn line_range(line_no: u32, line: &str) -> Range {
    Range::on_line(line_no, 0, line.trim_end().len() as u32)
}

lazy_static! {
    static ref COMPONENT_TAG_RE: Regex = Regex::new(r"(?is)<component\b([^>]*)>").unwrap();
    static ref SCRIPT_TAG_RE: Regex = Regex::new(r"(?is)<script\b([^>]*?)/?>").unwrap();
    static ref ATTR_RE: Regex = Regex::new(r#"([A-Za-z_][\w:-]*)\s*=\s*"([^"]*)""#).unwrap();
}

/// The built-in component description reader.
#[derive(Debug, Default)]
pub struct ComponentMarkupReader;

impl ComponentMarkupReader {
    pub fn new() -> Self {
        ComponentMarkupReader
    }
}

impl ComponentDescriptor for ComponentMarkupReader {
    fn parse(&self, pkg_path: &str, contents: &str) -> ComponentInfo {
        let mut info = ComponentInfo::default();
        let Some(caps) = COMPONENT_TAG_RE.captures(contents) else {
            info.diagnostics.push(
                messages::syntax_error("missing <component> element")
                    .at(pkg_path, Range::default()),
            );
            return info;
        };

        let tag = caps.get(0).unwrap();
        info.range = offset_range(contents, tag.start(), tag.end());

        for attr in ATTR_RE.captures_iter(caps.get(1).unwrap().as_str()) {
            let value = attr.get(2).unwrap().as_str();
            match attr.get(1).unwrap().as_str().to_lowercase().as_str() {
                "name" if !value.trim().is_empty() => info.name = Some(value.to_string()),
                "extends" if !value.trim().is_empty() => {
                    info.parent_name = Some(value.to_string())
                }
                _ => {}
            }
        }

        for script_caps in SCRIPT_TAG_RE.captures_iter(contents) {
            let tag = script_caps.get(0).unwrap();
            for attr in ATTR_RE.captures_iter(script_caps.get(1).unwrap().as_str()) {
                if attr.get(1).unwrap().as_str().eq_ignore_ascii_case("uri") {
                    info.scripts.push(ScriptRef {
                        uri: normalize_pkg_path(attr.get(2).unwrap().as_str()),
                        range: offset_range(contents, tag.start(), tag.end()),
                    });
                }
            }
        }
        info
    }
}

fn position_at(text: &str, offset: usize) -> Position {
    let mut line = 0u32;
    let mut character = 0u32;
    for (index, ch) in text.char_indices() {
        if index >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            character = 0;
        } else {
            character += 1;
        }
    }
    Position::new(line, character)
}

fn offset_range(text: &str, start: usize, end: usize) -> Range {
    Range {
        start: position_at(text, start),
        end: position_at(text, end),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(contents: &str) -> ParsedUnit {
        DeclScanner::new().parse("source/test.bcn", contents)
    }

    #[test]
    fn scans_functions_with_arity() {
        let unit = scan(
            "sub Main()\n\
             end sub\n\
             function Clamp(value, low = 0, high = 100)\n\
             end function\n",
        );
        assert_eq!(unit.functions.len(), 2);
        assert_eq!(unit.functions[0].name, "Main");
        assert_eq!((unit.functions[0].min_args, unit.functions[0].max_args), (0, 0));
        assert_eq!(unit.functions[1].name, "Clamp");
        assert_eq!((unit.functions[1].min_args, unit.functions[1].max_args), (1, 3));
    }

    #[test]
    fn scans_imports_with_normalized_paths() {
        let unit = scan("import \"pkg:/source/Util.bcn\"\n");
        assert_eq!(unit.imports.len(), 1);
        assert_eq!(unit.imports[0].path, "source/Util.bcn");
    }

    #[test]
    fn qualifies_declarations_inside_namespaces() {
        let unit = scan(
            "namespace Acme.Util\n\
             sub Log(message)\n\
             end sub\n\
             end namespace\n",
        );
        assert_eq!(unit.namespaces.len(), 1);
        assert_eq!(unit.namespaces[0].name, "Acme.Util");
        assert_eq!(unit.functions[0].name, "Acme.Util.Log");
    }

    #[test]
    fn records_calls_with_argument_counts() {
        let unit = scan(
            "sub Main()\n\
             \x20   DoSomething(1, 2)\n\
             \x20   Acme.Util.Log(\"a, b\")\n\
             end sub\n",
        );
        assert_eq!(unit.calls.len(), 2);
        assert_eq!(unit.calls[0].name, "DoSomething");
        assert_eq!(unit.calls[0].arg_count, 2);
        assert_eq!(unit.calls[1].name, "Acme.Util.Log");
        assert_eq!(unit.calls[1].arg_count, 1);
    }

    #[test]
    fn nested_call_arguments_count_once() {
        let unit = scan("sub Main()\n  Outer(Inner(1, 2), 3)\nend sub\n");
        let outer = unit.calls.iter().find(|c| c.name == "Outer").unwrap();
        assert_eq!(outer.arg_count, 2);
        let inner = unit.calls.iter().find(|c| c.name == "Inner").unwrap();
        assert_eq!(inner.arg_count, 2);
    }

    #[test]
    fn chained_method_calls_are_not_recorded() {
        let unit = scan("sub Main()\n  GetNode().Refresh()\nend sub\n");
        assert_eq!(unit.calls.len(), 1);
        assert_eq!(unit.calls[0].name, "GetNode");
    }

    #[test]
    fn keywords_are_not_calls() {
        let unit = scan("sub Main()\n  if (x) then\n    return (1)\n  end if\nend sub\n");
        assert!(unit.calls.is_empty());
    }

    #[test]
    fn comments_are_stripped() {
        let unit = scan("' DoSomething(1)\nsub Main() ' trailing comment\nend sub\n");
        assert!(unit.calls.is_empty());
        assert_eq!(unit.functions.len(), 1);
    }

    #[test]
    fn calls_inside_namespace_carry_containing_namespace() {
        let unit = scan(
            "namespace Acme\n\
             sub Go()\n\
             \x20   Helper()\n\
             end sub\n\
             end namespace\n",
        );
        assert_eq!(unit.calls.len(), 1);
        assert_eq!(unit.calls[0].containing_namespace.as_deref(), Some("Acme"));
    }

    #[test]
    fn unterminated_namespace_is_a_syntax_diagnostic() {
        let unit = scan("namespace Acme\nsub Go()\nend sub\n");
        assert_eq!(unit.diagnostics.len(), 1);
        assert_eq!(unit.diagnostics[0].code, messages::SYNTAX_ERROR);
    }

    #[test]
    fn stray_end_namespace_is_a_syntax_diagnostic() {
        let unit = scan("end namespace\n");
        assert_eq!(unit.diagnostics.len(), 1);
    }

    #[test]
    fn classes_and_interfaces_with_parents() {
        let unit = scan(
            "class Widget extends BaseWidget\n\
             end class\n\
             interface Greeter\n\
             end interface\n\
             enum Color\n\
             end enum\n\
             const MAX_DEPTH = 5\n",
        );
        assert_eq!(unit.classes.len(), 1);
        assert_eq!(unit.classes[0].parent_name.as_deref(), Some("BaseWidget"));
        assert_eq!(unit.interfaces.len(), 1);
        assert!(unit.interfaces[0].parent_name.is_none());
        assert_eq!(unit.enums.len(), 1);
        assert_eq!(unit.constants.len(), 1);
        assert_eq!(unit.constants[0].name, "MAX_DEPTH");
    }

    #[test]
    fn markup_reader_extracts_name_extends_and_scripts() {
        let info = ComponentMarkupReader::new().parse(
            "components/widget.xml",
            "<?xml version=\"1.0\" encoding=\"utf-8\" ?>\n\
             <component name=\"Widget\" extends=\"Group\">\n\
             \x20   <script type=\"text/beacon\" uri=\"pkg:/components/Widget.bcn\" />\n\
             </component>\n",
        );
        assert_eq!(info.name.as_deref(), Some("Widget"));
        assert_eq!(info.parent_name.as_deref(), Some("Group"));
        assert_eq!(info.scripts.len(), 1);
        assert_eq!(info.scripts[0].uri, "components/Widget.bcn");
        assert_eq!(info.range.start.line, 1);
        assert!(info.diagnostics.is_empty());
    }

    #[test]
    fn markup_reader_tolerates_missing_name() {
        let info = ComponentMarkupReader::new()
            .parse("components/widget.xml", "<component extends=\"Group\"></component>");
        assert!(info.name.is_none());
        assert_eq!(info.parent_name.as_deref(), Some("Group"));
        assert!(info.diagnostics.is_empty());
    }

    #[test]
    fn markup_reader_reports_missing_component_element() {
        let info = ComponentMarkupReader::new().parse("components/broken.xml", "<noise/>");
        assert_eq!(info.diagnostics.len(), 1);
        assert_eq!(info.diagnostics[0].code, messages::SYNTAX_ERROR);
    }
}
