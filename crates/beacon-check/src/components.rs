//! Component description checks: a component must carry a name, its
//! `extends` target must be loaded, and its script references must resolve.

use beacon_core::diagnostic::{messages, Diagnostic};
use beacon_core::path::pkg_key;

use crate::ScopeQuery;

pub fn check_component(query: &dyn ScopeQuery) -> Vec<Diagnostic> {
    let Some((pkg_path, info)) = query.component() else {
        return Vec::new();
    };

    let mut diagnostics = Vec::new();

    if info.name.is_none() {
        diagnostics.push(messages::component_missing_name().at(pkg_path, info.range));
    }

    if let Some(parent) = info.parent_name.as_deref() {
        if !query.component_exists(parent) {
            let child = info.name.as_deref().unwrap_or(pkg_path);
            diagnostics
                .push(messages::unknown_component_parent(parent, child).at(pkg_path, info.range));
        }
    }

    for script in &info.scripts {
        let target = pkg_key(&script.uri);
        if !query.has_file(&target) {
            diagnostics.push(
                messages::referenced_file_does_not_exist(&script.uri).at(pkg_path, script.range),
            );
        } else if query.parent_provides(&target) {
            diagnostics
                .push(messages::unnecessary_script_import(&script.uri).at(pkg_path, script.range));
        }
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::TestScope;
    use beacon_core::diagnostic::Range;
    use beacon_core::unit::{ComponentInfo, ScriptRef};

    fn widget_info(name: Option<&str>, extends: Option<&str>) -> ComponentInfo {
        ComponentInfo {
            name: name.map(str::to_string),
            parent_name: extends.map(str::to_string),
            scripts: Vec::new(),
            range: Range::on_line(1, 0, 40),
            diagnostics: Vec::new(),
        }
    }

    fn component_scope(info: ComponentInfo) -> TestScope {
        let mut scope = TestScope::new("components/widget.xml");
        scope.component = Some(("components/widget.xml".to_string(), info));
        scope
    }

    #[test]
    fn named_standalone_component_is_clean() {
        let scope = component_scope(widget_info(Some("Widget"), None));
        assert!(check_component(&scope).is_empty());
    }

    #[test]
    fn missing_name_is_reported() {
        let scope = component_scope(widget_info(None, None));
        let diagnostics = check_component(&scope);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, messages::COMPONENT_MISSING_NAME);
    }

    #[test]
    fn unknown_extends_is_a_warning() {
        let scope = component_scope(widget_info(Some("Widget"), Some("Ghost")));
        let diagnostics = check_component(&scope);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, messages::UNKNOWN_COMPONENT_PARENT);
    }

    #[test]
    fn known_extends_is_clean() {
        let mut scope = component_scope(widget_info(Some("Widget"), Some("Base")));
        scope.components.insert("base".to_string());
        assert!(check_component(&scope).is_empty());
    }

    #[test]
    fn script_ref_to_missing_file_is_reported() {
        let mut info = widget_info(Some("Widget"), None);
        info.scripts.push(ScriptRef {
            uri: "pkg:/components/widget.bcn".to_string(),
            range: Range::on_line(2, 2, 30),
        });
        let scope = component_scope(info);
        let diagnostics = check_component(&scope);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, messages::REFERENCED_FILE_DOES_NOT_EXIST);
    }

    #[test]
    fn script_ref_to_loaded_file_is_clean() {
        let mut info = widget_info(Some("Widget"), None);
        info.scripts.push(ScriptRef {
            uri: "pkg:/components/widget.bcn".to_string(),
            range: Range::on_line(2, 2, 30),
        });
        let mut scope = component_scope(info);
        scope.files.insert("components/widget.bcn".to_string());
        assert!(check_component(&scope).is_empty());
    }
}
