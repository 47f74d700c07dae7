//! End-to-end lifecycle tests: edits modeled as remove+add, cache-respecting
//! revalidation, and change propagation precision.

use std::cell::RefCell;
use std::rc::Rc;

use beacon_core::diagnostic::{messages, Severity};
use beacon_program::testing::{test_options, test_program, CountingParser};
use beacon_program::{ComponentMarkupReader, FileEvent, Plugin, Program, ScopeEvent};

const MAIN_CALLING_DOSOMETHING: &str = "sub Main()\n    DoSomething()\nend sub\n";
const LIB_SINGLE: &str = "sub DoSomething()\nend sub\n";
const LIB_DUPLICATED: &str = "sub DoSomething()\nend sub\nsub DoSomething()\nend sub\n";

fn widget_markup(name: &str, extends: Option<&str>, script: Option<&str>) -> String {
    let extends = extends
        .map(|parent| format!(" extends=\"{parent}\""))
        .unwrap_or_default();
    let script = script
        .map(|uri| format!("    <script type=\"text/beacon\" uri=\"{uri}\" />\n"))
        .unwrap_or_default();
    format!("<component name=\"{name}\"{extends}>\n{script}</component>\n")
}

#[test]
fn duplicate_function_scenario_end_to_end() {
    let mut program = test_program();
    program
        .set_file("pkg:/source/main.bcn", MAIN_CALLING_DOSOMETHING)
        .unwrap();
    program.set_file("pkg:/source/lib.bcn", LIB_SINGLE).unwrap();

    program.validate();
    assert_eq!(program.get_diagnostics(), vec![]);

    // Redefine the lib with a duplicated implementation.
    program
        .set_file("pkg:/source/lib.bcn", LIB_DUPLICATED)
        .unwrap();
    program.validate();
    let diagnostics = program.get_diagnostics();
    assert_eq!(diagnostics.len(), 2);
    for diagnostic in &diagnostics {
        assert_eq!(diagnostic.code, messages::DUPLICATE_FUNCTION_IMPLEMENTATION);
        assert_eq!(diagnostic.pkg_path, "source/lib.bcn");
        assert!(diagnostic.message.contains("in scope 'source'"));
    }

    // Remove the lib entirely: the call site no longer resolves.
    assert!(program.remove_file("pkg:/source/lib.bcn"));
    program.validate();
    let diagnostics = program.get_diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, messages::CALL_TO_UNKNOWN_FUNCTION);
    assert!(diagnostics[0].message.contains("DoSomething"));
}

#[test]
fn revalidation_is_idempotent_and_reparses_nothing() {
    let (parser, parse_count) = CountingParser::new();
    let mut program = Program::with_collaborators(
        test_options(),
        Box::new(parser),
        Box::new(ComponentMarkupReader::new()),
    )
    .unwrap();

    program
        .set_file("pkg:/source/main.bcn", MAIN_CALLING_DOSOMETHING)
        .unwrap();
    program.set_file("pkg:/source/lib.bcn", LIB_SINGLE).unwrap();
    assert_eq!(parse_count.get(), 2);

    program.validate();
    let first = program.get_diagnostics();
    program.validate();
    let second = program.get_diagnostics();

    assert_eq!(first, second);
    assert_eq!(parse_count.get(), 2, "validate must not re-parse");
}

#[test]
fn invalidation_is_precise_across_unrelated_scopes() {
    let mut program = test_program();
    program
        .set_file(
            "pkg:/components/alpha.xml",
            &widget_markup("Alpha", None, Some("pkg:/components/alpha.bcn")),
        )
        .unwrap();
    program
        .set_file("pkg:/components/alpha.bcn", "sub AlphaInit()\nend sub\n")
        .unwrap();
    program
        .set_file(
            "pkg:/components/beta.xml",
            &widget_markup("Beta", None, Some("pkg:/components/beta.bcn")),
        )
        .unwrap();
    program
        .set_file("pkg:/components/beta.bcn", "sub BetaInit()\nend sub\n")
        .unwrap();

    program.validate();
    assert!(program.get_scope("components/alpha.xml").unwrap().is_validated());
    assert!(program.get_scope("components/beta.xml").unwrap().is_validated());

    // Mutating alpha's script must stale alpha's scope and leave beta alone.
    program
        .set_file(
            "pkg:/components/alpha.bcn",
            "sub AlphaInit(config)\nend sub\n",
        )
        .unwrap();
    assert!(!program.get_scope("components/alpha.xml").unwrap().is_validated());
    assert!(program.get_scope("components/beta.xml").unwrap().is_validated());
}

#[test]
fn repeated_edits_do_not_leak_graph_subscriptions() {
    let mut program = test_program();
    program
        .set_file(
            "pkg:/components/alpha.xml",
            &widget_markup("Alpha", None, Some("pkg:/components/alpha.bcn")),
        )
        .unwrap();
    program
        .set_file("pkg:/components/alpha.bcn", "sub AlphaInit()\nend sub\n")
        .unwrap();
    program.validate();

    let baseline = program.dependency_graph().total_subscriptions();
    for revision in 0..25 {
        program
            .set_file(
                "pkg:/components/alpha.bcn",
                &format!("sub AlphaInit()\n    value = {revision}\nend sub\n"),
            )
            .unwrap();
        program.validate();
    }
    assert_eq!(program.dependency_graph().total_subscriptions(), baseline);
    assert_eq!(
        program
            .dependency_graph()
            .dependencies_of("component:alpha")
            .map(<[String]>::len),
        Some(1)
    );
}

#[test]
fn component_loaded_before_its_parent_recovers_when_parent_appears() {
    let mut program = test_program();
    program
        .set_file(
            "pkg:/components/child.xml",
            &widget_markup("Child", Some("Base"), None),
        )
        .unwrap();
    program.validate();

    let diagnostics = program.get_diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, messages::UNKNOWN_COMPONENT_PARENT);
    assert_eq!(diagnostics[0].severity, Severity::Warning);

    // Loading the parent later must stale the child's scope automatically.
    program
        .set_file("pkg:/components/base.xml", &widget_markup("Base", None, None))
        .unwrap();
    assert!(!program.get_scope("components/child.xml").unwrap().is_validated());

    program.validate();
    assert_eq!(program.get_diagnostics(), vec![]);
}

#[test]
fn import_closure_follows_imports_only() {
    let mut program = test_program();
    program
        .set_file(
            "pkg:/source/a.bcn",
            "import \"pkg:/source/b.bcn\"\nsub A()\nend sub\n",
        )
        .unwrap();
    program
        .set_file(
            "pkg:/source/b.bcn",
            "import \"pkg:/source/c.bcn\"\nsub B()\nend sub\n",
        )
        .unwrap();
    program.set_file("pkg:/source/c.bcn", "sub C()\nend sub\n").unwrap();
    program
        .set_file(
            "pkg:/source/d.bcn",
            "import \"pkg:/source/c.bcn\"\nsub D()\nend sub\n",
        )
        .unwrap();

    let closure = program
        .dependency_graph()
        .get_all_dependencies(&["source/a.bcn"], None);
    assert!(closure.contains(&"source/b.bcn".to_string()));
    assert!(closure.contains(&"source/c.bcn".to_string()));
    assert!(!closure.contains(&"source/d.bcn".to_string()));

    let union = program
        .dependency_graph()
        .get_all_dependencies(&["source/a.bcn", "source/d.bcn"], None);
    assert!(union.contains(&"source/b.bcn".to_string()));
    assert!(union.contains(&"source/c.bcn".to_string()));
    let c_count = union.iter().filter(|key| *key == "source/c.bcn").count();
    assert_eq!(c_count, 1, "union closure must deduplicate");
}

#[test]
fn removing_a_source_file_drops_the_source_scope_edge() {
    let mut program = test_program();
    program
        .set_file("pkg:/source/main.bcn", MAIN_CALLING_DOSOMETHING)
        .unwrap();
    program.set_file("pkg:/source/lib.bcn", LIB_SINGLE).unwrap();
    assert!(program
        .dependency_graph()
        .dependencies_of("scope:source")
        .unwrap()
        .contains(&"source/lib.bcn".to_string()));

    program.remove_file("pkg:/source/lib.bcn");
    assert!(!program
        .dependency_graph()
        .dependencies_of("scope:source")
        .unwrap()
        .contains(&"source/lib.bcn".to_string()));
}

#[test]
fn readiness_gate_flips_after_first_validate() {
    let mut program = test_program();
    assert!(!program.is_ready());
    program
        .set_file("pkg:/source/main.bcn", "sub Main()\nend sub\n")
        .unwrap();
    assert!(!program.is_ready());
    program.validate();
    assert!(program.is_ready());
}

#[test]
fn remove_of_unknown_file_is_a_noop() {
    let mut program = test_program();
    assert!(!program.remove_file("pkg:/source/ghost.bcn"));
}

#[test]
fn file_lookup_by_pkg_and_src_path() {
    let mut program = test_program();
    program
        .set_file("pkg:/source/Main.bcn", "sub Main()\nend sub\n")
        .unwrap();

    let by_pkg = program.get_file("pkg:/source/main.bcn").unwrap();
    assert_eq!(by_pkg.pkg_path(), "source/Main.bcn");
    let by_src = program.get_file("/proj/source/main.bcn").unwrap();
    assert_eq!(by_src.pkg_key(), "source/main.bcn");
}

struct Recorder {
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl Plugin for Recorder {
    fn before_file_parse(&self, _: &FileEvent) {
        self.log.borrow_mut().push("before_file_parse");
    }
    fn after_file_parse(&self, _: &FileEvent) {
        self.log.borrow_mut().push("after_file_parse");
    }
    fn before_file_validate(&self, _: &FileEvent) {
        self.log.borrow_mut().push("before_file_validate");
    }
    fn after_file_validate(&self, _: &FileEvent) {
        self.log.borrow_mut().push("after_file_validate");
    }
    fn before_program_validate(&self) {
        self.log.borrow_mut().push("before_program_validate");
    }
    fn after_program_validate(&self) {
        self.log.borrow_mut().push("after_program_validate");
    }
    fn before_scope_create(&self, _: &ScopeEvent) {
        self.log.borrow_mut().push("before_scope_create");
    }
    fn after_scope_create(&self, _: &ScopeEvent) {
        self.log.borrow_mut().push("after_scope_create");
    }
    fn before_file_dispose(&self, _: &FileEvent) {
        self.log.borrow_mut().push("before_file_dispose");
    }
    fn after_file_dispose(&self, _: &FileEvent) {
        self.log.borrow_mut().push("after_file_dispose");
    }
    fn before_program_dispose(&self) {
        self.log.borrow_mut().push("before_program_dispose");
    }
    fn after_program_dispose(&self) {
        self.log.borrow_mut().push("after_program_dispose");
    }
}

#[test]
fn plugin_hooks_fire_in_lifecycle_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut program = test_program();
    program.add_plugin(Rc::new(Recorder { log: Rc::clone(&log) }));

    program
        .set_file("pkg:/source/main.bcn", "sub Main()\nend sub\n")
        .unwrap();
    assert_eq!(
        log.borrow().as_slice(),
        &[
            "before_file_parse",
            "after_file_parse",
            "before_scope_create",
            "after_scope_create",
        ]
    );

    log.borrow_mut().clear();
    program.validate();
    assert_eq!(
        log.borrow().as_slice(),
        &[
            "before_program_validate",
            "before_file_validate",
            "after_file_validate",
            "after_program_validate",
        ]
    );

    log.borrow_mut().clear();
    program.remove_file("pkg:/source/main.bcn");
    assert_eq!(
        log.borrow().as_slice(),
        &["before_file_dispose", "after_file_dispose"]
    );

    log.borrow_mut().clear();
    drop(program);
    assert_eq!(
        log.borrow().as_slice(),
        &["before_program_dispose", "after_program_dispose"]
    );
}
