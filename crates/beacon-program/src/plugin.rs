//! Lifecycle hooks observed by plugins.
//!
//! The program emits a fixed set of before/after events around its state
//! mutations: "before" fires strictly before the mutation, "after" strictly
//! after with the mutated state already visible. Payloads are lightweight
//! value types; observers that need more query the program afterwards.

use std::rc::Rc;

/// Payload for file-level hooks.
#[derive(Debug, Clone)]
pub struct FileEvent {
    pub pkg_path: String,
}

/// Payload for scope-level hooks.
#[derive(Debug, Clone)]
pub struct ScopeEvent {
    pub name: String,
}

/// Observer of program lifecycle events. Every method defaults to a no-op;
/// implement only what you need.
pub trait Plugin {
    fn before_file_parse(&self, _event: &FileEvent) {}
    fn after_file_parse(&self, _event: &FileEvent) {}
    fn before_file_validate(&self, _event: &FileEvent) {}
    fn after_file_validate(&self, _event: &FileEvent) {}
    fn before_program_validate(&self) {}
    fn after_program_validate(&self) {}
    fn before_scope_create(&self, _event: &ScopeEvent) {}
    fn after_scope_create(&self, _event: &ScopeEvent) {}
    fn before_scope_dispose(&self, _event: &ScopeEvent) {}
    fn after_scope_dispose(&self, _event: &ScopeEvent) {}
    fn before_file_dispose(&self, _event: &FileEvent) {}
    fn after_file_dispose(&self, _event: &FileEvent) {}
    fn before_program_dispose(&self) {}
    fn after_program_dispose(&self) {}
}

/// Ordered plugin registry. Plugins fire in registration order.
#[derive(Default)]
pub struct PluginSet {
    plugins: Vec<Rc<dyn Plugin>>,
}

impl PluginSet {
    pub fn new() -> Self {
        PluginSet::default()
    }

    pub fn add(&mut self, plugin: Rc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub(crate) fn emit(&self, f: impl Fn(&dyn Plugin)) {
        for plugin in &self.plugins {
            f(plugin.as_ref());
        }
    }
}
