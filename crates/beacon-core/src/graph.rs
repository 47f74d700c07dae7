//! The observable dependency graph driving incremental revalidation.
//!
//! [`DependencyGraph`] is a directed graph of string-keyed nodes where each
//! node declares the set of other node keys it depends on, without knowing
//! whether those keys currently exist. Mutating a node emits a [`ChangeEvent`]
//! that propagates to every transitive dependent, with an at-most-once
//! guarantee per key per originating change (the `notified` set), so diamond
//! shapes and true cycles both terminate.
//!
//! Keys referenced before they are declared are interned as *placeholder*
//! nodes. A later `add_or_replace` of that key upgrades the placeholder in
//! place, so dependents registered early are notified when the key finally
//! appears. Missing keys are never errors anywhere in this API.
//!
//! Subscriptions are handle-based: [`DependencyGraph::on_change`] returns a
//! [`SubscriptionToken`] which [`DependencyGraph::unsubscribe`] consumes.
//! Listeners receive `&ChangeEvent` only, so they cannot re-enter the graph.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

/// A single change notification flowing through the graph.
///
/// Carries the key that originally changed and the set of keys already
/// notified during this propagation. The set is what makes cyclic and
/// diamond-shaped graphs safe: a key reachable via two paths is delivered
/// exactly once, and a cycle terminates instead of recursing forever.
pub struct ChangeEvent {
    source_key: String,
    notified: RefCell<HashSet<String>>,
}

impl ChangeEvent {
    fn new(source_key: impl Into<String>) -> Self {
        ChangeEvent {
            source_key: source_key.into(),
            notified: RefCell::new(HashSet::new()),
        }
    }

    /// The key whose mutation started this propagation.
    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    /// Returns true if `key` has not been notified yet, marking it notified.
    fn mark(&self, key: &str) -> bool {
        self.notified.borrow_mut().insert(key.to_string())
    }

    /// Number of keys notified so far (diagnostic accessor for tests).
    pub fn notified_count(&self) -> usize {
        self.notified.borrow().len()
    }
}

/// Opaque handle identifying one subscription, returned by
/// [`DependencyGraph::on_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

type ChangeListener = Rc<dyn Fn(&ChangeEvent)>;

/// Node payload: the key, whether the node was explicitly declared (as
/// opposed to interned as a placeholder target), and its declared
/// dependency list (sorted, deduplicated).
struct GraphNode {
    key: String,
    declared: bool,
    dependencies: Vec<String>,
}

/// Directed, observable graph of named nodes with change propagation.
pub struct DependencyGraph {
    inner: StableDiGraph<GraphNode, ()>,
    index: HashMap<String, NodeIndex>,
    subscribers: HashMap<String, Vec<(SubscriptionToken, ChangeListener)>>,
    token_keys: HashMap<SubscriptionToken, String>,
    next_token: u64,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .field("subscription_count", &self.token_keys.len())
            .finish()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph {
            inner: StableDiGraph::new(),
            index: HashMap::new(),
            subscribers: HashMap::new(),
            token_keys: HashMap::new(),
            next_token: 0,
        }
    }

    /// Looks up or creates the node for `key`. Created nodes start as
    /// placeholders until `add_or_replace` declares them.
    fn intern(&mut self, key: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(key) {
            return idx;
        }
        let idx = self.inner.add_node(GraphNode {
            key: key.to_string(),
            declared: false,
            dependencies: Vec::new(),
        });
        self.index.insert(key.to_string(), idx);
        idx
    }

    /// Declares (or redeclares) the node for `key` with the given dependency
    /// set. The list is sorted and deduplicated so dependency identity is
    /// order-independent. Any previous wiring for the key is torn down before
    /// the new edges go in, then a change event is emitted for `key` itself.
    pub fn add_or_replace<S: AsRef<str>>(&mut self, key: &str, dependencies: &[S]) {
        let mut deps: Vec<String> = dependencies
            .iter()
            .map(|d| d.as_ref().to_string())
            .collect();
        deps.sort();
        deps.dedup();

        let idx = self.intern(key);
        let old_edges: Vec<_> = self
            .inner
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for edge in old_edges {
            self.inner.remove_edge(edge);
        }

        for dep in &deps {
            let dep_idx = self.intern(dep);
            self.inner.add_edge(idx, dep_idx, ());
        }

        let node = &mut self.inner[idx];
        node.declared = true;
        node.dependencies = deps;

        self.emit_for(key);
    }

    /// Adds a single dependency to `key`, creating the node if absent.
    /// Idempotent: adding an already-present dependency is a complete no-op
    /// (no rebuild, no event).
    pub fn add_dependency(&mut self, key: &str, dependency_key: &str) {
        let mut deps = self
            .index
            .get(key)
            .map(|&idx| self.inner[idx].dependencies.clone())
            .unwrap_or_default();
        if deps.iter().any(|d| d == dependency_key) {
            return;
        }
        deps.push(dependency_key.to_string());
        self.add_or_replace(key, &deps);
    }

    /// Removes a single dependency from `key`. No-op when the node or the
    /// dependency entry does not exist.
    pub fn remove_dependency(&mut self, key: &str, dependency_key: &str) {
        let Some(&idx) = self.index.get(key) else {
            return;
        };
        let deps = &self.inner[idx].dependencies;
        if !deps.iter().any(|d| d == dependency_key) {
            return;
        }
        let deps: Vec<String> = deps
            .iter()
            .filter(|d| d.as_str() != dependency_key)
            .cloned()
            .collect();
        self.add_or_replace(key, &deps);
    }

    /// Removes the node for `key` and notifies its dependents that the
    /// dependency vanished. If other nodes still depend on `key`, the node
    /// survives as a placeholder so those edges stay intact; otherwise it is
    /// deleted outright. No-op for unknown or placeholder-only keys.
    pub fn remove(&mut self, key: &str) {
        let Some(&idx) = self.index.get(key) else {
            return;
        };
        if !self.inner[idx].declared {
            return;
        }

        let old_edges: Vec<_> = self
            .inner
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for edge in old_edges {
            self.inner.remove_edge(edge);
        }

        let has_dependents = self
            .inner
            .edges_directed(idx, Direction::Incoming)
            .next()
            .is_some();
        if has_dependents {
            let node = &mut self.inner[idx];
            node.declared = false;
            node.dependencies = Vec::new();
        } else {
            self.inner.remove_node(idx);
            self.index.remove(key);
        }

        self.emit_for(key);
    }

    /// Subscribes to change events for `key`. The key does not need to exist.
    /// Multiple independent subscribers per key are supported.
    pub fn on_change(
        &mut self,
        key: &str,
        listener: impl Fn(&ChangeEvent) + 'static,
    ) -> SubscriptionToken {
        let token = SubscriptionToken(self.next_token);
        self.next_token += 1;
        self.subscribers
            .entry(key.to_string())
            .or_default()
            .push((token, Rc::new(listener)));
        self.token_keys.insert(token, key.to_string());
        token
    }

    /// Releases the subscription identified by `token`. No-op for unknown or
    /// already-released tokens.
    pub fn unsubscribe(&mut self, token: SubscriptionToken) {
        let Some(key) = self.token_keys.remove(&token) else {
            return;
        };
        if let Some(list) = self.subscribers.get_mut(&key) {
            list.retain(|(t, _)| *t != token);
            if list.is_empty() {
                self.subscribers.remove(&key);
            }
        }
    }

    fn emit_for(&self, key: &str) {
        let event = ChangeEvent::new(key);
        self.emit(key, &event);
    }

    /// Delivers `event` to `key`'s subscribers, then propagates to every
    /// node that depends on `key`. The event's notified set guarantees
    /// at-most-once delivery per key per propagation.
    fn emit(&self, key: &str, event: &ChangeEvent) {
        if !event.mark(key) {
            return;
        }
        if let Some(list) = self.subscribers.get(key) {
            for (_, listener) in list {
                listener(event);
            }
        }
        if let Some(&idx) = self.index.get(key) {
            let dependents: Vec<String> = self
                .inner
                .edges_directed(idx, Direction::Incoming)
                .map(|e| self.inner[e.source()].key.clone())
                .collect();
            for dependent in dependents {
                self.emit(&dependent, event);
            }
        }
    }

    /// Computes the deduplicated transitive dependency closure of the given
    /// keys (the keys themselves are not seeded into the result). Traversal
    /// is iterative so deep or cyclic graphs cannot overflow the stack. Keys
    /// present in `exclude` are skipped along with everything only reachable
    /// through them.
    pub fn get_all_dependencies<S: AsRef<str>>(
        &self,
        keys: &[S],
        exclude: Option<&HashSet<String>>,
    ) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut result = Vec::new();
        let mut stack: Vec<String> = Vec::new();

        for key in keys {
            if let Some(&idx) = self.index.get(key.as_ref()) {
                for dep in &self.inner[idx].dependencies {
                    stack.push(dep.clone());
                }
            }
        }

        while let Some(key) = stack.pop() {
            if exclude.is_some_and(|ex| ex.contains(&key)) {
                continue;
            }
            if !seen.insert(key.clone()) {
                continue;
            }
            if let Some(&idx) = self.index.get(&key) {
                for dep in &self.inner[idx].dependencies {
                    stack.push(dep.clone());
                }
            }
            result.push(key);
        }

        result
    }

    /// The declared dependency list of `key`, or `None` for unknown or
    /// placeholder keys.
    pub fn dependencies_of(&self, key: &str) -> Option<&[String]> {
        let &idx = self.index.get(key)?;
        let node = &self.inner[idx];
        if node.declared {
            Some(&node.dependencies)
        } else {
            None
        }
    }

    /// True when `key` has been explicitly declared via `add_or_replace`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.index
            .get(key)
            .is_some_and(|&idx| self.inner[idx].declared)
    }

    /// Number of declared nodes (placeholders excluded).
    pub fn len(&self) -> usize {
        self.inner
            .node_weights()
            .filter(|node| node.declared)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live subscriptions for `key`.
    pub fn subscription_count(&self, key: &str) -> usize {
        self.subscribers.get(key).map_or(0, |list| list.len())
    }

    /// Number of live subscriptions across all keys.
    pub fn total_subscriptions(&self) -> usize {
        self.token_keys.len()
    }

    /// Releases every node and subscription. Safe to call once; the graph is
    /// empty but usable afterwards.
    pub fn dispose(&mut self) {
        self.inner.clear();
        self.index.clear();
        self.subscribers.clear();
        self.token_keys.clear();
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
