//! Per-graph result cache keyed by task name.

use serde_json::Value;
use std::collections::HashMap;

/// Results already computed inside one task graph.
///
/// A cache belongs to exactly one graph instance; parent, child and sibling
/// graphs never see each other's entries.
#[derive(Debug, Clone, Default)]
pub struct TaskCache {
    results: HashMap<String, Value>,
}

impl TaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, task: &str) -> Option<&Value> {
        self.results.get(task)
    }

    pub fn contains(&self, task: &str) -> bool {
        self.results.contains_key(task)
    }

    /// Record a result. The first result stored for a task wins.
    pub fn insert(&mut self, task: impl Into<String>, value: Value) {
        self.results.entry(task.into()).or_insert(value);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
