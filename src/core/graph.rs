//! Task graph built from a decomposition.
//!
//! TaskGraph stores task nodes in a petgraph `DiGraph` whose edge weights
//! carry the optional branch condition of each edge. Every graph owns a
//! private result cache and shares the ledger of the task that spawned it.

use crate::core::cache::TaskCache;
use crate::core::decomposition::Decomposition;
use crate::core::ledger::{Ledger, LedgerEntry, RUNNING};
use crate::core::task::{is_end_marker, TaskNode};
use crate::error::{Error, Result};
use crate::orchestration::Engine;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

/// A directed graph of task nodes.
pub struct TaskGraph {
    /// Nodes are tasks; edge weights are branch conditions.
    graph: DiGraph<TaskNode, Option<String>>,
    /// Task name to node index.
    index: HashMap<String, NodeIndex>,
    /// Start node declared explicitly.
    declared_start: Option<NodeIndex>,
    /// Source of the first edge added, the implicit start.
    first_source: Option<NodeIndex>,
    cache: TaskCache,
    ledger: Ledger,
    /// Name of the task this graph decomposes.
    parent: Option<String>,
}

impl TaskGraph {
    /// Create an empty graph appending to `ledger`.
    pub fn new(ledger: Ledger, parent: Option<&str>) -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            declared_start: None,
            first_source: None,
            cache: TaskCache::new(),
            ledger,
            parent: parent.map(str::to_string),
        }
    }

    /// Build and wire the graph a decomposition describes.
    ///
    /// Each declared node becomes a child of `parent` sharing its ledger.
    /// Once wiring succeeds the marker `{parent.goal: "RUNNING"}` is
    /// appended to the ledger.
    ///
    /// # Errors
    /// - `MalformedDecomposition` for duplicate ids or a missing end marker
    /// - `UnknownNodeReference` for edges or a start naming undeclared nodes
    pub fn from_decomposition(payload: &Decomposition, parent: &TaskNode) -> Result<Self> {
        if !payload.nodes.iter().any(|node| is_end_marker(&node.id)) {
            return Err(Error::MalformedDecomposition {
                task: parent.name.clone(),
                reason: "no END node declared".to_string(),
                payload: serde_json::to_string(payload).unwrap_or_default(),
            });
        }

        let mut graph = Self::new(parent.ledger().clone(), Some(&parent.name));
        for spec in &payload.nodes {
            graph.add_node(TaskNode::child_of(parent, spec))?;
        }
        for edge in &payload.edges {
            graph.add_edge(&edge.source, &edge.target, edge.condition.as_deref())?;
        }
        if let Some(start) = &payload.start {
            graph.set_start(start)?;
        }

        if graph.is_cyclic() {
            crate::twlog_debug!("Graph for '{}' contains a cycle", parent.name);
        }

        parent.ledger().append(parent.goal.clone(), RUNNING);
        Ok(graph)
    }

    fn owner(&self) -> String {
        self.parent.clone().unwrap_or_else(|| "<graph>".to_string())
    }

    fn lookup(&self, name: &str) -> Result<NodeIndex> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownNodeReference {
                task: self.owner(),
                node: name.to_string(),
            })
    }

    /// Add a task to the graph.
    ///
    /// # Errors
    /// Returns an error if a task with the same name exists or the task
    /// does not share this graph's ledger.
    pub fn add_node(&mut self, node: TaskNode) -> Result<NodeIndex> {
        if self.index.contains_key(&node.name) {
            return Err(Error::MalformedDecomposition {
                task: self.owner(),
                reason: format!("duplicate node id '{}'", node.name),
                payload: node.name,
            });
        }
        if !node.ledger().shares_with(&self.ledger) {
            return Err(Error::Validation(format!(
                "Task {} does not share the graph's ledger",
                node.name
            )));
        }

        let name = node.name.clone();
        let index = self.graph.add_node(node);
        self.index.insert(name, index);
        Ok(index)
    }

    /// Add an edge from `source` to `target`, optionally guarded by a condition.
    ///
    /// A repeated (source, target) pair keeps the first edge.
    pub fn add_edge(&mut self, source: &str, target: &str, condition: Option<&str>) -> Result<()> {
        let from = self.lookup(source)?;
        let to = self.lookup(target)?;

        if self.graph.find_edge(from, to).is_some() {
            crate::twlog_debug!("Ignoring repeated edge {} -> {}", source, target);
            return Ok(());
        }

        self.graph.add_edge(from, to, condition.map(str::to_string));
        self.first_source.get_or_insert(from);
        Ok(())
    }

    /// Declare the start node explicitly.
    pub fn set_start(&mut self, name: &str) -> Result<()> {
        self.declared_start = Some(self.lookup(name)?);
        Ok(())
    }

    /// Index of the start node: declared, else first edge source, else first node.
    pub fn start_index(&self) -> Option<NodeIndex> {
        self.declared_start
            .or(self.first_source)
            .or_else(|| self.graph.node_indices().next())
    }

    pub fn start(&self) -> Option<&TaskNode> {
        self.start_index().map(|index| &self.graph[index])
    }

    pub fn node(&self, name: &str) -> Option<&TaskNode> {
        self.index.get(name).map(|&index| &self.graph[index])
    }

    pub(crate) fn node_at(&self, index: NodeIndex) -> &TaskNode {
        &self.graph[index]
    }

    pub(crate) fn node_at_mut(&mut self, index: NodeIndex) -> &mut TaskNode {
        &mut self.graph[index]
    }

    /// Successor indices with their edge conditions, in edge insertion order.
    pub(crate) fn successors_of(&self, index: NodeIndex) -> Vec<(NodeIndex, Option<String>)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .map(|edge| (edge.id(), edge.target(), edge.weight().clone()))
            .collect();
        edges.sort_by_key(|(id, _, _)| *id);
        edges
            .into_iter()
            .map(|(_, target, condition)| (target, condition))
            .collect()
    }

    /// Successors of the named task in edge insertion order.
    pub fn successors(&self, name: &str) -> Vec<&TaskNode> {
        match self.index.get(name) {
            Some(&index) => self
                .successors_of(index)
                .into_iter()
                .map(|(target, _)| &self.graph[target])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Condition on the edge from `source` to `target`, if any.
    pub fn condition(&self, source: &str, target: &str) -> Option<&str> {
        let from = self.index.get(source)?;
        let to = self.index.get(target)?;
        let edge = self.graph.find_edge(*from, *to)?;
        self.graph.edge_weight(edge)?.as_deref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn has_end_marker(&self) -> bool {
        self.index.keys().any(|name| is_end_marker(name))
    }

    pub fn is_cyclic(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    pub fn cache(&self) -> &TaskCache {
        &self.cache
    }

    pub(crate) fn cache_mut(&mut self) -> &mut TaskCache {
        &mut self.cache
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Traverse the graph from its start node and return the ledger snapshot.
    pub async fn execute(self, engine: &Engine) -> Result<Vec<LedgerEntry>> {
        engine.execute(self).await
    }
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("parent", &self.parent)
            .field("tasks", &self.len())
            .field("edges", &self.edge_count())
            .finish()
    }
}
