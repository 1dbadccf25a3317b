//! Wire format of a decomposition produced by the oracle.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A node declared by a decomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Node id, used as the task name and goal.
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Declared reasoning type (`direct`, `decompose`, `type I`, `type II`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Conditional marker; its presence is what matters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<Value>,
}

impl NodeSpec {
    pub fn new(id: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            kind: None,
            conditional: None,
        }
    }

    /// The marker counts unless it is explicitly `false`.
    pub fn is_conditional(&self) -> bool {
        !matches!(self.conditional, None | Some(Value::Null) | Some(Value::Bool(false)))
    }
}

/// A dependency edge between two declared nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub source: String,
    pub target: String,
    /// Branch condition under which `target` follows `source`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl EdgeSpec {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            condition: None,
        }
    }

    pub fn when(mut self, condition: &str) -> Self {
        self.condition = Some(condition.to_string());
        self
    }
}

/// A task graph described as nodes and edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    /// Declared start node; falls back to the first edge's source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
}

impl Decomposition {
    pub fn new(nodes: Vec<NodeSpec>, edges: Vec<EdgeSpec>) -> Self {
        Self {
            start: None,
            nodes,
            edges,
        }
    }

    pub fn starting_at(mut self, start: &str) -> Self {
        self.start = Some(start.to_string());
        self
    }
}
