//! Task node data model.
//!
//! A task node is a unit of goal-directed work. When resolved it either
//! answers its goal directly or spawns a child graph that decomposes it.

use crate::core::decomposition::NodeSpec;
use crate::core::ledger::Ledger;
use crate::error::Result;
use crate::oracle::SystemRole;
use crate::orchestration::{Engine, Resolution};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Node names that mark the terminal task of a graph.
pub const END_MARKERS: [&str; 2] = ["END", "DONE"];

/// Check whether a task name is an end marker.
pub fn is_end_marker(name: &str) -> bool {
    END_MARKERS.contains(&name)
}

/// How a task should be approached by the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningHint {
    /// The oracle decides between answering and decomposing.
    #[default]
    Unset,
    /// The oracle must answer directly.
    Direct,
    /// The oracle must produce a decomposition.
    Decompose,
}

impl ReasoningHint {
    /// Parse the `type` field of a decomposition node.
    ///
    /// Accepts `direct`/`decompose` as well as the `type I`/`type II`
    /// spelling; anything else leaves the choice to the oracle.
    pub fn parse(kind: Option<&str>) -> Self {
        let normalized = match kind {
            Some(kind) => kind.trim().to_lowercase().replace(['_', '-'], " "),
            None => return Self::Unset,
        };
        match normalized.as_str() {
            "direct" | "type i" => Self::Direct,
            "decompose" | "type ii" => Self::Decompose,
            _ => Self::Unset,
        }
    }
}

impl std::fmt::Display for ReasoningHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReasoningHint::Unset => write!(f, "unset"),
            ReasoningHint::Direct => write!(f, "direct"),
            ReasoningHint::Decompose => write!(f, "decompose"),
        }
    }
}

/// A single task in a decomposition tree.
#[derive(Debug, Clone)]
pub struct TaskNode {
    /// Human-readable name, unique within the owning graph.
    pub name: String,
    /// System context the oracle is asked under.
    pub role: SystemRole,
    /// Reasoning hint selecting the prompt instruction.
    pub hint: ReasoningHint,
    /// Longer description of the goal.
    pub description: String,
    /// The goal this task must achieve.
    pub goal: String,
    /// Whether exactly one successor is picked after this task.
    pub conditional: bool,
    /// Name of the task that decomposed into this one.
    pub parent: Option<String>,
    /// Resolved result, absent until the task resolves.
    pub output: Option<Value>,
    ledger: Ledger,
}

impl TaskNode {
    /// Create a root task with the planner role and no hint.
    pub fn new(name: &str, goal: &str, ledger: Ledger) -> Self {
        Self {
            name: name.to_string(),
            role: SystemRole::Planner,
            hint: ReasoningHint::Unset,
            description: String::new(),
            goal: goal.to_string(),
            conditional: false,
            parent: None,
            output: None,
            ledger,
        }
    }

    /// Build the node a decomposition declares under `parent`.
    ///
    /// The child shares the parent's ledger and system role.
    pub fn child_of(parent: &TaskNode, spec: &NodeSpec) -> Self {
        Self {
            name: spec.id.clone(),
            role: parent.role,
            hint: ReasoningHint::parse(spec.kind.as_deref()),
            description: spec.description.clone(),
            goal: spec.id.clone(),
            conditional: spec.is_conditional(),
            parent: Some(parent.name.clone()),
            output: None,
            ledger: parent.ledger.clone(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_hint(mut self, hint: ReasoningHint) -> Self {
        self.hint = hint;
        self
    }

    pub fn with_role(mut self, role: SystemRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    pub fn conditional(mut self) -> Self {
        self.conditional = true;
        self
    }

    /// The ledger this task reads and appends to.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn is_end_marker(&self) -> bool {
        is_end_marker(&self.name)
    }

    pub fn is_resolved(&self) -> bool {
        self.output.is_some()
    }

    /// Resolve this task with `engine`, consuming it.
    pub async fn resolve(self, engine: &Engine) -> Result<Resolution> {
        engine.resolve(self).await
    }
}
