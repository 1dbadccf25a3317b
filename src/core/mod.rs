//! Core domain models for recursive task decomposition.
//!
//! This module contains the shared ledger, task nodes, the decomposition
//! wire format and the task graph with its private result cache.

pub mod cache;
pub mod decomposition;
pub mod graph;
pub mod ledger;
pub mod task;

pub use cache::TaskCache;
pub use decomposition::{Decomposition, EdgeSpec, NodeSpec};
pub use graph::TaskGraph;
pub use ledger::{format_transcript, Ledger, LedgerEntry, DONE, RUNNING};
pub use task::{is_end_marker, ReasoningHint, TaskNode, END_MARKERS};
