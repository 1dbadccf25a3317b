//! The shared, append-only state ledger.
//!
//! Every task in a decomposition tree holds a handle to the same ledger.
//! Handles are cheap clones over one storage; appends are serialized by a
//! mutex and records are never changed or removed once written.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

/// Marker value recorded when a goal starts being decomposed.
pub const RUNNING: &str = "RUNNING";

/// Marker value recorded when a graph reaches its end marker.
pub const DONE: &str = "DONE";

/// A single `{task: value}` record.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// Name of the task (or goal) the record belongs to.
    pub task: String,
    /// The recorded result.
    pub value: Value,
}

impl LedgerEntry {
    pub fn new(task: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            task: task.into(),
            value: value.into(),
        }
    }

    /// Render the value for prompts: strings verbatim, everything else as JSON.
    pub fn display_value(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl Serialize for LedgerEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.task, &self.value)?;
        map.end()
    }
}

/// Handle to a shared ledger.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: Arc<Mutex<Vec<LedgerEntry>>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger holding one seed record.
    pub fn seeded(task: impl Into<String>, value: impl Into<Value>) -> Self {
        let ledger = Self::new();
        ledger.append(task, value);
        ledger
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LedgerEntry>> {
        // Appends never leave the vector half-written, so a poisoned lock is still usable.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a record and return its position.
    pub fn append(&self, task: impl Into<String>, value: impl Into<Value>) -> usize {
        let mut entries = self.lock();
        entries.push(LedgerEntry::new(task, value));
        entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn last(&self) -> Option<LedgerEntry> {
        self.lock().last().cloned()
    }

    /// Copy of every record in append order.
    pub fn snapshot(&self) -> Vec<LedgerEntry> {
        self.lock().clone()
    }

    /// True when both handles point at the same storage.
    pub fn shares_with(&self, other: &Ledger) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }

    /// Human-readable history, one step per record.
    pub fn transcript(&self) -> String {
        format_transcript(&self.lock())
    }
}

/// Format records as the step history shown to the oracle.
pub fn format_transcript(entries: &[LedgerEntry]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            format!(
                "Step #{}:\n\tId: {}\n\tReturn Value: {}",
                index,
                entry.task,
                entry.display_value()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
