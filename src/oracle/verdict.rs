//! Decoding of structured oracle output.

use crate::core::Decomposition;
use crate::error::{Error, Result};
use crate::oracle::OracleResponse;
use serde_json::Value;

/// What a structured oracle result asks the engine to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The task's goal is answered.
    DirectAnswer(Value),
    /// The task splits into a graph of subtasks.
    Decomposition(Decomposition),
    /// The name of the successor to follow.
    BranchChoice(String),
}

impl Verdict {
    /// Decode a response returned for `task`.
    ///
    /// # Errors
    /// - `OracleResponseInvalid` when the response is not parsed JSON
    /// - `MalformedDecomposition` when the JSON matches no verdict shape
    pub fn from_response(task: &str, response: OracleResponse) -> Result<Self> {
        match response {
            OracleResponse::Structured {
                value: Some(value), ..
            } => Self::decode(task, value),
            other => Err(Error::OracleResponseInvalid {
                task: task.to_string(),
                raw: other.raw().to_string(),
            }),
        }
    }

    /// Decode a parsed JSON value.
    ///
    /// An `answer` key takes precedence, then `next_task_name`, then a
    /// `nodes` + `edges` pair.
    pub fn decode(task: &str, value: Value) -> Result<Self> {
        let malformed = |reason: String, value: &Value| Error::MalformedDecomposition {
            task: task.to_string(),
            reason,
            payload: value.to_string(),
        };

        let Some(object) = value.as_object() else {
            return Err(malformed("expected a JSON object".to_string(), &value));
        };

        if let Some(answer) = object.get("answer") {
            return Ok(Verdict::DirectAnswer(answer.clone()));
        }

        if let Some(choice) = object.get("next_task_name") {
            return match choice {
                Value::String(name) => Ok(Verdict::BranchChoice(name.trim().to_string())),
                _ => Err(malformed("next_task_name is not a string".to_string(), &value)),
            };
        }

        if object.contains_key("nodes") && object.contains_key("edges") {
            return serde_json::from_value::<Decomposition>(value.clone())
                .map(Verdict::Decomposition)
                .map_err(|e| malformed(format!("invalid nodes/edges: {}", e), &value));
        }

        Err(malformed(
            "neither an answer nor a nodes/edges decomposition".to_string(),
            &value,
        ))
    }
}
