//! Boundary to the external reasoning service.
//!
//! The engine only ever talks to a [`ReasoningOracle`]: it sends a role,
//! a prompt and the output shape it expects, and decodes the structured
//! result once into a [`Verdict`].

mod claude;
mod extract;
mod verdict;

pub use claude::ClaudeOracle;
pub use extract::{extract_code, extract_json};
pub use verdict::Verdict;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output shape requested from the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputShape {
    FreeText,
    StructuredJson,
    CodeBlock,
}

/// System context the oracle answers under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemRole {
    #[default]
    Planner,
    Empty,
}

impl SystemRole {
    /// The system message sent with the prompt.
    pub fn message(&self) -> &'static str {
        match self {
            SystemRole::Planner => "You are an expert on the following topics: Planning, Algorithms, Diagrams, Logic, Problem Solving, High-Level Thinking.",
            SystemRole::Empty => "",
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    /// Task on whose behalf the request is made.
    pub task: String,
    pub role: SystemRole,
    pub prompt: String,
    pub shape: OutputShape,
}

impl OracleRequest {
    pub fn new(task: &str, role: SystemRole, prompt: String, shape: OutputShape) -> Self {
        Self {
            task: task.to_string(),
            role,
            prompt,
            shape,
        }
    }
}

/// A completion, already shaped as requested.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleResponse {
    /// Free text.
    Text(String),
    /// Parsed JSON, or `None` when the text was not valid JSON.
    Structured { value: Option<Value>, raw: String },
    /// Extracted fenced code, plus the full completion.
    Code { code: Option<String>, raw: String },
}

impl OracleResponse {
    /// Shape raw completion text into the requested form.
    pub fn shape(raw: String, shape: OutputShape) -> Self {
        match shape {
            OutputShape::FreeText => OracleResponse::Text(raw),
            OutputShape::StructuredJson => OracleResponse::Structured {
                value: extract_json(&raw),
                raw,
            },
            OutputShape::CodeBlock => OracleResponse::Code {
                code: extract_code(&raw, "python"),
                raw,
            },
        }
    }

    /// The unprocessed completion text.
    pub fn raw(&self) -> &str {
        match self {
            OracleResponse::Text(raw)
            | OracleResponse::Structured { raw, .. }
            | OracleResponse::Code { raw, .. } => raw,
        }
    }
}

/// An external service that completes prompts.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// Complete one request in the requested output shape.
    async fn complete(&self, request: &OracleRequest) -> Result<OracleResponse>;
}
