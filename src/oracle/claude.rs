//! Oracle backed by the Claude Code CLI in headless mode.
//!
//! Each request runs `claude -p <prompt> --output-format json`, reads the
//! JSON envelope the CLI prints and shapes the completion text as the
//! request asked.

use crate::error::{Error, Result};
use crate::oracle::{OracleRequest, OracleResponse, ReasoningOracle};
use crate::util::bounded;
use crate::{twlog_debug, twlog_trace};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Envelope printed by `claude --output-format json`.
#[derive(Debug, Deserialize)]
struct RawClaudeResponse {
    subtype: Option<String>,
    result: Option<String>,
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Reasoning oracle that shells out to the `claude` binary.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use taskweave::oracle::ClaudeOracle;
/// use taskweave::orchestration::Engine;
///
/// let oracle = ClaudeOracle::new()?.with_model("sonnet");
/// let engine = Engine::new(Arc::new(oracle));
/// ```
#[derive(Debug, Clone)]
pub struct ClaudeOracle {
    binary: PathBuf,
    model: Option<String>,
    /// Extra bound on the process itself. The engine's oracle timeout
    /// already covers every call, so this is unset by default.
    timeout: Option<Duration>,
}

impl ClaudeOracle {
    /// Locate `claude` on the PATH.
    ///
    /// # Errors
    ///
    /// Returns `OracleBinaryNotFound` if the binary cannot be found.
    pub fn new() -> Result<Self> {
        Self::from_command("claude")
    }

    /// Locate a named command (or path) to use as the CLI.
    pub fn from_command(command: &str) -> Result<Self> {
        let binary = which::which(command).map_err(|_| Error::OracleBinaryNotFound)?;
        Ok(Self::with_binary(binary))
    }

    /// Use a specific binary path without checking that it exists.
    pub fn with_binary(binary: PathBuf) -> Self {
        Self {
            binary,
            model: None,
            timeout: None,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn command(&self, request: &OracleRequest) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("-p")
            .arg(&request.prompt)
            .arg("--output-format")
            .arg("json")
            .kill_on_drop(true);

        let system = request.role.message();
        if !system.is_empty() {
            command.arg("--append-system-prompt").arg(system);
        }
        if let Some(model) = &self.model {
            command.arg("--model").arg(model);
        }
        command
    }

    /// Pull the completion text out of the CLI's JSON envelope.
    ///
    /// Output that is not an envelope is returned trimmed as-is.
    pub fn parse_envelope(stdout: &str) -> Result<String> {
        let raw: RawClaudeResponse = match serde_json::from_str(stdout.trim()) {
            Ok(raw) => raw,
            Err(_) => return Ok(stdout.trim().to_string()),
        };
        if raw.subtype.is_none() && raw.result.is_none() && raw.error.is_none() {
            return Ok(stdout.trim().to_string());
        }

        let failed = raw.is_error || raw.subtype.as_deref().is_some_and(|s| s.starts_with("error"));
        if failed || (raw.result.is_none() && raw.error.is_some()) {
            let message = raw
                .error
                .or(raw.result)
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(Error::Oracle(message));
        }

        raw.result
            .ok_or_else(|| Error::Oracle("Unknown response format".to_string()))
    }
}

#[async_trait]
impl ReasoningOracle for ClaudeOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<OracleResponse> {
        twlog_debug!("ClaudeOracle: request for '{}' ({:?})", request.task, request.shape);
        twlog_trace!("ClaudeOracle prompt:\n{}", request.prompt);

        let output = bounded(self.timeout, self.command(request).output())
            .await
            .map_err(|after| Error::OracleTimeout {
                task: request.task.clone(),
                after,
            })?
            .map_err(Error::Io)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() && stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!(
                    "Claude execution failed with exit code {}",
                    output.status.code().unwrap_or(-1)
                )
            } else {
                stderr.trim().to_string()
            };
            return Err(Error::Oracle(message));
        }

        let text = Self::parse_envelope(&stdout)?;
        twlog_trace!("ClaudeOracle completion for '{}':\n{}", request.task, text);
        Ok(OracleResponse::shape(text, request.shape))
    }
}
