//! Orchestration of task resolution.
//!
//! The engine resolves tasks against a reasoning oracle and walks the
//! graphs their decompositions produce; `prompt` builds the requests it
//! sends along the way.

mod engine;
pub mod prompt;

pub use engine::{
    Engine, EngineConfig, Resolution, RunId, RunStats, DEFAULT_ORACLE_TIMEOUT_SECS,
};
