use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::orchestration::{EngineConfig, DEFAULT_ORACLE_TIMEOUT_SECS};
use crate::{twlog_debug, Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Oracle CLI command, `claude` when unset.
    pub command: Option<String>,
    pub model: Option<String>,
    /// Seconds per oracle call; 0 disables the bound.
    pub oracle_timeout_secs: Option<u64>,
    pub max_depth: Option<usize>,
    pub max_visits: Option<usize>,
}

impl Config {
    pub fn taskweave_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".taskweave"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::taskweave_dir()?.join("taskweave.toml"))
    }

    pub fn effective_command(&self) -> &str {
        self.command.as_deref().unwrap_or("claude")
    }

    pub fn oracle_timeout(&self) -> Option<Duration> {
        match self.oracle_timeout_secs.unwrap_or(DEFAULT_ORACLE_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            oracle_timeout: self.oracle_timeout(),
            max_depth: self.max_depth,
            max_visits: self.max_visits,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        twlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            twlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        if config.max_depth == Some(0) || config.max_visits == Some(0) {
            return Err(Error::Validation(
                "max_depth and max_visits must be at least 1".to_string(),
            ));
        }
        twlog_debug!(
            "Config loaded: command={:?}, model={:?}, timeout={:?}, max_depth={:?}, max_visits={:?}",
            config.command,
            config.model,
            config.oracle_timeout_secs,
            config.max_depth,
            config.max_visits
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                twlog_debug!("Creating config directory: {}", dir.display());
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        twlog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}
