use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::logs;

/// ~/.burrow, created on demand.
pub fn data_dir() -> Result<PathBuf> {
    let dir = dirs::home_dir()
        .context("cannot determine home directory")?
        .join(".burrow");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn config_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("config.toml"))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SSH client used for tunnels
    pub ssh_program: String,
    /// SSH config file to read hosts from (defaults to ~/.ssh/config)
    pub ssh_config: Option<String>,
    /// Log lines kept per tunnel
    pub log_capacity: usize,
    /// Answer used when Enter is pressed at the verbose prompt
    pub verbose_default: bool,
    /// Diagnostic log file (defaults to ~/.burrow/burrow.log)
    pub log_file: Option<String>,
    /// Shell for completions (bash, zsh, fish)
    pub shell: Option<String>,
    /// Editor for `burrow config` (overrides $VISUAL/$EDITOR)
    pub editor: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            ssh_config: None,
            log_capacity: logs::DEFAULT_CAPACITY,
            verbose_default: false,
            log_file: None,
            shell: None,
            editor: None,
        }
    }
}

impl Config {
    /// Load config from ~/.burrow/config.toml, falling back to defaults.
    pub fn load() -> Self {
        let path = match config_path() {
            Ok(p) => p,
            Err(_) => return Self::default(),
        };
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    fn parse(content: &str) -> Self {
        let mut cfg: Self = toml::from_str(content).unwrap_or_default();
        cfg.log_capacity = cfg.log_capacity.clamp(1, logs::DEFAULT_CAPACITY);
        cfg
    }

    /// SSH config path with `~/` expanded.
    pub fn ssh_config_path(&self) -> Option<PathBuf> {
        match self.ssh_config {
            Some(ref p) => expand_home(p),
            None => crate::ssh_config::default_path(),
        }
    }

    pub fn log_file_path(&self) -> Result<PathBuf> {
        match self.log_file {
            Some(ref p) => expand_home(p).context("cannot determine home directory"),
            None => Ok(data_dir()?.join("burrow.log")),
        }
    }

    /// Resolve which editor to use: config > $VISUAL > $EDITOR > vi
    pub fn resolve_editor(&self) -> String {
        if let Some(ref e) = self.editor {
            return e.clone();
        }
        std::env::var("VISUAL")
            .or_else(|_| std::env::var("EDITOR"))
            .unwrap_or_else(|_| "vi".to_string())
    }

    /// Write a default config file if none exists. Returns the path.
    pub fn init() -> Result<PathBuf> {
        let path = config_path()?;
        if path.exists() {
            return Ok(path);
        }
        let default = Self::default();
        let content = toml::to_string_pretty(&default)
            .context("failed to serialize default config")?;
        fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => Some(dirs::home_dir()?.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}
