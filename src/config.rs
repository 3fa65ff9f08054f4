use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::app_dirs::AppDirs;
use crate::runtime::DEFAULT_TICK_MS;

pub const MIN_TICK_MS: u64 = 1;
pub const MAX_TICK_MS: u64 = 100;

/// Persistent defaults; CLI flags override them per run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub commands_path: Option<PathBuf>,
    pub shuffle: bool,
    pub tick_ms: u64,
    pub high_score_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            commands_path: None,
            shuffle: true,
            tick_ms: DEFAULT_TICK_MS,
            high_score_path: None,
            log_path: None,
        }
    }
}

impl Config {
    pub fn clamped_tick_ms(&self) -> u64 {
        self.tick_ms.clamp(MIN_TICK_MS, MAX_TICK_MS)
    }

    /// Tick interval clamped to a range that keeps the countdown responsive.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.clamped_tick_ms())
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("archtype_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(err) => warn!(%err, path = %self.path.display(), "ignoring malformed config"),
            }
        }
        Config::default()
    }

    /// Writes the settings as they will be used, so an out-of-range tick is
    /// stored clamped.
    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        let effective = Config {
            tick_ms: cfg.clamped_tick_ms(),
            ..cfg.clone()
        };
        let mut json = serde_json::to_string_pretty(&effective).map_err(std::io::Error::other)?;
        json.push('\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), tick_ms = effective.tick_ms, "saved config");
        Ok(())
    }
}
