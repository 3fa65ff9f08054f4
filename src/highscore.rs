use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::app_dirs::AppDirs;
use crate::error::{ArchtypeError, Result};

/// On-disk shape: `{ "highScore": <int> }`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HighScoreRecord {
    pub high_score: u64,
}

pub trait HighScoreStore {
    /// Stored value, or 0 when absent or unreadable.
    fn load(&self) -> u64;
    /// Persists `score` unless a greater or equal value is already stored.
    fn save(&self, score: u64) -> Result<()>;
    /// Unconditionally stores 0.
    fn reset(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileHighScoreStore {
    path: PathBuf,
}

impl FileHighScoreStore {
    pub fn new() -> Self {
        let path = AppDirs::high_score_path().unwrap_or_else(|| PathBuf::from("archtype_highscore.json"));
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

    /// Strict read that distinguishes a missing file from a corrupt one.
    pub fn read(&self) -> Result<u64> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ArchtypeError::HighScoreMissing(self.path.clone()))
            }
            Err(err) => {
                return Err(ArchtypeError::HighScoreCorrupt {
                    path: self.path.clone(),
                    reason: err.to_string(),
                })
            }
        };

        serde_json::from_slice::<HighScoreRecord>(&bytes)
            .map(|record| record.high_score)
            .map_err(|err| ArchtypeError::HighScoreCorrupt {
                path: self.path.clone(),
                reason: err.to_string(),
            })
    }

    fn write(&self, score: u64) -> Result<()> {
        let to_err = |source| ArchtypeError::PersistenceWriteFailed {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(to_err)?;
        }
        let data = serde_json::to_vec(&HighScoreRecord { high_score: score }).unwrap_or_default();
        fs::write(&self.path, data).map_err(to_err)
    }
}

impl Default for FileHighScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HighScoreStore for FileHighScoreStore {
    fn load(&self) -> u64 {
        match self.read() {
            Ok(score) => score,
            Err(ArchtypeError::HighScoreMissing(path)) => {
                debug!(path = %path.display(), "no high score yet");
                0
            }
            Err(err) => {
                warn!(%err, "ignoring unreadable high score");
                0
            }
        }
    }

    fn save(&self, score: u64) -> Result<()> {
        let stored = self.read().unwrap_or(0);
        if stored >= score && self.path.exists() {
            debug!(stored, score, "stored high score already higher");
            return Ok(());
        }
        self.write(score)?;
        debug!(score, path = %self.path.display(), "saved high score");
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        self.write(0)
    }
}
