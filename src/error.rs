use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the trainer.
///
/// Only [`ArchtypeError::CatalogUnavailable`] and [`ArchtypeError::Terminal`]
/// abort a run; every other variant is logged and recovered where it occurs.
#[derive(Debug, Error)]
pub enum ArchtypeError {
    #[error("command catalog unavailable ({origin}): {reason}")]
    CatalogUnavailable { origin: String, reason: String },

    #[error("no high score stored at {0}")]
    HighScoreMissing(PathBuf),

    #[error("high score file {path} is corrupt: {reason}")]
    HighScoreCorrupt { path: PathBuf, reason: String },

    #[error("failed to persist high score to {path}: {source}")]
    PersistenceWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render frame: {0}")]
    RenderFailure(#[source] std::io::Error),

    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}

impl ArchtypeError {
    pub fn catalog(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CatalogUnavailable {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error must stop the process rather than degrade.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CatalogUnavailable { .. } | Self::Terminal(_))
    }
}

pub type Result<T> = std::result::Result<T, ArchtypeError>;
