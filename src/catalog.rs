use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use rand::Rng;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{ArchtypeError, Result};

static CORPUS_DIR: Dir = include_dir!("src/corpus");

const BUILTIN_CORPUS: &str = "commands.txt";

/// Ordered list of commands the player works through in one run.
///
/// The order is fixed once the run starts; [`CommandCatalog::shuffle`] is
/// applied at most once, before the first command is drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCatalog {
    commands: Vec<String>,
}

impl CommandCatalog {
    /// Loads the Arch Linux corpus compiled into the binary.
    pub fn builtin() -> Result<Self> {
        let file = CORPUS_DIR
            .get_file(BUILTIN_CORPUS)
            .ok_or_else(|| ArchtypeError::catalog("builtin", "embedded corpus missing"))?;

        let text = file
            .contents_utf8()
            .ok_or_else(|| ArchtypeError::catalog("builtin", "embedded corpus is not utf-8"))?;

        Self::parse("builtin", text)
    }

    /// Loads a newline-delimited corpus from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let text = fs::read_to_string(path)
            .map_err(|err| ArchtypeError::catalog(origin.clone(), err.to_string()))?;

        Self::parse(&origin, &text)
    }

    /// One command per line. Surrounding whitespace is trimmed; blank lines
    /// and `#` comment lines are skipped. Duplicates are kept.
    pub fn parse(origin: &str, text: &str) -> Result<Self> {
        let commands: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_owned)
            .collect();

        Self::from_commands(origin, commands)
    }

    pub fn from_commands(origin: &str, commands: Vec<String>) -> Result<Self> {
        if commands.is_empty() {
            return Err(ArchtypeError::catalog(origin, "no commands found"));
        }
        if commands.iter().any(|c| c.is_empty()) {
            return Err(ArchtypeError::catalog(origin, "empty command in corpus"));
        }

        debug!(origin, count = commands.len(), "loaded command catalog");
        Ok(Self { commands })
    }

    /// Uniform random permutation of the catalog.
    pub fn shuffle(mut self) -> Self {
        self.shuffle_with(&mut rand::thread_rng());
        self
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.commands.shuffle(rng);
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.commands.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(String::as_str)
    }
}
