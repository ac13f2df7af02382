//! Where a run writes its artifacts.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;

/// Output directory plus an optional file-name prefix, resolved once per run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLocation {
    dir: PathBuf,
    prefix: Option<String>,
}

impl OutputLocation {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: None,
        }
    }

    /// Same directory, with every file name prefixed `<prefix>_`.
    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        Self {
            dir: self.dir.clone(),
            prefix: Some(prefix.into()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file(&self, name: &str) -> PathBuf {
        match &self.prefix {
            Some(p) => self.dir.join(format!("{p}_{name}")),
            None => self.dir.join(name),
        }
    }

    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}

/// Create a fresh `<parent>/<name>` directory. An existing one is first
/// renamed to the lowest free `<name>_<n>`, so earlier results survive.
pub fn rotate_results_dir(parent: &Path, name: &str) -> Result<PathBuf> {
    let dir = parent.join(name);
    if dir.exists() {
        let mut n = 1usize;
        let archived = loop {
            let candidate = parent.join(format!("{name}_{n}"));
            if !candidate.exists() {
                break candidate;
            }
            n += 1;
        };
        std::fs::rename(&dir, &archived)?;
        info!(from = %dir.display(), to = %archived.display(), "Archived previous results");
    }
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
