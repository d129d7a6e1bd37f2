pub mod settings;

pub use settings::SquashSettings;

use crate::errors::{AtError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Globally configured trunk branch
pub const TRUNK_KEY: &str = "at.trunk";

/// Per-branch upstream merge reference, e.g. `refs/heads/develop`
pub fn branch_merge_key(branch: &str) -> String {
    format!("branch.{branch}.merge")
}

/// Read-only key-value configuration consumed by the squash engine
pub trait ConfigStore {
    /// Value for `key`, or `None` when unset or empty
    fn get(&self, key: &str) -> Option<String>;
}

impl<C: ConfigStore + ?Sized> ConfigStore for &C {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

impl ConfigStore for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }
}

/// The repository's git configuration (local, global and system levels)
pub struct GitConfigStore {
    git_dir: PathBuf,
}

impl GitConfigStore {
    pub fn open(repo_path: &Path) -> Result<Self> {
        let repo = git2::Repository::discover(repo_path)
            .map_err(|e| AtError::config(format!("Could not open git config: {e}")))?;
        Ok(Self {
            git_dir: repo.path().to_path_buf(),
        })
    }
}

impl ConfigStore for GitConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        // Reopen on every lookup; other tools may change config between calls
        let repo = git2::Repository::open(&self.git_dir).ok()?;
        let snapshot = repo.config().ok()?.snapshot().ok()?;
        snapshot
            .get_string(key)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }
}
