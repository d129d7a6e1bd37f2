pub mod cleanup;
pub mod config;
pub mod parent;
pub mod squash;

use crate::config::GitConfigStore;
use crate::errors::{AtError, Result};
use crate::git::{find_repository_root, is_git_repository, GitRepository};
use std::env;

/// Open the repository containing the current directory along with its config
fn open_current() -> Result<(GitRepository, GitConfigStore)> {
    let current_dir = env::current_dir()
        .map_err(|e| AtError::config(format!("Could not get current directory: {e}")))?;

    if !is_git_repository(&current_dir) {
        return Err(AtError::config(format!(
            "{} is not inside a git repository",
            current_dir.display()
        )));
    }

    let repo_root = find_repository_root(&current_dir)?;
    let repo = GitRepository::open(&repo_root)?;
    let config = GitConfigStore::open(&repo_root)?;
    Ok((repo, config))
}
