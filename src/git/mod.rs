pub mod executor;
pub mod repository;

pub use executor::{GitCli, GitExecutor};
pub use repository::{CommitSummary, GitRepository, StashEntry};

use crate::errors::{AtError, Result};
use std::path::Path;

/// Check if a directory is inside a Git repository
pub fn is_git_repository(path: &Path) -> bool {
    git2::Repository::discover(path).is_ok()
}

/// Find the root of the Git repository
pub fn find_repository_root(start_path: &Path) -> Result<std::path::PathBuf> {
    let repo = git2::Repository::discover(start_path).map_err(AtError::Git)?;

    let workdir = repo
        .workdir()
        .ok_or_else(|| AtError::config("Repository has no working directory (bare repo?)"))?;

    Ok(workdir.to_path_buf())
}
