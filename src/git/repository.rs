use crate::errors::{AtError, Result};
use crate::git::executor::{GitCli, GitExecutor};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Field separator used in `--format` strings (ASCII unit separator)
const FIELD_SEP: char = '\u{1f}';

/// One commit as listed by a range query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub id: String,
    pub parents: Vec<String>,
    pub subject: String,
}

impl CommitSummary {
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(8)]
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// An entry of `git stash list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StashEntry {
    /// Reflog selector, e.g. `stash@{0}`
    pub reference: String,
    pub message: String,
}

/// Explicit handle on one repository.
///
/// Every plumbing operation the squash engine needs goes through here, so
/// raw executor failures are turned into typed errors in exactly one place.
pub struct GitRepository<E = GitCli> {
    git: E,
    path: PathBuf,
}

impl GitRepository<GitCli> {
    /// Open the repository containing `path`, driving it through the `git` binary
    pub fn open(path: &Path) -> Result<Self> {
        let repo = git2::Repository::discover(path)
            .map_err(|e| AtError::config(format!("Not a git repository: {e}")))?;

        let workdir = repo
            .workdir()
            .ok_or_else(|| AtError::config("Repository has no working directory"))?
            .to_path_buf();

        Ok(Self::with_executor(&workdir, GitCli::new(&workdir)))
    }
}

impl<E: GitExecutor> GitRepository<E> {
    pub fn with_executor(path: &Path, git: E) -> Self {
        Self {
            git,
            path: path.to_path_buf(),
        }
    }

    /// Get repository path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        self.git.execute(args)
    }

    /// Get the current branch name; a detached HEAD is an error
    pub fn get_current_branch(&self) -> Result<String> {
        match self.run(&["symbolic-ref", "--quiet", "--short", "HEAD"]) {
            Ok(name) if !name.is_empty() => Ok(name),
            Ok(_) | Err(AtError::Command { .. }) => Err(AtError::branch(
                "HEAD is detached; check out a branch before squashing",
            )),
            Err(e) => Err(e),
        }
    }

    /// Resolve any revision expression to a full commit id
    pub fn resolve_commit(&self, reference: &str) -> Result<String> {
        self.try_resolve_commit(reference)?.ok_or_else(|| {
            AtError::not_found(format!("'{reference}' does not resolve to a commit"))
        })
    }

    pub fn try_resolve_commit(&self, reference: &str) -> Result<Option<String>> {
        let spec = format!("{reference}^{{commit}}");
        match self.run(&["rev-parse", "--verify", "--quiet", &spec]) {
            Ok(id) if !id.is_empty() => Ok(Some(id)),
            Ok(_) | Err(AtError::Command { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get the HEAD commit hash
    pub fn get_head_commit_hash(&self) -> Result<String> {
        self.resolve_commit("HEAD")
    }

    /// Tree id of a commit, used to compare content before and after a rewrite
    pub fn tree_of(&self, reference: &str) -> Result<String> {
        match self.run(&["rev-parse", &format!("{reference}^{{tree}}")]) {
            Err(AtError::Command { .. }) => {
                Err(AtError::not_found(format!("'{reference}' has no tree")))
            }
            other => other,
        }
    }

    /// Check if a local branch exists
    pub fn branch_exists(&self, name: &str) -> Result<bool> {
        let refname = format!("refs/heads/{name}");
        match self.run(&["show-ref", "--verify", "--quiet", &refname]) {
            Ok(_) => Ok(true),
            Err(AtError::Command { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// List all local branches
    pub fn list_branches(&self) -> Result<Vec<String>> {
        let output = self.run(&["for-each-ref", "--format=%(refname:short)", "refs/heads"])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Merge base of two revisions; `None` when the histories are unrelated
    pub fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>> {
        match self.run(&["merge-base", a, b]) {
            Ok(id) if !id.is_empty() => Ok(Some(id)),
            Ok(_) => Ok(None),
            Err(AtError::Command { code: Some(1), .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Full names of local branches, remote-tracking branches and tags whose
    /// history includes `commit`
    pub fn refs_containing(&self, commit: &str) -> Result<Vec<String>> {
        let output = self.run(&[
            "for-each-ref",
            "--format=%(refname)",
            "--contains",
            commit,
            "refs/heads",
            "refs/remotes",
            "refs/tags",
        ])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Committer timestamp (unix seconds) of a commit
    pub fn commit_timestamp(&self, commit: &str) -> Result<i64> {
        let raw = self.run(&["log", "-1", "--format=%ct", commit])?;
        raw.trim().parse::<i64>().map_err(|e| {
            AtError::validation(format!("Unexpected timestamp '{raw}' for {commit}: {e}"))
        })
    }

    /// Abbreviated name of the branch's remote-tracking upstream, if any
    pub fn upstream_of(&self, branch: &str) -> Result<Option<String>> {
        let spec = format!("{branch}@{{upstream}}");
        match self.run(&["rev-parse", "--abbrev-ref", "--symbolic-full-name", &spec]) {
            Ok(name) if !name.is_empty() => Ok(Some(name)),
            Ok(_) | Err(AtError::Command { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Commits reachable from `head` but not from `base`, oldest first
    pub fn get_commits_between(&self, base: &str, head: &str) -> Result<Vec<CommitSummary>> {
        let range = format!("{base}..{head}");
        let output = self.run(&["log", "--reverse", "--format=%H%x1f%P%x1f%s", &range])?;

        output
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(parse_commit_line)
            .collect()
    }

    /// True when tracked files have staged or unstaged modifications
    pub fn has_uncommitted_changes(&self) -> Result<bool> {
        let status = self.run(&["status", "--porcelain", "--untracked-files=no"])?;
        Ok(!status.is_empty())
    }

    /// Create a new branch at `start` and switch to it
    pub fn create_and_checkout_branch(&self, name: &str, start: &str) -> Result<()> {
        self.run(&["checkout", "--quiet", "-b", name, start])
            .map_err(|e| AtError::branch(format!("Could not create branch '{name}': {e}")))?;
        debug!("Created and switched to branch '{}' at {}", name, start);
        Ok(())
    }

    /// Switch to a branch
    pub fn checkout_branch(&self, name: &str) -> Result<()> {
        self.run(&["checkout", "--quiet", name])
            .map_err(|e| AtError::branch(format!("Could not checkout branch '{name}': {e}")))?;
        debug!("Switched to branch '{}'", name);
        Ok(())
    }

    /// Switch to a branch, discarding any half-applied state in the working tree
    pub fn force_checkout_branch(&self, name: &str) -> Result<()> {
        self.run(&["checkout", "--quiet", "--force", name])
            .map_err(|e| AtError::branch(format!("Could not checkout branch '{name}': {e}")))?;
        debug!("Force-switched to branch '{}'", name);
        Ok(())
    }

    /// Delete a local branch, merged or not
    pub fn delete_branch(&self, name: &str) -> Result<()> {
        self.run(&["branch", "-D", name])
            .map_err(|e| AtError::branch(format!("Could not delete branch '{name}': {e}")))?;
        info!("Deleted branch '{}'", name);
        Ok(())
    }

    /// Cherry-pick a commit onto the current branch.
    /// Empty results are kept so every picked commit maps to one new commit.
    pub fn cherry_pick(&self, commit: &str) -> Result<()> {
        self.run(&[
            "cherry-pick",
            "--allow-empty",
            "--keep-redundant-commits",
            commit,
        ])?;
        Ok(())
    }

    pub fn abort_cherry_pick(&self) -> Result<()> {
        self.run(&["cherry-pick", "--abort"])?;
        Ok(())
    }

    /// Get list of conflicted files
    pub fn get_conflicted_files(&self) -> Result<Vec<String>> {
        let output = self.run(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(output.lines().map(str::to_string).collect())
    }

    /// Soft reset to a specific commit (keeps changes in staging area)
    pub fn reset_soft(&self, commit: &str) -> Result<()> {
        self.run(&["reset", "--soft", commit])?;
        debug!("Soft reset to {}", commit);
        Ok(())
    }

    /// Create a commit with all staged changes and return its id.
    /// Hooks are skipped: the staged tree must be recorded exactly as given.
    pub fn commit(&self, message: &str) -> Result<String> {
        self.run(&[
            "commit",
            "--quiet",
            "--allow-empty",
            "--no-verify",
            "-m",
            message,
        ])?;
        let id = self.get_head_commit_hash()?;
        info!("Created commit: {} - {}", id, message.lines().next().unwrap_or(""));
        Ok(id)
    }

    /// Move `branch` to `new_commit`, but only if it still points at `expected_old`
    pub fn update_branch_to_commit(
        &self,
        branch: &str,
        new_commit: &str,
        expected_old: &str,
    ) -> Result<()> {
        let refname = format!("refs/heads/{branch}");
        self.run(&[
            "update-ref",
            "-m",
            "git-at: squash",
            &refname,
            new_commit,
            expected_old,
        ])
        .map_err(|e| {
            AtError::branch(format!(
                "Could not move '{branch}' from {expected_old} to {new_commit}: {e}"
            ))
        })?;
        debug!("Moved {} from {} to {}", refname, expected_old, new_commit);
        Ok(())
    }

    /// Stash staged and unstaged modifications of tracked files under `label`
    pub fn stash_push(&self, label: &str) -> Result<()> {
        self.run(&["stash", "push", "--quiet", "-m", label])?;
        Ok(())
    }

    pub fn stash_list(&self) -> Result<Vec<StashEntry>> {
        let output = self.run(&["stash", "list", "--format=%gd%x1f%s"])?;
        Ok(output
            .lines()
            .filter_map(|line| {
                let (reference, message) = line.split_once(FIELD_SEP)?;
                Some(StashEntry {
                    reference: reference.to_string(),
                    message: message.to_string(),
                })
            })
            .collect())
    }

    /// Re-apply a stash entry, including its index state, and drop it
    pub fn stash_pop(&self, reference: &str) -> Result<()> {
        self.run(&["stash", "pop", "--quiet", "--index", reference])?;
        Ok(())
    }
}

fn parse_commit_line(line: &str) -> Result<CommitSummary> {
    let mut fields = line.splitn(3, FIELD_SEP);
    let id = fields.next().unwrap_or_default().trim();
    let parents = fields.next().unwrap_or_default();
    let subject = fields.next().unwrap_or_default();

    if id.is_empty() {
        return Err(AtError::validation(format!("Malformed log line: '{line}'")));
    }

    Ok(CommitSummary {
        id: id.to_string(),
        parents: parents.split_whitespace().map(str::to_string).collect(),
        subject: subject.to_string(),
    })
}
