use crate::errors::{AtError, Result};
use crate::git::{CommitSummary, GitExecutor, GitRepository};
use serde::Serialize;
use tracing::debug;

/// Commits strictly after `base` up to and including `head`, oldest first.
/// Always computed fresh from the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRange {
    pub base: String,
    pub head: String,
    pub commits: Vec<CommitSummary>,
}

impl CommitRange {
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Fewer than two commits means there is nothing to consolidate
    pub fn needs_consolidation(&self) -> bool {
        self.commits.len() >= 2
    }

    pub fn merge_commits(&self) -> impl Iterator<Item = &CommitSummary> {
        self.commits.iter().filter(|c| c.is_merge())
    }

    /// Subjects, newest first
    pub fn subjects_newest_first(&self) -> Vec<String> {
        self.commits.iter().rev().map(|c| c.subject.clone()).collect()
    }
}

pub struct CommitRangeAnalyzer<'r, E: GitExecutor> {
    repo: &'r GitRepository<E>,
}

impl<'r, E: GitExecutor> CommitRangeAnalyzer<'r, E> {
    pub fn new(repo: &'r GitRepository<E>) -> Self {
        Self { repo }
    }

    /// All commits reachable from `head` but not from `base`
    pub fn range(&self, base: &str, head: &str) -> Result<CommitRange> {
        let base_commit = self
            .repo
            .try_resolve_commit(base)?
            .ok_or_else(|| AtError::not_found(format!("Target '{base}' does not exist")))?;
        let head_commit = self.repo.resolve_commit(head)?;

        let commits = self.repo.get_commits_between(&base_commit, &head_commit)?;
        debug!(
            "{} commit(s) between {} and {}",
            commits.len(),
            &base_commit[..base_commit.len().min(8)],
            &head_commit[..head_commit.len().min(8)]
        );

        Ok(CommitRange {
            base: base_commit,
            head: head_commit,
            commits,
        })
    }
}
