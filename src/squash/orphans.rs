use crate::errors::Result;
use crate::git::{GitExecutor, GitRepository, StashEntry};
use crate::squash::stash::orphaned_stashes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

const EPHEMERAL_MARKER: &str = "-squash-";

/// Unix timestamps have had at least 9 digits since 1973; shorter numbers are
/// user branch names like `bug-squash-1234`
const MIN_TIMESTAMP_DIGITS: usize = 9;

/// A temporary squash branch that outlived its squash
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanBranch {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Leftovers of squashes that were interrupted before cleanup ran
#[derive(Debug, Clone, Default, Serialize)]
pub struct Orphans {
    pub branches: Vec<OrphanBranch>,
    pub stashes: Vec<StashEntry>,
}

impl Orphans {
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty() && self.stashes.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepResult {
    pub deleted: Vec<String>,
    /// Branch name and reason
    pub failed: Vec<(String, String)>,
    /// Checked out, so left alone
    pub skipped: Vec<String>,
    /// Tip not contained in any other ref, so deleting would lose commits
    pub unmerged: Vec<String>,
}

/// True for names of the form `[prefix/]<branch>-squash-<unix-ts>[-<n>]`
pub fn is_ephemeral_branch_name(name: &str) -> bool {
    ephemeral_timestamp(name).is_some()
}

/// Creation time encoded in an ephemeral branch name
pub fn ephemeral_timestamp(name: &str) -> Option<i64> {
    let (stem, tail) = name.rsplit_once(EPHEMERAL_MARKER)?;
    if stem.is_empty() {
        return None;
    }

    let (timestamp, suffix) = match tail.split_once('-') {
        Some((ts, n)) => (ts, Some(n)),
        None => (tail, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if !all_digits(timestamp)
        || timestamp.len() < MIN_TIMESTAMP_DIGITS
        || suffix.is_some_and(|n| !all_digits(n))
    {
        return None;
    }
    timestamp.parse().ok()
}

/// List temporary branches and labelled stash entries left behind by a crash
pub fn find_orphans<E: GitExecutor>(repo: &GitRepository<E>) -> Result<Orphans> {
    let branches = repo
        .list_branches()?
        .into_iter()
        .filter_map(|name| {
            let timestamp = ephemeral_timestamp(&name)?;
            Some(OrphanBranch {
                created_at: DateTime::from_timestamp(timestamp, 0),
                name,
            })
        })
        .collect();

    Ok(Orphans {
        branches,
        stashes: orphaned_stashes(repo)?,
    })
}

/// Delete orphaned branches whose commits are still reachable from another
/// ref. Stash entries are never dropped, they may hold the only copy of
/// someone's work.
pub fn sweep_orphans<E: GitExecutor>(
    repo: &GitRepository<E>,
    orphans: &Orphans,
) -> Result<SweepResult> {
    let current = repo.get_current_branch().ok();
    let mut result = SweepResult::default();

    for branch in &orphans.branches {
        if current.as_deref() == Some(branch.name.as_str()) {
            warn!("Not deleting '{}': it is checked out", branch.name);
            result.skipped.push(branch.name.clone());
            continue;
        }

        let refname = format!("refs/heads/{}", branch.name);
        match repo.refs_containing(&refname) {
            Ok(refs) if refs.iter().any(|r| *r != refname) => {}
            Ok(_) => {
                warn!("Not deleting '{}': its commits exist nowhere else", branch.name);
                result.unmerged.push(branch.name.clone());
                continue;
            }
            Err(e) => {
                warn!("Could not check '{}': {}", branch.name, e);
                result.failed.push((branch.name.clone(), e.to_string()));
                continue;
            }
        }

        match repo.delete_branch(&branch.name) {
            Ok(()) => result.deleted.push(branch.name.clone()),
            Err(e) => {
                warn!("Failed to delete '{}': {}", branch.name, e);
                result.failed.push((branch.name.clone(), e.to_string()));
            }
        }
    }

    info!(
        "Swept {} orphaned branch(es), {} kept as unmerged, {} failed",
        result.deleted.len(),
        result.unmerged.len(),
        result.failed.len()
    );
    Ok(result)
}
