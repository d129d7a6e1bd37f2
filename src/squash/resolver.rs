use crate::config::{branch_merge_key, ConfigStore, SquashSettings};
use crate::errors::{AtError, Result};
use crate::git::{GitExecutor, GitRepository};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Which step of the parent-branch heuristic produced the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// `branch.<name>.merge`
    UpstreamMerge,
    /// `<name>@{upstream}`
    UpstreamTracking,
    /// Branch sharing the most recent merge-base
    Divergence,
    /// `at.trunk`
    Trunk,
    /// First existing conventional branch name
    Conventional,
    /// Merge-base with the trunk, used by pull-request squashes
    TrunkMergeBase,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ResolutionSource::UpstreamMerge => "configured upstream merge ref",
            ResolutionSource::UpstreamTracking => "remote-tracking branch",
            ResolutionSource::Divergence => "most recent merge-base",
            ResolutionSource::Trunk => "configured trunk",
            ResolutionSource::Conventional => "conventional default branch",
            ResolutionSource::TrunkMergeBase => "merge-base with the trunk",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentBranch {
    pub name: String,
    pub source: ResolutionSource,
}

/// Picks the branch a squash should be measured against when none is given.
///
/// Steps, first hit wins:
/// 1. `branch.<current>.merge`
/// 2. the remote-tracking upstream
/// 3. the local branch whose merge-base with HEAD is most recent
///    (ties go to the lexicographically smallest name). A branch that
///    already contains HEAD shares HEAD itself and so wins, which makes the
///    squash a no-op.
/// 4. the configured trunk
/// 5. the first existing conventional default branch
///
/// No step ever answers with the current branch itself.
pub struct ParentBranchResolver<'a, E: GitExecutor> {
    repo: &'a GitRepository<E>,
    config: &'a dyn ConfigStore,
    settings: &'a SquashSettings,
}

impl<'a, E: GitExecutor> ParentBranchResolver<'a, E> {
    pub fn new(
        repo: &'a GitRepository<E>,
        config: &'a dyn ConfigStore,
        settings: &'a SquashSettings,
    ) -> Self {
        Self {
            repo,
            config,
            settings,
        }
    }

    pub fn resolve(&self, current_branch: &str) -> Result<ParentBranch> {
        let found = self
            .from_upstream_merge(current_branch)
            .map(|name| (name, ResolutionSource::UpstreamMerge));

        let found = match found {
            Some(hit) => Some(hit),
            None => self
                .from_upstream_tracking(current_branch)?
                .map(|name| (name, ResolutionSource::UpstreamTracking)),
        };

        let found = match found {
            Some(hit) => Some(hit),
            None => self
                .from_divergence(current_branch)?
                .map(|name| (name, ResolutionSource::Divergence)),
        };

        let found = found.or_else(|| {
            self.from_trunk(current_branch)
                .map(|name| (name, ResolutionSource::Trunk))
        });

        let found = match found {
            Some(hit) => Some(hit),
            None => self
                .from_conventional(current_branch)?
                .map(|name| (name, ResolutionSource::Conventional)),
        };

        match found {
            Some((name, source)) => {
                info!("Parent of '{}' is '{}' ({})", current_branch, name, source);
                Ok(ParentBranch { name, source })
            }
            None => Err(AtError::not_found(format!(
                "Could not auto-detect a parent branch for '{current_branch}'; specify a target branch"
            ))),
        }
    }

    fn from_upstream_merge(&self, current: &str) -> Option<String> {
        let merge = self.config.get(&branch_merge_key(current))?;
        let name = merge.trim();
        let name = name.strip_prefix("refs/heads/").unwrap_or(name);
        candidate(name, current)
    }

    fn from_upstream_tracking(&self, current: &str) -> Result<Option<String>> {
        Ok(self
            .repo
            .upstream_of(current)?
            .and_then(|name| candidate(&name, current)))
    }

    fn from_divergence(&self, current: &str) -> Result<Option<String>> {
        let head = match self.repo.try_resolve_commit(current)? {
            Some(head) => head,
            None => return Ok(None),
        };

        let mut best: Option<(i64, String)> = None;
        for branch in self.repo.list_branches()? {
            if branch == current {
                continue;
            }

            let merge_base = match skip_on_command_error(self.repo.merge_base(&branch, &head))? {
                Some(Some(merge_base)) => merge_base,
                _ => continue,
            };

            let timestamp =
                match skip_on_command_error(self.repo.commit_timestamp(&merge_base))? {
                    Some(ts) if ts > 0 => ts,
                    _ => continue,
                };
            debug!("'{}' diverged at {} (t={})", branch, merge_base, timestamp);

            let better = match &best {
                None => true,
                Some((best_ts, best_name)) => {
                    timestamp > *best_ts || (timestamp == *best_ts && branch < *best_name)
                }
            };
            if better {
                best = Some((timestamp, branch));
            }
        }

        Ok(best.map(|(_, name)| name))
    }

    fn from_trunk(&self, current: &str) -> Option<String> {
        self.settings
            .trunk
            .as_deref()
            .and_then(|trunk| candidate(trunk, current))
    }

    fn from_conventional(&self, current: &str) -> Result<Option<String>> {
        for name in &self.settings.fallback_branches {
            if name != current && self.repo.branch_exists(name)? {
                return Ok(Some(name.clone()));
            }
        }
        Ok(None)
    }
}

fn candidate(name: &str, current: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name == current {
        None
    } else {
        Some(name.to_string())
    }
}

/// A failing git call only disqualifies one candidate; anything else aborts
fn skip_on_command_error<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(AtError::Command { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}
