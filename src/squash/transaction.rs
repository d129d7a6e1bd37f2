use crate::config::{ConfigStore, SquashSettings};
use crate::errors::{AtError, Result, SquashWarning};
use crate::git::{GitExecutor, GitRepository};
use crate::squash::message::generate_squash_message;
use crate::squash::range::{CommitRange, CommitRangeAnalyzer};
use crate::squash::resolver::{ParentBranchResolver, ResolutionSource};
use crate::squash::stash::StashGuard;
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// Lifecycle of a single squash call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SquashStatus {
    Idle,
    Validating,
    Isolating,
    Replaying,
    Finalizing,
    Cleanup,
    Done,
    Failed,
}

impl SquashStatus {
    pub fn can_transition_to(self, next: SquashStatus) -> bool {
        use SquashStatus::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Isolating)
                | (Validating, Done)
                | (Validating, Failed)
                | (Isolating, Replaying)
                | (Isolating, Failed)
                | (Replaying, Finalizing)
                | (Replaying, Cleanup)
                | (Finalizing, Cleanup)
                | (Cleanup, Done)
                | (Cleanup, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SquashStatus::Done | SquashStatus::Failed)
    }
}

impl fmt::Display for SquashStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Operation-scoped record of one squash. Never persisted.
#[derive(Debug, Clone)]
pub struct SquashPlan {
    pub branch: String,
    pub target_commit: String,
    pub original_head_commit: String,
    pub ephemeral_branch_name: Option<String>,
    pub stashed: bool,
    pub status: SquashStatus,
}

impl SquashPlan {
    fn new() -> Self {
        Self {
            branch: String::new(),
            target_commit: String::new(),
            original_head_commit: String::new(),
            ephemeral_branch_name: None,
            stashed: false,
            status: SquashStatus::Idle,
        }
    }

    fn advance(&mut self, next: SquashStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(AtError::validation(format!(
                "Illegal squash transition {} -> {}",
                self.status, next
            )));
        }
        debug!("Squash of '{}': {} -> {}", self.branch, self.status, next);
        self.status = next;
        Ok(())
    }

    /// Move to `Failed` and hand the error back
    fn fail(&mut self, error: AtError) -> AtError {
        if self.status.is_terminal() {
            debug!("Squash of '{}' already {}", self.branch, self.status);
        } else if let Err(e) = self.advance(SquashStatus::Failed) {
            debug!("{}", e);
        }
        error
    }
}

/// What a squash would do, computed without touching the repository
#[derive(Debug, Clone, Serialize)]
pub struct SquashPreview {
    pub branch: String,
    pub target: String,
    /// `None` when the target was given explicitly
    pub source: Option<ResolutionSource>,
    pub range: CommitRange,
}

impl SquashPreview {
    pub fn target_commit(&self) -> &str {
        &self.range.base
    }

    pub fn head_commit(&self) -> &str {
        &self.range.head
    }

    pub fn is_noop(&self) -> bool {
        !self.range.needs_consolidation()
    }
}

/// Outcome of a successful squash
#[derive(Debug, Clone, Serialize)]
pub struct SquashReport {
    pub branch: String,
    pub target: String,
    pub target_source: Option<ResolutionSource>,
    pub commits_consolidated: usize,
    pub original_head: String,
    pub new_head: String,
    pub message: Option<String>,
    pub warnings: Vec<SquashWarning>,
}

impl SquashReport {
    pub fn is_noop(&self) -> bool {
        self.commits_consolidated == 0
    }
}

/// Scratch branch used for the replay. Dropping it unreleased still tries to
/// remove it so no exit path leaves it behind.
struct EphemeralBranch<'r, E: GitExecutor> {
    repo: &'r GitRepository<E>,
    name: String,
    original_branch: String,
    cleaned: bool,
}

impl<'r, E: GitExecutor> EphemeralBranch<'r, E> {
    fn create(
        repo: &'r GitRepository<E>,
        name: String,
        start: &str,
        original_branch: &str,
    ) -> Result<Self> {
        repo.create_and_checkout_branch(&name, start)?;
        Ok(Self {
            repo,
            name,
            original_branch: original_branch.to_string(),
            cleaned: false,
        })
    }

    /// Leave the scratch branch and delete it
    fn cleanup(&mut self) -> Option<SquashWarning> {
        if self.cleaned {
            return None;
        }
        self.cleaned = true;

        match self.repo.get_current_branch() {
            Ok(current) if current == self.name => {
                if let Err(e) = self.repo.force_checkout_branch(&self.original_branch) {
                    return Some(self.warning(e));
                }
            }
            Ok(_) => {}
            Err(e) => debug!("Could not read current branch during cleanup: {}", e),
        }

        match self.repo.delete_branch(&self.name) {
            Ok(()) => None,
            Err(e) => Some(self.warning(e)),
        }
    }

    fn warning(&self, error: AtError) -> SquashWarning {
        let warning = SquashWarning::CleanupFailure {
            branch: self.name.clone(),
            reason: error.to_string(),
        };
        warn!("{}", warning);
        warning
    }
}

impl<E: GitExecutor> Drop for EphemeralBranch<'_, E> {
    fn drop(&mut self) {
        if !self.cleaned {
            warn!("Temporary branch '{}' was not cleaned up, removing it now", self.name);
            if self.cleanup().is_some() {
                warn!("Run 'git-at cleanup --execute' to remove leftover temporary branches");
            }
        }
    }
}

/// Collapses the commits a branch has on top of its target into one commit.
///
/// The current branch is only ever moved by a single compare-and-swap ref
/// update after the whole range has been replayed and collapsed on a scratch
/// branch, so a failed replay leaves it exactly where it was.
pub struct Squasher<'a, E: GitExecutor> {
    repo: &'a GitRepository<E>,
    config: &'a dyn ConfigStore,
    settings: SquashSettings,
}

impl<'a, E: GitExecutor> Squasher<'a, E> {
    pub fn new(repo: &'a GitRepository<E>, config: &'a dyn ConfigStore) -> Result<Self> {
        let settings = SquashSettings::load(config)?;
        Ok(Self::with_settings(repo, config, settings))
    }

    pub fn with_settings(
        repo: &'a GitRepository<E>,
        config: &'a dyn ConfigStore,
        settings: SquashSettings,
    ) -> Self {
        Self {
            repo,
            config,
            settings,
        }
    }

    pub fn settings(&self) -> &SquashSettings {
        &self.settings
    }

    /// Resolve the target and list the commits a squash would consolidate
    pub fn preview(&self, target: Option<&str>) -> Result<SquashPreview> {
        let branch = self.repo.get_current_branch()?;

        let (target, source) = match target.map(str::trim).filter(|t| !t.is_empty()) {
            Some(explicit) => (explicit.to_string(), None),
            None => {
                let parent =
                    ParentBranchResolver::new(self.repo, self.config, &self.settings)
                        .resolve(&branch)?;
                (parent.name, Some(parent.source))
            }
        };

        let range = CommitRangeAnalyzer::new(self.repo).range(&target, &branch)?;

        Ok(SquashPreview {
            branch,
            target,
            source,
            range,
        })
    }

    /// Like [`Squasher::preview`], but measured from the merge-base with the
    /// trunk (`at.trunk`, else `main`) so the branch is not moved onto the
    /// trunk's newer commits
    pub fn preview_for_pr(&self) -> Result<SquashPreview> {
        let branch = self.repo.get_current_branch()?;
        let trunk = self.settings.pr_trunk();
        if branch == trunk {
            return Err(AtError::validation(format!(
                "Cannot squash '{trunk}' for a pull request into itself"
            )));
        }

        let trunk_commit = self
            .repo
            .try_resolve_commit(trunk)?
            .ok_or_else(|| AtError::not_found(format!("Trunk branch '{trunk}' does not exist")))?;
        let head = self.repo.get_head_commit_hash()?;
        let base = self.repo.merge_base(&trunk_commit, &head)?.ok_or_else(|| {
            AtError::not_found(format!("'{branch}' shares no history with '{trunk}'"))
        })?;
        debug!("'{}' forked from '{}' at {}", branch, trunk, base);

        let range = CommitRangeAnalyzer::new(self.repo).range(&base, &branch)?;

        Ok(SquashPreview {
            branch,
            target: trunk.to_string(),
            source: Some(ResolutionSource::TrunkMergeBase),
            range,
        })
    }

    /// Squash the current branch down to one commit on top of `target`.
    ///
    /// `target` defaults to the auto-detected parent branch and `message` to
    /// one generated from the squashed commits.
    pub fn squash(&self, target: Option<&str>, message: Option<&str>) -> Result<SquashReport> {
        self.run(|| self.preview(target), message)
    }

    /// Squash everything the current branch added since it forked from the
    /// trunk, leaving the fork point where it is
    pub fn squash_for_pr(&self, message: Option<&str>) -> Result<SquashReport> {
        self.run(|| self.preview_for_pr(), message)
    }

    fn run<F>(&self, plan_target: F, message: Option<&str>) -> Result<SquashReport>
    where
        F: FnOnce() -> Result<SquashPreview>,
    {
        let mut plan = SquashPlan::new();
        plan.advance(SquashStatus::Validating)?;

        let preview = match plan_target().and_then(|preview| self.validate(preview)) {
            Ok(preview) => preview,
            Err(e) => return Err(plan.fail(e)),
        };
        plan.branch = preview.branch.clone();
        plan.target_commit = preview.target_commit().to_string();
        plan.original_head_commit = preview.head_commit().to_string();

        if preview.is_noop() {
            info!(
                "'{}' is {} commit(s) ahead of '{}', nothing to squash",
                preview.branch,
                preview.range.len(),
                preview.target
            );
            plan.advance(SquashStatus::Done)?;
            return Ok(SquashReport {
                branch: preview.branch,
                target: preview.target,
                target_source: preview.source,
                commits_consolidated: 0,
                original_head: plan.original_head_commit.clone(),
                new_head: plan.original_head_commit,
                message: None,
                warnings: Vec::new(),
            });
        }

        plan.advance(SquashStatus::Isolating)?;
        let stash = match StashGuard::isolate(self.repo) {
            Ok(stash) => stash,
            Err(e) => return Err(plan.fail(e)),
        };
        plan.stashed = stash.is_some();

        plan.advance(SquashStatus::Replaying)?;
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| generate_squash_message(&preview.range.subjects_newest_first()));

        let mut ephemeral = None;
        let outcome = self
            .ephemeral_branch_name(&plan.branch, Utc::now().timestamp())
            .and_then(|name| {
                plan.ephemeral_branch_name = Some(name.clone());
                EphemeralBranch::create(self.repo, name, &plan.target_commit, &plan.branch)
            })
            .and_then(|branch| {
                ephemeral = Some(branch);
                self.replay_and_collapse(&preview.range, &message)
            });

        let outcome = match outcome {
            Ok(new_tip) => {
                plan.advance(SquashStatus::Finalizing)?;
                self.finalize(&plan, &new_tip).map(|_| new_tip)
            }
            Err(e) => Err(e),
        };

        plan.advance(SquashStatus::Cleanup)?;
        let mut warnings = Vec::new();
        if let Some(mut branch) = ephemeral {
            warnings.extend(branch.cleanup());
        }
        if let Some(stash) = stash {
            let label = stash.label().to_string();
            if let Err(e) = stash.release() {
                let warning = SquashWarning::StashRestoreFailure {
                    label,
                    reason: e.to_string(),
                };
                warn!("{}", warning);
                warnings.push(warning);
            }
        }

        match outcome {
            Ok(new_head) => {
                plan.advance(SquashStatus::Done)?;
                info!(
                    "Squashed {} commits on '{}' into {}",
                    preview.range.len(),
                    plan.branch,
                    new_head
                );
                Ok(SquashReport {
                    branch: preview.branch,
                    target: preview.target,
                    target_source: preview.source,
                    commits_consolidated: preview.range.len(),
                    original_head: plan.original_head_commit,
                    new_head,
                    message: Some(message),
                    warnings,
                })
            }
            Err(e) => Err(plan.fail(with_warnings(e, warnings))),
        }
    }

    fn validate(&self, preview: SquashPreview) -> Result<SquashPreview> {
        if preview.is_noop() {
            return Ok(preview);
        }

        let merges: Vec<&str> = preview
            .range
            .merge_commits()
            .map(|c| c.short_id())
            .collect();
        if !merges.is_empty() {
            return Err(AtError::validation(format!(
                "Cannot squash '{}': range contains merge commit(s) {}",
                preview.branch,
                merges.join(", ")
            )));
        }

        if !self.settings.autostash && self.repo.has_uncommitted_changes()? {
            return Err(AtError::validation(
                "Working tree has uncommitted changes and autostash is disabled; commit or stash them first",
            ));
        }

        Ok(preview)
    }

    /// Pick every commit oldest first onto the scratch branch, then fold the
    /// result into one commit. Returns the new commit id.
    fn replay_and_collapse(&self, range: &CommitRange, message: &str) -> Result<String> {
        for commit in &range.commits {
            debug!("Replaying {} {}", commit.short_id(), commit.subject);
            if let Err(e) = self.repo.cherry_pick(&commit.id) {
                let stderr = match e {
                    AtError::Command { stderr, .. } => stderr,
                    other => return Err(other),
                };

                let conflicted_files = self.repo.get_conflicted_files().unwrap_or_else(|err| {
                    debug!("Could not list conflicted files: {}", err);
                    Vec::new()
                });
                if let Err(abort) = self.repo.abort_cherry_pick() {
                    debug!("cherry-pick --abort failed: {}", abort);
                }

                warn!(
                    "Replay of {} stopped: {} conflicted file(s)",
                    commit.short_id(),
                    conflicted_files.len()
                );
                return Err(AtError::Conflict {
                    commit: commit.id.clone(),
                    subject: commit.subject.clone(),
                    reason: stderr,
                    conflicted_files,
                    warnings: Vec::new(),
                });
            }
        }

        let replayed_tree = self.repo.tree_of("HEAD")?;
        self.repo.reset_soft(&range.base)?;
        let new_tip = self.repo.commit(message)?;

        let collapsed_tree = self.repo.tree_of(&new_tip)?;
        if collapsed_tree != replayed_tree {
            return Err(AtError::validation(format!(
                "Collapsed commit {new_tip} has tree {collapsed_tree}, expected {replayed_tree}"
            )));
        }
        Ok(new_tip)
    }

    fn finalize(&self, plan: &SquashPlan, new_tip: &str) -> Result<()> {
        self.repo
            .update_branch_to_commit(&plan.branch, new_tip, &plan.original_head_commit)?;

        // Cleanup force-checks out the branch if this fails
        if let Err(e) = self.repo.checkout_branch(&plan.branch) {
            warn!("{}", e);
        }
        Ok(())
    }

    /// `[<prefix>/]<branch>-squash-<unix-ts>`, suffixed when already taken
    fn ephemeral_branch_name(&self, branch: &str, timestamp: i64) -> Result<String> {
        let base = match self
            .settings
            .branch_prefix
            .as_deref()
            .map(|p| p.trim().trim_end_matches('/'))
            .filter(|p| !p.is_empty())
        {
            Some(prefix) => format!("{prefix}/{branch}-squash-{timestamp}"),
            None => format!("{branch}-squash-{timestamp}"),
        };

        if !self.repo.branch_exists(&base)? {
            return Ok(base);
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if !self.repo.branch_exists(&candidate)? {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

/// Attach cleanup warnings to the error that ended the squash
fn with_warnings(error: AtError, extra: Vec<SquashWarning>) -> AtError {
    match error {
        AtError::Conflict {
            commit,
            subject,
            reason,
            conflicted_files,
            mut warnings,
        } => {
            warnings.extend(extra);
            AtError::Conflict {
                commit,
                subject,
                reason,
                conflicted_files,
                warnings,
            }
        }
        other => other,
    }
}
