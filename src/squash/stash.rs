use crate::errors::{AtError, Result};
use crate::git::{GitExecutor, GitRepository, StashEntry};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Every stash entry created by a squash carries a label with this prefix
pub const STASH_LABEL_PREFIX: &str = "git-at-squash-";

/// Scoped isolation of uncommitted changes.
///
/// `isolate` stashes tracked modifications (staged and unstaged) under a
/// unique label. The changes are re-applied exactly once: either through an
/// explicit [`StashGuard::release`], which reports failure to the caller, or
/// from `Drop` when the guard goes out of scope unreleased.
pub struct StashGuard<'r, E: GitExecutor> {
    repo: &'r GitRepository<E>,
    label: String,
    released: bool,
}

impl<'r, E: GitExecutor> StashGuard<'r, E> {
    /// Stash uncommitted changes; `None` when the working tree is clean
    pub fn isolate(repo: &'r GitRepository<E>) -> Result<Option<Self>> {
        if !repo.has_uncommitted_changes()? {
            debug!("Working tree clean, nothing to stash");
            return Ok(None);
        }

        let label = format!("{STASH_LABEL_PREFIX}{}", Uuid::new_v4());
        repo.stash_push(&label)?;

        if find_labelled(repo, &label)?.is_none() {
            return Err(AtError::validation(format!(
                "git stash reported success but recorded no entry for '{label}'"
            )));
        }

        info!("Stashed uncommitted changes as '{}'", label);
        Ok(Some(Self {
            repo,
            label,
            released: false,
        }))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Re-apply the isolated changes.
    /// On failure the stash entry stays in place and can be recovered by hand.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        restore(self.repo, &self.label)
    }
}

impl<E: GitExecutor> Drop for StashGuard<'_, E> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        warn!("Restoring stash '{}' during unwind", self.label);
        if let Err(e) = restore(self.repo, &self.label) {
            warn!(
                "Could not restore stashed changes '{}': {}. Run 'git stash list' to recover them",
                self.label, e
            );
        }
    }
}

fn restore<E: GitExecutor>(repo: &GitRepository<E>, label: &str) -> Result<()> {
    let entry = find_labelled(repo, label)?
        .ok_or_else(|| AtError::not_found(format!("no stash entry labelled '{label}'")))?;

    repo.stash_pop(&entry.reference)?;
    info!("Restored stashed changes from '{}'", label);
    Ok(())
}

/// Most recent stash entry whose message carries `label`
fn find_labelled<E: GitExecutor>(repo: &GitRepository<E>, label: &str) -> Result<Option<StashEntry>> {
    Ok(repo
        .stash_list()?
        .into_iter()
        .find(|entry| entry.message.ends_with(label)))
}

/// Stash entries left behind by an interrupted squash
pub fn orphaned_stashes<E: GitExecutor>(repo: &GitRepository<E>) -> Result<Vec<StashEntry>> {
    Ok(repo
        .stash_list()?
        .into_iter()
        .filter(|entry| {
            entry
                .message
                .rsplit(' ')
                .next()
                .is_some_and(|word| word.starts_with(STASH_LABEL_PREFIX))
        })
        .collect())
}
