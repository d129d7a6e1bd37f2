use crate::cli::commands::open_current;
use crate::cli::output::Output;
use crate::errors::Result;
use crate::squash::{find_orphans, sweep_orphans, OrphanBranch};
use chrono::Utc;

/// List (and with `execute`, delete) leftovers of interrupted squashes
pub fn run(execute: bool) -> Result<()> {
    let (repo, _config) = open_current()?;

    Output::section(format!(
        "Scanning {} for leftovers of interrupted squashes",
        repo.path().display()
    ));
    let orphans = find_orphans(&repo)?;

    if orphans.is_empty() {
        Output::success("No orphaned temporary branches or stash entries found");
        return Ok(());
    }

    if !orphans.branches.is_empty() {
        Output::info(format!(
            "Found {} temporary branches:",
            orphans.branches.len()
        ));
        for branch in &orphans.branches {
            Output::sub_item(format!("{} {}", branch.name, describe_age(branch)));
        }
    }

    if !orphans.stashes.is_empty() {
        Output::info(format!(
            "Found {} stash entries holding uncommitted changes:",
            orphans.stashes.len()
        ));
        for entry in &orphans.stashes {
            Output::sub_item(format!("{} {}", entry.reference, entry.message));
        }
        Output::tip("Stash entries are never dropped automatically; restore one with:");
        Output::command_example("git stash pop --index <stash@{n}>");
    }

    Output::spacing();

    if !execute {
        Output::warning("Dry run, nothing was deleted");
        Output::info("Run with --execute to delete the temporary branches");
        return Ok(());
    }

    if orphans.branches.is_empty() {
        return Ok(());
    }

    let result = sweep_orphans(&repo, &orphans)?;
    for name in &result.deleted {
        Output::success(format!("Deleted: {name}"));
    }
    for name in &result.skipped {
        Output::warning(format!("Skipped: {name} (currently checked out)"));
    }
    for name in &result.unmerged {
        Output::warning(format!(
            "Kept: {name} (has commits no other branch or tag contains)"
        ));
    }
    if !result.unmerged.is_empty() {
        Output::tip("Inspect the kept branches and delete them with:");
        Output::command_example("git branch -D <branch>");
    }
    for (name, reason) in &result.failed {
        Output::error(format!("Failed to delete: {name} ({reason})"));
    }

    Ok(())
}

fn describe_age(branch: &OrphanBranch) -> String {
    let Some(created_at) = branch.created_at else {
        return "(orphaned)".to_string();
    };

    let age = Utc::now().signed_duration_since(created_at);
    if age.num_days() > 0 {
        format!("(created {} days ago)", age.num_days())
    } else if age.num_hours() > 0 {
        format!("(created {} hours ago)", age.num_hours())
    } else {
        format!("(created {} minutes ago)", age.num_minutes())
    }
}
