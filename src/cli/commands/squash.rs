use crate::cli::commands::open_current;
use crate::cli::output::Output;
use crate::config::settings::PR_SQUASH_KEY;
use crate::config::SquashSettings;
use crate::errors::{AtError, Result};
use crate::squash::{SquashPreview, SquashReport, Squasher};
use dialoguer::{theme::ColorfulTheme, Confirm};
use serde_json::json;

pub struct SquashArgs {
    pub target: Option<String>,
    pub pr: bool,
    pub message: Option<String>,
    pub yes: bool,
    pub dry_run: bool,
    pub json: bool,
}

pub fn run(args: SquashArgs) -> Result<()> {
    let (repo, config) = open_current()?;
    let squasher = Squasher::new(&repo, &config)?;

    let preview = if args.pr {
        squasher.preview_for_pr()?
    } else {
        squasher.preview(args.target.as_deref())?
    };

    if args.dry_run {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&preview)?);
        } else {
            show_preview(&preview);
            Output::info("Dry run, nothing was changed");
        }
        return Ok(());
    }

    if !args.json {
        show_preview(&preview);
    }

    if !preview.is_noop() && !args.yes {
        let proceed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Squash {} commits on '{}' into one?",
                preview.range.len(),
                preview.branch
            ))
            .default(true)
            .interact()
            .map_err(|e| AtError::config(format!("Input error: {e}")))?;

        if !proceed {
            Output::info("Squash cancelled");
            return Ok(());
        }
    }

    // Pin the previewed base commit so the squash matches what was confirmed
    let result = squasher
        .squash(Some(preview.target_commit()), args.message.as_deref())
        .map(|mut report| {
            report.target = preview.target.clone();
            report.target_source = preview.source;
            report
        });

    match result {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                show_report(&report);
            }
            Ok(())
        }
        Err(e) => {
            show_failure(&e);
            Err(e)
        }
    }
}

fn show_preview(preview: &SquashPreview) {
    Output::section(format!(
        "Squash {} onto {}",
        Output::branch(&preview.branch),
        Output::branch(&preview.target)
    ));
    if let Some(source) = preview.source {
        Output::sub_item(format!("Target detected via {source}"));
    }

    if preview.range.is_empty() {
        Output::sub_item("No commits ahead of the target");
    }
    for commit in preview.range.commits.iter().rev() {
        Output::bullet(format!("{} {}", Output::commit_id(&commit.id), commit.subject));
    }
    if preview.range.merge_commits().next().is_some() {
        Output::warning("Range contains merge commits, which cannot be squashed");
    }
}

fn show_report(report: &SquashReport) {
    if report.is_noop() {
        Output::success(format!(
            "Nothing to squash: '{}' is at most one commit ahead of '{}'",
            report.branch, report.target
        ));
    } else {
        Output::success(format!(
            "Squashed {} commits on {} into {}",
            report.commits_consolidated,
            Output::branch(&report.branch),
            Output::commit_id(&report.new_head)
        ));
        if let Some(message) = &report.message {
            Output::sub_item(format!("Message: {message}"));
        }
        Output::tip(format!(
            "Previous head was {}; restore with 'git reset --hard {}'",
            Output::commit_id(&report.original_head),
            report.original_head
        ));
    }

    for warning in &report.warnings {
        Output::warning(warning);
    }
}

/// Details the error message itself does not carry; the message is printed
/// once by the caller
fn show_failure(error: &AtError) {
    if let AtError::Conflict {
        conflicted_files, ..
    } = error
    {
        for file in conflicted_files {
            Output::sub_item(format!("conflict: {file}"));
        }
        Output::info("The branch was left unchanged");
    }

    for warning in error.warnings() {
        Output::warning(warning);
    }
}

/// Report whether pull requests are squashed automatically
pub fn show_auto_status(as_json: bool) -> Result<()> {
    let (_repo, config) = open_current()?;
    let settings = SquashSettings::load(&config)?;

    if as_json {
        let status = json!({
            "pr_squash": settings.pr_squash,
            "trunk": settings.pr_trunk(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    Output::section("Pull request squash setting");
    if settings.pr_squash {
        Output::success("Status: enabled");
        Output::sub_item(format!(
            "Commits are squashed against {} before a pull request is opened",
            Output::branch(settings.pr_trunk())
        ));
    } else {
        Output::info("Status: disabled");
        Output::sub_item("Pull requests keep their commits as they are");
    }

    Output::spacing();
    Output::tip("Change it with:");
    Output::command_example(format!("git config {PR_SQUASH_KEY} true"));
    Output::command_example(format!("git config {PR_SQUASH_KEY} false"));
    Output::tip("Squash for a pull request now with:");
    Output::command_example("git-at squash --pr");
    Ok(())
}
