use crate::cli::commands::open_current;
use crate::cli::output::Output;
use crate::config::SquashSettings;
use crate::errors::Result;
use crate::squash::ParentBranchResolver;

/// Show which branch a squash would target by default
pub fn run() -> Result<()> {
    let (repo, config) = open_current()?;
    let settings = SquashSettings::load(&config)?;
    let current = repo.get_current_branch()?;

    let parent = ParentBranchResolver::new(&repo, &config, &settings).resolve(&current)?;

    Output::success(format!(
        "Parent of {} is {}",
        Output::branch(&current),
        Output::branch(&parent.name)
    ));
    Output::sub_item(format!("Found via {}", parent.source));
    Ok(())
}
