use crate::cli::commands::open_current;
use crate::config::SquashSettings;
use crate::errors::Result;

/// Print the effective squash settings as JSON
pub fn run() -> Result<()> {
    let (_repo, config) = open_current()?;
    let settings = SquashSettings::load(&config)?;

    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
