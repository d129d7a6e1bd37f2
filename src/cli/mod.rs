pub mod commands;
pub mod output;

use crate::errors::Result;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "git-at")]
#[command(about = "Squash a branch down to one commit on top of its parent")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Squash the current branch into a single commit
    Squash {
        /// Branch or commit to squash onto (defaults to the detected parent branch)
        target: Option<String>,

        /// Squash everything since the branch forked from the trunk, for a pull request
        #[arg(long, short, conflicts_with = "target")]
        pr: bool,

        /// Report the automatic pull-request squash setting (at.pr.squash)
        #[arg(long, short, value_enum, value_name = "ACTION", conflicts_with_all = ["target", "pr", "dry_run"])]
        auto: Option<AutoAction>,

        /// Commit message (generated from the squashed commits if omitted)
        #[arg(long, short)]
        message: Option<String>,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,

        /// Show what would be squashed without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the detected parent branch of the current branch
    Parent,

    /// Find temporary branches and stash entries left by interrupted squashes
    Cleanup {
        /// Actually delete the orphaned branches (default is a dry run)
        #[arg(long)]
        execute: bool,
    },

    /// Show effective squash settings as JSON
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AutoAction {
    /// Show whether pull requests are squashed automatically
    Status,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        self.setup_logging();

        if self.no_color {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }

        match self.command {
            Commands::Squash {
                auto: Some(AutoAction::Status),
                json,
                ..
            } => commands::squash::show_auto_status(json),
            Commands::Squash {
                target,
                pr,
                message,
                yes,
                dry_run,
                json,
                ..
            } => commands::squash::run(commands::squash::SquashArgs {
                target,
                pr,
                message,
                yes,
                dry_run,
                json,
            }),
            Commands::Parent => commands::parent::run(),
            Commands::Cleanup { execute } => commands::cleanup::run(execute),
            Commands::Config => commands::config::run(),
        }
    }

    fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        };

        // stderr keeps --json output on stdout parseable
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .without_time();

        if self.no_color {
            subscriber.with_ansi(false).init();
        } else {
            subscriber.init();
        }
    }
}
