use crate::errors::{AtError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Runs git plumbing commands against one repository.
///
/// Implementations return trimmed stdout on success. Any unsuccessful
/// invocation must come back as [`AtError::Command`] (or [`AtError::Io`] when
/// the process could not be spawned); callers translate those into the
/// squash error taxonomy.
pub trait GitExecutor {
    fn execute(&self, args: &[&str]) -> Result<String>;
}

impl<E: GitExecutor + ?Sized> GitExecutor for &E {
    fn execute(&self, args: &[&str]) -> Result<String> {
        (**self).execute(args)
    }
}

impl<E: GitExecutor + ?Sized> GitExecutor for Box<E> {
    fn execute(&self, args: &[&str]) -> Result<String> {
        (**self).execute(args)
    }
}

/// Executor backed by the `git` binary
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
}

impl GitCli {
    pub fn new(workdir: &Path) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
        }
    }
}

impl GitExecutor for GitCli {
    fn execute(&self, args: &[&str]) -> Result<String> {
        debug!("git {}", args.join(" "));

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            // Never block on an editor or credential prompt
            .env("GIT_EDITOR", "true")
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!(
            "git {} exited with {:?}: {}",
            args.join(" "),
            output.status.code(),
            stderr
        );
        Err(AtError::Command {
            command: args.join(" "),
            code: output.status.code(),
            stderr,
        })
    }
}
